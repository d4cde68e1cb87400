//! RLC Compiled Rule List Format v1 Constants
//!
//! All values are little-endian.

/// Magic bytes: "RLC1"
pub const RLC_MAGIC: [u8; 4] = [0x52, 0x4C, 0x43, 0x31];

/// Current format version
pub const RLC_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Section directory entry size
pub const SECTION_ENTRY_SIZE: usize = 12;

// =============================================================================
// Header Field Offsets
// =============================================================================

/// Header field byte offsets.
pub mod header {
    /// u8[4] magic = "RLC1"
    pub const MAGIC: usize = 0;
    /// u16 version
    pub const VERSION: usize = 4;
    /// u16 flags
    pub const FLAGS: usize = 6;
    /// u32 headerBytes (always 32)
    pub const HEADER_BYTES: usize = 8;
    /// u32 sectionCount
    pub const SECTION_COUNT: usize = 12;
    /// u32 sectionDirOffset
    pub const SECTION_DIR_OFFSET: usize = 16;
    /// u32 ruleCount
    pub const RULE_COUNT: usize = 20;
    /// u32 sourceHash (Murmur3 of the raw source)
    pub const SOURCE_HASH: usize = 24;
    /// u32 crc32 over every byte except this field
    pub const CRC32: usize = 28;
}

/// Header flags.
pub mod header_flags {
    /// List carries a CRC32 checksum
    pub const HAS_CRC32: u16 = 1 << 0;
}

pub mod section_entry {
    /// u16 section id
    pub const ID: usize = 0;
    /// u16 flags
    pub const FLAGS: usize = 2;
    /// u32 file offset
    pub const OFFSET: usize = 4;
    /// u32 byte length
    pub const LENGTH: usize = 8;
}

// =============================================================================
// Section IDs
// =============================================================================

/// Section type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SectionId {
    /// String pool for url filters and selectors
    StrPool = 0x0001,
    /// Rules table
    Rules = 0x0002,
    /// Domain constraint data (if-domain / unless-domain)
    DomainConstraintPool = 0x0003,
    /// Sorted hashes of host-only block rules
    BlockDomains = 0x0004,
}

impl TryFrom<u16> for SectionId {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::StrPool),
            0x0002 => Ok(Self::Rules),
            0x0003 => Ok(Self::DomainConstraintPool),
            0x0004 => Ok(Self::BlockDomains),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Rules Table Layout
// =============================================================================

/// Rules table entry size
pub const RULE_ENTRY_SIZE: usize = 24;

pub mod rule_entry {
    /// u8 action
    pub const ACTION: usize = 0;
    /// u8 flags
    pub const FLAGS: usize = 1;
    /// u16 resource type mask
    pub const RESOURCE_MASK: usize = 2;
    /// u8 load type mask
    pub const LOAD_MASK: usize = 4;
    /// u16 url filter length
    pub const FILTER_LEN: usize = 6;
    /// u32 url filter string pool offset
    pub const FILTER_OFF: usize = 8;
    /// u32 selector string pool offset
    pub const SELECTOR_OFF: usize = 12;
    /// u16 selector length
    pub const SELECTOR_LEN: usize = 16;
    /// u32 domain constraint pool offset
    pub const CONSTRAINT_OFF: usize = 20;
}

/// Domain constraint entry header: u16 count, u16 reserved
pub const CONSTRAINT_HEADER_SIZE: usize = 4;

/// One (lo, hi) domain hash
pub const DOMAIN_HASH_SIZE: usize = 8;

// =============================================================================
// Sentinels
// =============================================================================

/// No string sentinel
pub const NO_STRING: u32 = 0xFFFF_FFFF;

/// No constraint sentinel
pub const NO_CONSTRAINT: u32 = 0xFFFF_FFFF;

// =============================================================================
// Helpers
// =============================================================================

/// Align offset to boundary.
#[inline]
pub const fn align_offset(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) & !(alignment - 1)
}

#[inline]
pub fn validate_magic(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == RLC_MAGIC
}

#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[inline]
pub fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
pub fn write_u16_le(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn write_u32_le(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Checksum of a compiled list, skipping the CRC field itself.
pub fn list_crc32(data: &[u8]) -> u32 {
    let mut crc_data = Vec::with_capacity(data.len().saturating_sub(4));
    crc_data.extend_from_slice(&data[..header::CRC32]);
    crc_data.extend_from_slice(&data[header::CRC32 + 4..]);
    crate::hash::crc32(&crc_data)
}
