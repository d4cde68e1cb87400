//! Zero-copy compiled rule list loader

use std::collections::HashMap;

use super::format::*;
use crate::hash::{hash_domain, Hash64};
use crate::types::{LoadType, ResourceType, RuleAction, RuleFlags};

/// Error type for compiled list loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Invalid magic bytes")]
    InvalidMagic,
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("CRC32 mismatch: stored={stored}, computed={computed}")]
    Crc32Mismatch { stored: u32, computed: u32 },
    #[error("Invalid section: {0}")]
    InvalidSection(String),
    #[error("Invalid rule {index}: {reason}")]
    InvalidRule { index: usize, reason: String },
    #[error("Data too short")]
    DataTooShort,
}

#[derive(Debug, Clone, Copy)]
struct SectionInfo {
    offset: usize,
    length: usize,
}

/// Zero-copy view over compiled rule list bytes.
///
/// Every rule is validated by [`RuleListView::load`], so the accessors
/// never fail on a loaded view.
#[derive(Debug, Clone)]
pub struct RuleListView<'a> {
    pub version: u16,
    pub flags: u16,
    pub source_hash: u32,
    rule_count: usize,
    str_pool: &'a [u8],
    rules: &'a [u8],
    constraints: &'a [u8],
    block_domains: &'a [u8],
}

impl<'a> RuleListView<'a> {
    /// Load and validate a compiled list.
    pub fn load(data: &'a [u8]) -> Result<Self, FormatError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatError::DataTooShort);
        }
        if !validate_magic(data) {
            return Err(FormatError::InvalidMagic);
        }

        let version = read_u16_le(data, header::VERSION);
        if version != RLC_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let flags = read_u16_le(data, header::FLAGS);
        if flags & header_flags::HAS_CRC32 != 0 {
            let stored = read_u32_le(data, header::CRC32);
            let computed = list_crc32(data);
            if stored != computed {
                return Err(FormatError::Crc32Mismatch { stored, computed });
            }
        }

        let section_count = read_u32_le(data, header::SECTION_COUNT) as usize;
        let section_dir_offset = read_u32_le(data, header::SECTION_DIR_OFFSET) as usize;
        let rule_count = read_u32_le(data, header::RULE_COUNT) as usize;
        let source_hash = read_u32_le(data, header::SOURCE_HASH);

        let dir_end = section_count
            .checked_mul(SECTION_ENTRY_SIZE)
            .and_then(|len| len.checked_add(section_dir_offset))
            .ok_or(FormatError::DataTooShort)?;
        if dir_end > data.len() {
            return Err(FormatError::DataTooShort);
        }

        let mut sections = HashMap::new();
        for i in 0..section_count {
            let entry = section_dir_offset + i * SECTION_ENTRY_SIZE;
            let id = match SectionId::try_from(read_u16_le(data, entry + section_entry::ID)) {
                Ok(id) => id,
                Err(_) => continue, // Skip unknown sections
            };
            let offset = read_u32_le(data, entry + section_entry::OFFSET) as usize;
            let length = read_u32_le(data, entry + section_entry::LENGTH) as usize;
            if offset.checked_add(length).map_or(true, |end| end > data.len()) {
                return Err(FormatError::InvalidSection(format!("{:?} out of bounds", id)));
            }
            sections.insert(id, SectionInfo { offset, length });
        }

        let section = |id: SectionId| -> Result<&'a [u8], FormatError> {
            let info = sections
                .get(&id)
                .ok_or_else(|| FormatError::InvalidSection(format!("{:?} missing", id)))?;
            Ok(&data[info.offset..info.offset + info.length])
        };

        let str_pool = length_prefixed(section(SectionId::StrPool)?, SectionId::StrPool)?;
        let constraints = length_prefixed(
            section(SectionId::DomainConstraintPool)?,
            SectionId::DomainConstraintPool,
        )?;

        let rules_section = section(SectionId::Rules)?;
        let table_count = counted(rules_section, SectionId::Rules)?;
        if table_count != rule_count {
            return Err(FormatError::InvalidSection(format!(
                "Rules holds {} entries, header says {}",
                table_count, rule_count
            )));
        }
        let rules = sized_table(rules_section, table_count, RULE_ENTRY_SIZE, SectionId::Rules)?;

        let domains_section = section(SectionId::BlockDomains)?;
        let domain_count = counted(domains_section, SectionId::BlockDomains)?;
        let block_domains =
            sized_table(domains_section, domain_count, 8, SectionId::BlockDomains)?;
        for i in 1..domain_count {
            if read_u64_le(block_domains, (i - 1) * 8) >= read_u64_le(block_domains, i * 8) {
                return Err(FormatError::InvalidSection("BlockDomains not sorted".to_string()));
            }
        }

        let view = Self {
            version,
            flags,
            source_hash,
            rule_count,
            str_pool,
            rules,
            constraints,
            block_domains,
        };

        for index in 0..rule_count {
            view.decode_rule(index)
                .map_err(|reason| FormatError::InvalidRule { index, reason })?;
        }

        Ok(view)
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn block_domain_count(&self) -> usize {
        self.block_domains.len() / 8
    }

    /// Get one rule.
    pub fn rule(&self, index: usize) -> Option<RuleRecord<'a>> {
        if index >= self.rule_count {
            return None;
        }
        self.decode_rule(index).ok()
    }

    pub fn rules(&self) -> impl Iterator<Item = RuleRecord<'a>> + '_ {
        (0..self.rule_count).filter_map(move |i| self.rule(i))
    }

    /// Whether a host-only block rule covers `host` or one of its parent domains.
    pub fn blocks_domain(&self, host: &str) -> bool {
        let mut candidate = host.trim_matches('.');
        loop {
            if candidate.is_empty() {
                return false;
            }
            if self.contains_block_hash(hash_domain(candidate)) {
                return true;
            }
            match candidate.find('.') {
                Some(dot) => candidate = &candidate[dot + 1..],
                None => return false,
            }
        }
    }

    fn contains_block_hash(&self, hash: Hash64) -> bool {
        let needle = hash.to_u64();
        let (mut lo, mut hi) = (0usize, self.block_domain_count());
        while lo < hi {
            let mid = (lo + hi) / 2;
            let value = read_u64_le(self.block_domains, mid * 8);
            if value == needle {
                return true;
            }
            if value < needle {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        false
    }

    fn decode_rule(&self, index: usize) -> Result<RuleRecord<'a>, String> {
        let base = index * RULE_ENTRY_SIZE;
        let entry = &self.rules[base..base + RULE_ENTRY_SIZE];

        let action = RuleAction::try_from(entry[rule_entry::ACTION])
            .map_err(|_| format!("unknown action {}", entry[rule_entry::ACTION]))?;
        let flags = RuleFlags::from_bits(entry[rule_entry::FLAGS])
            .ok_or_else(|| format!("unknown flags {:#x}", entry[rule_entry::FLAGS]))?;
        let resource_types = ResourceType::from_bits_truncate(read_u16_le(entry, rule_entry::RESOURCE_MASK));
        let load_types = LoadType::from_bits_truncate(entry[rule_entry::LOAD_MASK]);

        let url_filter = self.string(
            read_u32_le(entry, rule_entry::FILTER_OFF),
            read_u16_le(entry, rule_entry::FILTER_LEN),
        )?;

        let selector_off = read_u32_le(entry, rule_entry::SELECTOR_OFF);
        let selector = if selector_off == NO_STRING {
            None
        } else {
            Some(self.string(selector_off, read_u16_le(entry, rule_entry::SELECTOR_LEN))?)
        };

        let constraint_off = read_u32_le(entry, rule_entry::CONSTRAINT_OFF);
        let constraint = if constraint_off == NO_CONSTRAINT {
            None
        } else {
            Some(self.constraint(constraint_off as usize)?)
        };

        Ok(RuleRecord {
            action,
            flags,
            resource_types,
            load_types,
            url_filter,
            selector,
            constraint,
        })
    }

    fn string(&self, offset: u32, len: u16) -> Result<&'a str, String> {
        let (offset, len) = (offset as usize, len as usize);
        let bytes = offset
            .checked_add(len)
            .and_then(|end| self.str_pool.get(offset..end))
            .ok_or_else(|| format!("string {}+{} outside pool", offset, len))?;
        std::str::from_utf8(bytes).map_err(|e| format!("string at {} is not utf-8: {}", offset, e))
    }

    fn constraint(&self, offset: usize) -> Result<DomainConstraintView<'a>, String> {
        let header = offset
            .checked_add(CONSTRAINT_HEADER_SIZE)
            .and_then(|end| self.constraints.get(offset..end))
            .ok_or_else(|| format!("constraint {} outside pool", offset))?;
        let count = read_u16_le(header, 0) as usize;
        let start = offset + CONSTRAINT_HEADER_SIZE;
        let hashes = self
            .constraints
            .get(start..start + count * DOMAIN_HASH_SIZE)
            .ok_or_else(|| format!("constraint {} truncated", offset))?;
        Ok(DomainConstraintView { hashes })
    }
}

fn length_prefixed(section: &[u8], id: SectionId) -> Result<&[u8], FormatError> {
    let len = counted(section, id)?;
    section
        .get(4..4 + len)
        .ok_or_else(|| FormatError::InvalidSection(format!("{:?} length exceeds section", id)))
}

fn counted(section: &[u8], id: SectionId) -> Result<usize, FormatError> {
    if section.len() < 4 {
        return Err(FormatError::InvalidSection(format!("{:?} too short", id)));
    }
    Ok(read_u32_le(section, 0) as usize)
}

fn sized_table(section: &[u8], count: usize, entry_size: usize, id: SectionId) -> Result<&[u8], FormatError> {
    count
        .checked_mul(entry_size)
        .and_then(|len| section.get(4..4 + len))
        .ok_or_else(|| FormatError::InvalidSection(format!("{:?} table truncated", id)))
}

/// One decoded rule.
#[derive(Debug, Clone)]
pub struct RuleRecord<'a> {
    pub action: RuleAction,
    pub flags: RuleFlags,
    pub resource_types: ResourceType,
    pub load_types: LoadType,
    pub url_filter: &'a str,
    pub selector: Option<&'a str>,
    pub constraint: Option<DomainConstraintView<'a>>,
}

impl RuleRecord<'_> {
    /// True when the constraint lists excluded rather than required domains.
    pub fn is_unless_domain(&self) -> bool {
        self.flags.contains(RuleFlags::UNLESS_DOMAIN)
    }
}

/// Domain hashes attached to a rule.
#[derive(Debug, Clone, Copy)]
pub struct DomainConstraintView<'a> {
    hashes: &'a [u8],
}

impl DomainConstraintView<'_> {
    pub fn len(&self) -> usize {
        self.hashes.len() / DOMAIN_HASH_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        let hash = hash_domain(domain);
        self.hashes.chunks_exact(DOMAIN_HASH_SIZE).any(|chunk| {
            read_u32_le(chunk, 0) == hash.lo && read_u32_le(chunk, 4) == hash.hi
        })
    }
}
