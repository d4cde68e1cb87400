//! RLC Compiled Rule List Format and Loader
//!
//! This module provides the binary format layout and zero-copy loader
//! for compiled rule lists.

mod format;
mod loader;

pub use format::*;
pub use loader::*;

#[cfg(test)]
mod tests {
    use super::*;

    /// Header, directory and four empty sections.
    fn empty_list_bytes() -> Vec<u8> {
        let dir = HEADER_SIZE;
        let data_start = dir + 4 * SECTION_ENTRY_SIZE;
        let mut buf = vec![0u8; data_start + 16];

        buf[..4].copy_from_slice(&RLC_MAGIC);
        write_u16_le(&mut buf, header::VERSION, RLC_VERSION);
        write_u16_le(&mut buf, header::FLAGS, header_flags::HAS_CRC32);
        write_u32_le(&mut buf, header::HEADER_BYTES, HEADER_SIZE as u32);
        write_u32_le(&mut buf, header::SECTION_COUNT, 4);
        write_u32_le(&mut buf, header::SECTION_DIR_OFFSET, dir as u32);

        let ids = [
            SectionId::StrPool,
            SectionId::Rules,
            SectionId::DomainConstraintPool,
            SectionId::BlockDomains,
        ];
        for (i, id) in ids.iter().enumerate() {
            let entry = dir + i * SECTION_ENTRY_SIZE;
            write_u16_le(&mut buf, entry + section_entry::ID, *id as u16);
            write_u32_le(&mut buf, entry + section_entry::OFFSET, (data_start + i * 4) as u32);
            write_u32_le(&mut buf, entry + section_entry::LENGTH, 4);
        }

        let crc = list_crc32(&buf);
        write_u32_le(&mut buf, header::CRC32, crc);
        buf
    }

    #[test]
    fn loads_empty_list() {
        let bytes = empty_list_bytes();
        let view = RuleListView::load(&bytes).expect("empty list should load");
        assert_eq!(view.version, RLC_VERSION);
        assert_eq!(view.rule_count(), 0);
        assert_eq!(view.block_domain_count(), 0);
        assert!(!view.blocks_domain("example.com"));
        assert!(view.rule(0).is_none());
    }

    #[test]
    fn rejects_short_and_foreign_data() {
        assert_eq!(RuleListView::load(&[0u8; 8]).unwrap_err(), FormatError::DataTooShort);

        let mut bytes = empty_list_bytes();
        bytes[0] = b'X';
        assert_eq!(RuleListView::load(&bytes).unwrap_err(), FormatError::InvalidMagic);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = empty_list_bytes();
        write_u16_le(&mut bytes, header::VERSION, 7);
        assert_eq!(RuleListView::load(&bytes).unwrap_err(), FormatError::UnsupportedVersion(7));
    }

    #[test]
    fn detects_corruption_through_crc() {
        let mut bytes = empty_list_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            RuleListView::load(&bytes),
            Err(FormatError::Crc32Mismatch { .. })
        ));
    }

    #[test]
    fn rejects_rule_count_mismatch() {
        let mut bytes = empty_list_bytes();
        write_u32_le(&mut bytes, header::RULE_COUNT, 3);
        let crc = list_crc32(&bytes);
        write_u32_le(&mut bytes, header::CRC32, crc);
        assert!(matches!(
            RuleListView::load(&bytes),
            Err(FormatError::InvalidSection(_))
        ));
    }

    #[test]
    fn rejects_section_past_end() {
        let mut bytes = empty_list_bytes();
        let entry = HEADER_SIZE + SECTION_ENTRY_SIZE;
        write_u32_le(&mut bytes, entry + section_entry::LENGTH, 4096);
        let crc = list_crc32(&bytes);
        write_u32_le(&mut bytes, header::CRC32, crc);
        assert!(matches!(
            RuleListView::load(&bytes),
            Err(FormatError::InvalidSection(_))
        ));
    }
}
