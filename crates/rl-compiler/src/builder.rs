use std::collections::HashMap;

use rl_core::compiled::{
    align_offset, header, header_flags, list_crc32, rule_entry, section_entry, write_u16_le,
    write_u32_le, SectionId, HEADER_SIZE, NO_CONSTRAINT, NO_STRING, RLC_MAGIC, RLC_VERSION,
    RULE_ENTRY_SIZE, SECTION_ENTRY_SIZE,
};
use rl_core::hash::hash_domain;

use crate::rule::ParsedRule;

/// Lay out parsed rules in the RLC format.
///
/// String lengths must already fit in a u16; `compile` checks this.
pub fn build_list(rules: &[ParsedRule], source_hash: u32) -> Vec<u8> {
    let mut str_pool = StringPool::new();
    let (constraint_pool, constraint_offsets) = build_domain_constraint_pool(rules);
    let rules_section = build_rules_section(rules, &constraint_offsets, &mut str_pool);
    let block_domains = build_block_domains_section(rules);

    let mut sections = vec![
        SectionData::new(SectionId::StrPool, str_pool.build()),
        SectionData::new(SectionId::Rules, rules_section),
        SectionData::new(SectionId::DomainConstraintPool, constraint_pool),
        SectionData::new(SectionId::BlockDomains, block_domains),
    ];

    let section_dir_offset = HEADER_SIZE;
    let section_dir_bytes = sections.len() * SECTION_ENTRY_SIZE;
    let mut data_offset = align_offset(section_dir_offset + section_dir_bytes, 8);

    for section in &mut sections {
        section.offset = data_offset;
        data_offset = align_offset(data_offset + section.data.len(), 8);
    }

    let mut buffer = vec![0u8; data_offset];

    buffer[..4].copy_from_slice(&RLC_MAGIC);
    write_u16_le(&mut buffer, header::VERSION, RLC_VERSION);
    write_u16_le(&mut buffer, header::FLAGS, header_flags::HAS_CRC32);
    write_u32_le(&mut buffer, header::HEADER_BYTES, HEADER_SIZE as u32);
    write_u32_le(&mut buffer, header::SECTION_COUNT, sections.len() as u32);
    write_u32_le(&mut buffer, header::SECTION_DIR_OFFSET, section_dir_offset as u32);
    write_u32_le(&mut buffer, header::RULE_COUNT, rules.len() as u32);
    write_u32_le(&mut buffer, header::SOURCE_HASH, source_hash);

    for (index, section) in sections.iter().enumerate() {
        let entry = section_dir_offset + index * SECTION_ENTRY_SIZE;
        write_u16_le(&mut buffer, entry + section_entry::ID, section.id as u16);
        write_u16_le(&mut buffer, entry + section_entry::FLAGS, 0);
        write_u32_le(&mut buffer, entry + section_entry::OFFSET, section.offset as u32);
        write_u32_le(&mut buffer, entry + section_entry::LENGTH, section.data.len() as u32);

        let end = section.offset + section.data.len();
        buffer[section.offset..end].copy_from_slice(&section.data);
    }

    let crc = list_crc32(&buffer);
    write_u32_le(&mut buffer, header::CRC32, crc);
    buffer
}

struct SectionData {
    id: SectionId,
    data: Vec<u8>,
    offset: usize,
}

impl SectionData {
    fn new(id: SectionId, data: Vec<u8>) -> Self {
        Self { id, data, offset: 0 }
    }
}

struct StringPool {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl StringPool {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn intern(&mut self, s: &str) -> (u32, u16) {
        if let Some(&offset) = self.index.get(s) {
            return (offset, s.len() as u16);
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.index.insert(s.to_string(), offset);
        (offset, s.len() as u16)
    }

    fn build(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}

fn build_domain_constraint_pool(rules: &[ParsedRule]) -> (Vec<u8>, Vec<u32>) {
    let mut pool = Vec::new();
    pool.extend_from_slice(&0u32.to_le_bytes());

    let mut offsets = Vec::with_capacity(rules.len());
    let mut shared: HashMap<&[String], u32> = HashMap::new();

    for rule in rules {
        if rule.domains.is_empty() {
            offsets.push(NO_CONSTRAINT);
            continue;
        }
        if let Some(&offset) = shared.get(rule.domains.as_slice()) {
            offsets.push(offset);
            continue;
        }

        let offset = (pool.len() - 4) as u32;
        pool.extend_from_slice(&(rule.domains.len() as u16).to_le_bytes());
        pool.extend_from_slice(&0u16.to_le_bytes());
        for domain in &rule.domains {
            let hash = hash_domain(domain);
            pool.extend_from_slice(&hash.lo.to_le_bytes());
            pool.extend_from_slice(&hash.hi.to_le_bytes());
        }
        shared.insert(rule.domains.as_slice(), offset);
        offsets.push(offset);
    }

    let pool_len = (pool.len() - 4) as u32;
    pool[0..4].copy_from_slice(&pool_len.to_le_bytes());

    (pool, offsets)
}

fn build_rules_section(rules: &[ParsedRule], constraint_offsets: &[u32], str_pool: &mut StringPool) -> Vec<u8> {
    let mut section = vec![0u8; 4 + rules.len() * RULE_ENTRY_SIZE];
    write_u32_le(&mut section, 0, rules.len() as u32);

    for (rule_id, rule) in rules.iter().enumerate() {
        let base = 4 + rule_id * RULE_ENTRY_SIZE;
        let entry = &mut section[base..base + RULE_ENTRY_SIZE];

        entry[rule_entry::ACTION] = rule.action as u8;
        entry[rule_entry::FLAGS] = rule.flags.bits();
        write_u16_le(entry, rule_entry::RESOURCE_MASK, rule.resource_types.bits());
        entry[rule_entry::LOAD_MASK] = rule.load_types.bits();

        let (filter_off, filter_len) = str_pool.intern(&rule.url_filter);
        write_u32_le(entry, rule_entry::FILTER_OFF, filter_off);
        write_u16_le(entry, rule_entry::FILTER_LEN, filter_len);

        let (selector_off, selector_len) = match &rule.selector {
            Some(selector) => str_pool.intern(selector),
            None => (NO_STRING, 0),
        };
        write_u32_le(entry, rule_entry::SELECTOR_OFF, selector_off);
        write_u16_le(entry, rule_entry::SELECTOR_LEN, selector_len);

        write_u32_le(entry, rule_entry::CONSTRAINT_OFF, constraint_offsets[rule_id]);
    }

    section
}

fn build_block_domains_section(rules: &[ParsedRule]) -> Vec<u8> {
    let mut hashes: Vec<u64> = rules
        .iter()
        .filter(|rule| rule.is_host_only_block())
        .filter_map(|rule| rule.host.as_deref())
        .map(|host| hash_domain(host).to_u64())
        .collect();
    hashes.sort_unstable();
    hashes.dedup();

    let mut section = Vec::with_capacity(4 + hashes.len() * 8);
    section.extend_from_slice(&(hashes.len() as u32).to_le_bytes());
    for hash in hashes {
        section.extend_from_slice(&hash.to_le_bytes());
    }
    section
}
