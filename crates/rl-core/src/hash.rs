//! Hash functions used by the compiled rule list format
//!
//! Domains are keyed by a 64-bit composite of two Murmur3 passes with
//! different seeds. Raw sources are fingerprinted with a single pass so a
//! compiled list can be traced back to the text it was built from.
//!
//! Compiled lists carry a CRC32 over their bytes so a corrupted cache entry
//! is rejected at load time instead of being handed to the engine.

/// 64-bit hash represented as two 32-bit parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(C)]
pub struct Hash64 {
    pub lo: u32,
    pub hi: u32,
}

impl Hash64 {
    #[inline]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Convert to a single u64 for sorted storage.
    #[inline]
    pub const fn to_u64(&self) -> u64 {
        ((self.hi as u64) << 32) | (self.lo as u64)
    }

    #[inline]
    pub const fn from_u64(v: u64) -> Self {
        Self {
            lo: v as u32,
            hi: (v >> 32) as u32,
        }
    }
}

const SEED_LO: u32 = 0x9e3779b9;
const SEED_HI: u32 = 0x85ebca6b;
const SEED_SOURCE: u32 = 0x811c9dc5;

/// Murmur3 32-bit hash.
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut chunks = data.chunks_exact(4);

    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = chunks.remainder();
    let mut k: u32 = 0;
    for (i, &b) in tail.iter().enumerate() {
        k ^= (b as u32) << (8 * i);
    }
    if !tail.is_empty() {
        h ^= scramble(k);
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

#[inline]
fn scramble(k: u32) -> u32 {
    k.wrapping_mul(0xcc9e2d51)
        .rotate_left(15)
        .wrapping_mul(0x1b873593)
}

/// Compute 64-bit hash as (lo, hi) pair using two Murmur3 passes.
/// Never returns (0, 0).
pub fn hash64(data: &[u8]) -> Hash64 {
    let mut lo = murmur3_32(data, SEED_LO);
    let hi = murmur3_32(data, SEED_HI);
    if lo == 0 && hi == 0 {
        lo = 1;
    }
    Hash64 { lo, hi }
}

/// Hash a domain for the block-domain set and domain constraints.
/// Case-insensitive; a single leading or trailing dot is ignored.
pub fn hash_domain(domain: &str) -> Hash64 {
    let trimmed = domain.trim_matches('.');
    hash64(trimmed.to_ascii_lowercase().as_bytes())
}

/// Fingerprint of a raw rule source.
pub fn hash_source(data: &[u8]) -> u32 {
    murmur3_32(data, SEED_SOURCE)
}

/// CRC32 (IEEE 802.3 polynomial).
pub fn crc32(data: &[u8]) -> u32 {
    static CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut c = i as u32;
            let mut j = 0;
            while j < 8 {
                c = if c & 1 != 0 { 0xedb88320 ^ (c >> 1) } else { c >> 1 };
                j += 1;
            }
            table[i] = c;
            i += 1;
        }
        table
    };

    let mut crc = 0xffffffff_u32;
    for &byte in data {
        crc = CRC32_TABLE[((crc ^ byte as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    crc ^ 0xffffffff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn murmur3_matches_reference_vectors() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e28b7);
        assert_eq!(murmur3_32(b"test", 0), 0xba6bd213);
        assert_eq!(murmur3_32(b"Hello, world!", 0), 0xc0363e43);
    }

    #[test]
    fn murmur3_depends_on_seed() {
        assert_ne!(murmur3_32(b"ads", 0), murmur3_32(b"ads", 1));
    }

    #[test]
    fn hash64_never_empty() {
        for s in [b"" as &[u8], b"a", b"trackers", b"very-long-domain-name.example.com"] {
            let h = hash64(s);
            assert!(h.lo != 0 || h.hi != 0, "hash64({:?}) returned sentinel", s);
        }
    }

    #[test]
    fn hash64_u64_conversion() {
        let h = hash64(b"example.com");
        assert_eq!(Hash64::from_u64(h.to_u64()), h);
    }

    #[test]
    fn domain_hash_ignores_case_and_dots() {
        assert_eq!(hash_domain("Example.COM"), hash_domain("example.com"));
        assert_eq!(hash_domain(".example.com"), hash_domain("example.com"));
        assert_ne!(hash_domain("example.com"), hash_domain("example.org"));
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(crc32(b"123456789"), 0xcbf43926);
        assert_ne!(crc32(&[1, 2, 3]), crc32(&[1, 2, 4]));
    }
}
