//! MurmurHash3 (x64_128 and x86_32 variants).
//!
//! Original algorithm by Austin Appleby, placed in the public domain.
//! Blocks are always read little-endian so digests are identical on every host.

const C1_64: u64 = 0x87c3_7b91_1142_53d5;
const C2_64: u64 = 0x4cf5_ad43_2745_937f;

const C1_32: u32 = 0xcc9e_2d51;
const C2_32: u32 = 0x1b87_3593;

#[inline]
fn mix_k1_64(k1: u64) -> u64 {
    k1.wrapping_mul(C1_64).rotate_left(31).wrapping_mul(C2_64)
}

#[inline]
fn mix_k2_64(k2: u64) -> u64 {
    k2.wrapping_mul(C2_64).rotate_left(33).wrapping_mul(C1_64)
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// MurmurHash3 x64_128 of `data` with the given seed, returned as `(h1, h2)`.
pub fn hash128_with_seed(data: &[u8], seed: u64) -> (u64, u64) {
    let mut h1 = seed;
    let mut h2 = seed;

    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        let (lo, hi) = block.split_at(8);
        let k1 = u64::from_le_bytes(lo.try_into().unwrap_or([0; 8]));
        let k2 = u64::from_le_bytes(hi.try_into().unwrap_or([0; 8]));

        h1 ^= mix_k1_64(k1);
        h1 = h1.rotate_left(27).wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        h2 ^= mix_k2_64(k2);
        h2 = h2.rotate_left(31).wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }

    let tail = blocks.remainder();
    let mut k1 = 0u64;
    let mut k2 = 0u64;
    for (i, &byte) in tail.iter().enumerate() {
        if i < 8 {
            k1 ^= (byte as u64) << (i * 8);
        } else {
            k2 ^= (byte as u64) << ((i - 8) * 8);
        }
    }
    if tail.len() > 8 {
        h2 ^= mix_k2_64(k2);
    }
    if !tail.is_empty() {
        h1 ^= mix_k1_64(k1);
    }

    let len = data.len() as u64;
    h1 ^= len;
    h2 ^= len;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    (h1, h2)
}

/// MurmurHash3 x64_128 with seed 0.
#[inline]
pub fn hash128(data: &[u8]) -> (u64, u64) {
    hash128_with_seed(data, 0)
}

/// MurmurHash3 x64_128 as 16 little-endian bytes (`h1` then `h2`).
#[inline]
pub fn hash128_bytes(data: &[u8]) -> [u8; 16] {
    let (h1, h2) = hash128(data);
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&h1.to_le_bytes());
    out[8..].copy_from_slice(&h2.to_le_bytes());
    out
}

/// MurmurHash3 x86_32 of `data` with the given seed.
///
/// Cheaper than the 128-bit variant; meant for short strings.
pub fn hash32_with_seed(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;

    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k1 = u32::from_le_bytes(block.try_into().unwrap_or([0; 4]));
        h1 ^= k1.wrapping_mul(C1_32).rotate_left(15).wrapping_mul(C2_32);
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc ^ ((b as u32) << (i * 8)));
        h1 ^= k1.wrapping_mul(C1_32).rotate_left(15).wrapping_mul(C2_32);
    }

    h1 ^= data.len() as u32;
    fmix32(h1)
}

/// MurmurHash3 x86_32 with seed 0.
#[inline]
pub fn hash32(data: &[u8]) -> u32 {
    hash32_with_seed(data, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash32_reference_values() {
        assert_eq!(hash32(b""), 0);
        assert_eq!(hash32_with_seed(b"", 1), 0x514e_28b7);
        assert_eq!(hash32(b"hello"), 0x248b_fa47);
    }

    #[test]
    fn test_hash128_reference_value() {
        let (h1, h2) = hash128(b"hello");
        assert_eq!(h1, 0xcbd8_a7b3_41bd_9b02);
        assert_eq!(h2, 0x5b1e_906a_48ae_1d19);
    }

    #[test]
    fn test_hash128_empty_is_zero() {
        assert_eq!(hash128(b""), (0, 0));
    }

    #[test]
    fn test_every_tail_length_is_distinct() {
        // 16 bytes of block plus 0..=15 tail bytes
        let data: Vec<u8> = (0..32).collect();
        let mut seen = std::collections::HashSet::new();
        for len in 16..32 {
            assert!(seen.insert(hash128(&data[..len])));
        }
    }

    #[test]
    fn test_bytes_layout() {
        let (h1, h2) = hash128(b"test");
        let bytes = hash128_bytes(b"test");
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), h1);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), h2);
    }
}
