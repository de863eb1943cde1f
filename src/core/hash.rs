//! Content hashing used for change detection.
//!
//! Buffers are hashed with MurmurHash3 x64_128; attribute value strings use
//! the cheaper x86_32 variant. Equal content always yields equal hashes,
//! and the exporter relies on that: a collision is read as "unchanged".

use std::fmt;

/// 128-bit digest of a byte buffer.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Default)]
pub struct ContentHash {
    h1: u64,
    h2: u64,
}

impl ContentHash {
    /// Placeholder used when hashing is skipped (single-frame exports).
    pub const NONE: Self = Self { h1: 0, h2: 0 };

    /// Hash raw bytes.
    #[inline]
    pub fn of_bytes(data: &[u8]) -> Self {
        let (h1, h2) = murmur3::hash128(data);
        Self { h1, h2 }
    }

    /// Hash a slice of plain-old-data values by their in-memory bytes.
    #[inline]
    pub fn of_pod<T: bytemuck::Pod>(data: &[T]) -> Self {
        Self::of_bytes(bytemuck::cast_slice(data))
    }

    /// Hash only when `enabled`, otherwise return [`ContentHash::NONE`].
    #[inline]
    pub fn of_pod_if<T: bytemuck::Pod>(enabled: bool, data: &[T]) -> Self {
        if enabled {
            Self::of_pod(data)
        } else {
            Self::NONE
        }
    }

    /// Check if this is the placeholder digest.
    #[inline]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Digest as 16 little-endian bytes.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.h1.to_le_bytes());
        out[8..].copy_from_slice(&self.h2.to_le_bytes());
        out
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:016x}{:016x})", self.h1, self.h2)
    }
}

/// Hash of a rendered attribute value.
pub type ValueHash = u32;

/// Hash an attribute value string.
#[inline]
pub fn hash_str(s: &str) -> ValueHash {
    murmur3::hash32(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = ContentHash::of_pod(&[1.0f32, 2.0, 3.0]);
        let b = ContentHash::of_pod(&[1.0f32, 2.0, 3.0]);
        assert_eq!(a, b);
        assert_eq!(hash_str("Color(1, 0, 0)"), hash_str("Color(1, 0, 0)"));
    }

    #[test]
    fn test_order_sensitive() {
        let a = ContentHash::of_pod(&[1i32, 2, 3]);
        let b = ContentHash::of_pod(&[3i32, 2, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_skipped_hash_is_placeholder() {
        assert!(ContentHash::of_pod_if(false, &[1u32, 2]).is_none());
        assert!(!ContentHash::of_pod_if(true, &[1u32, 2]).is_none());
    }
}
