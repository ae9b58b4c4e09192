//! Content hashing for exact deduplication.

use md5::{Digest, Md5};

use crate::config::HashAlgorithm;

/// Computes content digests used as canonical object names.
pub struct Hasher;

impl Hasher {
    /// Hex digest of `data` with the configured algorithm.
    pub fn content_hash(algorithm: HashAlgorithm, data: &[u8]) -> String {
        match algorithm {
            HashAlgorithm::Md5 => Self::md5_hex(data),
            HashAlgorithm::Blake3 => Self::blake3_hex(data),
        }
    }

    /// Lowercase hex MD5, the default canonical naming scheme.
    pub fn md5_hex(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    pub fn blake3_hex(data: &[u8]) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        hasher.finalize().to_hex().to_string()
    }

    /// Whether `candidate` has the shape of a digest produced by `algorithm`.
    ///
    /// This only checks length and alphabet; it says nothing about which
    /// bytes produced it.
    pub fn looks_like_digest(algorithm: HashAlgorithm, candidate: &str) -> bool {
        let expected_len = match algorithm {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Blake3 => 64,
        };
        candidate.len() == expected_len
            && candidate
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_empty_input() {
        assert_eq!(Hasher::md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_md5_known_vector() {
        assert_eq!(
            Hasher::md5_hex(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn test_same_bytes_same_hash() {
        let a = Hasher::content_hash(HashAlgorithm::Blake3, b"pixels");
        let b = Hasher::content_hash(HashAlgorithm::Blake3, b"pixels");
        assert_eq!(a, b);
        assert_ne!(a, Hasher::content_hash(HashAlgorithm::Blake3, b"pixelz"));
    }

    #[test]
    fn test_digest_shape() {
        let md5 = Hasher::md5_hex(b"x");
        assert!(Hasher::looks_like_digest(HashAlgorithm::Md5, &md5));
        assert!(!Hasher::looks_like_digest(HashAlgorithm::Blake3, &md5));
        assert!(!Hasher::looks_like_digest(HashAlgorithm::Md5, "photo1"));
    }
}
