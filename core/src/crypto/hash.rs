//! # Hashing Utilities
//!
//! SHA-256 is the only hash function this crate needs: it derives chat
//! message ids (`sha256(sender || content || timestamp)`) and underlies the
//! proof-of-work predicate (`sha256(id || nonce)`). No BLAKE3, no Merkle
//! trees — those solved a different problem in a different codebase.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use meshgossip_core::crypto::sha256;
///
/// let hash = sha256(b"meshgossip");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array, for callers that
/// want to avoid the heap allocation of [`sha256`].
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices together without a concatenation allocation.
/// Used for content-addressing chat ids from `(sender, content, timestamp)`.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_empty_string() {
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn deterministic() {
        let a = sha256(b"mesh");
        let b = sha256(b"mesh");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn array_matches_vec() {
        let vec_result = sha256(b"test data");
        let arr_result = sha256_array(b"test data");
        assert_eq!(vec_result.as_slice(), arr_result.as_slice());
    }

    #[test]
    fn multi_matches_concatenation() {
        let multi = sha256_multi(&[b"hello", b" world"]);
        let single = sha256_array(b"hello world");
        assert_eq!(multi, single);
    }

    #[test]
    fn different_inputs_differ() {
        let a = sha256(b"mesh");
        let b = sha256(b"Mesh");
        assert_ne!(a, b);
    }
}
