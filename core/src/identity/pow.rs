//! # Proof of Work
//!
//! A weak Sybil/spam gate: before a node's identity is useful on the mesh,
//! it must find a `nonce` such that `sha256(id || nonce)` has
//! `POW_DIFFICULTY` leading zero bits. This does not stop a determined
//! attacker — it makes mass-identity churn mildly expensive, which is all
//! it needs to do.
//!
//! The nonce is solved once, at startup (or persisted alongside the
//! keypair), and carried in every HEARTBEAT so receivers can re-check it
//! cheaply without redoing the search themselves.

use crate::crypto::sha256_array;

/// Count the number of leading zero bits across a 32-byte digest.
fn leading_zero_bits(digest: &[u8; 32]) -> u32 {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 8;
            continue;
        }
        count += byte.leading_zeros();
        break;
    }
    count
}

/// Returns `true` if `sha256(id || nonce)` has at least `difficulty`
/// leading zero bits.
pub fn verify_pow(id: &[u8], nonce: u64, difficulty: u32) -> bool {
    let mut preimage = Vec::with_capacity(id.len() + 8);
    preimage.extend_from_slice(id);
    preimage.extend_from_slice(&nonce.to_be_bytes());
    let digest = sha256_array(&preimage);
    leading_zero_bits(&digest) >= difficulty
}

/// Search for a nonce satisfying `verify_pow(id, nonce, difficulty)`,
/// starting from 0 and incrementing. At the default difficulty (8-12
/// bits) this takes a few hundred to a few thousand hash attempts —
/// sub-second on any modern core.
pub fn solve_pow(id: &[u8], difficulty: u32) -> u64 {
    let mut nonce: u64 = 0;
    loop {
        if verify_pow(id, nonce, difficulty) {
            return nonce;
        }
        nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solved_nonce_verifies() {
        let id = b"some-node-identifier-bytes";
        let difficulty = 8;
        let nonce = solve_pow(id, difficulty);
        assert!(verify_pow(id, nonce, difficulty));
    }

    #[test]
    fn zero_difficulty_always_passes() {
        assert!(verify_pow(b"anything", 0, 0));
    }

    #[test]
    fn wrong_nonce_usually_fails_at_nontrivial_difficulty() {
        // Not every nonce satisfies a given difficulty; nonce 0 hashed
        // against an arbitrary id should not coincidentally satisfy a
        // moderately high difficulty.
        let id = b"deterministic-test-id";
        assert!(!verify_pow(id, 0, 24));
    }

    #[test]
    fn leading_zero_bits_all_zero_digest() {
        assert_eq!(leading_zero_bits(&[0u8; 32]), 256);
    }

    #[test]
    fn leading_zero_bits_first_byte_nonzero() {
        let mut digest = [0u8; 32];
        digest[0] = 0b0000_1000; // 4 leading zero bits
        assert_eq!(leading_zero_bits(&digest), 4);
    }

    #[test]
    fn solving_is_deterministic_for_the_same_id() {
        let id = b"node-a";
        assert_eq!(solve_pow(id, 10), solve_pow(id, 10));
    }
}
