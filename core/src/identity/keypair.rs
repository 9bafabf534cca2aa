//! # Node Identity
//!
//! Binds a long-term Ed25519 [`Keypair`](crate::crypto::Keypair) to a
//! proof-of-work nonce, producing the [`NodeIdentity`] every other
//! component treats as "this process's identity on the mesh."
//!
//! The public key bytes *are* the node identifier (§3 `NodeIdentity` /
//! GLOSSARY "Node identifier"). Persistence of the signing key across
//! restarts is optional and, when it happens, lives in the node binary
//! (file I/O has no business in a transport-agnostic engine crate); this
//! module only owns what the engine needs at runtime.

use crate::config::POW_DIFFICULTY;
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::identity::pow::{solve_pow, verify_pow};

/// This process's identity on the mesh: a signing keypair plus a
/// proof-of-work nonce bound to its public key.
pub struct NodeIdentity {
    keypair: Keypair,
    nonce: u64,
}

impl NodeIdentity {
    /// Generate a brand new keypair and solve its proof-of-work from
    /// scratch. This is the common startup path for a node with no
    /// persisted identity.
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Wrap an existing keypair (e.g. loaded from disk by the node
    /// binary) and solve its proof-of-work. Per §3, re-solving PoW on
    /// every load — rather than persisting the nonce — keeps the
    /// invariant trivially true without a second file to get out of sync.
    pub fn from_keypair(keypair: Keypair) -> Self {
        let nonce = solve_pow(&keypair.public_key_bytes(), POW_DIFFICULTY);
        Self { keypair, nonce }
    }

    /// The 32-byte node identifier (the public key bytes).
    pub fn id(&self) -> [u8; 32] {
        self.keypair.public_key_bytes()
    }

    /// This identity's public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// The solved proof-of-work nonce, as carried on every outbound
    /// HEARTBEAT.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Sign a message with this identity's keypair.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }

    /// Self-check: does this identity's own (id, nonce) pair satisfy the
    /// configured difficulty? Should always be `true` after construction;
    /// exposed mainly so tests and diagnostics can assert it directly.
    pub fn verify_own_pow(&self) -> bool {
        verify_pow(&self.id(), self.nonce, POW_DIFFICULTY)
    }

    /// Access the underlying keypair, e.g. for the node binary to persist
    /// it to disk.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity_satisfies_its_own_pow() {
        let identity = NodeIdentity::generate();
        assert!(identity.verify_own_pow());
    }

    #[test]
    fn from_keypair_solves_pow_for_that_keypair() {
        let kp = Keypair::generate();
        let expected_id = kp.public_key_bytes();
        let identity = NodeIdentity::from_keypair(kp);
        assert_eq!(identity.id(), expected_id);
        assert!(verify_pow(&identity.id(), identity.nonce(), POW_DIFFICULTY));
    }

    #[test]
    fn sign_is_verifiable_against_own_public_key() {
        let identity = NodeIdentity::generate();
        let sig = identity.sign(b"seq:1");
        assert!(identity.public_key().verify(b"seq:1", &sig));
    }

    #[test]
    fn two_identities_have_distinct_ids() {
        let a = NodeIdentity::generate();
        let b = NodeIdentity::generate();
        assert_ne!(a.id(), b.id());
    }
}
