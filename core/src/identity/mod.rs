//! # Identity Module
//!
//! Node identity for the gossip engine: every participant on the mesh is
//! identified by an Ed25519 keypair's public bytes, gated by a
//! proof-of-work nonce bound to that identity.
//!
//! The identity stack is layered:
//!
//! 1. **Keypair** — raw Ed25519 key material, from [`crate::crypto`].
//! 2. **Proof of work** — a nonce satisfying `sha256(id || nonce)` having
//!    `POW_DIFFICULTY` leading zero bits; Sybil/spam friction.
//! 3. **[`NodeIdentity`]** — the two bound together into the one value the
//!    rest of the engine treats as "who am I."
//!
//! ## Design Decisions
//!
//! - Ed25519 was chosen for its speed, small key/signature sizes, and
//!   resistance to timing side-channels.
//! - The node identifier is the raw 32-byte public key, not a derived
//!   human-readable encoding — there is no bech32/base58 address layer in
//!   this engine, since peers exchange raw identifier bytes over the wire.

pub mod keypair;
pub mod pow;

pub use keypair::NodeIdentity;
pub use pow::{solve_pow, verify_pow};
