//! # Cryptographic Primitives
//!
//! Every signing operation and every hash used by the engine flows through
//! here. We deliberately chose boring, well-audited cryptography:
//!
//! - **Ed25519** for signatures — fast, deterministic, nobody has broken it.
//! - **SHA-256** for content-addressing and the proof-of-work predicate.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations (`ed25519-dalek`, `sha2`).

pub mod hash;
pub mod keys;
pub mod signatures;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy.
pub use hash::{sha256, sha256_array, sha256_multi};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
pub use signatures::{sign, verify, SignatureError};
