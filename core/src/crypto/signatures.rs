//! # Digital Signatures
//!
//! Ed25519 signing and verification — the backbone of authentication in
//! the gossip protocol. Every heartbeat, every LEAVE, every GLOBAL chat is
//! authenticated with a signature over a fixed, tag-prefixed string (see
//! §3/§4.1 of the wire format: `"seq:" || seq`, `"type:LEAVE:" || id`,
//! `"chat:" || id`).
//!
//! ## Why not just use ed25519-dalek directly?
//!
//! Wrapping the operations gives us a single place to audit all signing
//! operations, consistent error types, and type safety — you can't
//! accidentally pass a hash where a message goes.
//!
//! ## Strictness
//!
//! We use `ed25519-dalek`'s strict verification by default, rejecting
//! edge-case signatures that lenient implementations accept.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use thiserror::Error;

use super::keys::{Keypair, PublicKey, Signature};

/// Errors during signature operations.
///
/// Intentionally vague — we don't tell attackers why verification failed.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Sign a message using a node keypair.
///
/// # Example
///
/// ```
/// use meshgossip_core::crypto::{Keypair, sign, verify};
///
/// let keypair = Keypair::generate();
/// let message = b"seq:1";
/// let signature = sign(&keypair, message);
///
/// assert!(verify(&keypair.public_key(), message, &signature));
/// ```
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verify an Ed25519 signature against a public key and message.
///
/// Returns `true` if the signature is valid, `false` otherwise. We
/// intentionally don't distinguish between "invalid signature" and "wrong
/// public key" — both are just "nope."
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

/// Verify a signature using raw byte components, as received over the
/// wire before any typed parsing has happened.
pub fn verify_raw(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8; 64],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let signature = DalekSignature::from_bytes(signature_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
