//! # Key Management
//!
//! Ed25519 keypair generation and serialization for gossip node identities.
//!
//! Every node on the mesh has exactly one long-term Ed25519 keypair. Its
//! public half, 32 raw bytes, doubles as the node identifier that appears
//! in every heartbeat, peer-table entry, and chat signature.
//!
//! ## Why Ed25519?
//!
//! - Deterministic signatures (no k-value footguns like ECDSA).
//! - 128-bit security level in 32+32 bytes. Compact and sufficient.
//! - Fast verification — we check a signature on nearly every inbound
//!   message, so this needs to be cheap.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (thanks, ed25519-dalek).
//! - We use OS-level RNG (`OsRng`) for key generation.
//! - Key bytes are never logged. If you add logging to this module, you
//!   will be asked to leave.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// Intentionally vague about *why* something failed — leaking details
/// about key material through error messages is a classic footgun.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// A gossip node's identity keypair wrapping Ed25519 signing and
/// verification keys.
///
/// ## Serialization
///
/// `Keypair` intentionally does NOT implement `Serialize`/`Deserialize`
/// directly. Serializing private keys should be a deliberate, conscious
/// act, not something that happens because someone shoved a keypair into
/// a JSON response. Use `to_bytes()` / `from_bytes()` explicitly.
///
/// # Examples
///
/// ```
/// use meshgossip_core::crypto::keys::Keypair;
///
/// let kp = Keypair::generate();
/// let msg = b"seq:1";
/// let sig = kp.sign(msg);
/// assert!(kp.verify(msg, &sig));
/// ```
pub struct Keypair {
    /// The Ed25519 signing (private) key. 32 bytes of pure responsibility.
    signing_key: SigningKey,
}

/// The public half of a node identity. This is the 32-byte node
/// identifier that shows up in peer records, heartbeats, and signatures.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature over a message.
///
/// 64 bytes. Deterministic for a given (key, message) pair. Stored as
/// `Vec<u8>` for serde compatibility, but always exactly 64 bytes for a
/// signature produced by [`Keypair::sign`]. A `Signature` parsed from the
/// wire that isn't 64 bytes simply fails verification — no panics.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Keypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    ///
    /// The seed is used directly as the Ed25519 secret scalar.
    ///
    /// **Warning**: if you call this with a weak seed, you get a weak key.
    /// Use a proper CSPRNG to produce the seed bytes.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Reconstruct a keypair from raw 32-byte secret key material.
    ///
    /// Equivalent to [`from_seed`](Self::from_seed) — in Ed25519, the
    /// 32-byte secret key *is* the seed.
    pub fn from_bytes(secret_key_bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        Ok(Self::from_seed(secret_key_bytes))
    }

    /// Reconstruct a keypair from a hex-encoded secret key, as persisted
    /// on disk between restarts.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut arr = [0u8; SECRET_KEY_LENGTH];
        arr.copy_from_slice(&bytes);
        Self::from_bytes(&arr)
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Get the raw public key bytes (32 bytes) — the node identifier.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message and return a `Signature`.
    ///
    /// Ed25519 signatures are deterministic — the same (key, message) pair
    /// always produces the same signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature {
            bytes: sig.to_bytes().to_vec(),
        }
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Exports the raw 32-byte secret key material.
    ///
    /// **Handle with extreme care.** This is the only secret standing
    /// between an attacker and full control of the associated identity.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Export the raw secret key bytes. Alias for
    /// [`secret_key_bytes`](Self::secret_key_bytes).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret_key_bytes()
    }

    /// Hex-encode the secret key, for persisting to disk between restarts.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Get the public key as a hex string. Useful for display and logging.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }
}

impl Clone for Keypair {
    /// Cloning a keypair is allowed but should make you uncomfortable.
    /// Every copy of a private key is another thing to protect.
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output. Not even
        // "partially." A partial leak is still a leak.
        write!(f, "Keypair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for Keypair {
    /// Two keypairs are equal if their public keys match.
    fn eq(&self, other: &Self) -> bool {
        self.public_key_bytes() == other.public_key_bytes()
    }
}

impl Eq for Keypair {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

impl PublicKey {
    /// Create a `PublicKey` from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Try to create a `PublicKey` from a byte slice.
    ///
    /// Validates the length and that the bytes represent a valid Ed25519
    /// point — we don't just accept any 32 bytes.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        if slice.len() != 32 {
            return Err(KeyError::InvalidPublicKey);
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);

        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;

        Ok(Self { bytes })
    }

    /// Get the raw bytes — the node identifier.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify a signature against this public key.
    ///
    /// Returns `true` if the signature is valid, `false` otherwise. We
    /// don't distinguish failure modes — both "bad signature" and "invalid
    /// key bytes" collapse to `false`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig_bytes: [u8; 64] = match signature.bytes.as_slice().try_into() {
            Ok(b) => b,
            Err(_) => return false,
        };
        let dalek_sig = DalekSignature::from_bytes(&sig_bytes);
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded public key string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::OddLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self { bytes: arr })
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

impl Signature {
    /// Create a signature from raw 64-byte representation.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the hex-encoded signature string. 128 characters for a
    /// valid signature.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parse a hex-encoded signature, as received over the wire.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 64 {
            return Err(hex::FromHexError::OddLength);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "Signature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_valid_keypair() {
        let kp = Keypair::generate();
        assert_eq!(kp.public_key_bytes().len(), 32);
        assert_eq!(kp.to_bytes().len(), 32);
    }

    #[test]
    fn keypair_sign_verify_roundtrip() {
        let kp = Keypair::generate();
        let msg = b"seq:1";
        let sig = kp.sign(msg);
        assert!(kp.verify(msg, &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"correct message");
        assert!(!kp.verify(b"wrong message", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.verify(b"message", &sig));
    }

    #[test]
    fn roundtrip_bytes() {
        let kp = Keypair::generate();
        let secret_bytes = kp.to_bytes();
        let restored = Keypair::from_bytes(&secret_bytes).unwrap();
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());
    }

    #[test]
    fn roundtrip_hex() {
        let kp = Keypair::generate();
        let hex_str = kp.to_hex();
        let restored = Keypair::from_hex(&hex_str).unwrap();
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());
    }

    #[test]
    fn invalid_hex_rejected() {
        assert!(Keypair::from_hex("deadbeef").is_err());
        assert!(Keypair::from_hex("not-hex-at-all").is_err());
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        let hex_str = pk.to_hex();
        let recovered = PublicKey::from_hex(&hex_str).unwrap();
        assert_eq!(pk, recovered);
    }

    #[test]
    fn two_generated_keypairs_are_different() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        assert_ne!(kp1.public_key_bytes(), kp2.public_key_bytes());
    }

    #[test]
    fn public_key_try_from_slice() {
        let kp = Keypair::generate();
        let pk = PublicKey::try_from_slice(&kp.public_key_bytes()).unwrap();
        assert_eq!(pk.as_bytes(), &kp.public_key_bytes());
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        let short = [0u8; 16];
        assert!(PublicKey::try_from_slice(&short).is_err());
    }

    #[test]
    fn clone_preserves_identity() {
        let kp = Keypair::generate();
        let cloned = kp.clone();
        assert_eq!(kp.public_key_bytes(), cloned.public_key_bytes());
        assert_eq!(kp.to_bytes(), cloned.to_bytes());
    }

    #[test]
    fn deterministic_from_seed() {
        let seed = [42u8; 32];
        let kp1 = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn deterministic_signatures() {
        let kp = Keypair::generate();
        let msg = b"determinism is underrated";
        let sig1 = kp.sign(msg);
        let sig2 = kp.sign(msg);
        assert_eq!(sig1.as_bytes(), sig2.as_bytes());
    }

    #[test]
    fn signature_hex_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"test");
        let hex_str = sig.to_hex();
        let recovered = Signature::from_hex(&hex_str).unwrap();
        assert_eq!(sig, recovered);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("Keypair(pub="));
        assert!(!debug_str.contains("signing_key"));
    }

    #[test]
    fn empty_message_signing() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"");
        assert!(kp.verify(b"", &sig));
    }

    #[test]
    fn known_seed_vector() {
        // Deterministic test vector: a well-known seed should always produce
        // the same public key. Catches regressions in key derivation.
        let seed: [u8; 32] = [
            0x6d, 0x65, 0x73, 0x68, 0x67, 0x6f, 0x73, 0x73, // "meshgoss"
            0x69, 0x70, 0x2d, 0x6e, 0x6f, 0x64, 0x65, 0x00, // "ip-node\0"
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let kp = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp.public_key_hex(), kp2.public_key_hex());

        let sig = kp.sign(b"seq:1");
        assert!(kp.verify(b"seq:1", &sig));
    }
}
