//! # Engine Configuration & Constants
//!
//! Every magic number in the gossip engine lives here. If you're hardcoding
//! a constant somewhere else, you're doing it wrong.
//!
//! The cryptographic and protocol-shape constants (hop budget, message size
//! cap, PoW difficulty) are not meant to vary per deployment — they define
//! what a "valid" message looks like network-wide, and a node running a
//! different hop budget than its peers just silently disagrees with them
//! about what gets relayed. Treat them as build-time, not runtime, knobs.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How often the Gossip Engine emits a self-heartbeat and sweeps stale peers.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Wall-clock interval after which an un-refreshed peer is evicted from the
/// Peer Table. Fixed at 5x the heartbeat interval so a peer survives a
/// handful of missed/lost heartbeats before being swept.
pub const LIVENESS_TTL: Duration = Duration::from_millis(2_500);

/// Grace period between broadcasting a shutdown LEAVE and exiting the
/// process. Best-effort — we don't wait for acknowledgements.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// How often the Relay Dedup Filter rotates its current/previous generation.
/// Must exceed the expected max relay propagation time by a wide margin —
/// comfortably bigger than `MAX_RELAY_HOPS * HEARTBEAT_INTERVAL`.
pub const ROTATION_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Relay & Transport
// ---------------------------------------------------------------------------

/// Maximum relay depth. A message arriving with `hops >= MAX_RELAY_HOPS` is
/// never forwarded again, bounding flood fan-out across the network.
pub const MAX_RELAY_HOPS: u8 = 3;

/// Maximum serialized size, in bytes, of a single wire message (including
/// the trailing newline). Oversized frames are dropped before decoding.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Maximum number of live entries the Peer Table will hold. Once full,
/// `addOrUpdate` refuses to admit previously-unknown identities.
pub const MAX_PEERS: usize = 500;

// ---------------------------------------------------------------------------
// Proof of Work
// ---------------------------------------------------------------------------

/// Required leading zero bits in `sha256(id || nonce)`. Small on purpose —
/// this is a Sybil/spam friction, not a security boundary. 10 bits is a few
/// hundred to a few thousand hash attempts, sub-second on any modern core.
pub const POW_DIFFICULTY: u32 = 10;

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Maximum chat message content length, in characters.
pub const MAX_CHAT_CONTENT_LENGTH: usize = 140;

/// Freshness window for GLOBAL-scope chat: a message whose `timestamp` is
/// further than this from the receiver's clock is rejected.
pub const CHAT_FRESHNESS_WINDOW_MS: i64 = 60_000;

/// Sliding-window size for the per-sender chat rate limiter.
pub const CHAT_WINDOW: Duration = Duration::from_millis(10_000);

/// Maximum chat messages a single sender may have accepted within
/// `CHAT_WINDOW`. The same window/max pair also bounds locally submitted
/// chat before it is signed and broadcast.
pub const CHAT_MAX: u32 = 5;

/// Per-sender rate-limit entries older than this are garbage-collected from
/// the limiter's map, per the "shared-mutable chat rate map" design note.
pub const CHAT_RATE_ENTRY_TTL: Duration = Duration::from_millis(10 * CHAT_WINDOW.as_millis() as u64);

/// Whether chat dissemination is enabled at all. When `false`, the Chat
/// Submission Endpoint and the CHAT arm of the Message Handler both reject
/// everything outright — used to run a membership-only node.
pub const ENABLE_CHAT: bool = true;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Default TCP port the reference overlay implementation listens on. The
/// real DHT/overlay transport this node ultimately runs on is out of scope;
/// this default only matters for the bundled reference transport.
pub const DEFAULT_PORT: u16 = 7946;

/// Fixed topic name hashed (SHA-256) to derive the overlay's 32-byte topic
/// identifier. Every node joining the same mesh must agree on this string.
pub const TOPIC_NAME: &str = "meshgossip-v1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_ttl_is_five_heartbeat_intervals() {
        assert_eq!(LIVENESS_TTL, HEARTBEAT_INTERVAL * 5);
    }

    #[test]
    fn rotation_interval_dwarfs_max_relay_propagation() {
        let max_relay_propagation = HEARTBEAT_INTERVAL * MAX_RELAY_HOPS as u32;
        assert!(ROTATION_INTERVAL > max_relay_propagation * 10);
    }

    #[test]
    fn chat_rate_entry_ttl_is_ten_windows() {
        assert_eq!(CHAT_RATE_ENTRY_TTL, CHAT_WINDOW * 10);
    }

    #[test]
    fn pow_difficulty_is_small() {
        // This is spam friction, not a security boundary.
        assert!(POW_DIFFICULTY <= 20);
    }

    #[test]
    fn max_message_size_fits_a_chat_message_comfortably() {
        // sender(64 hex) + content(140) + signature(128 hex) + json overhead
        assert!(MAX_MESSAGE_SIZE > 1024);
    }
}
