//! # Gossip
//!
//! Everything that makes this a mesh node rather than a bag of crypto
//! primitives: the wire format, the membership table, loop suppression,
//! message dispatch, the engine that owns it all, connection plumbing,
//! the local event stream, counters, and rate limiting.
//!
//! `handler` and `chat` both extend [`Engine`] with additional inherent
//! methods rather than wrapping it — see the module docs on `engine` for
//! why the whole thing is one owned value instead of a web of callbacks.

pub mod chat;
pub mod connection;
pub mod dedup;
pub mod diagnostics;
pub mod engine;
pub mod event_bus;
pub mod handler;
pub mod peer_table;
pub mod rate_limiter;
pub mod wire;

pub use chat::{ChatSubmission, ChatSubmissionError};
pub use connection::{ConnId, ConnectionManager, InboundEvent, OverlaySocket};
pub use dedup::RelayDedupFilter;
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use engine::Engine;
pub use event_bus::{EventBus, EventPayload};
pub use handler::is_valid_chat_content;
pub use peer_table::{PeerRecord, PeerTable};
pub use rate_limiter::RateLimiter;
pub use wire::{decode_line, encode_line, split_lines, ChatScope, DecodeError, WireMessage};
