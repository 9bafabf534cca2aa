//! # Diagnostics
//!
//! A fixed set of monotonic counters tracking engine activity (§4.9).
//! These are plain `u64` counters incremented from within the single
//! engine-loop writer; no atomics are needed because nothing outside that
//! loop ever mutates them. A snapshot is handed out for the `/status`
//! endpoint, the `/metrics` exporter, and the local event subscription
//! payload's `diagnostics` field (§6).

/// A point-in-time copy of every counter, safe to serialize or compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DiagnosticsSnapshot {
    pub heartbeats_received: u64,
    pub heartbeats_relayed: u64,
    pub duplicate_seq: u64,
    pub invalid_pow: u64,
    pub invalid_sig: u64,
    pub new_peers_added: u64,
    pub leave_messages: u64,
}

/// The live counter set.
#[derive(Debug, Default)]
pub struct Diagnostics {
    heartbeats_received: u64,
    heartbeats_relayed: u64,
    duplicate_seq: u64,
    invalid_pow: u64,
    invalid_sig: u64,
    new_peers_added: u64,
    leave_messages: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_heartbeat_received(&mut self) {
        self.heartbeats_received += 1;
    }

    pub fn record_heartbeat_relayed(&mut self) {
        self.heartbeats_relayed += 1;
    }

    pub fn record_duplicate_seq(&mut self) {
        self.duplicate_seq += 1;
    }

    pub fn record_invalid_pow(&mut self) {
        self.invalid_pow += 1;
    }

    pub fn record_invalid_sig(&mut self) {
        self.invalid_sig += 1;
    }

    pub fn record_new_peer(&mut self) {
        self.new_peers_added += 1;
    }

    pub fn record_leave_message(&mut self) {
        self.leave_messages += 1;
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            heartbeats_received: self.heartbeats_received,
            heartbeats_relayed: self.heartbeats_relayed,
            duplicate_seq: self.duplicate_seq,
            invalid_pow: self.invalid_pow,
            invalid_sig: self.invalid_sig,
            new_peers_added: self.new_peers_added,
            leave_messages: self.leave_messages,
        }
    }
}
