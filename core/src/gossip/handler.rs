//! # Message Handler
//!
//! Validates, authenticates, and dispatches inbound messages (§4.5). This
//! is the hard part: every inbound HEARTBEAT, LEAVE, and CHAT passes
//! through here, gets checked against the Peer Table / Dedup Filter /
//! Rate Limiter, and produces local state mutations, relay decisions, and
//! Event Bus emissions.
//!
//! Implemented as inherent methods on [`Engine`](crate::gossip::engine::Engine)
//! per the §9 design note: rather than three outbound callbacks, the
//! handler invokes methods on the engine value that owns Peer Table,
//! Dedup, Diagnostics, and Event Bus directly, making the single-writer
//! contract explicit. Nothing in this module ever returns an error to its
//! caller — every rejection is a silent drop, optionally counted in
//! Diagnostics, per §7's "no error propagates across message boundaries."

use std::net::IpAddr;
use std::time::Instant;

use tracing::trace;

use crate::config::{CHAT_FRESHNESS_WINDOW_MS, MAX_CHAT_CONTENT_LENGTH, MAX_RELAY_HOPS, POW_DIFFICULTY};
use crate::crypto::{sha256_multi, PublicKey, Signature};
use crate::identity::verify_pow;

use super::connection::ConnId;
use super::dedup::relay_mark;
use super::engine::Engine;
use super::wire::{ChatScope, WireMessage};

/// `true` if a chat body satisfies the 140-character bound (§3, testable
/// property 10). Counts Unicode scalar values, not bytes.
pub fn is_valid_chat_content(content: &str) -> bool {
    !content.is_empty() && content.chars().count() <= MAX_CHAT_CONTENT_LENGTH
}

fn decode_hex_32(s: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(s).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

fn public_key_from_id(id: &[u8; 32]) -> PublicKey {
    PublicKey::from_bytes(*id)
}

impl Engine {
    /// Entry point for every inbound wire message (§4.5). `conn_id`/`remote_ip`
    /// identify the socket the message arrived on ("sourceSocket").
    pub fn handle_message(&mut self, conn_id: ConnId, remote_ip: IpAddr, msg: WireMessage, now: Instant) {
        match msg {
            WireMessage::Heartbeat { id, seq, hops, nonce, sig } => {
                self.handle_heartbeat(conn_id, remote_ip, &id, seq, hops, nonce, &sig, now)
            }
            WireMessage::Leave { id, hops, sig } => self.handle_leave(conn_id, &id, hops, &sig, now),
            WireMessage::Chat { sender, content, timestamp, scope, hops, id, sig, target } => {
                self.handle_chat(conn_id, sender, content, timestamp, scope, hops, id, sig, target, now)
            }
        }
    }

    fn handle_heartbeat(
        &mut self,
        conn_id: ConnId,
        remote_ip: IpAddr,
        id_hex: &str,
        seq: u64,
        hops: u8,
        nonce: u64,
        sig_hex: &str,
        now: Instant,
    ) {
        let Some(id) = decode_hex_32(id_hex) else {
            trace!("heartbeat with malformed id, dropping");
            return;
        };

        // (1) Duplicate or regression.
        if let Some(stored) = self.peer_table.get(&id) {
            if seq <= stored.seq {
                self.diagnostics.record_duplicate_seq();
                return;
            }
        }

        // (2) Proof of work.
        if !verify_pow(&id, nonce, POW_DIFFICULTY) {
            self.diagnostics.record_invalid_pow();
            return;
        }

        // (4) Cap check before signature verification, for identities not
        // yet admitted.
        let already_known = self.peer_table.get(&id).is_some();
        if !already_known && self.peer_table.size() >= crate::config::MAX_PEERS {
            return;
        }

        // (5) Signature over "seq:"+seq.
        let Some(sig) = Signature::from_hex(sig_hex).ok() else {
            self.diagnostics.record_invalid_sig();
            return;
        };
        let message = format!("seq:{seq}");
        if !public_key_from_id(&id).verify(message.as_bytes(), &sig) {
            self.diagnostics.record_invalid_sig();
            return;
        }

        // (6) 0-hop delivery binds the socket's peer id and captures its IP.
        let direct_ip: Option<IpAddr> = if hops == 0 {
            self.connections.bind_peer_id(conn_id, id);
            Some(remote_ip)
        } else {
            None
        };

        // (7) Admit / update.
        let was_new = self.peer_table.add_or_update(id, seq, now, direct_ip);
        self.diagnostics.record_heartbeat_received();

        // (8) Membership-change event on new admission.
        if was_new {
            self.diagnostics.record_new_peer();
            self.emit_membership_change();
        }

        // (9) Bounded relay with loop suppression.
        if hops < MAX_RELAY_HOPS {
            let mark = relay_mark(&id, &seq.to_string());
            if !self.dedup.has_relayed(&mark) {
                self.dedup.mark_relayed(&mark);
                let relayed = WireMessage::Heartbeat {
                    id: id_hex.to_string(),
                    seq,
                    hops: hops + 1,
                    nonce,
                    sig: sig_hex.to_string(),
                };
                self.connections.broadcast_except(Some(conn_id), &relayed);
                self.diagnostics.record_heartbeat_relayed();
            }
        }
    }

    fn handle_leave(&mut self, conn_id: ConnId, id_hex: &str, hops: u8, sig_hex: &str, now: Instant) {
        let _ = now;
        let Some(id) = decode_hex_32(id_hex) else {
            return;
        };

        // Absence of the peer short-circuits before signature verification.
        if self.peer_table.get(&id).is_none() {
            return;
        }

        let Some(sig) = Signature::from_hex(sig_hex).ok() else {
            self.diagnostics.record_invalid_sig();
            return;
        };
        let message = format!("type:LEAVE:{id_hex}");
        if !public_key_from_id(&id).verify(message.as_bytes(), &sig) {
            // Open question resolved in DESIGN.md: a LEAVE failing local
            // verification is dropped, never relayed.
            self.diagnostics.record_invalid_sig();
            return;
        }

        self.peer_table.remove(&id);
        self.diagnostics.record_leave_message();
        self.emit_membership_change();

        if hops < MAX_RELAY_HOPS {
            let mark = relay_mark(&id, "leave");
            if !self.dedup.has_relayed(&mark) {
                self.dedup.mark_relayed(&mark);
                let relayed = WireMessage::Leave {
                    id: id_hex.to_string(),
                    hops: hops + 1,
                    sig: sig_hex.to_string(),
                };
                self.connections.broadcast_except(Some(conn_id), &relayed);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_chat(
        &mut self,
        conn_id: ConnId,
        sender_hex: String,
        content: String,
        timestamp: i64,
        scope: ChatScope,
        hops: u8,
        id_hex: Option<String>,
        sig_hex: Option<String>,
        target: Option<String>,
        now: Instant,
    ) {
        let _ = target;
        if !crate::config::ENABLE_CHAT {
            return;
        }
        if !is_valid_chat_content(&content) {
            return;
        }
        let Some(sender) = decode_hex_32(&sender_hex) else {
            return;
        };

        match scope {
            ChatScope::Local => {
                // Accepted only if heard directly from the claimed author.
                if self.connections.peer_id_of(conn_id) != Some(sender) {
                    return;
                }
                if !self.rate_limiter.check_and_record(sender, now) {
                    return;
                }
                self.event_bus.publish(super::event_bus::EventPayload::Chat {
                    kind: super::event_bus::ChatEventKind::Chat,
                    sender: sender_hex,
                    content,
                    timestamp,
                });
                // Never relayed.
            }
            ChatScope::Global => {
                let (Some(id_hex), Some(sig_hex)) = (id_hex, sig_hex) else {
                    return;
                };
                let Some(claimed_id) = decode_hex_32(&id_hex) else {
                    return;
                };

                // Content-address integrity.
                let timestamp_bytes = timestamp.to_string();
                let recomputed =
                    sha256_multi(&[sender_hex.as_bytes(), content.as_bytes(), timestamp_bytes.as_bytes()]);
                if recomputed != claimed_id {
                    return;
                }

                // Freshness.
                if now_ms_delta(timestamp).unsigned_abs() > CHAT_FRESHNESS_WINDOW_MS as u64 {
                    return;
                }

                let Some(sig) = Signature::from_hex(&sig_hex).ok() else {
                    self.diagnostics.record_invalid_sig();
                    return;
                };
                let message = format!("chat:{id_hex}");
                if !PublicKey::from_bytes(sender).verify(message.as_bytes(), &sig) {
                    self.diagnostics.record_invalid_sig();
                    return;
                }

                let mark = relay_mark(&claimed_id, "chat");
                if self.dedup.has_relayed(&mark) {
                    return;
                }
                self.dedup.mark_relayed(&mark);

                if !self.rate_limiter.check_and_record(sender, now) {
                    return;
                }

                self.event_bus.publish(super::event_bus::EventPayload::Chat {
                    kind: super::event_bus::ChatEventKind::Chat,
                    sender: sender_hex.clone(),
                    content: content.clone(),
                    timestamp,
                });

                if hops < MAX_RELAY_HOPS {
                    let relayed = WireMessage::Chat {
                        sender: sender_hex,
                        content,
                        timestamp,
                        scope: ChatScope::Global,
                        hops: hops + 1,
                        id: Some(id_hex),
                        sig: Some(sig_hex),
                        target: None,
                    };
                    self.connections.broadcast_except(Some(conn_id), &relayed);
                }
            }
        }
    }
}

/// Freshness checks compare against the wall clock, not the engine's
/// monotonic `Instant` — the timestamp is an externally supplied
/// millisecond Unix time.
fn now_ms_delta(timestamp_ms: i64) -> i64 {
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    now_ms - timestamp_ms
}
