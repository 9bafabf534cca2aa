//! # Chat Submission Endpoint
//!
//! How a message authored on *this* node enters the mesh (§2 item 11,
//! §4.8). Distinct from [`handler`](super::handler)'s inbound path: there
//! is no signature to verify (we are the signer) and no relay-exclusion
//! socket (every direct connection is a destination). What it shares with
//! the inbound path is the same [`RateLimiter`](super::rate_limiter::RateLimiter)
//! instance and the same Event Bus.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use super::engine::Engine;
use super::event_bus::{ChatEventKind, EventPayload};
use super::handler::is_valid_chat_content;
use super::wire::{ChatScope, WireMessage};

/// A locally authored chat message, prior to signing and transmission.
#[derive(Debug, Clone)]
pub struct ChatSubmission {
    pub content: String,
    pub scope: ChatScope,
    pub target: Option<String>,
}

/// Why a local chat submission was rejected. Mirrors the handler's
/// silent-drop philosophy for inbound chat, but submission is a direct
/// local call, so the caller gets a typed reason back instead of a
/// diagnostics counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChatSubmissionError {
    #[error("chat content must be 1-140 characters")]
    InvalidContent,
    #[error("rate limit exceeded")]
    RateLimited,
}

fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Engine {
    /// Submit a chat message authored locally. Validates content, applies
    /// the shared rate limit, signs (GLOBAL scope only), hands it to every
    /// directly connected peer, and publishes it to the local Event Bus.
    pub fn submit_chat(&mut self, submission: ChatSubmission, now: Instant) -> Result<(), ChatSubmissionError> {
        if !crate::config::ENABLE_CHAT {
            return Err(ChatSubmissionError::RateLimited);
        }
        if !is_valid_chat_content(&submission.content) {
            return Err(ChatSubmissionError::InvalidContent);
        }

        let sender = self.identity.id();
        if !self.rate_limiter.check_and_record(sender, now) {
            return Err(ChatSubmissionError::RateLimited);
        }

        let sender_hex = hex::encode(sender);
        let timestamp = current_time_millis();

        let wire = match submission.scope {
            ChatScope::Local => WireMessage::Chat {
                sender: sender_hex.clone(),
                content: submission.content.clone(),
                timestamp,
                scope: ChatScope::Local,
                hops: 0,
                id: None,
                sig: None,
                target: submission.target.clone(),
            },
            ChatScope::Global => {
                let timestamp_bytes = timestamp.to_string();
                let id = crate::crypto::sha256_multi(&[
                    sender_hex.as_bytes(),
                    submission.content.as_bytes(),
                    timestamp_bytes.as_bytes(),
                ]);
                let id_hex = hex::encode(id);
                let sig = self.identity.sign(format!("chat:{id_hex}").as_bytes());

                // Mark before transmission: the same message bouncing back
                // from a directly connected peer must not be re-relayed.
                let mark = super::dedup::relay_mark(&id, "chat");
                self.dedup.mark_relayed(&mark);

                WireMessage::Chat {
                    sender: sender_hex.clone(),
                    content: submission.content.clone(),
                    timestamp,
                    scope: ChatScope::Global,
                    hops: 0,
                    id: Some(id_hex),
                    sig: Some(sig.to_hex()),
                    target: submission.target.clone(),
                }
            }
        };

        self.connections.broadcast_except(None, &wire);
        self.event_bus.publish(EventPayload::Chat {
            kind: ChatEventKind::Chat,
            sender: sender_hex,
            content: submission.content,
            timestamp,
        });

        Ok(())
    }
}
