//! # Rate Limiter
//!
//! A sliding-window limiter per sender-id for inbound chat (§4.8), plus a
//! single process-global instance of the same shape guards locally
//! submitted chat before it is signed and broadcast.
//!
//! Per the "shared-mutable chat rate map" design note (§9), entries are
//! garbage-collected opportunistically whenever they haven't been touched
//! in `CHAT_RATE_ENTRY_TTL` (10x the window) — there is no separate sweep
//! task, `gc_stale` is just called alongside the regular per-sender check.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::{CHAT_MAX, CHAT_RATE_ENTRY_TTL, CHAT_WINDOW};

#[derive(Debug, Clone, Copy)]
struct ChatRateState {
    count: u32,
    window_start: Instant,
}

/// Per-sender sliding-window chat rate limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    senders: HashMap<[u8; 32], ChatRateState>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// On each candidate chat acceptance: expire `sender`'s window if
    /// stale, then admit if under `CHAT_MAX`, incrementing the count.
    /// Returns `true` if the message should be accepted.
    pub fn check_and_record(&mut self, sender: [u8; 32], now: Instant) -> bool {
        let state = self.senders.entry(sender).or_insert(ChatRateState {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(state.window_start) >= CHAT_WINDOW {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= CHAT_MAX {
            return false;
        }

        state.count += 1;
        true
    }

    /// Drop any sender entry untouched for longer than
    /// `CHAT_RATE_ENTRY_TTL`, bounding the map's size across a long-lived
    /// process even with heavy sender churn.
    pub fn gc_stale(&mut self, now: Instant) {
        self.senders
            .retain(|_, state| now.saturating_duration_since(state.window_start) <= CHAT_RATE_ENTRY_TTL);
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
