//! # Relay Dedup Filter
//!
//! A time-partitioned Bloom filter identifying `(node-id, kind)` tuples
//! already forwarded, to suppress gossip loops (§4.4). A pair of filters
//! is kept in a rotating "current"/"previous" scheme: insertions always go
//! to `current`; queries consult both. Every `ROTATION_INTERVAL`,
//! `previous <- current` and `current` is reset empty.
//!
//! Two generations (rather than one ever-growing filter) bound memory and
//! give automatic forgetting — a peer's `seq` advances indefinitely and
//! chat ids accumulate, so without rotation the filter would either grow
//! unboundedly or saturate into uselessly high false-positive rates.

use bloomfilter::Bloom;

use crate::config::ROTATION_INTERVAL;

/// Expected number of distinct relay marks per rotation window, sized for
/// a comfortably large mesh. Tuned for the <=1% false-positive target at
/// this capacity; `Bloom::new_for_fp_rate` sizes the underlying bitset
/// accordingly.
const EXPECTED_ITEMS_PER_WINDOW: usize = 100_000;

/// Targeted false-positive rate for the relay dedup filter (§4.4).
const TARGET_FALSE_POSITIVE_RATE: f64 = 0.01;

/// A relay mark: `(id, seq)` for HEARTBEAT, `(id, "leave")` for LEAVE,
/// `(message-id, "chat")` for CHAT, rendered as a single string key.
pub fn relay_mark(subject: &[u8], kind: &str) -> String {
    format!("{}:{}", hex::encode(subject), kind)
}

/// Rotating dual-Bloom-filter dedup state, plus the wall-clock timestamp
/// of the last rotation.
pub struct RelayDedupFilter {
    current: Bloom<String>,
    previous: Bloom<String>,
    last_rotation: std::time::Instant,
}

impl RelayDedupFilter {
    pub fn new() -> Self {
        Self {
            current: Bloom::new_for_fp_rate(EXPECTED_ITEMS_PER_WINDOW, TARGET_FALSE_POSITIVE_RATE),
            previous: Bloom::new_for_fp_rate(EXPECTED_ITEMS_PER_WINDOW, TARGET_FALSE_POSITIVE_RATE),
            last_rotation: std::time::Instant::now(),
        }
    }

    /// Returns whether `mark` has already been relayed, per either
    /// generation of the filter.
    pub fn has_relayed(&self, mark: &str) -> bool {
        let key = mark.to_string();
        self.current.check(&key) || self.previous.check(&key)
    }

    /// Marks `mark` as relayed in the current generation. Callers must
    /// mark BEFORE transmission so an in-flight echo of the same message
    /// cannot re-arm the filter and cause a second relay.
    pub fn mark_relayed(&mut self, mark: &str) {
        self.current.set(&mark.to_string());
    }

    /// Rotate if at least `ROTATION_INTERVAL` has elapsed since the last
    /// rotation: `previous <- current`, `current <- empty`. The caller
    /// (Gossip Engine tick) drives this; it is not automatic on every
    /// query so that rotation happens at a predictable, bounded rate.
    pub fn maybe_rotate(&mut self, now: std::time::Instant) {
        if now.saturating_duration_since(self.last_rotation) >= ROTATION_INTERVAL {
            self.previous = std::mem::replace(
                &mut self.current,
                Bloom::new_for_fp_rate(EXPECTED_ITEMS_PER_WINDOW, TARGET_FALSE_POSITIVE_RATE),
            );
            self.last_rotation = now;
        }
    }
}

impl Default for RelayDedupFilter {
    fn default() -> Self {
        Self::new()
    }
}
