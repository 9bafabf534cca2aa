//! # Wire Codec
//!
//! Each peer connection is a bidirectional stream of newline-delimited
//! JSON objects. This module defines the tagged [`WireMessage`] union and
//! the strict, size-bounded, field-allowlist decoder described in §4.2.
//!
//! Decoding is deliberately unforgiving: unknown fields, wrong field
//! types, oversized frames, and unknown `type` tags are all dropped
//! silently (the caller increments a diagnostics counter) rather than
//! raising an error. No error ever propagates out of this module — that
//! mirrors the engine's "gossip-tolerant" stance from §7.

use serde::{Deserialize, Serialize};

use crate::config::MAX_MESSAGE_SIZE;

/// Chat scope, as carried on a CHAT message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatScope {
    Local,
    Global,
}

/// A single decoded wire message. Each variant's `#[serde(rename_all)]`
/// and field set corresponds exactly to the allowlist in §3 — no extra
/// fields are accepted (`deny_unknown_fields`), and fields are optional
/// only where the protocol genuinely permits their absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum WireMessage {
    #[serde(rename = "HEARTBEAT")]
    Heartbeat {
        id: String,
        seq: u64,
        hops: u8,
        nonce: u64,
        sig: String,
    },
    #[serde(rename = "LEAVE")]
    Leave { id: String, hops: u8, sig: String },
    #[serde(rename = "CHAT")]
    Chat {
        sender: String,
        content: String,
        timestamp: i64,
        scope: ChatScope,
        hops: u8,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        sig: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        target: Option<String>,
    },
}

/// Why a line failed to decode. Each variant maps to a diagnostics bump
/// or a plain drop at the call site — never to an error returned to a
/// caller outside this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The line (including its trailing newline) exceeded `MAX_MESSAGE_SIZE`.
    FrameTooLarge,
    /// The bytes were not a valid UTF-8 JSON object, or failed the
    /// allowlist/required-field/type checks for its tag.
    Malformed,
    /// The `type` tag was not one of HEARTBEAT, LEAVE, CHAT.
    UnknownType,
}

/// Decode a single line (without its trailing `\n`) into a [`WireMessage`].
///
/// Enforces, in order: total length bound, valid JSON object with a
/// recognized `type`, and the allowlisted field set for that type
/// (`serde`'s `deny_unknown_fields` plus the enum's required fields do the
/// allowlist check for us — anything outside the exact shape fails to
/// deserialize and is treated identically to malformed JSON).
pub fn decode_line(line: &[u8]) -> Result<WireMessage, DecodeError> {
    if line.len() > MAX_MESSAGE_SIZE {
        return Err(DecodeError::FrameTooLarge);
    }

    // Peek the `type` field first so an unrecognized tag is reported as
    // UnknownType rather than Malformed, per §4.2 ("unknown types are
    // dropped without error" — we still distinguish it for diagnostics).
    let probe: serde_json::Value = serde_json::from_slice(line).map_err(|_| DecodeError::Malformed)?;
    let Some(type_tag) = probe.get("type").and_then(|v| v.as_str()) else {
        return Err(DecodeError::Malformed);
    };
    if !matches!(type_tag, "HEARTBEAT" | "LEAVE" | "CHAT") {
        return Err(DecodeError::UnknownType);
    }

    serde_json::from_slice(line).map_err(|_| DecodeError::Malformed)
}

/// Encode a [`WireMessage`] as a single line, without the trailing `\n`
/// (callers append the delimiter when writing to a socket).
pub fn encode_line(msg: &WireMessage) -> Vec<u8> {
    serde_json::to_vec(msg).expect("WireMessage always serializes")
}

/// Split an accumulated byte buffer on `\n`, returning complete lines and
/// leaving any trailing partial line in `buf` for the next read.
pub fn split_lines(buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    loop {
        let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
            break;
        };
        let line: Vec<u8> = buf.drain(..=pos).collect();
        // Drop the trailing newline itself.
        let line = line[..line.len() - 1].to_vec();
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_heartbeat() -> WireMessage {
        WireMessage::Heartbeat {
            id: "ab".repeat(32),
            seq: 1,
            hops: 0,
            nonce: 42,
            sig: "cd".repeat(64),
        }
    }

    #[test]
    fn heartbeat_roundtrips() {
        let msg = sample_heartbeat();
        let encoded = encode_line(&msg);
        let decoded = decode_line(&encoded).unwrap();
        match (msg, decoded) {
            (
                WireMessage::Heartbeat { id: a, seq: sa, .. },
                WireMessage::Heartbeat { id: b, seq: sb, .. },
            ) => {
                assert_eq!(a, b);
                assert_eq!(sa, sb);
            }
            _ => panic!("expected heartbeat variants"),
        }
    }

    #[test]
    fn leave_roundtrips() {
        let msg = WireMessage::Leave {
            id: "ab".repeat(32),
            hops: 0,
            sig: "cd".repeat(64),
        };
        let encoded = encode_line(&msg);
        let decoded = decode_line(&encoded).unwrap();
        assert!(matches!(decoded, WireMessage::Leave { .. }));
    }

    #[test]
    fn chat_global_roundtrips() {
        let msg = WireMessage::Chat {
            sender: "ab".repeat(32),
            content: "hello mesh".to_string(),
            timestamp: 1_700_000_000_000,
            scope: ChatScope::Global,
            hops: 0,
            id: Some("ef".repeat(32)),
            sig: Some("12".repeat(64)),
            target: None,
        };
        let encoded = encode_line(&msg);
        let decoded = decode_line(&encoded).unwrap();
        assert!(matches!(decoded, WireMessage::Chat { scope: ChatScope::Global, .. }));
    }

    #[test]
    fn chat_local_has_no_id_or_sig() {
        let msg = WireMessage::Chat {
            sender: "ab".repeat(32),
            content: "hi".to_string(),
            timestamp: 1,
            scope: ChatScope::Local,
            hops: 0,
            id: None,
            sig: None,
            target: None,
        };
        let encoded = encode_line(&msg);
        let as_str = String::from_utf8(encoded).unwrap();
        assert!(!as_str.contains("\"sig\""));
        assert!(!as_str.contains("\"id\""));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let huge = vec![b'a'; MAX_MESSAGE_SIZE + 1];
        assert_eq!(decode_line(&huge), Err(DecodeError::FrameTooLarge));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let line = br#"{"type":"PING","foo":1}"#;
        assert_eq!(decode_line(line), Err(DecodeError::UnknownType));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        // HEARTBEAT missing `sig`.
        let line = br#"{"type":"HEARTBEAT","id":"aa","seq":1,"hops":0,"nonce":1}"#;
        assert_eq!(decode_line(line), Err(DecodeError::Malformed));
    }

    #[test]
    fn extra_field_is_rejected_by_allowlist() {
        let line = br#"{"type":"LEAVE","id":"aa","hops":0,"sig":"bb","extra":"nope"}"#;
        assert_eq!(decode_line(line), Err(DecodeError::Malformed));
    }

    #[test]
    fn not_json_is_malformed() {
        assert_eq!(decode_line(b"not json at all"), Err(DecodeError::Malformed));
    }

    #[test]
    fn split_lines_yields_complete_lines_and_retains_partial() {
        let mut buf = b"line one\nline two\npartial".to_vec();
        let lines = split_lines(&mut buf);
        assert_eq!(lines, vec![b"line one".to_vec(), b"line two".to_vec()]);
        assert_eq!(buf, b"partial".to_vec());
    }

    #[test]
    fn split_lines_on_empty_buffer() {
        let mut buf = Vec::new();
        assert!(split_lines(&mut buf).is_empty());
    }
}
