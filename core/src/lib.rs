// Copyright (c) 2026 Mesh Gossip Contributors. MIT License.
// See LICENSE for details.

//! # Mesh Gossip — Core Engine
//!
//! This crate is the membership and message-dissemination engine for a
//! peer-to-peer gossip node: an authenticated heartbeat protocol, a
//! multi-hop relay fabric with duplicate suppression, liveness/eviction
//! machinery, and a chat propagation state machine riding on the same
//! fabric.
//!
//! It is deliberately transport-agnostic. The engine depends only on the
//! [`gossip::OverlaySocket`] trait for byte-stream I/O; joining a DHT-based
//! discovery overlay, the encrypted transport underneath it, and any local
//! HTTP/browser presentation layer are all external collaborators supplied
//! by whatever binary embeds this crate.
//!
//! ## Architecture
//!
//! - **identity** — long-term signing keypair plus a proof-of-work nonce.
//! - **crypto** — low-level Ed25519/SHA-256 primitives identity builds on.
//! - **gossip** — wire codec, peer table, relay dedup filter, message
//!   handler, gossip engine tick, connection manager, event bus,
//!   diagnostics, rate limiter, and chat submission — the engine itself.
//! - **config** — every tunable constant in one place.
//!
//! ## Design Philosophy
//!
//! 1. Gossip-tolerant: no single failed event should leave the system
//!    permanently inconsistent; the next successful heartbeat round heals it.
//! 2. Single-writer over shared state (Peer Table, Dedup Filter, rate
//!    limits, Diagnostics) — see [`gossip::engine`] for the serialization
//!    point.
//! 3. Every public API is documented; every headline guarantee has a test.

pub mod config;
pub mod crypto;
pub mod gossip;
pub mod identity;
