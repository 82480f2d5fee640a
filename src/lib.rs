//! Sidecast is the transfer core of a browser-style video/chat relay: a host
//! streams media to viewers and can additionally push an auxiliary "tool"
//! payload to every connected viewer over a dedicated peer-to-peer binary
//! side-channel, without routing the payload through the signaling server.
//!
//! Signaling, room membership and media are external collaborators. This
//! crate owns the side-load protocol itself: one metadata frame followed by
//! ordered binary chunks, flow-controlled against the channel's outbound
//! buffer and reassembled with progress reporting on the receiving side.

/// Abstraction over the ordered, reliable point-to-point message channel.
pub mod channel;
/// Handles configuration loading and management.
pub mod config;
/// Host/viewer orchestration: active content, per-peer transfer sessions.
pub mod engine;
/// Logging utilities for the application.
pub mod log;
/// The side-load transfer protocol: sender, receiver, scheduling, storage.
pub mod sideload;
