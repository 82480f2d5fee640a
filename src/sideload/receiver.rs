use bytes::{Bytes, BytesMut};
use std::sync::Arc;

use crate::channel::Frame;
use crate::log::log_sink::LogSink;
use crate::sideload::metadata::parse_metadata;
use crate::sideload::session::{ReceiverState, RecvSession, percent};
use crate::{sink_debug, sink_warn, transfer_log};

/// Why a transfer was given up on. Every reason is terminal; the channel is
/// torn down and nothing is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// The first text frame did not parse as a metadata announcement.
    MalformedMetadata,
    /// The metadata frame exceeded the size bound.
    MetadataTooLarge,
    /// A binary chunk arrived before any metadata.
    ChunkBeforeMetadata,
    /// A second metadata frame arrived mid-transfer.
    DuplicateMetadata,
    /// The channel closed before the declared size was reached.
    ChannelClosed,
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AbandonReason::MalformedMetadata => "malformed metadata frame",
            AbandonReason::MetadataTooLarge => "oversized metadata frame",
            AbandonReason::ChunkBeforeMetadata => "chunk before metadata",
            AbandonReason::DuplicateMetadata => "duplicate metadata frame",
            AbandonReason::ChannelClosed => "channel closed mid-transfer",
        };
        f.write_str(text)
    }
}

/// What the worker should do after feeding one event to a receiver machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RecvAction {
    /// Frame consumed; nothing to report yet.
    Continue,
    /// More payload arrived.
    Progress { percent: u8 },
    /// Transfer finished. Fires at most once per machine; the channel should
    /// be closed from this side.
    Complete {
        name: String,
        mime: String,
        payload: Bytes,
    },
    /// Transfer given up on. Fires at most once; the channel should be
    /// closed from this side.
    Abandoned(AbandonReason),
    /// The machine is already terminal; the frame was dropped.
    Ignored,
}

/// Reassembles one transfer from one channel: a single metadata frame, then
/// binary chunks appended in arrival order until the declared size is
/// reached.
///
/// Any protocol violation (no parsable metadata, chunks before metadata, a
/// second metadata frame) abandons the transfer outright rather than
/// guessing. In particular, a missing metadata frame must never lead to the
/// degenerate "declared size zero, first chunk completes the transfer"
/// outcome.
pub struct TransferReceiver {
    session: RecvSession,
    state: ReceiverState,
    log_sink: Arc<dyn LogSink>,
}

impl TransferReceiver {
    pub fn new(log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            session: RecvSession::default(),
            state: ReceiverState::AwaitingMetadata,
            log_sink,
        }
    }

    #[must_use]
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Feeds one inbound frame to the machine.
    pub fn handle_frame(&mut self, frame: Frame) -> RecvAction {
        if self.is_terminal() {
            return RecvAction::Ignored;
        }
        match frame {
            Frame::Text(text) => self.handle_text(&text),
            Frame::Binary(chunk) => self.handle_chunk(chunk),
        }
    }

    /// The channel closed. Anything short of a completed transfer is
    /// abandoned; a machine that already completed stays completed.
    pub fn handle_close(&mut self) -> RecvAction {
        if self.is_terminal() {
            return RecvAction::Ignored;
        }
        sink_debug!(
            self.log_sink,
            "[RECEIVER] channel closed at {}/{} bytes",
            self.session.received_bytes,
            self.session.declared_size()
        );
        self.abandon(AbandonReason::ChannelClosed)
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ReceiverState::Complete | ReceiverState::Abandoned
        )
    }

    fn handle_text(&mut self, text: &str) -> RecvAction {
        if self.state == ReceiverState::Receiving {
            sink_warn!(
                self.log_sink,
                "[RECEIVER] second metadata frame mid-transfer"
            );
            return self.abandon(AbandonReason::DuplicateMetadata);
        }

        match parse_metadata(text) {
            Ok(meta) => {
                transfer_log!(
                    self.log_sink,
                    "MetaIn: name:'{}' size:{} mime:{}",
                    meta.name,
                    meta.size,
                    meta.mime
                );
                let empty = meta.size == 0;
                self.session.meta = Some(meta);
                self.state = ReceiverState::Receiving;
                if empty {
                    // A declared size of zero needs no chunks.
                    return self.complete();
                }
                RecvAction::Continue
            }
            Err(e) => {
                sink_warn!(self.log_sink, "[RECEIVER] dropping transfer: {}", e);
                let reason = match e {
                    crate::sideload::metadata::MetadataError::TooLarge { .. } => {
                        AbandonReason::MetadataTooLarge
                    }
                    crate::sideload::metadata::MetadataError::Malformed => {
                        AbandonReason::MalformedMetadata
                    }
                };
                self.abandon(reason)
            }
        }
    }

    fn handle_chunk(&mut self, chunk: Bytes) -> RecvAction {
        if self.state == ReceiverState::AwaitingMetadata {
            sink_warn!(
                self.log_sink,
                "[RECEIVER] {}-byte chunk arrived before metadata",
                chunk.len()
            );
            return self.abandon(AbandonReason::ChunkBeforeMetadata);
        }

        self.session.received_bytes += chunk.len() as u64;
        transfer_log!(
            self.log_sink,
            "ChunkIn: bytes:{} total:{}/{}",
            chunk.len(),
            self.session.received_bytes,
            self.session.declared_size()
        );
        self.session.chunks.push(chunk);

        let declared = self.session.declared_size();
        if self.session.received_bytes >= declared {
            return self.complete();
        }
        RecvAction::Progress {
            percent: percent(self.session.received_bytes, declared),
        }
    }

    fn complete(&mut self) -> RecvAction {
        let declared = self.session.declared_size();
        let mut buf = BytesMut::with_capacity(declared as usize);
        for chunk in &self.session.chunks {
            buf.extend_from_slice(chunk);
        }
        self.state = ReceiverState::Complete;

        // Session buffers are dropped here; only the reassembled payload
        // lives on.
        let meta = self.session.meta.take();
        self.session.chunks = Vec::new();

        let (name, mime) = meta.map_or_else(
            || (String::new(), String::new()),
            |m| (m.name, m.mime),
        );
        sink_debug!(
            self.log_sink,
            "[RECEIVER] transfer of '{}' complete ({} bytes)",
            name,
            buf.len()
        );
        RecvAction::Complete {
            name,
            mime,
            payload: buf.freeze(),
        }
    }

    fn abandon(&mut self, reason: AbandonReason) -> RecvAction {
        self.state = ReceiverState::Abandoned;
        self.session.chunks = Vec::new();
        RecvAction::Abandoned(reason)
    }
}
