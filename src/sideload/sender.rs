use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{ChannelState, SideChannel};
use crate::log::log_sink::LogSink;
use crate::sideload::constants::{
    BUFFER_POLL_DELAY, CHUNK_SIZE, CLOSE_GRACE, MAX_BUFFER, OPEN_POLL_DELAY,
};
use crate::sideload::metadata::{TransferMetadata, encode_metadata};
use crate::sideload::session::{SendSession, SenderState, percent};
use crate::{sink_debug, sink_error, transfer_log};

/// What the scheduler should do after one tick of a sender machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTick {
    /// Channel not open yet; check again after the delay.
    Pending(Duration),
    /// One frame queued. Tick again on the next pass so other lanes get
    /// their turn between chunks.
    Sent { percent: u8 },
    /// Outbound buffer above the high-water mark; nothing sent. Retry after
    /// the delay.
    WaitBuffer(Duration),
    /// Every byte queued; close the channel once the grace delay elapses.
    Drain(Duration),
    /// Terminal. `delivered` is true when the whole payload was queued on
    /// the transport before teardown.
    Closed { delivered: bool },
}

/// Streams one payload over one dedicated channel: a single metadata text
/// frame, then ordered binary chunks of at most [`CHUNK_SIZE`] bytes.
///
/// The machine is re-entrant and never blocks; waiting of any kind is
/// expressed as the returned [`SendTick`] directive. A lost channel ends the
/// transfer silently, there is no retry. One machine per peer; fan-out to
/// several viewers means several independent machines on independent
/// channels.
pub struct TransferSender {
    meta: TransferMetadata,
    payload: Bytes,
    session: SendSession,
    state: SenderState,
    drain_started: bool,
    log_sink: Arc<dyn LogSink>,
}

impl TransferSender {
    /// The declared size is taken from the payload itself, so the metadata
    /// frame and the chunk loop can never disagree.
    pub fn new(name: &str, mime: &str, payload: Bytes, log_sink: Arc<dyn LogSink>) -> Self {
        let total = payload.len() as u64;
        Self {
            meta: TransferMetadata {
                name: name.to_string(),
                size: total,
                mime: mime.to_string(),
            },
            payload,
            session: SendSession::new(total, MAX_BUFFER),
            state: SenderState::Created,
            drain_started: false,
            log_sink,
        }
    }

    #[must_use]
    pub fn state(&self) -> SenderState {
        self.state
    }

    #[must_use]
    pub fn metadata(&self) -> &TransferMetadata {
        &self.meta
    }

    /// Advances the machine by at most one frame.
    pub fn tick(&mut self, channel: &dyn SideChannel) -> SendTick {
        if self.state == SenderState::Closed {
            return SendTick::Closed {
                delivered: self.session.finished(),
            };
        }

        match channel.state() {
            ChannelState::Open => {}
            ChannelState::Connecting => return SendTick::Pending(OPEN_POLL_DELAY),
            ChannelState::Closing | ChannelState::Closed => {
                // Transport gone. A lost transfer is not an error; the peer
                // is gone or tore the channel down, and there is no retry.
                let delivered = self.state == SenderState::Draining;
                sink_debug!(
                    self.log_sink,
                    "[SENDER] channel closed underneath transfer of '{}' at offset {}/{}",
                    self.meta.name,
                    self.session.offset,
                    self.session.total_size
                );
                self.state = SenderState::Closed;
                return SendTick::Closed { delivered };
            }
        }

        if self.state == SenderState::Created {
            self.state = SenderState::SendingMeta;
        }

        if self.state == SenderState::SendingMeta {
            return self.send_metadata(channel);
        }

        if self.state == SenderState::Streaming {
            return self.send_next_chunk(channel);
        }

        // Draining: first visit announces the grace delay, the next one
        // (scheduled after it) tears the channel down.
        if !self.drain_started {
            self.drain_started = true;
            return SendTick::Drain(CLOSE_GRACE);
        }
        channel.close();
        self.state = SenderState::Closed;
        sink_debug!(
            self.log_sink,
            "[SENDER] transfer of '{}' drained, channel closed",
            self.meta.name
        );
        SendTick::Closed { delivered: true }
    }

    fn send_metadata(&mut self, channel: &dyn SideChannel) -> SendTick {
        let text = match encode_metadata(&self.meta) {
            Ok(text) => text,
            Err(e) => {
                sink_error!(
                    self.log_sink,
                    "[SENDER] failed to encode metadata for '{}': {}",
                    self.meta.name,
                    e
                );
                self.state = SenderState::Closed;
                return SendTick::Closed { delivered: false };
            }
        };
        if channel.send_text(&text).is_err() {
            self.state = SenderState::Closed;
            return SendTick::Closed { delivered: false };
        }
        transfer_log!(
            self.log_sink,
            "MetaOut: name:'{}' size:{} mime:{}",
            self.meta.name,
            self.meta.size,
            self.meta.mime
        );
        if self.session.finished() {
            // Zero-byte payload: nothing to stream.
            self.state = SenderState::Draining;
        } else {
            self.state = SenderState::Streaming;
        }
        SendTick::Sent {
            percent: percent(self.session.offset, self.session.total_size),
        }
    }

    fn send_next_chunk(&mut self, channel: &dyn SideChannel) -> SendTick {
        if channel.buffered_amount() > self.session.high_water_mark {
            return SendTick::WaitBuffer(BUFFER_POLL_DELAY);
        }

        let start = self.session.offset as usize;
        let end = (start + CHUNK_SIZE).min(self.payload.len());
        if channel.send_binary(self.payload.slice(start..end)).is_err() {
            self.state = SenderState::Closed;
            return SendTick::Closed { delivered: false };
        }
        self.session.offset = end as u64;
        transfer_log!(
            self.log_sink,
            "ChunkOut: name:'{}' bytes:{} offset:{}/{}",
            self.meta.name,
            end - start,
            self.session.offset,
            self.session.total_size
        );

        if self.session.finished() {
            self.state = SenderState::Draining;
        }
        SendTick::Sent {
            percent: percent(self.session.offset, self.session.total_size),
        }
    }
}
