use bytes::Bytes;

use crate::sideload::metadata::TransferMetadata;

/// Sender-side lifecycle. Driven forward by [`crate::sideload::sender::TransferSender::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Channel handed over but not yet open.
    Created,
    /// Channel open; the metadata frame has not been emitted yet.
    SendingMeta,
    /// Chunk loop in progress.
    Streaming,
    /// All bytes queued; waiting out the flush grace period.
    Draining,
    /// Terminal: channel torn down, successfully or not.
    Closed,
}

/// Receiver-side lifecycle. The `Idle` phase of a transfer (channel
/// announced, no handler yet) is represented by the machine not existing;
/// construction is lazy, on the channel-opened event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    AwaitingMetadata,
    Receiving,
    /// Terminal: payload reassembled and delivered exactly once.
    Complete,
    /// Terminal: transfer cannot complete (protocol violation or channel
    /// loss). Nothing is delivered.
    Abandoned,
}

/// Mutable sender-side record for one transfer. Owned exclusively by its
/// sender machine; destroyed with the channel.
#[derive(Debug)]
pub struct SendSession {
    /// Next byte of the source to send.
    pub offset: u64,
    pub total_size: u64,
    /// Outbound-buffer level above which sending defers.
    pub high_water_mark: u64,
}

impl SendSession {
    pub fn new(total_size: u64, high_water_mark: u64) -> Self {
        Self {
            offset: 0,
            total_size,
            high_water_mark,
        }
    }

    #[must_use]
    pub fn finished(&self) -> bool {
        self.offset >= self.total_size
    }
}

/// Mutable receiver-side record for one transfer. `chunks` is append-only;
/// concatenation order is arrival order.
#[derive(Debug, Default)]
pub struct RecvSession {
    pub meta: Option<TransferMetadata>,
    pub received_bytes: u64,
    pub chunks: Vec<Bytes>,
}

impl RecvSession {
    /// Declared size, or 0 while metadata has not arrived.
    #[must_use]
    pub fn declared_size(&self) -> u64 {
        self.meta.as_ref().map_or(0, |m| m.size)
    }
}

/// Progress in whole percent: `floor(min(100, done/total*100))`.
/// A zero-byte transfer is complete the moment it exists, hence 100.
#[must_use]
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = done.saturating_mul(100) / total;
    pct.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::percent;

    #[test]
    fn percent_is_floored_and_capped() {
        assert_eq!(percent(0, 40000), 0);
        assert_eq!(percent(16384, 40000), 40); // 40.96 -> 40
        assert_eq!(percent(32768, 40000), 81); // 81.92 -> 81
        assert_eq!(percent(40000, 40000), 100);
        assert_eq!(percent(50000, 40000), 100); // never above 100
    }

    #[test]
    fn percent_of_zero_total_is_complete() {
        assert_eq!(percent(0, 0), 100);
    }
}
