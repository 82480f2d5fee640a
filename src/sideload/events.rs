use bytes::Bytes;

use crate::sideload::receiver::AbandonReason;

/// Notifications the transfer workers publish to the application. `lane`
/// identifies an outbound transfer, `id` an inbound channel.
#[derive(Debug, Clone)]
pub enum SideloadEvent {
    SendProgress { lane: u64, percent: u8 },
    /// The whole payload was queued and the channel was torn down.
    SendCompleted { lane: u64 },
    /// The channel died mid-transfer. Informational; there is no retry.
    SendAborted { lane: u64 },
    RecvProgress { id: u64, percent: u8 },
    RecvCompleted {
        id: u64,
        name: String,
        mime: String,
        payload: Bytes,
    },
    RecvAbandoned { id: u64, reason: AbandonReason },
}
