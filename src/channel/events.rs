use bytes::Bytes;

use crate::channel::traits::SideChannel;

/// One inbound frame, already split by the transport into the two wire
/// categories the protocol distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(t) => t.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Channel lifecycle and traffic notifications, delivered on an mpsc
/// receiver owned by whoever consumes the connection (one receiver per peer
/// connection; `id` disambiguates channels multiplexed on it).
pub enum ChannelEvent {
    /// The remote side created a channel towards us. Carries a handle so the
    /// consumer can close the channel once a transfer finishes.
    Opened {
        id: u64,
        label: String,
        channel: Box<dyn SideChannel>,
    },
    Message {
        id: u64,
        frame: Frame,
    },
    Closed {
        id: u64,
    },
}

impl std::fmt::Debug for ChannelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelEvent::Opened { id, label, .. } => f
                .debug_struct("Opened")
                .field("id", id)
                .field("label", label)
                .finish(),
            ChannelEvent::Message { id, frame } => f
                .debug_struct("Message")
                .field("id", id)
                .field("len", &frame.len())
                .finish(),
            ChannelEvent::Closed { id } => f.debug_struct("Closed").field("id", id).finish(),
        }
    }
}
