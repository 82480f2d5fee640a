use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use crate::channel::events::{ChannelEvent, Frame};
use crate::channel::state::ChannelState;
use crate::channel::traits::{ChannelError, SideChannel};

/// State shared by the two ends of a loopback channel.
struct Shared {
    state: Mutex<ChannelState>,
    buffered: AtomicU64,
    close_announced: AtomicBool,
}

/// In-memory channel: frames sent on one end arrive as [`ChannelEvent`]s on
/// the event queue supplied when the pair was opened. Used by the test suite
/// and by local single-process runs; a production transport implements
/// [`SideChannel`] against a real data channel instead.
///
/// Delivery is instantaneous, so the outbound buffer never fills on its own;
/// [`set_buffered_amount`](Self::set_buffered_amount) simulates transport
/// backlog for backpressure tests.
pub struct LoopbackChannel {
    id: u64,
    label: String,
    shared: Arc<Shared>,
    /// Event queue of the opposite end's consumer. The receiving end of a
    /// pair has no queue to talk back into; the side-load wire only ever
    /// flows one way.
    remote_tx: Option<mpsc::Sender<ChannelEvent>>,
}

impl LoopbackChannel {
    /// Opens a channel pair. The returned end is the sending side; the
    /// opposite end is announced to `remote_tx` as [`ChannelEvent::Opened`]
    /// so its consumer can install a transfer handler before any frame
    /// arrives.
    pub fn open_pair(
        id: u64,
        label: &str,
        remote_tx: &mpsc::Sender<ChannelEvent>,
    ) -> Result<LoopbackChannel, ChannelError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(ChannelState::Open),
            buffered: AtomicU64::new(0),
            close_announced: AtomicBool::new(false),
        });

        let far_end = LoopbackChannel {
            id,
            label: label.to_string(),
            shared: shared.clone(),
            remote_tx: None,
        };
        remote_tx
            .send(ChannelEvent::Opened {
                id,
                label: label.to_string(),
                channel: Box::new(far_end),
            })
            .map_err(|_| ChannelError::Detached)?;

        Ok(LoopbackChannel {
            id,
            label: label.to_string(),
            shared,
            remote_tx: Some(remote_tx.clone()),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Simulates transport backlog so tests can exercise backpressure.
    pub fn set_buffered_amount(&self, amount: u64) {
        self.shared.buffered.store(amount, Ordering::SeqCst);
    }

    fn deliver(&self, frame: Frame) -> Result<(), ChannelError> {
        let state = self.state();
        if !state.is_open() {
            return Err(ChannelError::NotOpen(state));
        }
        let Some(tx) = &self.remote_tx else {
            return Err(ChannelError::Detached);
        };
        tx.send(ChannelEvent::Message { id: self.id, frame })
            .map_err(|_| ChannelError::Detached)
    }
}

#[allow(clippy::expect_used)]
impl SideChannel for LoopbackChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> ChannelState {
        *self.shared.state.lock().expect("channel state lock poisoned")
    }

    fn buffered_amount(&self) -> u64 {
        self.shared.buffered.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.deliver(Frame::Text(text.to_string()))
    }

    fn send_binary(&self, payload: Bytes) -> Result<(), ChannelError> {
        self.deliver(Frame::Binary(payload))
    }

    fn close(&self) {
        {
            let mut state = self.shared.state.lock().expect("channel state lock poisoned");
            if *state == ChannelState::Closed {
                return;
            }
            *state = ChannelState::Closed;
        }
        // Announce teardown to the consuming side exactly once, regardless
        // of which end initiated it.
        if !self.shared.close_announced.swap(true, Ordering::SeqCst)
            && let Some(tx) = &self.remote_tx
        {
            let _ = tx.send(ChannelEvent::Closed { id: self.id });
        }
    }
}
