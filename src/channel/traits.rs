use bytes::Bytes;

use crate::channel::state::ChannelState;

/// Errors surfaced by channel send operations.
#[derive(Debug)]
pub enum ChannelError {
    /// The channel is not in the `Open` state.
    NotOpen(ChannelState),
    /// The remote end is gone and can no longer accept frames.
    Detached,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::NotOpen(state) => write!(f, "channel not open (state: {state:?})"),
            ChannelError::Detached => write!(f, "remote end detached"),
        }
    }
}

/// One ordered, reliable point-to-point message channel.
///
/// The side-load protocol only ever talks to a channel through this trait:
/// it sends text and binary frames, polls the outbound buffer level for
/// backpressure, checks the ready state, and closes the channel when done.
/// Inbound traffic does not go through the trait; it arrives as
/// [`crate::channel::ChannelEvent`]s on the consumer's event receiver.
pub trait SideChannel: Send {
    /// The label the channel was created with. Transfers only ever use
    /// channels labeled [`crate::sideload::constants::CHANNEL_LABEL`].
    fn label(&self) -> &str;

    fn state(&self) -> ChannelState;

    /// Bytes queued on the transport but not yet handed to the network.
    fn buffered_amount(&self) -> u64;

    /// Sends one UTF-8 text frame.
    fn send_text(&self, text: &str) -> Result<(), ChannelError>;

    /// Sends one binary frame.
    fn send_binary(&self, payload: Bytes) -> Result<(), ChannelError>;

    /// Begins teardown. Safe to call from either side, and more than once.
    fn close(&self);
}
