/// Lifecycle of a channel, mirroring the transport's ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    /// True only while frames can be sent.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, ChannelState::Open)
    }
}
