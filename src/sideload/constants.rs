use std::time::Duration;

/// Reserved label of side-load channels. Receivers react only to channels
/// created with this label; everything else multiplexed on the connection is
/// left alone.
pub const CHANNEL_LABEL: &str = "sideload";

/// Maximum payload of one binary chunk frame.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Outbound-buffer high-water mark. While the channel reports more than this
/// many unsent bytes, the sender defers instead of queuing further chunks.
pub const MAX_BUFFER: u64 = 256 * 1024;

/// Delay before re-checking a saturated outbound buffer.
pub const BUFFER_POLL_DELAY: Duration = Duration::from_millis(10);

/// Delay before re-checking a channel that has not finished connecting.
pub const OPEN_POLL_DELAY: Duration = Duration::from_millis(10);

/// Grace period between the last chunk and channel teardown, giving the
/// transport time to flush its outbound buffer. A heuristic; the protocol
/// has no flush acknowledgment.
pub const CLOSE_GRACE: Duration = Duration::from_millis(1000);

/// Upper bound on the metadata text frame. Anything larger is rejected
/// before parsing.
pub const MAX_META_LEN: usize = 4 * 1024;
