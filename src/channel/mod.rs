//! The ordered, reliable point-to-point message channel the side-load
//! protocol runs over. The real transport (typically a peer-to-peer data
//! channel) lives outside this crate; callers adapt it to [`SideChannel`]
//! and deliver inbound traffic as [`ChannelEvent`]s. A loopback
//! implementation is provided for tests and local runs.

pub mod events;
pub mod loopback;
pub mod state;
pub mod traits;


pub use events::{ChannelEvent, Frame};
pub use loopback::LoopbackChannel;
pub use state::ChannelState;
pub use traits::{ChannelError, SideChannel};
