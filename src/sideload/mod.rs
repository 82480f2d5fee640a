//! The side-load transfer protocol: one metadata text frame followed by
//! ordered binary chunks over a dedicated channel, flow-controlled against
//! the channel's outbound buffer. Sender and receiver are independent,
//! re-entrant state machines; the scheduler and receiver worker drive them
//! against real channels.

pub mod constants;
pub mod events;
pub mod metadata;
pub mod receiver;
pub mod receiver_worker;
pub mod scheduler;
pub mod sender;
pub mod session;
pub mod store;


pub use events::SideloadEvent;
pub use metadata::TransferMetadata;
pub use receiver::{AbandonReason, RecvAction, TransferReceiver};
pub use receiver_worker::ReceiverWorker;
pub use scheduler::{SendLane, SendScheduler};
pub use sender::{SendTick, TransferSender};
pub use store::PayloadStore;
