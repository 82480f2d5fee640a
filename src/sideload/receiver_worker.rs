use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

use crate::channel::{ChannelEvent, SideChannel};
use crate::log::log_sink::LogSink;
use crate::sideload::constants::CHANNEL_LABEL;
use crate::sideload::events::SideloadEvent;
use crate::sideload::receiver::{RecvAction, TransferReceiver};
use crate::{sink_debug, sink_info, sink_trace};

/// Consumes one peer connection's channel events and reassembles every
/// side-load transfer the peer opens towards us.
///
/// Only channels labeled [`CHANNEL_LABEL`] get a receiver machine; events
/// for anything else multiplexed on the connection pass through untouched.
/// Machines are created lazily on the channel-opened event and dropped as
/// soon as their channel closes or their transfer ends, so an abandoned
/// transfer releases its buffers with the channel.
pub struct ReceiverWorker {
    peer: String,
    rx: Receiver<ChannelEvent>,
    tx_listener: Sender<SideloadEvent>,
    receivers: HashMap<u64, (TransferReceiver, Box<dyn SideChannel>)>,
    log_sink: Arc<dyn LogSink>,
}

impl ReceiverWorker {
    pub fn new(
        peer: String,
        rx: Receiver<ChannelEvent>,
        tx_listener: Sender<SideloadEvent>,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            peer,
            rx,
            tx_listener,
            receivers: HashMap::new(),
            log_sink,
        }
    }

    /// Runs until every event sender for the connection is gone.
    pub fn run(mut self) {
        sink_info!(
            self.log_sink,
            "[RECV_WORKER] watching connection to {}",
            self.peer
        );
        while let Ok(event) = self.rx.recv() {
            match event {
                ChannelEvent::Opened { id, label, channel } => {
                    if label != CHANNEL_LABEL {
                        sink_trace!(
                            self.log_sink,
                            "[RECV_WORKER] ignoring channel {} with label '{}'",
                            id,
                            label
                        );
                        continue;
                    }
                    sink_debug!(
                        self.log_sink,
                        "[RECV_WORKER] side-load channel {} opened by {}",
                        id,
                        self.peer
                    );
                    self.receivers
                        .insert(id, (TransferReceiver::new(self.log_sink.clone()), channel));
                }
                ChannelEvent::Message { id, frame } => {
                    // Traffic for channels we never adopted (foreign labels)
                    // is not ours to judge.
                    let Some((receiver, channel)) = self.receivers.get_mut(&id) else {
                        sink_trace!(
                            self.log_sink,
                            "[RECV_WORKER] frame on untracked channel {}",
                            id
                        );
                        continue;
                    };
                    match receiver.handle_frame(frame) {
                        RecvAction::Continue | RecvAction::Ignored => {}
                        RecvAction::Progress { percent } => {
                            let _ = self
                                .tx_listener
                                .send(SideloadEvent::RecvProgress { id, percent });
                        }
                        RecvAction::Complete {
                            name,
                            mime,
                            payload,
                        } => {
                            channel.close();
                            self.receivers.remove(&id);
                            let _ = self.tx_listener.send(SideloadEvent::RecvCompleted {
                                id,
                                name,
                                mime,
                                payload,
                            });
                        }
                        RecvAction::Abandoned(reason) => {
                            sink_debug!(
                                self.log_sink,
                                "[RECV_WORKER] transfer on channel {} abandoned: {}",
                                id,
                                reason
                            );
                            channel.close();
                            self.receivers.remove(&id);
                            let _ = self
                                .tx_listener
                                .send(SideloadEvent::RecvAbandoned { id, reason });
                        }
                    }
                }
                ChannelEvent::Closed { id } => {
                    let Some((mut receiver, _channel)) = self.receivers.remove(&id) else {
                        continue;
                    };
                    if let RecvAction::Abandoned(reason) = receiver.handle_close() {
                        let _ = self
                            .tx_listener
                            .send(SideloadEvent::RecvAbandoned { id, reason });
                    }
                }
            }
        }
        sink_info!(
            self.log_sink,
            "[RECV_WORKER] connection to {} gone, worker stopped",
            self.peer
        );
    }
}
