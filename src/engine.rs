use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::channel::{ChannelEvent, SideChannel};
use crate::config::Config;
use crate::log::log_sink::LogSink;
use crate::sideload::events::SideloadEvent;
use crate::sideload::receiver_worker::ReceiverWorker;
use crate::sideload::scheduler::{SendLane, SendScheduler};
use crate::sideload::sender::TransferSender;
use crate::sideload::store::PayloadStore;
use crate::{sink_debug, sink_info, sink_warn};

/// The payload currently offered to the room, pushed to every viewer whose
/// connection comes up while it is active.
pub struct ActivePush {
    pub name: String,
    pub mime: String,
    pub payload: Bytes,
}

/// Caller-facing orchestration of side-load transfers for one client.
///
/// The engine owns the peer-identity to transfer-lane mapping and the
/// "push to every newly joined peer while content is active" policy; the
/// protocol machines themselves stay stateless across transfers. Inbound
/// transfers from watched connections are reassembled by per-connection
/// workers and, on completion, materialized through the payload store.
pub struct PushEngine {
    log_sink: Arc<dyn LogSink>,
    scheduler: SendScheduler,
    event_tx: Sender<SideloadEvent>,
    event_rx: Receiver<SideloadEvent>,
    store: PayloadStore,
    active: Option<ActivePush>,
    /// lane id -> peer identity, for releasing bookkeeping on lane end.
    lane_peers: HashMap<u64, String>,
    /// peer identity -> lane id of the push currently running towards it.
    peer_lanes: HashMap<String, u64>,
}

impl PushEngine {
    pub fn new(config: &Config, log_sink: Arc<dyn LogSink>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let scheduler = SendScheduler::start(event_tx.clone(), log_sink.clone());
        let store = PayloadStore::new(config, log_sink.clone());
        Self {
            log_sink,
            scheduler,
            event_tx,
            event_rx,
            store,
            active: None,
            lane_peers: HashMap::new(),
            peer_lanes: HashMap::new(),
        }
    }

    /// Makes a payload the room's active content. Peers joining from now on
    /// get it pushed; peers already connected are untouched (the caller
    /// decides whether to re-offer to them).
    pub fn activate(&mut self, name: &str, mime: &str, payload: Bytes) {
        sink_info!(
            self.log_sink,
            "[ENGINE] content '{}' activated ({} bytes)",
            name,
            payload.len()
        );
        self.active = Some(ActivePush {
            name: name.to_string(),
            mime: mime.to_string(),
            payload,
        });
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActivePush> {
        self.active.as_ref()
    }

    /// A peer's connection came up. While content is active this starts a
    /// push over the supplied dedicated channel and returns the lane id;
    /// with nothing active the channel is left untouched.
    pub fn peer_joined(
        &mut self,
        peer: &str,
        channel: Box<dyn SideChannel>,
    ) -> Option<u64> {
        let push = self.active.as_ref()?;
        let lane_id: u64 = rand::random();
        let sender = TransferSender::new(
            &push.name,
            &push.mime,
            push.payload.clone(),
            self.log_sink.clone(),
        );
        if let Err(e) = self.scheduler.begin(SendLane {
            id: lane_id,
            sender,
            channel,
        }) {
            sink_warn!(self.log_sink, "[ENGINE] could not start push: {}", e);
            return None;
        }
        sink_debug!(
            self.log_sink,
            "[ENGINE] pushing '{}' to {} on lane {}",
            push.name,
            peer,
            lane_id
        );
        self.lane_peers.insert(lane_id, peer.to_string());
        self.peer_lanes.insert(peer.to_string(), lane_id);
        Some(lane_id)
    }

    /// Forgets a peer's bookkeeping. Cancellation itself is channel
    /// teardown, which the surrounding application owns; the lane notices
    /// the dead channel on its next tick.
    pub fn peer_left(&mut self, peer: &str) {
        if let Some(lane_id) = self.peer_lanes.remove(peer) {
            self.lane_peers.remove(&lane_id);
        }
    }

    /// Spawns a worker reassembling every side-load transfer arriving on
    /// the given connection's event stream.
    pub fn watch_connection(&self, peer: &str, rx: Receiver<ChannelEvent>) {
        let worker = ReceiverWorker::new(
            peer.to_string(),
            rx,
            self.event_tx.clone(),
            self.log_sink.clone(),
        );
        thread::spawn(move || worker.run());
    }

    /// Drains pending transfer events, updating lane bookkeeping and
    /// materializing completed inbound payloads, and hands the events to
    /// the caller (typically for UI progress).
    pub fn poll(&mut self) -> Vec<SideloadEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            match &event {
                SideloadEvent::SendCompleted { lane } | SideloadEvent::SendAborted { lane } => {
                    if let Some(peer) = self.lane_peers.remove(lane) {
                        self.peer_lanes.remove(&peer);
                    }
                }
                SideloadEvent::RecvCompleted { name, payload, .. } => {
                    if let Err(e) = self.store.save(name, payload) {
                        sink_warn!(
                            self.log_sink,
                            "[ENGINE] failed to store received payload '{}': {}",
                            name,
                            e
                        );
                    }
                }
                _ => {}
            }
            out.push(event);
        }
        out
    }

    /// Stops the send scheduler. In-flight lanes are dropped; their
    /// channels close when the surrounding connections go away.
    pub fn shutdown(&mut self) {
        sink_info!(self.log_sink, "[ENGINE] shutting down");
        self.scheduler.shutdown();
    }
}
