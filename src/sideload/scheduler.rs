use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::channel::SideChannel;
use crate::log::log_sink::LogSink;
use crate::sideload::events::SideloadEvent;
use crate::sideload::sender::{SendTick, TransferSender};
use crate::{sink_debug, sink_info, sink_trace, sink_warn};

/// Poll interval while no lane is scheduled.
const IDLE_WAIT: Duration = Duration::from_millis(100);
/// Upper bound on any single wait, so shutdown and new lanes stay reactive.
const MAX_WAIT: Duration = Duration::from_secs(1);

/// One outbound transfer: a sender machine bound to its dedicated channel.
pub struct SendLane {
    pub id: u64,
    pub sender: TransferSender,
    pub channel: Box<dyn SideChannel>,
}

pub enum SchedulerCommands {
    Begin(SendLane),
    Shutdown,
}

/// Drives every outbound transfer from a single worker thread.
///
/// Each loop pass services the lanes whose deadline has passed, then sleeps
/// on the command channel until the earliest next deadline. A lane waiting
/// out backpressure or the drain grace period costs nothing, and a lane that
/// just sent a chunk is rescheduled immediately but behind every other due
/// lane, so one hungry transfer cannot starve the rest.
pub struct SendScheduler {
    tx: Sender<SchedulerCommands>,
}

impl SendScheduler {
    pub fn start(event_tx: Sender<SideloadEvent>, log_sink: Arc<dyn LogSink>) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || Self::run_loop(rx, event_tx, log_sink));
        Self { tx }
    }

    /// Hands a new lane to the worker. Fails only after shutdown.
    pub fn begin(&self, lane: SendLane) -> Result<(), String> {
        self.tx
            .send(SchedulerCommands::Begin(lane))
            .map_err(|e| e.to_string())
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SchedulerCommands::Shutdown);
    }

    fn run_loop(
        rx: Receiver<SchedulerCommands>,
        event_tx: Sender<SideloadEvent>,
        log_sink: Arc<dyn LogSink>,
    ) {
        struct Active {
            lane: SendLane,
            due: Instant,
        }

        sink_info!(log_sink, "[SCHEDULER] worker started");
        let mut lanes: Vec<Active> = Vec::new();

        loop {
            let now = Instant::now();

            lanes.retain_mut(|active| {
                if active.due > now {
                    return true;
                }
                match active.lane.sender.tick(active.lane.channel.as_ref()) {
                    SendTick::Pending(delay) => {
                        active.due = now + delay;
                        true
                    }
                    SendTick::Sent { percent } => {
                        let _ = event_tx.send(SideloadEvent::SendProgress {
                            lane: active.lane.id,
                            percent,
                        });
                        // Yield: due stays "now", the lane runs again next
                        // pass, after every other due lane.
                        active.due = now;
                        true
                    }
                    SendTick::WaitBuffer(delay) => {
                        sink_trace!(
                            log_sink,
                            "[SCHEDULER] lane {} backpressured, retry in {:?}",
                            active.lane.id,
                            delay
                        );
                        active.due = now + delay;
                        true
                    }
                    SendTick::Drain(grace) => {
                        sink_trace!(
                            log_sink,
                            "[SCHEDULER] lane {} draining for {:?}",
                            active.lane.id,
                            grace
                        );
                        active.due = now + grace;
                        true
                    }
                    SendTick::Closed { delivered } => {
                        let event = if delivered {
                            sink_debug!(log_sink, "[SCHEDULER] lane {} completed", active.lane.id);
                            SideloadEvent::SendCompleted {
                                lane: active.lane.id,
                            }
                        } else {
                            sink_warn!(
                                log_sink,
                                "[SCHEDULER] lane {} lost its channel, transfer dropped",
                                active.lane.id
                            );
                            SideloadEvent::SendAborted {
                                lane: active.lane.id,
                            }
                        };
                        let _ = event_tx.send(event);
                        false
                    }
                }
            });

            // Sleep until the earliest deadline, capped so commands are
            // still picked up promptly.
            let wait = lanes
                .iter()
                .map(|a| a.due.saturating_duration_since(Instant::now()))
                .min()
                .unwrap_or(IDLE_WAIT)
                .min(MAX_WAIT);

            match rx.recv_timeout(wait) {
                Ok(SchedulerCommands::Begin(lane)) => {
                    sink_debug!(
                        log_sink,
                        "[SCHEDULER] lane {} started ({} bytes)",
                        lane.id,
                        lane.sender.metadata().size
                    );
                    lanes.push(Active {
                        lane,
                        due: Instant::now(),
                    });
                }
                Ok(SchedulerCommands::Shutdown) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        sink_info!(log_sink, "[SCHEDULER] worker stopped");
    }
}
