//! End-to-end exercises of the side-load path: push engine + send scheduler
//! on one side, receiver worker + payload store on the other, joined by the
//! in-memory loopback channel.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use sidecast::channel::{ChannelEvent, LoopbackChannel, SideChannel};
use sidecast::config::Config;
use sidecast::engine::PushEngine;
use sidecast::log::NoopLogSink;
use sidecast::sideload::constants::CHANNEL_LABEL;
use sidecast::sideload::events::SideloadEvent;
use sidecast::sideload::receiver::AbandonReason;
use std::fs;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

fn patterned(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

fn config_with_storage(dir: &std::path::Path) -> Config {
    let mut cfg = Config::empty();
    cfg.sections
        .entry("sideload".to_string())
        .or_default()
        .insert(
            "storage_path".to_string(),
            dir.to_string_lossy().to_string(),
        );
    cfg
}

/// Polls the engine until `done` says the collected events suffice.
fn pump_until(
    engine: &mut PushEngine,
    deadline: Duration,
    done: impl Fn(&[SideloadEvent]) -> bool,
) -> Vec<SideloadEvent> {
    let start = Instant::now();
    let mut events = Vec::new();
    while start.elapsed() < deadline {
        events.extend(engine.poll());
        if done(&events) {
            return events;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("timed out waiting for transfer events; got {:?}", events);
}

#[test]
fn push_reaches_viewer_and_lands_on_disk() {
    let tmp_dir = std::env::temp_dir().join("sidecast_roundtrip_test");
    let _ = fs::remove_dir_all(&tmp_dir);

    let cfg = config_with_storage(&tmp_dir);
    let mut engine = PushEngine::new(&cfg, Arc::new(NoopLogSink));

    let (viewer_tx, viewer_rx) = mpsc::channel::<ChannelEvent>();
    engine.watch_connection("viewer-1", viewer_rx);

    let payload = patterned(40000);
    engine.activate("tool.wasm", "application/wasm", payload.clone());

    let host_end = LoopbackChannel::open_pair(11, CHANNEL_LABEL, &viewer_tx).expect("open_pair");
    let lane = engine
        .peer_joined("viewer-1", Box::new(host_end))
        .expect("content is active, push should start");

    let events = pump_until(&mut engine, Duration::from_secs(10), |events| {
        let sent = events
            .iter()
            .any(|e| matches!(e, SideloadEvent::SendCompleted { .. }));
        let received = events
            .iter()
            .any(|e| matches!(e, SideloadEvent::RecvCompleted { .. }));
        sent && received
    });

    // The reassembled payload matches the source byte for byte.
    let (name, received) = events
        .iter()
        .find_map(|e| match e {
            SideloadEvent::RecvCompleted { name, payload, .. } => {
                Some((name.clone(), payload.clone()))
            }
            _ => None,
        })
        .expect("completion event present");
    assert_eq!(name, "tool.wasm");
    assert_eq!(received, payload);

    // Receiver-side progress for 40000/16384: 40%, 81%, then completion.
    let recv_progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            SideloadEvent::RecvProgress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(recv_progress, vec![40, 81]);

    // Sender-side progress is non-decreasing and ends at 100.
    let send_progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            SideloadEvent::SendProgress { lane: l, percent } if *l == lane => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(send_progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(send_progress.last(), Some(&100));

    // The store materialized the payload under the configured directory.
    let on_disk = fs::read(tmp_dir.join("tool.wasm")).expect("stored file readable");
    assert_eq!(on_disk, payload);

    engine.shutdown();
    let _ = fs::remove_dir_all(&tmp_dir);
}

#[test]
fn no_push_starts_while_nothing_is_active() {
    let tmp_dir = std::env::temp_dir().join("sidecast_inactive_test");
    let cfg = config_with_storage(&tmp_dir);
    let mut engine = PushEngine::new(&cfg, Arc::new(NoopLogSink));

    let (viewer_tx, _viewer_rx) = mpsc::channel::<ChannelEvent>();
    let host_end = LoopbackChannel::open_pair(21, CHANNEL_LABEL, &viewer_tx).expect("open_pair");

    assert!(engine.peer_joined("viewer-1", Box::new(host_end)).is_none());
    engine.shutdown();
}

#[test]
fn malformed_metadata_abandons_instead_of_completing() {
    let tmp_dir = std::env::temp_dir().join("sidecast_malformed_test");
    let cfg = config_with_storage(&tmp_dir);
    let mut engine = PushEngine::new(&cfg, Arc::new(NoopLogSink));

    let (viewer_tx, viewer_rx) = mpsc::channel::<ChannelEvent>();
    engine.watch_connection("viewer-1", viewer_rx);

    let host_end = LoopbackChannel::open_pair(31, CHANNEL_LABEL, &viewer_tx).expect("open_pair");
    host_end.send_text("{definitely not json").expect("send");
    // The chunk that follows must not trigger the old "first chunk
    // completes a zero-declared transfer" behavior.
    let _ = host_end.send_binary(patterned(16384));

    let events = pump_until(&mut engine, Duration::from_secs(5), |events| {
        events
            .iter()
            .any(|e| matches!(e, SideloadEvent::RecvAbandoned { .. }))
    });

    assert!(events.iter().any(|e| matches!(
        e,
        SideloadEvent::RecvAbandoned {
            reason: AbandonReason::MalformedMetadata,
            ..
        }
    )));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SideloadEvent::RecvCompleted { .. })),
        "a transfer without metadata must never complete"
    );
    engine.shutdown();
}

#[test]
fn channels_with_other_labels_are_left_alone() {
    let tmp_dir = std::env::temp_dir().join("sidecast_foreign_label_test");
    let cfg = config_with_storage(&tmp_dir);
    let mut engine = PushEngine::new(&cfg, Arc::new(NoopLogSink));

    let (viewer_tx, viewer_rx) = mpsc::channel::<ChannelEvent>();
    engine.watch_connection("viewer-1", viewer_rx);

    // Chat traffic multiplexed on the same connection.
    let chat = LoopbackChannel::open_pair(41, "chat", &viewer_tx).expect("open_pair");
    chat.send_text("hello there").expect("send");
    chat.send_binary(Bytes::from_static(b"sticker")).expect("send");

    std::thread::sleep(Duration::from_millis(100));
    assert!(
        engine.poll().is_empty(),
        "foreign-label traffic must produce no transfer events"
    );
    engine.shutdown();
}

#[test]
fn viewer_closing_mid_transfer_abandons_without_completion() {
    let tmp_dir = std::env::temp_dir().join("sidecast_early_close_test");
    let cfg = config_with_storage(&tmp_dir);
    let mut engine = PushEngine::new(&cfg, Arc::new(NoopLogSink));

    let (viewer_tx, viewer_rx) = mpsc::channel::<ChannelEvent>();
    engine.watch_connection("viewer-1", viewer_rx);

    // Hand-fed transfer: metadata declaring five chunks, two delivered,
    // then the channel dies.
    let host_end = LoopbackChannel::open_pair(51, CHANNEL_LABEL, &viewer_tx).expect("open_pair");
    host_end
        .send_text(r#"{"type":"meta","name":"big.bin","size":81920,"mime":"application/octet-stream"}"#)
        .expect("send");
    host_end.send_binary(patterned(16384)).expect("send");
    host_end.send_binary(patterned(16384)).expect("send");
    host_end.close();

    let events = pump_until(&mut engine, Duration::from_secs(5), |events| {
        events
            .iter()
            .any(|e| matches!(e, SideloadEvent::RecvAbandoned { .. }))
    });

    assert!(events.iter().any(|e| matches!(
        e,
        SideloadEvent::RecvAbandoned {
            reason: AbandonReason::ChannelClosed,
            ..
        }
    )));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SideloadEvent::RecvCompleted { .. }))
    );
    engine.shutdown();
}
