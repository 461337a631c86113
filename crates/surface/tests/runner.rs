//! The threaded runner: batches and timer expiry on one tick thread.

use std::sync::Arc;
use std::time::Duration;
use tactus_config::{Aggregation, Settings};
use tactus_contacts::ContactBatch;
use tactus_recognition::{Configuration, RecognitionRegistry};
use tactus_recognizers::{HoldConfig, HoldEvent, HoldRecognizer};
use tactus_surface::{Clock, ManualClock, Surface, SurfaceInput, SurfaceRunner};
use tactus_targets::RectTarget;

fn runner(clock: &Arc<ManualClock>) -> SurfaceRunner {
    let registry = Arc::new(RecognitionRegistry::new());
    let surface = Surface::new(Settings::new(Aggregation::Union), registry).unwrap();
    let clock: Arc<dyn Clock> = clock.clone();
    SurfaceRunner::spawn(surface, clock).unwrap()
}

#[test]
fn test_hold_fires_from_runner_clock() {
    let clock = Arc::new(ManualClock::new(0));
    let mut runner = runner(&clock);
    let pad = runner
        .add_target(Arc::new(RectTarget::new(0.0, 0.0, 1.0, 1.0)))
        .unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let config = Configuration::new(HoldConfig {
        hold_ms: 200,
        ..HoldConfig::default()
    });
    runner
        .registry()
        .register::<HoldRecognizer, _>(&config, HoldEvent::Hold, pad, move |g| {
            let _ = tx.send((g.target, g.timestamp_ms));
        });

    runner
        .submit(ContactBatch::new(0).add(1, 0.5, 0.5))
        .unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

    clock.set(250);
    let (target, timestamp_ms) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(target, pad);
    assert_eq!(timestamp_ms, 250);

    let surface = runner.stop().unwrap();
    assert_eq!(surface.now_ms(), 250);
    assert_eq!(surface.next_deadline(), None);
}

#[test]
fn test_raw_sender_and_shutdown() {
    let clock = Arc::new(ManualClock::new(0));
    let mut runner = runner(&clock);
    let sender = runner.sender();
    sender
        .send(SurfaceInput::Batch(ContactBatch::new(5).add(1, 0.2, 0.2)))
        .unwrap();
    sender.send(SurfaceInput::Shutdown).unwrap();

    let surface = runner.stop().unwrap();
    assert_eq!(surface.groups().count(), 1);
    assert!(!runner.is_running());
}
