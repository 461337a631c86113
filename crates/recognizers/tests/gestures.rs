//! Reference recognizers driven through a real surface.

use std::sync::{Arc, Mutex};
use tactus_config::{Aggregation, Settings};
use tactus_contacts::ContactBatch;
use tactus_recognition::{Configuration, GestureEvent, RecognitionRegistry, Recognizer};
use tactus_recognizers::{
    DragConfig, DragEvent, DragRecognizer, HoldConfig, HoldEvent, HoldRecognizer, TapConfig,
    TapEvent, TapRecognizer,
};
use tactus_surface::Surface;
use tactus_targets::{RectTarget, Role, TargetId};

type Log = Arc<Mutex<Vec<String>>>;

fn setup() -> (Surface, TargetId) {
    let registry = Arc::new(RecognitionRegistry::new());
    let mut surface = Surface::new(Settings::new(Aggregation::Union), registry).unwrap();
    let pad = surface.add_target(Arc::new(RectTarget::new(0.0, 0.0, 1.0, 1.0)));
    (surface, pad)
}

fn listen<R: Recognizer>(
    surface: &Surface,
    config: &Configuration,
    event: R::Event,
    target: TargetId,
    log: &Log,
) {
    let log = Arc::clone(log);
    surface
        .registry()
        .register::<R, _>(config, event, target, move |g| {
            log.lock().unwrap().push(g.event.name().to_string());
        });
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

mod tap {
    use super::*;

    fn tap_surface() -> (Surface, Log) {
        let (surface, pad) = setup();
        let log = Log::default();
        let config = Configuration::new(TapConfig::default());
        listen::<TapRecognizer>(&surface, &config, TapEvent::Tap, pad, &log);
        (surface, log)
    }

    #[test]
    fn test_quick_touch_taps() {
        let (mut surface, log) = tap_surface();
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.5, 0.5))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(80).remove(1, 0.5, 0.5))
            .unwrap();
        assert_eq!(entries(&log), vec!["tap"]);
    }

    #[test]
    fn test_two_finger_tap_is_one_tap() {
        let (mut surface, log) = tap_surface();
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.5, 0.5).add(2, 0.55, 0.5))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(60).remove(1, 0.5, 0.5))
            .unwrap();
        assert!(entries(&log).is_empty());
        surface
            .refresh(&ContactBatch::new(70).remove(2, 0.55, 0.5))
            .unwrap();
        assert_eq!(entries(&log), vec!["tap"]);
    }

    #[test]
    fn test_slow_touch_does_not_tap() {
        let (mut surface, log) = tap_surface();
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.5, 0.5))
            .unwrap();
        surface.advance_to(301);
        surface
            .refresh(&ContactBatch::new(400).remove(1, 0.5, 0.5))
            .unwrap();
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_unbounded_duration_saturates_expiry_deadline() {
        let (mut surface, pad) = setup();
        let log = Log::default();
        let config = Configuration::new(TapConfig {
            max_duration_ms: u64::MAX,
            ..TapConfig::default()
        });
        listen::<TapRecognizer>(&surface, &config, TapEvent::Tap, pad, &log);

        surface
            .refresh(&ContactBatch::new(10).add(1, 0.5, 0.5))
            .unwrap();
        assert_eq!(surface.next_deadline(), Some(u64::MAX));
        surface
            .refresh(&ContactBatch::new(5_000).remove(1, 0.5, 0.5))
            .unwrap();
        assert_eq!(entries(&log), vec!["tap"]);
    }

    #[test]
    fn test_moving_touch_does_not_tap() {
        let (mut surface, log) = tap_surface();
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.5, 0.5))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(30).update(1, 0.6, 0.5))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(60).remove(1, 0.6, 0.5))
            .unwrap();
        assert!(entries(&log).is_empty());
    }
}

mod hold {
    use super::*;

    fn hold_surface() -> (Surface, Log) {
        let (surface, pad) = setup();
        let log = Log::default();
        let config = Configuration::new(HoldConfig {
            hold_ms: 300,
            ..HoldConfig::default()
        });
        listen::<HoldRecognizer>(&surface, &config, HoldEvent::Hold, pad, &log);
        (surface, log)
    }

    #[test]
    fn test_still_touch_holds_on_timer() {
        let (mut surface, log) = hold_surface();
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.5, 0.5))
            .unwrap();
        assert_eq!(surface.next_deadline(), Some(300));

        assert_eq!(surface.advance_to(299).timers_fired, 0);
        assert!(entries(&log).is_empty());
        assert_eq!(surface.advance_to(300).timers_fired, 1);
        assert_eq!(entries(&log), vec!["hold"]);
        assert_eq!(surface.next_deadline(), None);
    }

    #[test]
    fn test_lift_before_expiry_cancels_hold() {
        let (mut surface, log) = hold_surface();
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.5, 0.5))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(100).remove(1, 0.5, 0.5))
            .unwrap();
        surface.advance_to(300);
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_moving_touch_cancels_hold() {
        let (mut surface, log) = hold_surface();
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.5, 0.5))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(100).update(1, 0.6, 0.5))
            .unwrap();
        surface.advance_to(300);
        assert!(entries(&log).is_empty());
    }
}

mod drag {
    use super::*;

    fn drag_surface(local_role: Role) -> (Surface, Log) {
        let (mut surface, _pad) = setup();
        let log = Log::default();
        let handle = surface.add_target(Arc::new(RectTarget::new(0.1, 0.1, 0.1, 0.1)));
        let config = Configuration::new(DragConfig::default()).with_local_role(local_role);
        for event in DragEvent::ALL {
            listen::<DragRecognizer>(&surface, &config, *event, handle, &log);
        }
        (surface, log)
    }

    #[test]
    fn test_drag_start_move_end() {
        let (mut surface, log) = drag_surface(Role::Initial);
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.15, 0.15))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(16).update(1, 0.15, 0.16))
            .unwrap();
        assert!(entries(&log).is_empty());

        surface
            .refresh(&ContactBatch::new(32).update(1, 0.25, 0.16))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(48).update(1, 0.35, 0.16))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(64).remove(1, 0.35, 0.16))
            .unwrap();
        assert_eq!(entries(&log), vec!["drag_start", "drag", "drag_end"]);

        let group = surface.groups().next().map(|(_, g)| g).unwrap();
        assert!(group.is_done());
    }

    #[test]
    fn test_drag_off_target_ends_with_intersection_role() {
        let (mut surface, log) = drag_surface(Role::Intersection);
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.15, 0.15))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(16).update(1, 0.25, 0.15))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(32).update(1, 0.3, 0.15))
            .unwrap();
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_lift_without_moving_is_not_a_drag() {
        let (mut surface, log) = drag_surface(Role::Initial);
        surface
            .refresh(&ContactBatch::new(0).add(1, 0.15, 0.15))
            .unwrap();
        surface
            .refresh(&ContactBatch::new(50).remove(1, 0.15, 0.15))
            .unwrap();
        assert!(entries(&log).is_empty());
        let group = surface.groups().next().map(|(_, g)| g).unwrap();
        assert!(group.is_done());
    }
}
