use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domwire_core::{Document, EventTarget, NativeEvent};
use domwire_frames::{FrameHost, FrameThrottler, Registration, ThrottleKey};
use parking_lot::Mutex;
use serde_json::{json, Value};

fn setup() -> (Document, FrameHost, FrameThrottler) {
    let document = Document::new();
    let host = FrameHost::new();
    let throttler = FrameThrottler::new(document.clone(), host.clone());
    (document, host, throttler)
}

fn scroll_to(y: i64) -> NativeEvent {
    NativeEvent::new("scroll").with_data(json!({ "y": y }))
}

#[test]
fn test_five_sync_scrolls_run_once_next_frame() {
    let (document, host, throttler) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    throttler
        .set([Registration::new(EventTarget::Window, "scroll", "ns1", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })])
        .unwrap();

    for _ in 0..5 {
        document.fire(EventTarget::Window, "scroll").unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0, "nothing runs before the frame");

    host.run_frame();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_coalesces_to_latest_event() {
    let (document, host, throttler) = setup();
    let seen: Arc<Mutex<Vec<Option<Value>>>> = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    throttler
        .set([Registration::new(EventTarget::Window, "scroll", "sticky", move |event| {
            s.lock().push(event.data().cloned());
        })])
        .unwrap();

    for y in 0..10 {
        document.dispatch(EventTarget::Window, scroll_to(y)).unwrap();
    }
    host.run_frame();

    assert_eq!(*seen.lock(), vec![Some(json!({ "y": 9 }))]);
}

#[test]
fn test_at_most_once_per_frame() {
    let (document, host, throttler) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    throttler
        .set([Registration::new(EventTarget::Window, "pointermove", "cursor", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })])
        .unwrap();

    // Two events per 16ms frame for ten frames.
    for _ in 0..20 {
        document.fire(EventTarget::Window, "pointermove").unwrap();
        host.advance(Duration::from_millis(8));
    }

    assert_eq!(host.frames_run(), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[test]
fn test_delay_debounces_until_quiet() {
    let (document, host, throttler) = setup();
    let fired_at: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
    let f = fired_at.clone();
    let clock = host.clone();
    throttler
        .set([Registration::new(EventTarget::Window, "resize", "layout", move |_| {
            f.lock().push(clock.now());
        })
        .with_delay(Duration::from_millis(200))])
        .unwrap();

    // Every 50ms for one second.
    for _ in 0..=20 {
        document.fire(EventTarget::Window, "resize").unwrap();
        host.advance(Duration::from_millis(50));
    }
    assert!(fired_at.lock().is_empty(), "still inside the debounce window");

    host.advance(Duration::from_millis(400));

    let fired_at = fired_at.lock();
    assert_eq!(fired_at.len(), 1);
    let last_event = Duration::from_millis(1000);
    assert!(fired_at[0] >= last_event + Duration::from_millis(200));
    assert!(fired_at[0] <= last_event + Duration::from_millis(200) + host.frame_interval());
}

#[test]
fn test_remove_then_fire_runs_nothing() {
    let (document, host, throttler) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let registration = Registration::new(EventTarget::Window, "scroll", "parallax", move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let key = registration.key();
    throttler.set([registration]).unwrap();

    throttler.remove([&key]);
    document.fire(EventTarget::Window, "scroll").unwrap();
    host.advance(Duration::from_millis(100));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!throttler.contains(&key));
}

#[test]
fn test_remove_unknown_key_is_noop() {
    let (_document, _host, throttler) = setup();
    throttler.remove([&ThrottleKey::new("scroll", "never-set")]);
    assert!(throttler.is_empty());
}

#[test]
fn test_resetting_same_key_keeps_one_listener() {
    let (document, host, throttler) = setup();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let a = first.clone();
    throttler
        .set([Registration::new(EventTarget::Window, "scroll", "header", move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        })])
        .unwrap();
    let b = second.clone();
    throttler
        .set([Registration::new(EventTarget::Window, "scroll", "header", move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        })])
        .unwrap();

    assert_eq!(document.listener_count(EventTarget::Window, "scroll"), 1);
    document.fire(EventTarget::Window, "scroll").unwrap();
    host.run_frame();

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn test_namespaces_are_independent() {
    let (document, host, throttler) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    for namespace in ["header", "sidebar"] {
        let c = calls.clone();
        throttler
            .set([Registration::new(EventTarget::Window, "scroll", namespace, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })])
            .unwrap();
    }

    document.fire(EventTarget::Window, "scroll").unwrap();
    host.run_frame();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_frame_in_flight_survives_remove() {
    let (document, host, throttler) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let registration = Registration::new(EventTarget::Window, "scroll", "lazy", move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let key = registration.key();
    throttler.set([registration]).unwrap();

    document.fire(EventTarget::Window, "scroll").unwrap();
    throttler.remove([&key]);
    host.run_frame();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    document.fire(EventTarget::Window, "scroll").unwrap();
    host.run_frame();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_element_target_and_scoped_guard() {
    let (document, host, throttler) = setup();
    let panel = document.append_element(document.root(), "div", &[]).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();

    {
        let _guard = throttler
            .set_scoped(Registration::new(panel, "scroll", "list", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        document.fire(panel.into(), "scroll").unwrap();
        host.run_frame();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    assert!(throttler.is_empty());
    assert_eq!(document.listener_count(panel.into(), "scroll"), 0);
    document.fire(panel.into(), "scroll").unwrap();
    host.run_frame();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
