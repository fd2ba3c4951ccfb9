use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn cfg() -> SinkConfig {
    Box::new(())
}

fn probed(name: &str, ok: bool) -> SinkBackend {
    let mut b = SinkBackend::new(name);
    b.probe = Some(Box::new(move |_| ok));
    b
}

#[test]
fn scenario_6_fallback_selection() {
    let mut reg = Registry::new();
    reg.register(probed("A", false)).unwrap();
    reg.register(probed("B", true)).unwrap();

    assert_eq!(reg.pick("A", &cfg()).unwrap().name, "B");
    assert_eq!(reg.pick("auto", &cfg()).unwrap().name, "B");
    assert_eq!(reg.pick("missing", &cfg()).unwrap().name, "B");

    let mut reg2 = Registry::new();
    reg2.register(probed("A", false)).unwrap();
    assert!(reg2.pick("A", &cfg()).is_err());
    assert!(reg2.pick("auto", &cfg()).is_err());
    assert!(reg2.pick("missing", &cfg()).is_err());
}

#[test]
fn register_refuses_duplicate_names() {
    let mut reg = Registry::new();
    reg.register(SinkBackend::new("dup")).unwrap();
    assert!(reg.register(SinkBackend::new("dup")).is_err());
}

#[test]
fn update_without_update_callback_is_stop_then_start() {
    let mut reg = Registry::new();
    let starts = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));
    let s1 = starts.clone();
    let st1 = stops.clone();

    let mut backend = SinkBackend::new("restart-only");
    backend.start = Some(Box::new(move |_, _| {
        s1.fetch_add(1, Ordering::SeqCst);
        0
    }));
    backend.stop = Some(Box::new(move |_| {
        st1.fetch_add(1, Ordering::SeqCst);
    }));
    reg.register(backend).unwrap();

    let mut stream = Stream::new(&reg, cfg());
    stream.attach_sink("restart-only").unwrap();
    stream.start(FrameDescriptor::default()).unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    stream.update(FrameDescriptor::default()).unwrap();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(starts.load(Ordering::SeqCst), 2);
}

#[test]
fn update_with_update_callback_does_not_restart() {
    let mut reg = Registry::new();
    let updates = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));
    let u1 = updates.clone();
    let st1 = stops.clone();

    let mut backend = SinkBackend::new("has-update");
    backend.update = Some(Box::new(move |_, _| {
        u1.fetch_add(1, Ordering::SeqCst);
        0
    }));
    backend.stop = Some(Box::new(move |_| {
        st1.fetch_add(1, Ordering::SeqCst);
    }));
    reg.register(backend).unwrap();

    let mut stream = Stream::new(&reg, cfg());
    stream.attach_sink("has-update").unwrap();
    stream.start(FrameDescriptor::default()).unwrap();
    stream.update(FrameDescriptor::default()).unwrap();

    assert_eq!(updates.load(Ordering::SeqCst), 1);
    assert_eq!(stops.load(Ordering::SeqCst), 0);
}

#[test]
fn attach_sink_forbidden_after_start() {
    let mut reg = Registry::new();
    reg.register(SinkBackend::new("a")).unwrap();
    reg.register(SinkBackend::new("b")).unwrap();
    let mut stream = Stream::new(&reg, cfg());
    stream.attach_sink("a").unwrap();
    stream.start(FrameDescriptor::default()).unwrap();
    assert!(stream.attach_sink("b").is_err());
}

#[test]
fn update_forbidden_before_start() {
    let mut reg = Registry::new();
    reg.register(SinkBackend::new("a")).unwrap();
    let mut stream = Stream::new(&reg, cfg());
    stream.attach_sink("a").unwrap();
    assert!(stream.update(FrameDescriptor::default()).is_err());
}

#[test]
fn stop_is_idempotent() {
    let mut reg = Registry::new();
    let stops = Arc::new(AtomicUsize::new(0));
    let st1 = stops.clone();
    let mut backend = SinkBackend::new("a");
    backend.stop = Some(Box::new(move |_| {
        st1.fetch_add(1, Ordering::SeqCst);
    }));
    reg.register(backend).unwrap();

    let mut stream = Stream::new(&reg, cfg());
    stream.attach_sink("a").unwrap();
    stream.start(FrameDescriptor::default()).unwrap();
    stream.stop();
    stream.stop();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn submit_calls_every_sink_and_returns_first_error() {
    let mut reg = Registry::new();
    let mut a = SinkBackend::new("a");
    a.submit = Some(Box::new(|_, _| 5));
    reg.register(a).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let c1 = calls.clone();
    let mut b = SinkBackend::new("b");
    b.submit = Some(Box::new(move |_, _| {
        c1.fetch_add(1, Ordering::SeqCst);
        0
    }));
    reg.register(b).unwrap();

    let mut stream = Stream::new(&reg, cfg());
    stream.attach_sink("a").unwrap();
    stream.attach_sink("b").unwrap();
    stream.start(FrameDescriptor::default()).unwrap();
    let rc = stream.submit(1);
    assert_eq!(rc, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "every sink must still be called");
}
