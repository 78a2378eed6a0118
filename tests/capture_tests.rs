use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Consumer, Observer, Split};
use ringbuf::HeapRb;
use vadgate::audio::capture::CaptureSink;

#[test]
fn test_sink_downmixes_into_queue() {
    let (producer, mut consumer) = HeapRb::<f32>::new(64).split();
    let dropped = Arc::new(AtomicU64::new(0));
    let active = Arc::new(AtomicBool::new(true));
    let mut sink = CaptureSink::new(producer, 2, dropped.clone(), active);

    sink.write_f32(&[0.5, -0.5, 1.0, 0.0]);
    sink.write_i16(&[16384, 16384]);

    let mut out = [0.0f32; 8];
    let read = consumer.pop_slice(&mut out);
    assert_eq!(&out[..read], &[0.0, 0.5, 0.5]);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
}

#[test]
fn test_sink_counts_overflow() {
    let (producer, consumer) = HeapRb::<f32>::new(4).split();
    let dropped = Arc::new(AtomicU64::new(0));
    let mut sink = CaptureSink::new(producer, 1, dropped.clone(), Arc::new(AtomicBool::new(true)));

    sink.write_f32(&[0.1; 10]);
    assert_eq!(consumer.occupied_len(), 4);
    assert_eq!(dropped.load(Ordering::Relaxed), 6, "Overflow is dropped and counted");
}

#[test]
fn test_stopped_sink_pushes_nothing() {
    let (producer, mut consumer) = HeapRb::<f32>::new(64).split();
    let dropped = Arc::new(AtomicU64::new(0));
    let active = Arc::new(AtomicBool::new(true));
    let mut sink = CaptureSink::new(producer, 1, dropped.clone(), active.clone());

    // 1. Audio before the stop reaches the queue
    sink.write_f32(&[0.2; 8]);

    // 2. Stop: later callbacks are ignored
    active.store(false, Ordering::Release);
    sink.write_f32(&[0.9; 8]);
    sink.write_i16(&[1000; 8]);

    let mut out = [0.0f32; 64];
    let read = consumer.pop_slice(&mut out);
    assert_eq!(read, 8, "Only pre-stop audio should be queued");
    assert!(out[..read].iter().all(|&s| s == 0.2));
    assert_eq!(dropped.load(Ordering::Relaxed), 0, "Ignored input is not an overflow");
}
