mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{config, windows, ScriptedClassifier, WINDOW};
use vadgate::config::DetectorConfig;
use vadgate::kernel::audio::segmenter::{FlushPolicy, SpeechState};
use vadgate::kernel::classifier::{Classifier, ClassifierError, EnergyClassifier};
use vadgate::kernel::event::SegmentEvent;
use vadgate::kernel::telemetry::event::TelemetryEvent;
use vadgate::{SpeechDetector, VadError};

#[test]
fn test_detector_reports_segments_from_raw_bytes() {
    let classifier = ScriptedClassifier::new(&[0.1, 0.1, 0.6, 0.7, 0.6, 0.2, 0.1]);
    let mut detector = SpeechDetector::new(&config(), classifier).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let started = events.clone();
    detector.listeners_mut().speech_started.subscribe(move |e| {
        started.lock().unwrap().push(format!("start@{}", e.tick.frame));
    });
    let ended = events.clone();
    detector.listeners_mut().speech_ended.subscribe(move |e| {
        ended.lock().unwrap().push(format!("end@{}", e.tick.frame));
    });

    // 7 windows of PCM16, delivered in awkward chunk sizes.
    let bytes = vec![0u8; 7 * WINDOW * 2];
    let mut processed = 0;
    for chunk in bytes.chunks(334) {
        processed += detector.feed_bytes(chunk).unwrap();
    }

    assert_eq!(processed, 7);
    assert_eq!(*events.lock().unwrap(), vec!["start@2", "end@5"]);
    assert_eq!(detector.state(), SpeechState::Silence);

    let stats = detector.stats();
    assert_eq!(stats.total_frames, 7);
    assert_eq!(stats.speech_frames, 3);
    assert_eq!(stats.segments_started, 1);
    assert_eq!(stats.segments_ended, 1);
    assert_eq!(stats.speech_ms, 96);
    assert!((stats.speech_activity_ratio() - 3.0 / 7.0).abs() < 1e-9);
}

#[test]
fn test_listeners_run_in_registration_order() {
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::new(&[0.9])).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for id in 0..3 {
        let order = order.clone();
        let index = detector.listeners_mut().frame_classified.subscribe(move |_| {
            order.lock().unwrap().push(id);
        });
        assert_eq!(index, id);
    }
    assert_eq!(detector.listeners_mut().frame_classified.len(), 3);
    let seen = order.clone();
    detector.listeners_mut().speech_started.subscribe(move |_| {
        seen.lock().unwrap().push(99);
    });

    detector.feed_samples(&windows(1, 0.0)).unwrap();
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 99], "Frame listeners fire before the segment event");
}

#[test]
fn test_classifier_fault_leaves_state_untouched() {
    let script = vec![
        Ok(0.9),
        Err(ClassifierError::Backend("model crashed".into())),
        Ok(0.9),
        Ok(0.1),
    ];
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::with_script(script)).unwrap();

    let err = detector.feed_samples(&windows(4, 0.0)).unwrap_err();
    match &err {
        VadError::Classifier { tick, source } => {
            assert_eq!(tick.frame, 1);
            assert_eq!(*source, ClassifierError::Backend("model crashed".into()));
        }
        other => panic!("Expected classifier error, got {:?}", other),
    }
    assert!(err.is_transient());

    // Still speaking from frame 0; the remaining windows wait in the buffer.
    assert_eq!(detector.state(), SpeechState::Speaking);
    assert_eq!(detector.buffered(), 2 * WINDOW);
    assert_eq!(detector.stats().classifier_faults, 1);
    assert_eq!(detector.stats().total_frames, 1, "Faulted windows are not counted as frames");

    assert_eq!(detector.drain().unwrap(), 2);
    assert_eq!(detector.state(), SpeechState::Silence);
    assert_eq!(detector.stats().segments_ended, 1);
    assert_eq!(detector.stats().total_frames, 3);
}

#[test]
fn test_out_of_range_probability_is_a_fault() {
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::new(&[f32::NAN, 1.5])).unwrap();

    assert!(detector.feed_samples(&windows(1, 0.0)).is_err());
    assert!(detector.feed_samples(&windows(1, 0.0)).is_err());
    assert_eq!(detector.state(), SpeechState::Silence);
    assert_eq!(detector.stats().classifier_faults, 2);
    assert!(detector.last_frame().is_none());
}

#[test]
fn test_finish_flushes_open_segment() {
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::new(&[0.1, 0.9, 0.9])).unwrap();
    let flushed = Arc::new(Mutex::new(Vec::new()));
    let sink = flushed.clone();
    detector.listeners_mut().speech_ended.subscribe(move |e| {
        sink.lock().unwrap().push((e.flushed(), e.end_time()));
    });

    // Three full windows plus a partial one that never gets classified.
    detector.feed_samples(&windows(3, 0.0)).unwrap();
    detector.feed_samples(&[0.0; 100]).unwrap();
    assert_eq!(detector.buffered(), 100);

    let event = detector.finish();
    assert!(matches!(event, Some(SegmentEvent::Ended(_))));
    assert_eq!(detector.buffered(), 0);
    assert_eq!(*flushed.lock().unwrap(), vec![(true, Duration::from_millis(96))]);
    assert_eq!(detector.stats().segments_flushed, 1);
}

#[test]
fn test_finish_with_discard_policy() {
    let config = DetectorConfig {
        flush_policy: FlushPolicy::Discard,
        ..DetectorConfig::default()
    };
    let mut detector = SpeechDetector::new(&config, ScriptedClassifier::new(&[0.9, 0.9])).unwrap();
    detector.feed_samples(&windows(2, 0.0)).unwrap();

    assert!(detector.finish().is_none());
    assert_eq!(detector.state(), SpeechState::Silence);
    assert_eq!(detector.stats().segments_started, 1);
    assert_eq!(detector.stats().segments_ended, 0);
}

#[test]
fn test_reset_is_idempotent() {
    let probabilities = [0.1, 0.9, 0.8, 0.2, 0.7, 0.1];
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::new(&probabilities)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    detector.listeners_mut().speech_started.subscribe(move |e| {
        sink.lock().unwrap().push(("start", e.segment_id, e.tick.frame, e.start_time));
    });
    let sink = log.clone();
    detector.listeners_mut().speech_ended.subscribe(move |e| {
        sink.lock().unwrap().push(("end", e.segment.id, e.tick.frame, e.end_time()));
    });

    // 1. First pass
    detector.feed_samples(&windows(6, 0.0)).unwrap();
    let first = log.lock().unwrap().split_off(0);
    assert_eq!(first.len(), 4, "Two segments, each started and ended");

    // 2. Reset the same detector and replay the same sequence
    detector.reset();
    assert_eq!(detector.state(), SpeechState::Silence);
    assert_eq!(detector.buffered(), 0);
    detector.classifier_mut().load(&probabilities);
    detector.feed_samples(&windows(6, 0.0)).unwrap();
    let second = log.lock().unwrap().split_off(0);

    assert_eq!(first, second, "Replay after reset should match event for event");
    assert_eq!(detector.classifier().resets, 1);
    assert_eq!(detector.classifier().calls, 12);

    // Stats are monotonic across the reset.
    assert_eq!(detector.stats().total_frames, 12);
    assert_eq!(detector.stats().segments_started, 4);
}

#[test]
fn test_reset_restarts_classifier_and_clock() {
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::new(&[0.9, 0.9])).unwrap();
    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = ticks.clone();
    detector.listeners_mut().frame_classified.subscribe(move |f| {
        sink.lock().unwrap().push(f.tick.frame);
    });

    detector.feed_samples(&windows(1, 0.0)).unwrap();
    detector.reset();
    detector.feed_samples(&windows(1, 0.0)).unwrap();

    assert_eq!(*ticks.lock().unwrap(), vec![0, 0]);
    assert_eq!(detector.classifier().calls, 2);
    assert_eq!(detector.classifier().resets, 1, "Reset is forwarded to the classifier");
}

#[test]
fn test_classifier_called_once_per_window() {
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::default()).unwrap();

    // 5.5 windows in uneven chunks: exactly 5 classifications, none repeated.
    let samples = vec![0.0f32; 5 * WINDOW + WINDOW / 2];
    let mut processed = 0;
    for chunk in samples.chunks(700) {
        processed += detector.feed_samples(chunk).unwrap();
        assert_eq!(detector.classifier().calls, processed);
    }
    assert_eq!(processed, 5);
    assert_eq!(detector.buffered(), WINDOW / 2);
    assert_eq!(detector.last_frame().map(|f| f.tick.frame), Some(4));
}

/// Takes longer than a 32 ms window on every call.
struct SlowClassifier;

impl Classifier for SlowClassifier {
    fn classify(&mut self, _window: &[f32], _sample_rate: u32) -> Result<f32, ClassifierError> {
        std::thread::sleep(Duration::from_millis(40));
        Ok(0.0)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[test]
fn test_slow_classification_counts_overruns() {
    let mut detector = SpeechDetector::new(&config(), SlowClassifier).unwrap();
    assert_eq!(detector.feed_samples(&windows(2, 0.0)).unwrap(), 2);

    let stats = detector.stats();
    assert_eq!(stats.overruns, 2, "Both windows overran their 32ms budget");
    assert_eq!(stats.total_frames, 2, "Overrun frames are still classified");

    let overruns: Vec<_> = detector
        .telemetry()
        .recent()
        .filter_map(|e| match e {
            TelemetryEvent::Overrun { tick, elapsed_us, budget_us } => Some((tick.frame, *elapsed_us, *budget_us)),
            _ => None,
        })
        .collect();
    assert_eq!(overruns.len(), 2);
    for (frame, elapsed_us, budget_us) in overruns {
        assert_eq!(budget_us, 32_000);
        assert!(elapsed_us > budget_us, "frame {} took {}us", frame, elapsed_us);
    }
}

#[test]
fn test_fast_classification_has_no_overruns() {
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::default()).unwrap();
    detector.feed_samples(&windows(3, 0.0)).unwrap();
    assert_eq!(detector.stats().overruns, 0);
}

#[test]
fn test_flush_after_faulted_tail_ends_at_last_classified_window() {
    let script = vec![Ok(0.9), Err(ClassifierError::Backend("dropout".into()))];
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::with_script(script)).unwrap();
    assert!(detector.feed_samples(&windows(2, 0.0)).is_err());

    let Some(SegmentEvent::Ended(ended)) = detector.finish() else {
        panic!("Expected a flushed segment");
    };
    assert!(ended.flushed());
    assert_eq!(ended.end_time(), Duration::from_millis(32), "Faulted window is not part of the segment");
    assert_eq!(ended.duration(), Duration::from_millis(32));
    assert_eq!(ended.segment.frames, 1);
    assert_eq!(ended.audio().len(), WINDOW * 2);
}

#[test]
fn test_energy_classifier_finds_tone() {
    let mut detector = SpeechDetector::new(&config(), EnergyClassifier::default()).unwrap();
    let tone: Vec<f32> = (0..4 * WINDOW)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin())
        .collect();

    detector.feed_samples(&windows(2, 0.0)).unwrap();
    detector.feed_samples(&tone).unwrap();
    detector.feed_samples(&windows(2, 0.0)).unwrap();

    let stats = detector.stats();
    assert_eq!(stats.total_frames, 8);
    assert_eq!(stats.speech_frames, 4);
    assert_eq!(stats.segments_started, 1);
    assert_eq!(stats.segments_ended, 1);

    let snapshot = detector.telemetry().snapshot();
    assert_eq!(snapshot.rms.count, 8);
    assert!(snapshot.rms.max > 10_000.0, "Tone RMS on the 16-bit scale: {}", snapshot.rms.max);
}

#[test]
fn test_telemetry_records_faults() {
    let script = vec![Err(ClassifierError::WindowTooShort(3))];
    let mut detector = SpeechDetector::new(&config(), ScriptedClassifier::with_script(script)).unwrap();
    let _ = detector.feed_samples(&windows(1, 0.0));

    let faults = detector
        .telemetry()
        .recent()
        .filter(|e| matches!(e, TelemetryEvent::ClassifierFault { .. }))
        .count();
    assert_eq!(faults, 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let bad_rate = DetectorConfig {
        sample_rate: 44_100,
        ..DetectorConfig::default()
    };
    assert!(matches!(
        SpeechDetector::new(&bad_rate, ScriptedClassifier::default()),
        Err(VadError::UnsupportedSampleRate(44_100))
    ));

    let bad_threshold = DetectorConfig {
        threshold: 1.2,
        ..DetectorConfig::default()
    };
    assert!(matches!(
        SpeechDetector::new(&bad_threshold, ScriptedClassifier::default()),
        Err(VadError::InvalidThreshold(_))
    ));
}

#[test]
fn test_window_size_scales_with_rate() {
    for (rate, window) in [(8_000, 256), (16_000, 512), (32_000, 1024), (48_000, 1536)] {
        let config = DetectorConfig {
            sample_rate: rate,
            ..DetectorConfig::default()
        };
        let detector = SpeechDetector::new(&config, ScriptedClassifier::default()).unwrap();
        assert_eq!(detector.window_size(), window);
        assert_eq!(detector.clock().window_duration(), Duration::from_millis(32));
    }
}
