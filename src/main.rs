use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ringbuf::traits::Split;
use ringbuf::HeapRb;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use vadgate::audio::capture::AudioCapture;
use vadgate::audio::file::{detect_file, FileReport};
use vadgate::audio::processing::{AudioProcessor, DetectorMessage};
use vadgate::audio::wav::{self, SessionRecorder};
use vadgate::config::{ClassifierKind, DetectorConfig, WebRtcMode};
use vadgate::kernel::audio::segmenter::FlushPolicy;
use vadgate::kernel::classifier::Classifier;
use vadgate::kernel::event::{FrameResult, SpeechEnded, SpeechStarted};
use vadgate::kernel::telemetry::recorder::TelemetrySnapshot;
use vadgate::kernel::time::StreamClock;
use vadgate::{SpeechDetector, VadError};

#[derive(Parser, Debug)]
#[command(name = "vadgate", about = "Streaming voice activity detection and speech segmentation")]
struct Cli {
    /// JSON detector configuration. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Speech probability threshold in [0, 1].
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Processing sample rate (8000, 16000, 32000 or 48000).
    #[arg(long, global = true)]
    sample_rate: Option<u32>,

    #[arg(long, global = true, value_enum)]
    classifier: Option<ClassifierArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassifierArg {
    Energy,
    Webrtc,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Real-time detection on the default microphone.
    Live {
        /// Write every finished speech segment to DIR as a WAV file.
        #[arg(long, value_name = "DIR")]
        save_segments: Option<PathBuf>,

        /// Append all detected speech to one WAV file.
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,

        /// Drop a segment still open at Ctrl+C instead of closing it.
        #[arg(long)]
        discard_on_stop: bool,
    },

    /// Offline detection over a WAV file.
    File {
        path: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        #[arg(long)]
        min_speech_ms: Option<u64>,

        #[arg(long)]
        min_silence_ms: Option<u64>,

        #[arg(long)]
        speech_pad_ms: Option<u64>,

        #[arg(long)]
        max_speech_secs: Option<f32>,
    },

    /// Self test: configuration, classifier and detector construction.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Live {
            save_segments,
            record,
            discard_on_stop,
        } => {
            if discard_on_stop {
                config.flush_policy = FlushPolicy::Discard;
            }
            config.validate()?;
            run_live(config, save_segments, record).await
        }
        Command::File {
            path,
            json,
            min_speech_ms,
            min_silence_ms,
            speech_pad_ms,
            max_speech_secs,
        } => {
            let params = &mut config.timestamps;
            if let Some(v) = min_speech_ms {
                params.min_speech_ms = v;
            }
            if let Some(v) = min_silence_ms {
                params.min_silence_ms = v;
            }
            if let Some(v) = speech_pad_ms {
                params.speech_pad_ms = v;
            }
            if max_speech_secs.is_some() {
                params.max_speech_secs = max_speech_secs;
            }
            config.validate()?;
            run_file(&config, &path, json)
        }
        Command::Check => run_check(&config),
    }
}

fn load_config(cli: &Cli) -> Result<DetectorConfig> {
    let mut config = match &cli.config {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if let Some(rate) = cli.sample_rate {
        config.sample_rate = rate;
    }
    match cli.classifier {
        Some(ClassifierArg::Energy) if !matches!(config.classifier, ClassifierKind::Energy(_)) => {
            config.classifier = ClassifierKind::default();
        }
        Some(ClassifierArg::Webrtc) if !matches!(config.classifier, ClassifierKind::WebRtc { .. }) => {
            config.classifier = ClassifierKind::WebRtc {
                mode: WebRtcMode::default(),
            };
        }
        _ => {}
    }
    Ok(config)
}

async fn run_live(config: DetectorConfig, save_segments: Option<PathBuf>, record: Option<PathBuf>) -> Result<()> {
    let session = Uuid::new_v4();
    let clock = StreamClock::new(config.sample_rate, config.window_size());

    // Capture -> lock-free queue -> processing thread
    let rb = HeapRb::<f32>::new(config.capture_capacity());
    let (producer, consumer) = rb.split();
    let capture =
        AudioCapture::new(producer, config.sample_rate).context("Failed to initialize Audio Capture")?;
    tracing::info!("Audio Capture Initialized at {}Hz", capture.sample_rate);

    let (tx, mut rx) = mpsc::channel(256);
    let cancel = CancellationToken::new();
    let processor = AudioProcessor::new(consumer, tx, config.clone(), cancel.clone());
    let worker = std::thread::spawn(move || processor.run());

    if let Some(dir) = &save_segments {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut recorder = record
        .as_ref()
        .map(|path| SessionRecorder::create(path, config.sample_rate))
        .transpose()?;

    println!("Real-time speech detection (session {})", session);
    println!("═══════════════════════════════════════");
    println!("  Device:      {}", capture.device_name);
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!("  Threshold:   {:.2}", config.threshold);
    println!("  Window:      {} samples ({:?})", config.window_size(), clock.window_duration());
    println!();
    println!("Speak into the microphone. Press Ctrl+C to stop.");

    let mut stopping = false;
    let mut saved = 0usize;
    let mut final_snapshot: Option<TelemetrySnapshot> = None;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    DetectorMessage::Started(event) => print_started(&event),
                    DetectorMessage::Ended(event) => {
                        print_ended(&event);
                        if let Some(dir) = &save_segments {
                            let path = dir.join(format!("{}-{:04}.wav", session, event.segment.id));
                            match wav::write_pcm16(&path, config.sample_rate, event.audio()) {
                                Ok(()) => {
                                    saved += 1;
                                    println!("   Saved: {}", path.display());
                                }
                                Err(e) => tracing::warn!("Failed to save segment: {}", e),
                            }
                        }
                        if let Some(recorder) = recorder.as_mut() {
                            if let Err(e) = recorder.append(event.audio()) {
                                tracing::warn!("Failed to append to recording: {}", e);
                            }
                        }
                    }
                    DetectorMessage::Status { frame, snapshot } => print_status(&frame, &snapshot, &clock),
                    DetectorMessage::Fault { tick, message } => {
                        println!("Classifier error on frame {}: {}", tick.frame, message);
                    }
                    DetectorMessage::Stopped(snapshot) => final_snapshot = Some(snapshot),
                }
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                println!("\nStopping speech detection...");
                stopping = true;
                // Nothing captured after this point reaches the detector.
                capture.stop();
                cancel.cancel();
            }
        }
    }

    let result = worker
        .join()
        .map_err(|_| anyhow!("processing thread panicked"))?;
    let snapshot = match (result, final_snapshot) {
        (Ok(snapshot), _) => snapshot,
        (Err(e), Some(snapshot)) => {
            tracing::error!("Processing ended with error: {}", e);
            snapshot
        }
        (Err(e), None) => return Err(e.into()),
    };

    if let Some(recorder) = recorder {
        let samples = recorder.samples();
        recorder.finalize()?;
        if let Some(path) = &record {
            println!("Recorded {} speech samples to {}", samples, path.display());
        }
    }

    print_final_report(&snapshot, &clock, capture.dropped_samples(), saved);
    Ok(())
}

fn print_started(event: &SpeechStarted) {
    println!("\nSpeech started (segment {})", event.segment_id);
    println!("   Time:        {}", format_offset(event.start_time));
    println!("   Probability: {:.3}", event.probability);
}

fn print_ended(event: &SpeechEnded) {
    println!("\nSpeech ended (segment {}){}", event.segment.id, if event.flushed() { " [stream stopped]" } else { "" });
    println!("   Start:       {}", format_offset(event.start_time()));
    println!("   End:         {}", format_offset(event.end_time()));
    println!("   Duration:    {:.2} s ({} samples)", event.duration().as_secs_f64(), event.segment.sample_count());
    println!("   Last prob:   {:.3}", event.last_probability());
    println!("   Mean prob:   {:.3}", event.segment.mean_probability());
}

fn print_status(frame: &FrameResult, snapshot: &TelemetrySnapshot, clock: &StreamClock) {
    let stats = &snapshot.stats;
    println!();
    println!("Real-time Speech Detection Status");
    println!("═══════════════════════════════════════");
    println!("  Speech Probability:    {:.3}", frame.probability);
    println!("  Current Status:        {}", if frame.is_speech { "Speech" } else { "Silence" });
    println!("  Speech Activity Ratio: {:.1}%", stats.speech_activity_ratio() * 100.0);
    println!("  Total Frames:          {}", stats.total_frames);
    println!("  Speech Frames:         {}", stats.speech_frames);
    println!("  Signal:                {:.0} RMS, SNR {:.1} dB", snapshot.rms.mean, snapshot.snr_db.mean);
    println!("  Runtime:               {}", format_clock(stats.running_time(clock.window_duration())));
}

fn print_final_report(snapshot: &TelemetrySnapshot, clock: &StreamClock, dropped: u64, saved: usize) {
    let stats = &snapshot.stats;
    println!();
    println!("Final statistics");
    println!("═══════════════════════════════════════");
    println!("  Total frames:        {}", stats.total_frames);
    println!("  Speech frames:       {}", stats.speech_frames);
    println!("  Speech activity:     {:.1}%", stats.speech_activity_ratio() * 100.0);
    println!("  Segments:            {} started, {} ended ({} at stop)", stats.segments_started, stats.segments_ended, stats.segments_flushed);
    println!("  Speech time:         {:.2} s", stats.speech_ms as f64 / 1000.0);
    println!("  Runtime:             {}", format_clock(stats.running_time(clock.window_duration())));
    println!("  Signal RMS:          mean {:.0}, min {:.0}, max {:.0}, sd {:.1}", snapshot.rms.mean, snapshot.rms.min, snapshot.rms.max, snapshot.rms.std_dev());
    println!("  Noise floor:         mean {:.1} dB", snapshot.noise_floor_db.mean);
    println!("  SNR:                 mean {:.1} dB, best {:.1} dB", snapshot.snr_db.mean, snapshot.snr_db.max);
    if stats.classifier_faults > 0 || stats.overruns > 0 || dropped > 0 {
        println!("  Classifier faults:   {}", stats.classifier_faults);
        println!("  Overruns:            {}", stats.overruns);
        println!("  Dropped samples:     {}", dropped);
    }
    if saved > 0 {
        println!("  Segments saved:      {}", saved);
    }
}

fn run_file(config: &DetectorConfig, path: &Path, json: bool) -> Result<()> {
    let report = detect_file(path, config).with_context(|| format!("analysing {}", path.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_file_report(&report);
    }
    Ok(())
}

fn print_file_report(report: &FileReport) {
    println!("Detection results");
    println!("═══════════════════════════════════════");
    println!("  Duration:        {:.2} s at {} Hz", report.duration_secs, report.sample_rate);
    println!("  Frames:          {}", report.frames);
    println!("  Speech segments: {}", report.segments.len());
    println!("  Speech time:     {:.2} s", report.speech_secs());
    if report.faulted_frames > 0 {
        println!("  Faulted frames:  {}", report.faulted_frames);
    }
    println!();

    if report.segments.is_empty() {
        println!("No speech activity detected");
        return;
    }
    for (i, segment) in report.segments.iter().enumerate() {
        println!(
            "  {}. start {:.2}s, end {:.2}s, duration {:.2}s",
            i + 1,
            segment.start_secs,
            segment.end_secs,
            segment.duration_secs()
        );
    }
}

fn run_check(config: &DetectorConfig) -> Result<()> {
    println!("System check");
    println!("═══════════════════════════════════════");

    config.validate()?;
    println!("  Configuration valid ({} Hz, threshold {:.2})", config.sample_rate, config.threshold);

    let mut classifier = vadgate::audio::build_classifier(&config.classifier, config.sample_rate)?;
    let silence = vec![0.0f32; config.window_size()];
    let probability = classifier
        .classify(&silence, config.sample_rate)
        .map_err(|source| VadError::Classifier { tick: Default::default(), source })?;
    println!("  Classifier '{}' loaded; silent window scores {:.3}", classifier.name(), probability);

    let mut detector = SpeechDetector::new(config, classifier)?;
    let one_second = vec![0i16; config.sample_rate as usize];
    let frames = detector.feed_i16(&one_second)?;
    println!("  Detector processed {} frames of silence; speaking = {}", frames, detector.is_speaking());

    println!();
    println!("All checks passed.");
    Ok(())
}

fn format_offset(offset: Duration) -> String {
    let total_ms = offset.as_millis();
    format!(
        "{:02}:{:02}.{:03}",
        total_ms / 60_000,
        (total_ms / 1000) % 60,
        total_ms % 1000
    )
}

fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
