mod summary;

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use speech_ipa_core::audio::domain::speech_recognizer::Device;
use speech_ipa_core::audio::infrastructure::whisper_recognizer::WhisperLoader;
use speech_ipa_core::phonetics::domain::phonemizer::Phonemizer;
use speech_ipa_core::phonetics::infrastructure::espeak_backend::EspeakBackend;
use speech_ipa_core::pipeline::transcribe_use_case::{TranscribeOptions, TranscribeUseCase};
use speech_ipa_core::shared::constants::{DEFAULT_MODEL_SIZE, ESPEAK_PROGRAM};

/// Transcribe an audio file with Whisper and convert the transcript to IPA
/// using espeak-ng.
#[derive(Parser)]
#[command(name = "speech-to-ipa")]
struct Cli {
    /// Input audio file (any ffmpeg-readable format).
    audio: PathBuf,

    /// Whisper model size (tiny, base, small, medium, large-v3, ...) or a
    /// path to a ggml model file.
    #[arg(long, default_value = DEFAULT_MODEL_SIZE)]
    model: String,

    /// Spoken language hint (e.g. en, fr). Detected when omitted.
    #[arg(long)]
    language: Option<String>,

    /// espeak-ng language code for phonemization. Derived from the spoken
    /// language when omitted.
    #[arg(long)]
    ipa_language: Option<String>,

    /// Inference device: cpu or gpu.
    #[arg(long, default_value = "cpu")]
    device: String,

    /// Model precision (int8, float16, float32, q5_1, ...). Picked from
    /// the device when omitted.
    #[arg(long)]
    compute_type: Option<String>,

    /// Keep long silences instead of filtering them before recognition.
    #[arg(long)]
    disable_vad: bool,

    /// Write the result as JSON (UTF-8) to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Do not use ANSI colors in the summary.
    #[arg(long)]
    no_color: bool,

    /// Print each segment with timestamps.
    #[arg(long)]
    segments: bool,

    /// Directory for downloaded Whisper models.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// espeak-ng executable.
    #[arg(long, default_value = ESPEAK_PROGRAM)]
    espeak: PathBuf,

    /// Inference threads (defaults to the CPU count, up to 4).
    #[arg(long)]
    threads: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let device = validate(&cli)?;

    let options = TranscribeOptions {
        model_size: cli.model.clone(),
        language: cli.language.clone(),
        ipa_language: cli.ipa_language.clone(),
        device,
        compute_type: cli.compute_type.clone(),
        vad_filter: !cli.disable_vad,
    };

    let line = ProgressLine::default();
    let download_line = line.clone();
    let mut loader = WhisperLoader::new().with_download_progress(Box::new(
        move |downloaded: u64, total: u64| download_progress(&download_line, downloaded, total),
    ));
    if let Some(ref dir) = cli.model_dir {
        loader = loader.with_model_dir(dir);
    }
    if let Some(threads) = cli.threads {
        loader = loader.with_threads(threads);
    }
    let phonemizer = Phonemizer::new(Box::new(EspeakBackend::with_program(&cli.espeak)));

    let segment_line = line.clone();
    let use_case = TranscribeUseCase::new(
        Box::new(loader),
        phonemizer,
        Some(Box::new(
            move |done: usize, seconds: f64, total: Option<f64>| {
                segment_line.update(&segment_progress(done, seconds, total))
            },
        )),
    );
    let result = use_case.execute(&cli.audio, &options);
    line.finish();
    let result = result?;

    if let Some(ref output) = cli.output {
        fs::write(output, result.to_json()?)?;
        log::info!("Result written to {}", output.display());
    }

    println!(
        "{}",
        summary::format_summary(&result, !cli.no_color, cli.segments)
    );
    Ok(())
}

fn validate(cli: &Cli) -> Result<Device, Box<dyn std::error::Error>> {
    if cli.model.trim().is_empty() {
        return Err("Model must not be empty".into());
    }
    if cli.threads == Some(0) {
        return Err("Threads must be at least 1".into());
    }
    if let Some(ref output) = cli.output {
        if output.is_dir() {
            return Err(format!("Output path is a directory: {}", output.display()).into());
        }
    }
    Ok(cli.device.parse::<Device>()?)
}

/// A `\r`-rewritten status line on stderr, shared by every progress
/// reporter so it is terminated exactly once.
#[derive(Clone, Default)]
struct ProgressLine {
    open: Arc<AtomicBool>,
}

impl ProgressLine {
    fn update(&self, text: &str) {
        self.open.store(true, Ordering::Relaxed);
        eprint!("\r{text}");
    }

    /// Ends the line if anything was printed. Returns whether it was open.
    fn finish(&self) -> bool {
        let was_open = self.open.swap(false, Ordering::Relaxed);
        if was_open {
            eprintln!();
        }
        was_open
    }
}

fn segment_progress(done: usize, seconds: f64, total: Option<f64>) -> String {
    match total {
        Some(total) if total > 0.0 => {
            let pct = (seconds / total * 100.0).min(100.0) as u32;
            format!("Transcribing... {pct}% ({done} segments)")
        }
        _ => format!("Transcribing... {done} segments"),
    }
}

fn download_progress(line: &ProgressLine, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        line.update(&format!("Downloading Whisper model... {pct}%"));
        if downloaded >= total {
            line.finish();
        }
    } else {
        line.update(&format!("Downloading Whisper model... {downloaded} bytes"));
    }
}
