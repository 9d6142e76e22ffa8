use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::shared::error::BoxError;

/// Inference device for the recognition engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

impl Device {
    /// Precision used when the caller does not choose one: 8-bit weights
    /// on CPU, the engine's native precision on GPU.
    pub fn default_compute_type(self) -> &'static str {
        match self {
            Device::Cpu => "int8",
            Device::Gpu => "auto",
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "gpu" | "cuda" => Ok(Device::Gpu),
            other => Err(format!("Device must be 'cpu' or 'gpu', got '{other}'")),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Gpu => f.write_str("gpu"),
        }
    }
}

/// Which model to load and how to run it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub model_size: String,
    pub device: Device,
    pub compute_type: String,
}

/// Decoding parameters for one recognition run.
///
/// [`DecodeOptions::deterministic`] gives greedy search with a single beam
/// and candidate at temperature 0. A `beam_size` above 1 switches the
/// engine to beam search.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeOptions {
    /// Spoken language; `None` lets the engine detect it.
    pub language: Option<String>,
    pub beam_size: u32,
    pub best_of: u32,
    pub temperature: f32,
    pub vad_filter: bool,
}

impl DecodeOptions {
    pub fn deterministic(language: Option<String>, vad_filter: bool) -> Self {
        Self {
            language,
            beam_size: 1,
            best_of: 1,
            temperature: 0.0,
            vad_filter,
        }
    }
}

/// A recognized span as reported by the engine, before any filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub avg_logprob: Option<f64>,
    pub no_speech_prob: Option<f64>,
}

/// Run-level metadata for a recognition run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecognitionInfo {
    /// Detected (or forced) language; empty when detection produced nothing.
    pub language: String,
    pub language_probability: Option<f64>,
    /// Length of the input audio in seconds.
    pub duration: Option<f64>,
}

/// Lazily produced segments. Each item is computed when pulled.
pub type SegmentStream<'a> = Box<dyn Iterator<Item = Result<RawSegment, BoxError>> + 'a>;

/// Output of [`SpeechRecognizer::recognize`].
pub struct Recognition<'a> {
    pub segments: SegmentStream<'a>,
    pub info: RecognitionInfo,
}

/// Domain interface for speech-to-text engines with a loaded model.
pub trait SpeechRecognizer {
    fn recognize(
        &mut self,
        audio_path: &Path,
        options: &DecodeOptions,
    ) -> Result<Recognition<'_>, BoxError>;
}

/// Domain interface for instantiating a [`SpeechRecognizer`].
///
/// Loading may download or read large model files.
pub trait RecognizerLoader {
    fn load(&self, spec: &ModelSpec) -> Result<Box<dyn SpeechRecognizer>, BoxError>;
}
