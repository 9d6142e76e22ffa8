use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One recognized speech span with its transcript and IPA rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub ipa: String,
    pub avg_logprob: Option<f64>,
    pub no_speech_prob: Option<f64>,
}

/// Complete result of transcribing one audio file.
///
/// `ipa` is produced by phonemizing `text` as a whole, so it is not
/// required to equal the concatenation of the per-segment `ipa` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    #[serde(with = "path_string")]
    pub audio_path: PathBuf,
    pub text: String,
    pub ipa: String,
    pub segments: Vec<Segment>,
    pub language: String,
    pub language_confidence: Option<f64>,
    pub duration: Option<f64>,
    pub model_size: String,
    pub ipa_language: String,
}

impl TranscriptionResult {
    /// Structured form of the result, as written to JSON.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Pretty-printed JSON. IPA symbols are written literally.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

mod path_string {
    use std::path::PathBuf;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(path: &PathBuf, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&path.to_string_lossy())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
        String::deserialize(deserializer).map(PathBuf::from)
    }
}
