use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::domain::speech_recognizer::{
    DecodeOptions, Device, ModelSpec, Recognition, RecognizerLoader,
};
use crate::audio::infrastructure::whisper_recognizer::WhisperLoader;
use crate::phonetics::domain::language_code::LanguageCode;
use crate::phonetics::domain::phonemizer::{PhonemizeError, Phonemizer};
use crate::phonetics::infrastructure::espeak_backend::EspeakBackend;
use crate::pipeline::segment_aggregator::SegmentAggregator;
use crate::shared::constants::DEFAULT_MODEL_SIZE;
use crate::shared::error::BoxError;
use crate::shared::transcription::{Segment, TranscriptionResult};

#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Audio file not found: {}", .0.display())]
    AudioNotFound(PathBuf),
    #[error(transparent)]
    Phonemize(#[from] PhonemizeError),
    /// Model resolution, loading or decoding failed.
    #[error(transparent)]
    Recognition(BoxError),
}

/// Options for one transcription run.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscribeOptions {
    pub model_size: String,
    /// Spoken language; detected when `None`.
    pub language: Option<String>,
    /// Phonemizer language; derived from the spoken language when `None`.
    pub ipa_language: Option<String>,
    pub device: Device,
    /// Inference precision; picked from `device` when `None`.
    pub compute_type: Option<String>,
    pub vad_filter: bool,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            model_size: DEFAULT_MODEL_SIZE.to_string(),
            language: None,
            ipa_language: None,
            device: Device::Cpu,
            compute_type: None,
            vad_filter: true,
        }
    }
}

impl TranscribeOptions {
    pub fn model_spec(&self) -> ModelSpec {
        let compute_type = non_blank(&self.compute_type)
            .unwrap_or_else(|| self.device.default_compute_type())
            .to_string();
        ModelSpec {
            model_size: self.model_size.clone(),
            device: self.device,
            compute_type,
        }
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions::deterministic(
            non_blank(&self.language).map(str::to_string),
            self.vad_filter,
        )
    }
}

/// Progress callback: `(segments_done, seconds_processed, total_seconds)`.
pub type SegmentProgressFn = Box<dyn Fn(usize, f64, Option<f64>) + Send>;

/// Audio file in, IPA transcription out.
pub struct TranscribeUseCase {
    loader: Box<dyn RecognizerLoader>,
    phonemizer: Phonemizer,
    progress: Option<SegmentProgressFn>,
}

impl TranscribeUseCase {
    pub fn new(
        loader: Box<dyn RecognizerLoader>,
        phonemizer: Phonemizer,
        progress: Option<SegmentProgressFn>,
    ) -> Self {
        Self {
            loader,
            phonemizer,
            progress,
        }
    }

    pub fn execute(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResult, TranscribeError> {
        // 1. Cheap check before any model work
        if !audio_path.exists() {
            return Err(TranscribeError::AudioNotFound(audio_path.to_path_buf()));
        }

        // 2. Load the recognizer
        let spec = options.model_spec();
        let mut recognizer = self
            .loader
            .load(&spec)
            .map_err(TranscribeError::Recognition)?;

        // 3. Recognize
        let Recognition { segments, info } = recognizer
            .recognize(audio_path, &options.decode_options())
            .map_err(TranscribeError::Recognition)?;

        // 4. Pick languages
        let language = non_blank(&options.language)
            .map(str::to_string)
            .unwrap_or(info.language);
        let ipa_language = non_blank(&options.ipa_language)
            .and_then(LanguageCode::new)
            .unwrap_or_else(|| LanguageCode::resolve(Some(language.as_str())));
        log::info!(
            "Language '{}' (confidence {:?}), phonemizing as '{ipa_language}'",
            language,
            info.language_probability
        );

        // 5. Phonemize segment by segment
        let duration = info.duration;
        let mut done = 0;
        let on_segment = |segment: &Segment| {
            done += 1;
            if let Some(ref cb) = self.progress {
                cb(done, segment.end, duration);
            }
        };
        let aggregated = SegmentAggregator::new(&self.phonemizer, &ipa_language)
            .aggregate(segments, on_segment)?;

        // 6. Phonemize the whole transcript in one go
        let text = aggregated.full_text();
        let ipa = if text.is_empty() {
            String::new()
        } else {
            self.phonemizer.phonemize(&text, &ipa_language)?
        };

        Ok(TranscriptionResult {
            audio_path: audio_path.to_path_buf(),
            text,
            ipa,
            segments: aggregated.segments,
            language,
            language_confidence: info.language_probability,
            duration,
            model_size: options.model_size.clone(),
            ipa_language: ipa_language.to_string(),
        })
    }
}

/// Transcribes `audio_path` with Whisper and espeak-ng using default
/// model locations.
pub fn transcribe(
    audio_path: &Path,
    options: &TranscribeOptions,
) -> Result<TranscriptionResult, TranscribeError> {
    TranscribeUseCase::new(
        Box::new(WhisperLoader::new()),
        Phonemizer::new(Box::new(EspeakBackend::new())),
        None,
    )
    .execute(audio_path, options)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::domain::speech_recognizer::{RawSegment, RecognitionInfo, SpeechRecognizer};
    use crate::phonetics::domain::phoneme_backend::PhonemeBackend;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    // ─── Stubs ───

    #[derive(Default)]
    struct Calls {
        loads: Vec<ModelSpec>,
        decodes: Vec<DecodeOptions>,
    }

    struct StubRecognizer {
        segments: Vec<RawSegment>,
        info: RecognitionInfo,
        fail_with: Option<&'static str>,
        calls: Arc<Mutex<Calls>>,
    }

    impl SpeechRecognizer for StubRecognizer {
        fn recognize(
            &mut self,
            _: &Path,
            options: &DecodeOptions,
        ) -> Result<Recognition<'_>, BoxError> {
            self.calls.lock().unwrap().decodes.push(options.clone());
            if let Some(message) = self.fail_with {
                return Err(message.into());
            }
            Ok(Recognition {
                segments: Box::new(self.segments.clone().into_iter().map(Ok::<_, BoxError>)),
                info: self.info.clone(),
            })
        }
    }

    struct StubLoader {
        segments: Vec<RawSegment>,
        info: RecognitionInfo,
        fail_with: Option<&'static str>,
        calls: Arc<Mutex<Calls>>,
    }

    impl RecognizerLoader for StubLoader {
        fn load(&self, spec: &ModelSpec) -> Result<Box<dyn SpeechRecognizer>, BoxError> {
            self.calls.lock().unwrap().loads.push(spec.clone());
            Ok(Box::new(StubRecognizer {
                segments: self.segments.clone(),
                info: self.info.clone(),
                fail_with: self.fail_with,
                calls: self.calls.clone(),
            }))
        }
    }

    /// Deterministic fake: `/text@language/`.
    struct TaggingBackend;

    impl PhonemeBackend for TaggingBackend {
        fn phonemize(&self, text: &str, language: &str) -> Result<String, BoxError> {
            Ok(format!("/{}@{language}/", text.to_lowercase()))
        }
    }

    struct FailingBackend;

    impl PhonemeBackend for FailingBackend {
        fn phonemize(&self, _: &str, _: &str) -> Result<String, BoxError> {
            Err("espeak-ng not found".into())
        }
    }

    fn raw(start: f64, end: f64, text: &str) -> RawSegment {
        RawSegment {
            start,
            end,
            text: text.to_string(),
            avg_logprob: None,
            no_speech_prob: None,
        }
    }

    fn english_info() -> RecognitionInfo {
        RecognitionInfo {
            language: "en".to_string(),
            language_probability: Some(0.95),
            duration: Some(2.0),
        }
    }

    struct Fixture {
        audio: NamedTempFile,
        calls: Arc<Mutex<Calls>>,
        use_case: TranscribeUseCase,
    }

    fn fixture_with(
        segments: Vec<RawSegment>,
        info: RecognitionInfo,
        backend: Box<dyn PhonemeBackend>,
        fail_with: Option<&'static str>,
    ) -> Fixture {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let loader = StubLoader {
            segments,
            info,
            fail_with,
            calls: calls.clone(),
        };
        Fixture {
            audio: NamedTempFile::new().unwrap(),
            calls,
            use_case: TranscribeUseCase::new(Box::new(loader), Phonemizer::new(backend), None),
        }
    }

    fn fixture(segments: Vec<RawSegment>, info: RecognitionInfo) -> Fixture {
        fixture_with(segments, info, Box::new(TaggingBackend), None)
    }

    #[test]
    fn test_end_to_end_with_detected_language() {
        let f = fixture(
            vec![raw(0.0, 1.2, "Hello"), raw(1.2, 2.0, "")],
            english_info(),
        );
        let result = f
            .use_case
            .execute(f.audio.path(), &TranscribeOptions::default())
            .unwrap();

        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].text, "Hello");
        assert_eq!(result.segments[0].start, 0.0);
        assert_eq!(result.segments[0].end, 1.2);
        assert_eq!(result.language, "en");
        assert_eq!(result.ipa_language, "en-us");
        assert_eq!(result.language_confidence, Some(0.95));
        assert_eq!(result.duration, Some(2.0));
        assert_eq!(result.text, "Hello");
        assert_eq!(result.ipa, "/hello@en-us/");
        assert_eq!(result.model_size, "small");
        assert_eq!(result.audio_path, f.audio.path());
    }

    #[test]
    fn test_missing_audio_fails_before_loading_model() {
        let f = fixture(vec![raw(0.0, 1.0, "Hello")], english_info());
        let missing = f.audio.path().with_extension("missing.wav");

        let err = f
            .use_case
            .execute(&missing, &TranscribeOptions::default())
            .unwrap_err();

        assert!(matches!(err, TranscribeError::AudioNotFound(ref p) if *p == missing));
        assert!(err.to_string().contains("missing.wav"));
        let calls = f.calls.lock().unwrap();
        assert!(calls.loads.is_empty());
        assert!(calls.decodes.is_empty());
    }

    #[test]
    fn test_cpu_defaults_to_int8_and_deterministic_decoding() {
        let f = fixture(vec![], english_info());
        f.use_case
            .execute(f.audio.path(), &TranscribeOptions::default())
            .unwrap();

        let calls = f.calls.lock().unwrap();
        assert_eq!(
            calls.loads,
            vec![ModelSpec {
                model_size: "small".to_string(),
                device: Device::Cpu,
                compute_type: "int8".to_string(),
            }]
        );
        assert_eq!(calls.decodes, vec![DecodeOptions::deterministic(None, true)]);
    }

    #[test]
    fn test_gpu_defaults_to_auto_and_explicit_compute_type_wins() {
        let f = fixture(vec![], english_info());
        let gpu = TranscribeOptions {
            device: Device::Gpu,
            ..Default::default()
        };
        f.use_case.execute(f.audio.path(), &gpu).unwrap();
        let explicit = TranscribeOptions {
            compute_type: Some("float32".to_string()),
            model_size: "tiny".to_string(),
            vad_filter: false,
            ..Default::default()
        };
        f.use_case.execute(f.audio.path(), &explicit).unwrap();

        let calls = f.calls.lock().unwrap();
        assert_eq!(calls.loads[0].compute_type, "auto");
        assert_eq!(calls.loads[1].compute_type, "float32");
        assert_eq!(calls.loads[1].model_size, "tiny");
        assert!(!calls.decodes[1].vad_filter);
    }

    #[test]
    fn test_language_override_is_forwarded_and_reported() {
        let f = fixture(vec![raw(0.0, 1.0, "Bonjour")], english_info());
        let options = TranscribeOptions {
            language: Some("fr".to_string()),
            ..Default::default()
        };
        let result = f.use_case.execute(f.audio.path(), &options).unwrap();

        assert_eq!(result.language, "fr");
        assert_eq!(result.ipa_language, "fr-fr");
        assert_eq!(result.segments[0].ipa, "/bonjour@fr-fr/");
        let calls = f.calls.lock().unwrap();
        assert_eq!(calls.decodes[0].language.as_deref(), Some("fr"));
    }

    #[test]
    fn test_ipa_language_override_is_used_verbatim() {
        let f = fixture(vec![raw(0.0, 1.0, "Hello")], english_info());
        let options = TranscribeOptions {
            ipa_language: Some("en-GB".to_string()),
            ..Default::default()
        };
        let result = f.use_case.execute(f.audio.path(), &options).unwrap();

        assert_eq!(result.language, "en");
        assert_eq!(result.ipa_language, "en-GB");
        assert_eq!(result.ipa, "/hello@en-GB/");
    }

    #[test]
    fn test_blank_overrides_count_as_absent() {
        let f = fixture(vec![raw(0.0, 1.0, "Hallo")], RecognitionInfo {
            language: "de".to_string(),
            ..english_info()
        });
        let options = TranscribeOptions {
            language: Some(String::new()),
            ipa_language: Some("  ".to_string()),
            compute_type: Some(String::new()),
            ..Default::default()
        };
        let result = f.use_case.execute(f.audio.path(), &options).unwrap();

        assert_eq!(result.language, "de");
        assert_eq!(result.ipa_language, "de");
        let calls = f.calls.lock().unwrap();
        assert_eq!(calls.decodes[0].language, None);
        assert_eq!(calls.loads[0].compute_type, "int8");
    }

    #[test]
    fn test_failed_detection_falls_back_to_default_ipa_language() {
        let f = fixture(vec![raw(0.0, 1.0, "Hello")], RecognitionInfo::default());
        let result = f
            .use_case
            .execute(f.audio.path(), &TranscribeOptions::default())
            .unwrap();

        assert_eq!(result.language, "");
        assert_eq!(result.ipa_language, "en-us");
        assert_eq!(result.language_confidence, None);
        assert_eq!(result.duration, None);
    }

    #[test]
    fn test_full_ipa_is_phonemized_independently() {
        let f = fixture(
            vec![raw(0.0, 1.0, "Hi"), raw(1.0, 2.0, "there")],
            english_info(),
        );
        let result = f
            .use_case
            .execute(f.audio.path(), &TranscribeOptions::default())
            .unwrap();

        assert_eq!(result.text, "Hi there");
        assert_eq!(result.ipa, "/hi there@en-us/");
        let joined: Vec<&str> = result.segments.iter().map(|s| s.ipa.as_str()).collect();
        assert_eq!(joined, vec!["/hi@en-us/", "/there@en-us/"]);
        assert_ne!(result.ipa, joined.join(" "));
    }

    #[test]
    fn test_no_speech_yields_empty_text_and_ipa() {
        let f = fixture(vec![raw(0.0, 1.0, "   ")], english_info());
        let result = f
            .use_case
            .execute(f.audio.path(), &TranscribeOptions::default())
            .unwrap();

        assert!(result.segments.is_empty());
        assert_eq!(result.text, "");
        assert_eq!(result.ipa, "");
    }

    #[test]
    fn test_recognizer_error_propagates_unchanged() {
        let f = fixture_with(
            vec![],
            english_info(),
            Box::new(TaggingBackend),
            Some("Failed to load Whisper model: bad magic"),
        );
        let err = f
            .use_case
            .execute(f.audio.path(), &TranscribeOptions::default())
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Recognition(_)));
        assert_eq!(err.to_string(), "Failed to load Whisper model: bad magic");
    }

    #[test]
    fn test_phonemizer_error_names_language() {
        let f = fixture_with(
            vec![raw(0.0, 1.0, "Hello")],
            english_info(),
            Box::new(FailingBackend),
            None,
        );
        let err = f
            .use_case
            .execute(f.audio.path(), &TranscribeOptions::default())
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Phonemize(_)));
        assert!(err.to_string().contains("'en-us'"), "{err}");
    }

    #[test]
    fn test_progress_reports_each_segment() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let loader = StubLoader {
            segments: vec![raw(0.0, 1.0, "a"), raw(1.0, 1.5, ""), raw(1.5, 2.0, "b")],
            info: english_info(),
            fail_with: None,
            calls,
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let use_case = TranscribeUseCase::new(
            Box::new(loader),
            Phonemizer::new(Box::new(TaggingBackend)),
            Some(Box::new(move |done: usize, at: f64, total: Option<f64>| {
                sink.lock().unwrap().push((done, at, total));
            })),
        );
        let audio = NamedTempFile::new().unwrap();
        use_case
            .execute(audio.path(), &TranscribeOptions::default())
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, 1.0, Some(2.0)), (2, 2.0, Some(2.0))]
        );
    }
}
