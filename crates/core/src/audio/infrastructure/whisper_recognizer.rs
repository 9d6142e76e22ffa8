use std::path::{Path, PathBuf};

use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

use crate::audio::domain::audio_reader::AudioReader;
use crate::audio::domain::speech_recognizer::{
    DecodeOptions, Device, ModelSpec, RawSegment, Recognition, RecognitionInfo,
    RecognizerLoader, SpeechRecognizer,
};
use crate::audio::domain::voice_activity::{
    collect_speech, detect_speech, SpeechTimeline, VadParams,
};
use crate::audio::infrastructure::ffmpeg_audio_reader::FfmpegAudioReader;
use crate::shared::constants::{MAX_DEFAULT_THREADS, WHISPER_SAMPLE_RATE};
use crate::shared::error::BoxError;
use crate::shared::model_resolver::{self, ProgressFn};

/// Loads ggml Whisper models, downloading them on first use.
pub struct WhisperLoader {
    model_dir: Option<PathBuf>,
    threads: Option<usize>,
    progress: Option<ProgressFn>,
}

impl Default for WhisperLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WhisperLoader {
    pub fn new() -> Self {
        Self {
            model_dir: None,
            threads: None,
            progress: None,
        }
    }

    /// Directory holding (and receiving downloaded) model files.
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    pub fn with_download_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Path of the model file for `spec`. A model size naming an existing
    /// file is used as-is.
    pub fn model_path(&self, spec: &ModelSpec) -> Result<PathBuf, BoxError> {
        let direct = Path::new(&spec.model_size);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let name = model_resolver::whisper_model_file_name(&spec.model_size, &spec.compute_type);
        let url = model_resolver::whisper_model_url(&name);
        let path = model_resolver::resolve(
            &name,
            &url,
            self.model_dir.as_deref(),
            self.progress.as_deref(),
        )?;
        Ok(path)
    }
}

impl RecognizerLoader for WhisperLoader {
    fn load(&self, spec: &ModelSpec) -> Result<Box<dyn SpeechRecognizer>, BoxError> {
        let model_path = self.model_path(spec)?;
        log::info!(
            "Loading Whisper model {} on {} (compute type {})",
            model_path.display(),
            spec.device,
            spec.compute_type
        );

        let mut context_params = WhisperContextParameters::default();
        context_params.use_gpu = spec.device == Device::Gpu;
        let context = WhisperContext::new_with_params(
            model_path.to_str().ok_or("Invalid model path")?,
            context_params,
        )
        .map_err(|e| format!("Failed to load Whisper model: {e}"))?;

        let threads = self.threads.unwrap_or_else(default_threads);
        Ok(Box::new(WhisperRecognizer::new(
            context,
            Box::new(FfmpegAudioReader),
            threads,
        )))
    }
}

/// Speech recognizer using whisper.cpp via whisper-rs.
///
/// Decoding runs once per [`SpeechRecognizer::recognize`] call; segments
/// are then read out of the whisper state one at a time as the returned
/// stream is pulled.
pub struct WhisperRecognizer {
    context: WhisperContext,
    reader: Box<dyn AudioReader>,
    threads: usize,
    state: Option<WhisperState>,
}

impl WhisperRecognizer {
    pub fn new(context: WhisperContext, reader: Box<dyn AudioReader>, threads: usize) -> Self {
        Self {
            context,
            reader,
            threads,
            state: None,
        }
    }

    /// Detects the spoken language, returning `(code, probability)`.
    fn detect_language(
        &self,
        state: &mut WhisperState,
        samples: &[f32],
    ) -> Result<(String, Option<f64>), BoxError> {
        if !self.context.is_multilingual() {
            return Ok(("en".to_string(), Some(1.0)));
        }
        state
            .pcm_to_mel(samples, self.threads)
            .map_err(|e| format!("Whisper spectrogram failed: {e}"))?;
        let (lang_id, probs) = state
            .lang_detect(0, self.threads)
            .map_err(|e| format!("Whisper language detection failed: {e}"))?;

        let language = whisper_rs::get_lang_str(lang_id).unwrap_or_default();
        let probability = usize::try_from(lang_id)
            .ok()
            .and_then(|i| probs.get(i))
            .map(|p| *p as f64);
        Ok((language.to_string(), probability))
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn recognize(
        &mut self,
        audio_path: &Path,
        options: &DecodeOptions,
    ) -> Result<Recognition<'_>, BoxError> {
        let audio = self.reader.read_audio(audio_path, WHISPER_SAMPLE_RATE)?;
        let duration = audio.duration();

        let (speech, timeline) = if options.vad_filter {
            let chunks = detect_speech(&audio, &VadParams::default());
            let kept: f64 = chunks.iter().map(|c| c.len()).sum::<usize>() as f64
                / WHISPER_SAMPLE_RATE as f64;
            log::info!(
                "Voice activity filter kept {kept:.2}s of {duration:.2}s in {} chunk(s)",
                chunks.len()
            );
            (
                collect_speech(&audio, &chunks),
                SpeechTimeline::new(&chunks, WHISPER_SAMPLE_RATE),
            )
        } else {
            (audio, SpeechTimeline::default())
        };

        self.state = None;
        if speech.is_empty() {
            log::warn!("No speech found in {}", audio_path.display());
            return Ok(Recognition {
                segments: Box::new(std::iter::empty()),
                info: RecognitionInfo {
                    language: options.language.clone().unwrap_or_default(),
                    language_probability: options.language.as_ref().map(|_| 1.0),
                    duration: Some(duration),
                },
            });
        }

        let mut state = self
            .context
            .create_state()
            .map_err(|e| format!("Failed to create Whisper state: {e}"))?;

        let (language, language_probability) = match &options.language {
            Some(language) => (language.clone(), Some(1.0)),
            None => self.detect_language(&mut state, speech.samples())?,
        };
        log::info!("Decoding with language '{language}'");

        let mut params = FullParams::new(sampling_strategy(options));
        if !language.is_empty() {
            params.set_language(Some(&language));
        }
        params.set_translate(false);
        params.set_temperature(options.temperature);
        params.set_temperature_inc(0.0);
        params.set_suppress_blank(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_n_threads(self.threads as i32);

        state
            .full(params, speech.samples())
            .map_err(|e| format!("Whisper inference failed: {e}"))?;

        let count = state.full_n_segments();
        let state = self.state.insert(state);
        Ok(Recognition {
            segments: Box::new(WhisperSegments {
                state,
                next: 0,
                count,
                timeline,
            }),
            info: RecognitionInfo {
                language,
                language_probability,
                duration: Some(duration),
            },
        })
    }
}

/// Pull-based view over the segments of a finished whisper run.
struct WhisperSegments<'a> {
    state: &'a WhisperState,
    next: i32,
    count: i32,
    timeline: SpeechTimeline,
}

impl Iterator for WhisperSegments<'_> {
    type Item = Result<RawSegment, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.count {
            let index = self.next;
            self.next += 1;
            let Some(segment) = self.state.get_segment(index) else {
                continue;
            };

            let text = match segment.to_str_lossy() {
                Ok(text) => text.into_owned(),
                Err(e) => return Some(Err(format!("Failed to read segment {index}: {e}").into())),
            };

            // Segment timestamps are in centiseconds (10ms units)
            let start = segment.start_timestamp() as f64 / 100.0;
            let end = segment.end_timestamp() as f64 / 100.0;

            let logprobs: Vec<f64> = (0..segment.n_tokens())
                .filter_map(|i| segment.get_token(i))
                .filter(|token| is_text_token(token.to_str().unwrap_or("")))
                .map(|token| token.token_data().plog as f64)
                .collect();

            return Some(Ok(RawSegment {
                start: self.timeline.to_original(start, false),
                end: self.timeline.to_original(end, true),
                text,
                avg_logprob: mean(&logprobs),
                no_speech_prob: Some(segment.no_speech_probability() as f64),
            }));
        }
        None
    }
}

/// Beam search when more than one beam is requested, otherwise greedy
/// decoding over `best_of` candidates.
fn sampling_strategy(options: &DecodeOptions) -> SamplingStrategy {
    if options.beam_size > 1 {
        SamplingStrategy::BeamSearch {
            beam_size: options.beam_size as i32,
            patience: -1.0,
        }
    } else {
        SamplingStrategy::Greedy {
            best_of: options.best_of.max(1) as i32,
        }
    }
}

/// Special tokens render as `[_BEG_]`, `<|endoftext|>` and similar.
fn is_text_token(text: &str) -> bool {
    let trimmed = text.trim();
    !(trimmed.starts_with("[_") || trimmed.starts_with("<|"))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_THREADS)
}
