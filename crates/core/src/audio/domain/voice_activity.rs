use super::audio_segment::AudioSegment;

pub const DEFAULT_FRAME_MS: u32 = 30;
pub const DEFAULT_MIN_SPEECH_MS: u32 = 250;
pub const DEFAULT_MIN_SILENCE_MS: u32 = 2000;
pub const DEFAULT_SPEECH_PAD_MS: u32 = 400;

/// Tuning for [`detect_speech`].
#[derive(Clone, Debug, PartialEq)]
pub struct VadParams {
    pub frame_ms: u32,
    /// Frames louder than `noise_floor * noise_ratio` count as speech.
    pub noise_ratio: f32,
    /// Absolute RMS below which a frame is always silence (about -46 dBFS).
    pub min_rms: f32,
    /// Upper bound on the adaptive threshold (about -34 dBFS). Without it a
    /// recording with no pauses would measure its floor on speech.
    pub max_threshold: f32,
    pub min_speech_ms: u32,
    /// Silences shorter than this stay inside the surrounding chunk.
    pub min_silence_ms: u32,
    pub speech_pad_ms: u32,
}

impl Default for VadParams {
    fn default() -> Self {
        Self {
            frame_ms: DEFAULT_FRAME_MS,
            noise_ratio: 4.0,
            min_rms: 0.005,
            max_threshold: 0.02,
            min_speech_ms: DEFAULT_MIN_SPEECH_MS,
            min_silence_ms: DEFAULT_MIN_SILENCE_MS,
            speech_pad_ms: DEFAULT_SPEECH_PAD_MS,
        }
    }
}

/// Half-open sample range `[start, end)` that contains speech.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeechChunk {
    pub start: usize,
    pub end: usize,
}

impl SpeechChunk {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Energy-based voice activity detection.
///
/// The speech threshold adapts to the recording: it sits `noise_ratio`
/// above the 10th-percentile frame energy, clamped to
/// `[min_rms, max_threshold]`. Loudness relative to other speech never
/// matters, so quiet talkers are kept.
pub fn detect_speech(audio: &AudioSegment, params: &VadParams) -> Vec<SpeechChunk> {
    let rate = audio.sample_rate() as usize;
    let samples = audio.samples();
    if samples.is_empty() || rate == 0 {
        return Vec::new();
    }

    let ms = |v: u32| rate * v as usize / 1000;
    let frame_len = ms(params.frame_ms).max(1);
    let energies: Vec<f32> = samples.chunks(frame_len).map(rms).collect();
    let threshold = speech_threshold(&energies, params);

    let mut regions: Vec<SpeechChunk> = Vec::new();
    for (i, energy) in energies.iter().enumerate() {
        if *energy < threshold {
            continue;
        }
        let start = i * frame_len;
        let end = (start + frame_len).min(samples.len());
        match regions.last_mut() {
            Some(last) if start - last.end < ms(params.min_silence_ms).max(1) => last.end = end,
            _ => regions.push(SpeechChunk { start, end }),
        }
    }

    let min_speech = ms(params.min_speech_ms);
    let pad = ms(params.speech_pad_ms);
    let mut chunks: Vec<SpeechChunk> = Vec::new();
    for region in regions.into_iter().filter(|r| r.len() >= min_speech) {
        let padded = SpeechChunk {
            start: region.start.saturating_sub(pad),
            end: (region.end + pad).min(samples.len()),
        };
        match chunks.last_mut() {
            Some(last) if padded.start <= last.end => last.end = padded.end,
            _ => chunks.push(padded),
        }
    }

    log::debug!(
        "VAD kept {} chunk(s), threshold {threshold:.4}",
        chunks.len()
    );
    chunks
}

/// Concatenate the speech chunks into a single segment.
pub fn collect_speech(audio: &AudioSegment, chunks: &[SpeechChunk]) -> AudioSegment {
    let samples = audio.samples();
    let mut out = Vec::with_capacity(chunks.iter().map(SpeechChunk::len).sum());
    for chunk in chunks {
        out.extend_from_slice(&samples[chunk.start..chunk.end]);
    }
    AudioSegment::new(out, audio.sample_rate())
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

fn speech_threshold(energies: &[f32], params: &VadParams) -> f32 {
    let mut sorted = energies.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let noise_floor = sorted[sorted.len() / 10];
    (noise_floor * params.noise_ratio)
        .min(params.max_threshold)
        .max(params.min_rms)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TimelineSpan {
    filtered_start: f64,
    original_start: f64,
    len: f64,
}

/// Maps timestamps on the speech-only timeline back to the original audio.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpeechTimeline {
    spans: Vec<TimelineSpan>,
}

impl SpeechTimeline {
    pub fn new(chunks: &[SpeechChunk], sample_rate: u32) -> Self {
        let rate = sample_rate as f64;
        let mut filtered_start = 0.0;
        let spans = chunks
            .iter()
            .map(|c| {
                let span = TimelineSpan {
                    filtered_start,
                    original_start: c.start as f64 / rate,
                    len: c.len() as f64 / rate,
                };
                filtered_start += span.len;
                span
            })
            .collect();
        Self { spans }
    }

    /// Original-timeline position of `t`. A timestamp on a chunk boundary
    /// belongs to the earlier chunk when it ends a segment and to the later
    /// one when it starts a segment.
    pub fn to_original(&self, t: f64, is_end: bool) -> f64 {
        let Some(last) = self.spans.last() else {
            return t;
        };
        let span = self
            .spans
            .iter()
            .find(|s| {
                let end = s.filtered_start + s.len;
                if is_end {
                    t <= end
                } else {
                    t < end
                }
            })
            .unwrap_or(last);
        span.original_start + (t - span.filtered_start)
    }
}
