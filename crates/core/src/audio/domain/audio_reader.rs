use std::path::Path;

use super::audio_segment::AudioSegment;
use crate::shared::error::BoxError;

/// Domain interface for decoding an audio file.
pub trait AudioReader: Send {
    /// Decode the first audio stream to mono PCM at `target_sample_rate`.
    /// Files without an audio stream are an error.
    fn read_audio(&self, path: &Path, target_sample_rate: u32) -> Result<AudioSegment, BoxError>;
}
