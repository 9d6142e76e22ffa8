use crate::shared::error::BoxError;

/// Domain interface for grapheme-to-phoneme engines.
///
/// Implementations receive text without the preserved punctuation marks
/// and return IPA with stress marks for the given language code.
pub trait PhonemeBackend: Send + Sync {
    fn phonemize(&self, text: &str, language: &str) -> Result<String, BoxError>;
}
