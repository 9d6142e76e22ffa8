pub const DEFAULT_MODEL_SIZE: &str = "small";

/// Base URL of the ggml Whisper model files published with whisper.cpp.
pub const WHISPER_MODEL_BASE_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Upper bound on inference threads when the caller does not pick a count.
pub const MAX_DEFAULT_THREADS: usize = 4;

/// Phonemizer language used when no usable language hint is available.
pub const DEFAULT_IPA_LANGUAGE: &str = "en-us";

/// Punctuation kept verbatim in phonemized output.
pub const PRESERVED_PUNCTUATION: &str = ";:,.!?¡¿—…\"«»“”()[]{}";

pub const ESPEAK_PROGRAM: &str = "espeak-ng";

pub const APP_CACHE_DIR_NAME: &str = "speech-to-ipa";
