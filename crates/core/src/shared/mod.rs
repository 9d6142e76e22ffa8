pub mod constants;
pub mod error;
pub mod model_resolver;
pub mod transcription;
