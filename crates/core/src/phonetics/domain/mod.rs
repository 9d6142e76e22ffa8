pub mod language_code;
pub mod phoneme_backend;
pub mod phonemizer;
