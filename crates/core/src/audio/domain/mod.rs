pub mod audio_reader;
pub mod audio_segment;
pub mod speech_recognizer;
pub mod voice_activity;
