pub mod espeak_backend;
