use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::phonetics::domain::phoneme_backend::PhonemeBackend;
use crate::shared::constants::ESPEAK_PROGRAM;
use crate::shared::error::BoxError;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Phoneme backend that shells out to the espeak-ng executable.
///
/// Text is written to stdin and IPA (with stress marks) read back from
/// stdout. espeak-ng breaks output at clause boundaries; lines are joined
/// with single spaces.
#[derive(Debug, Clone)]
pub struct EspeakBackend {
    program: PathBuf,
}

impl Default for EspeakBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EspeakBackend {
    pub fn new() -> Self {
        Self::with_program(ESPEAK_PROGRAM)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl PhonemeBackend for EspeakBackend {
    fn phonemize(&self, text: &str, language: &str) -> Result<String, BoxError> {
        let spawn_err = |source| BackendError::Spawn {
            program: self.program_name(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(["-q", "--ipa", "-v", language, "--stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(BackendError::Failed {
                program: self.program_name(),
                status: output.status,
                stderr,
            }
            .into());
        }
        if !stderr.is_empty() {
            log::warn!("{}: {stderr}", self.program_name());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(join_lines(&stdout))
    }
}

fn join_lines(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
