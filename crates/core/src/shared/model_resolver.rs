use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::constants::{APP_CACHE_DIR_NAME, WHISPER_MODEL_BASE_URL};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download failed for {url}: server answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Resolve a model file by name, downloading it into `model_dir` when it
/// is not there yet. `model_dir` defaults to [`model_cache_dir`].
pub fn resolve(
    name: &str,
    url: &str,
    model_dir: Option<&Path>,
    progress: Option<&(dyn Fn(u64, u64) + Send + Sync)>,
) -> Result<PathBuf, ModelResolveError> {
    let dir = match model_dir {
        Some(dir) => dir.to_path_buf(),
        None => model_cache_dir()?,
    };
    let path = dir.join(name);
    if path.exists() {
        log::debug!("Using cached model {}", path.display());
        return Ok(path);
    }

    fs::create_dir_all(&dir).map_err(|source| ModelResolveError::CacheDir {
        path: dir.clone(),
        source,
    })?;
    log::info!("Downloading {name} from {url}");
    download(url, &path, progress)?;
    Ok(path)
}

/// File name of the ggml Whisper model for a model size and compute type.
///
/// `int8` selects the 8-bit quantized weights, the float and `auto` modes
/// select the unquantized file, and anything else is taken as a ggml
/// quantization suffix (e.g. `q5_1`).
pub fn whisper_model_file_name(model_size: &str, compute_type: &str) -> String {
    match compute_type.trim().to_lowercase().as_str() {
        "" | "auto" | "default" | "float16" | "float32" | "f16" | "f32" => {
            format!("ggml-{model_size}.bin")
        }
        "int8" => format!("ggml-{model_size}-q8_0.bin"),
        quant => format!("ggml-{model_size}-{quant}.bin"),
    }
}

pub fn whisper_model_url(file_name: &str) -> String {
    format!("{WHISPER_MODEL_BASE_URL}/{file_name}")
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/speech-to-ipa/models/`
/// - Linux: `$XDG_CACHE_HOME/speech-to-ipa/models/` or `~/.cache/speech-to-ipa/models/`
/// - Windows: `%LOCALAPPDATA%/speech-to-ipa/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_CACHE_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(
    url: &str,
    dest: &Path,
    progress: Option<&(dyn Fn(u64, u64) + Send + Sync)>,
) -> Result<(), ModelResolveError> {
    let download_err = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let mut response = reqwest::blocking::get(url).map_err(download_err)?;
    if !response.status().is_success() {
        return Err(ModelResolveError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let temp_path = dest.with_extension("part");
    let write_err = |source| ModelResolveError::Write {
        path: temp_path.clone(),
        source,
    };

    let result = (|| {
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        let mut buf = vec![0u8; 1024 * 1024];
        let mut downloaded: u64 = 0;
        loop {
            let n = response.read(&mut buf).map_err(write_err)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).map_err(write_err)?;
            downloaded += n as u64;
            if let Some(cb) = progress {
                cb(downloaded, total);
            }
        }
        file.flush().map_err(write_err)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, dest).map_err(|source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    })
}
