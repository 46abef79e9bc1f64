//! On-demand download of the pose landmark ONNX model.

use std::{env, fs, io, path::{Path, PathBuf}};

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};

const MODEL_URL: &str =
    "https://huggingface.co/onnx-community/pose_landmark_full/resolve/main/pose_landmark_full.onnx";

const MODEL_PATH_ENV: &str = "POSE_MODEL_PATH";

/// Model location: `POSE_MODEL_PATH` when set, otherwise `models/` next to
/// the working directory.
pub fn default_model_path() -> PathBuf {
    if let Ok(path) = env::var(MODEL_PATH_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from("models").join("pose_landmark_full.onnx")
}

/// Downloads the model to `path` unless it is already present. Writes to a
/// temp file and renames so an interrupted download never leaves a partial
/// model behind.
pub fn ensure_model_available(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    log::info!("downloading pose landmark model to {}", path.display());
    let response = reqwest::blocking::get(MODEL_URL)
        .with_context(|| format!("failed to fetch {MODEL_URL}"))?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "model download failed with status {}",
            response.status()
        ));
    }

    let bar = match response.content_length() {
        Some(len) => ProgressBar::new(len).with_style(
            ProgressStyle::with_template("{msg} {bar:30} {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        ),
        None => ProgressBar::new_spinner(),
    };
    bar.set_message("pose model");

    let partial = path.with_extension("partial");
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("failed to create {}", partial.display()))?;
    io::copy(&mut bar.wrap_read(response), &mut file)
        .context("model download interrupted")?;
    bar.finish_and_clear();

    fs::rename(&partial, path)
        .with_context(|| format!("failed to move model into {}", path.display()))?;
    Ok(())
}
