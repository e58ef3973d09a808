use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    HandposeEstimator,
    PalmDetector,
}

impl ModelKind {
    pub fn filename(&self) -> &'static str {
        match self {
            ModelKind::HandposeEstimator => "handpose_estimation_mediapipe_2023feb.onnx",
            ModelKind::PalmDetector => "palm_detection_mediapipe_2023feb.onnx",
        }
    }

    fn url(&self) -> &'static str {
        match self {
            ModelKind::HandposeEstimator => {
                "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/handpose_estimation_mediapipe_2023feb.onnx"
            }
            ModelKind::PalmDetector => {
                "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/palm_detection_mediapipe_2023feb.onnx"
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ModelKind::HandposeEstimator => "handpose estimator",
            ModelKind::PalmDetector => "palm detector",
        }
    }
}

/// Returns the path of `model` inside `model_dir`, downloading it first if it
/// is not there yet.
pub fn ensure_model(model: ModelKind, model_dir: &Path) -> anyhow::Result<PathBuf> {
    let model_path = model_dir.join(model.filename());
    if model_path.exists() {
        log::debug!("{} model present at {}", model.label(), model_path.display());
        return Ok(model_path);
    }

    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create model directory {}", model_dir.display()))?;
    download_to_path(model, &model_path).with_context(|| {
        format!(
            "failed to download {} model to {}",
            model.label(),
            model_path.display()
        )
    })?;
    Ok(model_path)
}

fn download_to_path(model: ModelKind, dest: &Path) -> anyhow::Result<()> {
    log::info!("fetching {} model from {}", model.label(), model.url());
    let mut response = Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()?
        .get(model.url())
        .send()?
        .error_for_status()?;

    let progress = progress_bar(response.content_length(), model);
    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("cannot create {}", partial.display()))?;

    let written = io::copy(&mut progress.wrap_read(&mut response), &mut file)
        .context("model transfer interrupted")?;
    file.sync_all().context("cannot flush downloaded model")?;
    drop(file);

    fs::rename(&partial, dest)
        .with_context(|| format!("cannot move {} into place", partial.display()))?;
    progress.finish_with_message(format!("{} model ready", model.label()));
    log::info!("{} model stored at {} ({written} bytes)", model.label(), dest.display());
    Ok(())
}

fn progress_bar(total: Option<u64>, model: ModelKind) -> ProgressBar {
    let (progress, template) = match total {
        Some(total) if total > 0 => (
            ProgressBar::new(total),
            "{msg} [{wide_bar}] {bytes}/{total_bytes} ({eta})",
        ),
        _ => (ProgressBar::new_spinner(), "{spinner} {msg} {bytes}"),
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        progress.set_style(style.progress_chars("=> "));
    }
    progress.set_message(model.label());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
