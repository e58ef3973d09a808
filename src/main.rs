use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use frameland::{
    ServiceConfig,
    service::{HandDetectionService, HandOptions, Image},
};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .context("usage: frameland <input-image> [output-image] [service-config.json]")?;
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("annotated.png"));
    let config = match args.next() {
        Some(path) => ServiceConfig::from_file(Path::new(&path))?,
        None => ServiceConfig::default(),
    };

    let image = load_image(&input)?;
    let service = start_service(&config)?;

    let reply = service
        .get_hands(HandOptions {
            image: image.clone(),
            return_image: false,
            min_score: 0.0,
        })
        .context("GetHands failed")?;
    log::info!("{} hands in {}", reply.hands.len(), input.display());
    for (index, hand) in reply.hands.iter().enumerate() {
        log::info!(
            "hand [{index}]: {} ({:.2}), {} landmarks",
            hand.label,
            hand.score,
            hand.landmarks.len()
        );
    }

    let annotated = service
        .detect_and_draw(HandOptions {
            image,
            ..HandOptions::default()
        })
        .context("DetectAndDraw failed")?;
    save_image(annotated, &output)?;
    log::info!("annotated image written to {}", output.display());

    service.shutdown();
    Ok(())
}

fn load_image(path: &Path) -> Result<Image> {
    let rgb = image::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Image {
        width,
        height,
        channels: 3,
        data: rgb.into_raw(),
    })
}

fn save_image(image: Image, path: &Path) -> Result<()> {
    let color = match image.channels {
        1 => image::ExtendedColorType::L8,
        3 => image::ExtendedColorType::Rgb8,
        4 => image::ExtendedColorType::Rgba8,
        other => anyhow::bail!("cannot save an image with {other} channels"),
    };
    image::save_buffer(path, &image.data, image.width, image.height, color)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(feature = "handpose-ort")]
fn start_service(config: &ServiceConfig) -> Result<HandDetectionService> {
    use frameland::pipeline::recognizer::OrtEngine;

    let engine = OrtEngine::new(&config.graph.model_dir, config.graph.max_num_hands)?;
    HandDetectionService::start(engine, config).context("failed to start hand tracking")
}

#[cfg(not(feature = "handpose-ort"))]
fn start_service(_config: &ServiceConfig) -> Result<HandDetectionService> {
    anyhow::bail!("no hand-pose engine compiled in; rebuild with `--features handpose-ort`")
}
