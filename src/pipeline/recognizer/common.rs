use anyhow::{Context, Result, anyhow, ensure};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, PixelFormat};

pub const INPUT_SIZE: u32 = 224;
pub const NUM_LANDMARKS: usize = 21;
pub const PALM_INPUT_SIZE: u32 = 192;

/// How a source frame was scaled and centred into a square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_w: u32,
    pub source_h: u32,
}

impl Letterbox {
    fn fit(source_w: u32, source_h: u32, target: u32) -> (Self, u32, u32) {
        let scale = target as f32 / source_w.max(source_h) as f32;
        let fitted_w = ((source_w as f32 * scale).round() as u32).clamp(1, target);
        let fitted_h = ((source_h as f32 * scale).round() as u32).clamp(1, target);
        let letterbox = Self {
            scale,
            pad_x: ((target - fitted_w) / 2) as f32,
            pad_y: ((target - fitted_h) / 2) as f32,
            source_w,
            source_h,
        };
        (letterbox, fitted_w, fitted_h)
    }

    pub fn to_source(&self, x: f32, y: f32, target: u32) -> (f32, f32) {
        let side = target as f32;
        (
            (x * side - self.pad_x) / self.scale,
            (y * side - self.pad_y) / self.scale,
        )
    }
}

fn require_rgba(frame: &Frame) -> Result<()> {
    ensure!(
        frame.format() == PixelFormat::Rgba8,
        "hand models take RGBA frames, got {} channels",
        frame.channels()
    );
    ensure!(
        frame.width() > 0 && frame.height() > 0,
        "hand models cannot run on an empty frame"
    );
    Ok(())
}

/// Scales `frame` to fit a `target` square, pads with black and returns an
/// NHWC tensor of RGB in `[0, 1]`.
pub fn letterbox_tensor(frame: &Frame, target: u32) -> Result<(Array4<f32>, Letterbox)> {
    require_rgba(frame)?;
    let (letterbox, fitted_w, fitted_h) = Letterbox::fit(frame.width(), frame.height(), target);

    let source = fir::images::ImageRef::new(
        frame.width(),
        frame.height(),
        frame.data(),
        fir::PixelType::U8x4,
    )?;
    let mut fitted = fir::images::Image::new(fitted_w, fitted_h, fir::PixelType::U8x4);
    fir::Resizer::new()
        .resize(
            &source,
            &mut fitted,
            Some(
                &fir::ResizeOptions::new()
                    .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear)),
            ),
        )
        .context("letterbox resize failed")?;

    let side = target as usize;
    let mut input = Array4::<f32>::zeros((1, side, side, 3));
    let plane = input
        .as_slice_mut()
        .ok_or_else(|| anyhow!("letterbox tensor is not contiguous"))?;
    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);

    plane
        .par_chunks_mut(side * 3)
        .skip(pad_y)
        .zip(fitted.buffer().par_chunks_exact(fitted_w as usize * 4))
        .for_each(|(row, pixels)| {
            for (dst, px) in row[pad_x * 3..].chunks_exact_mut(3).zip(pixels.chunks_exact(4)) {
                dst[0] = px[0] as f32 / 255.0;
                dst[1] = px[1] as f32 / 255.0;
                dst[2] = px[2] as f32 / 255.0;
            }
        });

    Ok((input, letterbox))
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    ensure!(
        flat.len() >= NUM_LANDMARKS * 3,
        "hand-pose output has {} values, need {}",
        flat.len(),
        NUM_LANDMARKS * 3
    );
    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|xyz| [xyz[0], xyz[1], xyz[2]])
        .collect())
}

/// A square window of the source frame, rotated by `angle` radians around
/// `center` and resampled to `output_size` pixels per side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotatedCrop {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub source_w: u32,
    pub source_h: u32,
}

impl RotatedCrop {
    pub fn around(frame: &Frame, center: (f32, f32), side: f32, angle: f32, output_size: u32) -> Self {
        Self {
            center,
            side,
            angle,
            output_size,
            source_w: frame.width(),
            source_h: frame.height(),
        }
    }

    fn unclamped_source(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let step = self.side / self.output_size as f32;
        let (dx, dy) = ((x - half) * step, (y - half) * step);
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }

    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let (sx, sy) = self.unclamped_source(x, y);
        (
            sx.clamp(0.0, self.source_w.saturating_sub(1) as f32),
            sy.clamp(0.0, self.source_h.saturating_sub(1) as f32),
        )
    }

    /// Bilinearly samples the crop into an NHWC RGB tensor in `[0, 1]`.
    /// Samples falling outside the frame are black.
    pub fn sample(&self, frame: &Frame) -> Result<Array4<f32>> {
        require_rgba(frame)?;
        let size = self.output_size as usize;
        let mut data = vec![0f32; size * size * 3];

        data.par_chunks_mut(size * 3)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, dst) in row.chunks_exact_mut(3).enumerate() {
                    let (sx, sy) = self.unclamped_source(x as f32 + 0.5, y as f32 + 0.5);
                    dst.copy_from_slice(&bilinear_rgb(frame, sx, sy));
                }
            });

        Array4::from_shape_vec((1, size, size, 3), data)
            .map_err(|err| anyhow!("failed to shape rotated crop: {err}"))
    }
}

fn bilinear_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let rgba = frame.data();

    let mut out = [0f32; 3];
    for (ox, oy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        let (px, py) = (x0 as i64 + ox, y0 as i64 + oy);
        if weight == 0.0 || px < 0 || py < 0 || px >= w || py >= h {
            continue;
        }
        let idx = ((py * w + px) * 4) as usize;
        for (channel, value) in out.iter_mut().enumerate() {
            *value += rgba[idx + channel] as f32 / 255.0 * weight;
        }
    }
    out
}
