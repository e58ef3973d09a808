mod anchors;

use std::{cmp::Ordering, path::Path};

use anchors::ANCHORS;
use anyhow::{Context, Result, anyhow, ensure};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::common::{Letterbox, PALM_INPUT_SIZE, letterbox_tensor};
use crate::types::Frame;

/// Palm keypoints regressed per anchor. Index 0 is the wrist, 2 the base of
/// the middle finger.
const KEYPOINTS: usize = 7;
const WRIST: usize = 0;
const MIDDLE_FINGER_BASE: usize = 2;
/// Box centre and size, then the keypoints.
const BOX_FEATURES: usize = 4 + KEYPOINTS * 2;

/// The hand-pose crop is this many times the palm's extent.
const CROP_SCALE: f32 = 2.4;
const MIN_PALM_EXTENT: f32 = 80.0;

#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    /// `[x1, y1, x2, y2]`, clamped to the frame.
    pub bbox: [f32; 4],
    pub keypoints: [(f32, f32); KEYPOINTS],
    pub score: f32,
}

impl PalmRegion {
    fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    fn iou(&self, other: &PalmRegion) -> f32 {
        let overlap_w = (self.bbox[2].min(other.bbox[2]) - self.bbox[0].max(other.bbox[0])).max(0.0);
        let overlap_h = (self.bbox[3].min(other.bbox[3]) - self.bbox[1].max(other.bbox[1])).max(0.0);
        let overlap = overlap_w * overlap_h;
        let union = self.area() + other.area() - overlap;
        if overlap <= 0.0 || union <= 0.0 {
            0.0
        } else {
            overlap / union
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRegion {
    pub center: (f32, f32),
    pub side: f32,
    /// Radians; zero when the fingers point straight up.
    pub angle: f32,
}

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 32,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load palm detector from {}", model_path.display()))?;
        Ok(Self { session, cfg })
    }

    /// Palms by descending score, overlapping ones suppressed, at most `top_k`.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_tensor(frame, PALM_INPUT_SIZE)?;
        let outputs = self
            .session
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("palm detector inference failed")?;
        ensure!(
            outputs.len() >= 2,
            "palm detector returned {} outputs, expected boxes and scores",
            outputs.len()
        );

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let box_head = HeadShape::parse(boxes.shape(), "box")?;
        let score_head = HeadShape::parse(scores.shape(), "score")?;

        decode_palm_outputs(
            boxes
                .as_slice()
                .ok_or_else(|| anyhow!("palm boxes are not contiguous"))?,
            box_head,
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("palm scores are not contiguous"))?,
            score_head,
            &letterbox,
            &self.cfg,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct HeadShape {
    anchors: usize,
    features: usize,
}

impl HeadShape {
    fn parse(shape: &[usize], head: &str) -> Result<Self> {
        match shape {
            [.., anchors, features] if shape.len() >= 3 && *features > 0 => Ok(Self {
                anchors: *anchors,
                features: *features,
            }),
            _ => Err(anyhow!(
                "palm {head} output has shape {shape:?}, expected [batch, anchors, features]"
            )),
        }
    }

    fn len(&self) -> usize {
        self.anchors * self.features
    }
}

fn decode_palm_outputs(
    boxes: &[f32],
    box_head: HeadShape,
    scores: &[f32],
    score_head: HeadShape,
    letterbox: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    ensure!(
        box_head.features >= BOX_FEATURES,
        "palm box output has {} features per anchor, need {BOX_FEATURES}",
        box_head.features
    );
    ensure!(
        box_head.anchors == score_head.anchors,
        "palm heads disagree on anchor count: {} boxes, {} scores",
        box_head.anchors,
        score_head.anchors
    );
    ensure!(
        boxes.len() >= box_head.len() && scores.len() >= score_head.len(),
        "palm outputs shorter than their shapes"
    );

    let input = PALM_INPUT_SIZE as f32;
    let to_source = |x: f32, y: f32| letterbox.to_source(x, y, PALM_INPUT_SIZE);
    let (max_x, max_y) = (
        letterbox.source_w.saturating_sub(1) as f32,
        letterbox.source_h.saturating_sub(1) as f32,
    );

    let candidates = boxes
        .chunks_exact(box_head.features)
        .zip(scores.chunks_exact(score_head.features))
        .zip(ANCHORS.iter())
        .filter_map(|((features, logit), anchor)| {
            let score = sigmoid(logit[0]);
            if score < cfg.score_threshold {
                return None;
            }

            let cx = features[0] / input + anchor[0];
            let cy = features[1] / input + anchor[1];
            let (half_w, half_h) = (features[2] / input / 2.0, features[3] / input / 2.0);
            let (x1, y1) = to_source(cx - half_w, cy - half_h);
            let (x2, y2) = to_source(cx + half_w, cy + half_h);
            if x2 <= x1 || y2 <= y1 {
                return None;
            }

            let keypoints = std::array::from_fn(|k| {
                let offset = 4 + k * 2;
                to_source(
                    features[offset] / input + anchor[0],
                    features[offset + 1] / input + anchor[1],
                )
            });
            Some(PalmRegion {
                bbox: [
                    x1.clamp(0.0, max_x),
                    y1.clamp(0.0, max_y),
                    x2.clamp(0.0, max_x),
                    y2.clamp(0.0, max_y),
                ],
                keypoints,
                score,
            })
        })
        .collect();

    Ok(suppress_overlaps(candidates, cfg.nms_threshold, cfg.top_k))
}

/// Greedy non-maximum suppression, best score first.
fn suppress_overlaps(mut candidates: Vec<PalmRegion>, threshold: f32, top_k: usize) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut kept: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if kept.len() >= top_k {
            break;
        }
        if kept.iter().all(|palm| palm.iou(&candidate) < threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Squares up the palm, grows it to cover the fingers and turns it so the
/// fingers point up in the crop.
pub fn crop_from_palm(palm: &PalmRegion) -> CropRegion {
    let count = KEYPOINTS as f32;
    let (sum_x, sum_y) = palm
        .keypoints
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let center = (sum_x / count, sum_y / count);

    let (min_x, max_x, min_y, max_y) = palm.keypoints.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |(lx, hx, ly, hy), &(x, y)| (lx.min(x), hx.max(x), ly.min(y), hy.max(y)),
    );
    let extent = (palm.bbox[2] - palm.bbox[0])
        .max(palm.bbox[3] - palm.bbox[1])
        .max(max_x - min_x)
        .max(max_y - min_y)
        .max(MIN_PALM_EXTENT);

    CropRegion {
        center,
        side: extent * CROP_SCALE,
        angle: finger_angle(palm),
    }
}

/// Rotation that maps the crop's up direction onto wrist -> middle finger.
fn finger_angle(palm: &PalmRegion) -> f32 {
    let (wx, wy) = palm.keypoints[WRIST];
    let (mx, my) = palm.keypoints[MIDDLE_FINGER_BASE];
    let (dx, dy) = (mx - wx, my - wy);
    if dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON {
        return 0.0;
    }
    dx.atan2(-dy)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn palm(bbox: [f32; 4], score: f32) -> PalmRegion {
        let mut keypoints = [(50.0, 80.0); KEYPOINTS];
        keypoints[WRIST] = (50.0, 100.0);
        keypoints[MIDDLE_FINGER_BASE] = (50.0, 60.0);
        PalmRegion {
            bbox,
            keypoints,
            score,
        }
    }

    #[test]
    fn overlapping_palms_keep_the_best() {
        let kept = suppress_overlaps(
            vec![
                palm([0.0, 0.0, 10.0, 10.0], 0.6),
                palm([1.0, 1.0, 11.0, 11.0], 0.9),
                palm([50.0, 50.0, 60.0, 60.0], 0.7),
            ],
            0.3,
            8,
        );
        let scores: Vec<f32> = kept.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn upright_hand_has_no_rotation() {
        assert_eq!(finger_angle(&palm([0.0; 4], 1.0)), 0.0);

        let mut sideways = palm([0.0; 4], 1.0);
        sideways.keypoints[MIDDLE_FINGER_BASE] = (90.0, 100.0);
        assert!((finger_angle(&sideways) - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn small_palms_get_a_minimum_crop() {
        let crop = crop_from_palm(&palm([10.0, 10.0, 20.0, 20.0], 1.0));
        assert_eq!(crop.side, MIN_PALM_EXTENT * CROP_SCALE);
    }

    #[test]
    fn decodes_a_single_confident_anchor() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            source_w: PALM_INPUT_SIZE,
            source_h: PALM_INPUT_SIZE,
        };
        let box_head = HeadShape {
            anchors: 2,
            features: BOX_FEATURES,
        };
        let score_head = HeadShape {
            anchors: 2,
            features: 1,
        };
        let mut boxes = vec![0.0; box_head.len()];
        boxes[2] = 20.0;
        boxes[3] = 20.0;
        let scores = vec![5.0, -5.0];

        let palms = decode_palm_outputs(
            &boxes,
            box_head,
            &scores,
            score_head,
            &letterbox,
            &PalmDetectorConfig::default(),
        )
        .unwrap();

        assert_eq!(palms.len(), 1);
        let centre = ANCHORS[0][0] * PALM_INPUT_SIZE as f32;
        assert!((palms[0].bbox[0] - (centre - 10.0).max(0.0)).abs() < 1e-3);
        assert!((palms[0].bbox[2] - (centre + 10.0)).abs() < 1e-3);
    }

    #[test]
    fn rejects_mismatched_heads() {
        let err = HeadShape::parse(&[1, 2016], "box").unwrap_err();
        assert!(err.to_string().contains("expected [batch, anchors, features]"));
    }
}
