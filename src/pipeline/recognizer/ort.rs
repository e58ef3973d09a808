use std::path::Path;

use anyhow::{Context, Result, ensure};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    HandObservation, HandposeEngine,
    common::{self, RotatedCrop},
    palm::{PalmDetector, PalmDetectorConfig, PalmRegion, crop_from_palm},
};
use crate::{
    model_download::{ModelKind, ensure_model},
    types::{Classification, Frame, Handedness, Landmark, NormalizedRect},
};

pub struct OrtEngine {
    handpose: Session,
    palm_detector: PalmDetector,
    max_hands: usize,
}

impl OrtEngine {
    pub fn new(model_dir: &Path, max_hands: usize) -> Result<Self> {
        let handpose_path = ensure_model(ModelKind::HandposeEstimator, model_dir)?;
        let palm_path = ensure_model(ModelKind::PalmDetector, model_dir)?;

        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&handpose_path)
            .with_context(|| {
                format!("failed to load hand-pose model from {}", handpose_path.display())
            })?;
        let palm_detector = PalmDetector::new(&palm_path, PalmDetectorConfig::default())?;

        log::info!(
            "ORT hand engine ready: estimator {}, palm detector {}",
            handpose_path.display(),
            palm_path.display()
        );
        Ok(Self {
            handpose,
            palm_detector,
            max_hands,
        })
    }

    fn estimate(&mut self, frame: &Frame, palm: &PalmRegion, rect_id: i64) -> Result<HandObservation> {
        let region = crop_from_palm(palm);
        let crop = RotatedCrop::around(frame, region.center, region.side, region.angle, common::INPUT_SIZE);
        let outputs = self
            .handpose
            .run(ort::inputs![Tensor::from_array(crop.sample(frame)?)?])
            .context("hand-pose inference failed")?;
        ensure!(outputs.len() >= 1, "hand-pose model returned no outputs");

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let raw = common::decode_landmarks(&coords)?;

        let scalar = |index: usize| -> f32 {
            (index < outputs.len())
                .then(|| outputs[index].try_extract_array::<f32>().ok())
                .flatten()
                .and_then(|values| values.iter().next().copied())
                .unwrap_or(0.0)
        };
        let presence = scalar(1);
        // 1.0 means a right hand.
        let right = scalar(2);

        let handedness = if right >= 0.5 {
            Classification::new(Handedness::Right.label(), right)
        } else {
            Classification::new(Handedness::Left.label(), 1.0 - right)
        };

        Ok(HandObservation {
            landmarks: normalized_landmarks(&raw, &crop),
            handedness,
            rect: normalized_rect(&crop, rect_id),
            confidence: (presence * palm.score).clamp(0.0, 1.0),
        })
    }
}

impl HandposeEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<HandObservation>> {
        let palms = self.palm_detector.detect(frame).unwrap_or_else(|err| {
            log::warn!("palm detection failed: {err:?}");
            Vec::new()
        });

        let mut hands = Vec::with_capacity(palms.len().min(self.max_hands));
        for (index, palm) in palms.iter().take(self.max_hands).enumerate() {
            match self.estimate(frame, palm, index as i64) {
                Ok(hand) => hands.push(hand),
                Err(err) => log::warn!("hand-pose estimation failed for palm {index}: {err:?}"),
            }
        }
        Ok(hands)
    }
}

/// Crop-pixel landmarks to `[0, 1]` image coordinates; depth is scaled by the
/// crop size.
fn normalized_landmarks(raw: &[[f32; 3]], crop: &RotatedCrop) -> Vec<Landmark> {
    let (w, h) = (crop.source_w.max(1) as f32, crop.source_h.max(1) as f32);
    raw.iter()
        .map(|&[x, y, z]| {
            let (sx, sy) = crop.to_source(x, y);
            Landmark::new(sx / w, sy / h, z / crop.output_size as f32)
        })
        .collect()
}

fn normalized_rect(crop: &RotatedCrop, rect_id: i64) -> NormalizedRect {
    let (w, h) = (crop.source_w.max(1) as f32, crop.source_h.max(1) as f32);
    NormalizedRect {
        x_center: crop.center.0 / w,
        y_center: crop.center.1 / h,
        width: crop.side / w,
        height: crop.side / h,
        rotation: crop.angle,
        rect_id,
    }
}
