#[cfg(feature = "handpose-ort")]
mod common;
#[cfg(feature = "handpose-ort")]
mod ort;
#[cfg(feature = "handpose-ort")]
mod palm;

#[cfg(feature = "handpose-ort")]
pub use self::ort::OrtEngine;

use crate::types::{Classification, Frame, LandmarkList, NormalizedRect};

#[derive(Clone, Debug, PartialEq)]
pub struct HandObservation {
    pub landmarks: LandmarkList,
    pub handedness: Classification,
    pub rect: NormalizedRect,
    /// Overall detection confidence in `[0, 1]`.
    pub confidence: f32,
}

pub trait HandposeEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandObservation>>;
}
