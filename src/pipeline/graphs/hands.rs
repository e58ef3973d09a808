use std::cmp::Ordering;

use super::annotate;
use crate::{
    config::GraphConfig,
    pipeline::{
        frame_buffer,
        graph::Payload,
        recognizer::{HandObservation, HandposeEngine},
        runner::FrameGraph,
        streams,
    },
    types::{Frame, PixelFormat},
};

/// Hand tracking: detection, landmark estimation and annotation of the input
/// frame. `hand_count` and `output_video` fire for every frame; the per-hand
/// streams fire only when a hand was found.
pub struct HandTrackingGraph<E> {
    engine: E,
    max_num_hands: usize,
    min_confidence: f32,
    draw_rects: bool,
}

impl<E: HandposeEngine> HandTrackingGraph<E> {
    pub fn new(engine: E, config: &GraphConfig) -> Self {
        Self {
            engine,
            max_num_hands: config.max_num_hands,
            min_confidence: config.min_hand_confidence,
            draw_rects: config.draw_rects,
        }
    }

    fn detect(&mut self, frame: &Frame) -> Vec<HandObservation> {
        let inferred = if frame.format() == PixelFormat::Rgba8 {
            self.engine.infer(frame)
        } else {
            self.engine.infer(&frame_buffer::to_rgba(frame))
        };
        let mut hands = inferred.unwrap_or_else(|err| {
            log::warn!("hand inference failed: {err:?}");
            Vec::new()
        });

        hands.retain(|hand| hand.confidence >= self.min_confidence);
        hands.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        hands.truncate(self.max_num_hands);
        hands
    }
}

impl<E: HandposeEngine> FrameGraph for HandTrackingGraph<E> {
    fn output_streams(&self) -> &[&'static str] {
        streams::HAND_TRACKING_OUTPUTS
    }

    fn process(&mut self, frame: Frame) -> anyhow::Result<Vec<(&'static str, Payload)>> {
        let hands = self.detect(&frame);

        let mut annotated = frame;
        for hand in &hands {
            if self.draw_rects {
                annotate::draw_rect(&mut annotated, &hand.rect);
            }
            annotate::draw_skeleton(&mut annotated, &hand.landmarks);
        }

        let mut outputs = vec![
            (streams::HAND_COUNT, Payload::Count(hands.len())),
            (streams::OUTPUT_VIDEO, Payload::Frame(annotated)),
        ];
        if hands.is_empty() {
            return Ok(outputs);
        }

        let mut landmarks = Vec::with_capacity(hands.len());
        let mut handedness = Vec::with_capacity(hands.len());
        let mut rects = Vec::with_capacity(hands.len());
        for hand in hands {
            landmarks.push(hand.landmarks);
            handedness.push(hand.handedness);
            rects.push(hand.rect);
        }
        outputs.push((streams::LANDMARKS, Payload::Landmarks(landmarks)));
        outputs.push((streams::HANDEDNESS, Payload::Classifications(handedness)));
        outputs.push((streams::HAND_RECTS, Payload::Rects(rects)));
        Ok(outputs)
    }
}
