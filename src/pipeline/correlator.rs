//! Turns the hand-tracking graph's independent output streams into one
//! correlated [`DetectionSet`] per frame.
//!
//! `hand_count` is the gate. It is pulled first for every frame; the
//! `landmarks`, `handedness` and `multi_hand_rects` streams only carry a packet
//! when the count is non-zero, so they are pulled only then. Pulling a
//! conditional stream for an empty frame would block until the *next* frame
//! with hands and attribute its results to this one.
//!
//! Per-hand identity is positional: index `i` of every conditional stream
//! describes the same hand.

use std::time::Duration;

use super::{
    frame_pipeline::{FramePipeline, InFlight},
    graph::{ChannelReader, StreamingPipeline},
    streams,
};
use crate::{
    config::GraphConfig,
    error::PipelineError,
    types::{Classification, DetectedHand, DetectionSet, Frame, LandmarkList, NormalizedRect},
};

/// Which optional streams a correlator registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObservedStreams {
    pub output_video: bool,
    pub landmarks: bool,
    pub handedness: bool,
    pub hand_rects: bool,
}

impl ObservedStreams {
    pub fn all() -> Self {
        Self {
            output_video: true,
            landmarks: true,
            handedness: true,
            hand_rects: true,
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            output_video: config.observes(streams::OUTPUT_VIDEO),
            landmarks: config.observes(streams::LANDMARKS),
            handedness: config.observes(streams::HANDEDNESS),
            hand_rects: config.observes(streams::HAND_RECTS),
        }
    }
}

/// Result of one frame: detections plus the annotated frame when
/// `output_video` is observed.
#[derive(Clone, Debug, PartialEq)]
pub struct Correlated {
    pub detections: DetectionSet,
    pub annotated: Option<Frame>,
}

/// Streams that only fire when the frame has at least one hand. Every read of
/// them goes through [`GatedStreams::pull`].
struct GatedStreams {
    landmarks: Option<Box<dyn ChannelReader>>,
    handedness: Option<Box<dyn ChannelReader>>,
    hand_rects: Option<Box<dyn ChannelReader>>,
}

impl GatedStreams {
    fn pull(
        &mut self,
        frames: &FramePipeline,
        in_flight: &InFlight,
        hand_count: usize,
    ) -> Result<DetectionSet, PipelineError> {
        if hand_count == 0 {
            return Ok(DetectionSet::empty());
        }

        let landmarks = match self.landmarks.as_deref_mut() {
            Some(reader) => {
                let lists = frames
                    .pull(reader, in_flight)?
                    .into_landmarks(streams::LANDMARKS)?;
                Some(expect_len(lists, hand_count, streams::LANDMARKS)?)
            }
            None => None,
        };
        let handedness = match self.handedness.as_deref_mut() {
            Some(reader) => {
                let labels = frames
                    .pull(reader, in_flight)?
                    .into_classifications(streams::HANDEDNESS)?;
                Some(expect_len(labels, hand_count, streams::HANDEDNESS)?)
            }
            None => None,
        };
        let rects = match self.hand_rects.as_deref_mut() {
            Some(reader) => {
                let rects = frames
                    .pull(reader, in_flight)?
                    .into_rects(streams::HAND_RECTS)?;
                Some(expect_len(rects, hand_count, streams::HAND_RECTS)?)
            }
            None => None,
        };

        Ok(zip_hands(hand_count, landmarks, handedness, rects))
    }
}

fn expect_len<T>(items: Vec<T>, expected: usize, channel: &str) -> Result<Vec<T>, PipelineError> {
    if items.len() != expected {
        log::warn!(
            "`{channel}` reported {} entries for {expected} hands",
            items.len()
        );
        return Err(PipelineError::CorrelationMismatch {
            channel: channel.to_string(),
            expected,
            actual: items.len(),
        });
    }
    Ok(items)
}

/// Index `i` of each sequence becomes hand `i`. Callers have already checked
/// every present sequence has `hand_count` entries.
fn zip_hands(
    hand_count: usize,
    landmarks: Option<Vec<LandmarkList>>,
    handedness: Option<Vec<Classification>>,
    rects: Option<Vec<NormalizedRect>>,
) -> DetectionSet {
    let mut landmarks = landmarks.map(Vec::into_iter);
    let mut handedness = handedness.map(Vec::into_iter);
    let mut rects = rects.map(Vec::into_iter);

    let hands = (0..hand_count)
        .map(|_| DetectedHand {
            landmarks: landmarks
                .as_mut()
                .and_then(Iterator::next)
                .unwrap_or_default(),
            handedness: handedness.as_mut().and_then(Iterator::next),
            rect: rects.as_mut().and_then(Iterator::next),
        })
        .collect();

    DetectionSet { hands }
}

pub struct HandCorrelator {
    frames: FramePipeline,
    hand_count: Box<dyn ChannelReader>,
    output_video: Option<Box<dyn ChannelReader>>,
    gated: GatedStreams,
}

impl HandCorrelator {
    /// Registers the observed streams on a configured pipeline and starts it.
    pub fn start(
        pipeline: Box<dyn StreamingPipeline>,
        observed: ObservedStreams,
        pull_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let mut frames = FramePipeline::new(pipeline, pull_timeout);

        let hand_count = frames.register(streams::HAND_COUNT).map_err(|err| {
            PipelineError::init(format!(
                "`{}` has no usable `{}` stream: {err}",
                frames.name(),
                streams::HAND_COUNT
            ))
        })?;
        let output_video = register_if(&mut frames, observed.output_video, streams::OUTPUT_VIDEO)?;
        let gated = GatedStreams {
            landmarks: register_if(&mut frames, observed.landmarks, streams::LANDMARKS)?,
            handedness: register_if(&mut frames, observed.handedness, streams::HANDEDNESS)?,
            hand_rects: register_if(&mut frames, observed.hand_rects, streams::HAND_RECTS)?,
        };

        frames.start()?;
        log::info!(
            "hand correlator started on `{}` (pull timeout {:?})",
            frames.name(),
            frames.pull_timeout()
        );

        Ok(Self {
            frames,
            hand_count,
            output_video,
            gated,
        })
    }

    pub fn observes_output_video(&self) -> bool {
        self.output_video.is_some()
    }

    /// Runs one frame through the graph. Either every observed stream is read
    /// for this frame and correlated, or an error is returned; partial results
    /// never escape.
    pub fn process(&mut self, frame: Frame) -> Result<Correlated, PipelineError> {
        let in_flight = self.frames.submit(frame)?;

        let hand_count = self
            .frames
            .pull(&mut *self.hand_count, &in_flight)?
            .into_count(streams::HAND_COUNT)?;

        let annotated = match self.output_video.as_deref_mut() {
            Some(reader) => Some(
                self.frames
                    .pull(reader, &in_flight)?
                    .into_frame(streams::OUTPUT_VIDEO)?,
            ),
            None => None,
        };

        let detections = self.gated.pull(&self.frames, &in_flight, hand_count)?;

        log::debug!(
            "frame {} yielded {} hands",
            in_flight.timestamp,
            detections.hand_count()
        );
        for (index, hand) in detections.hands.iter().enumerate() {
            for (i, landmark) in hand.landmarks.iter().enumerate() {
                log::trace!(
                    "hand [{index}] landmark [{i}]: ({}, {}, {})",
                    landmark.x,
                    landmark.y,
                    landmark.z
                );
            }
        }

        Ok(Correlated {
            detections,
            annotated,
        })
    }

    /// Closes the input and drains the pipeline.
    pub fn shutdown(mut self) -> Result<(), PipelineError> {
        self.frames.stop()
    }
}

fn register_if(
    frames: &mut FramePipeline,
    enabled: bool,
    stream: &str,
) -> Result<Option<Box<dyn ChannelReader>>, PipelineError> {
    if !enabled {
        return Ok(None);
    }
    frames.register(stream).map(Some)
}
