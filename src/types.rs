use serde::{Deserialize, Serialize};

use crate::error::FrameError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn from_channels(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::Gray8),
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channels(&self) -> u32 {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A rectangular pixel buffer whose byte length always matches its geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let format = PixelFormat::from_channels(channels)
            .ok_or(FrameError::UnsupportedChannels { channels })?;
        let expected = expected_len(width, height, channels).ok_or(FrameError::SizeOverflow {
            width,
            height,
            channels,
        })?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                channels,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Result<Self, FrameError> {
        let channels = format.channels();
        let len = expected_len(width, height, channels).ok_or(FrameError::SizeOverflow {
            width,
            height,
            channels,
        })?;
        Self::new(width, height, channels, vec![0u8; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u32 {
        self.format.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel access. The length cannot change through a slice, so the
    /// shape invariant holds.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

fn expected_len(width: u32, height: u32, channels: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels as usize)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

pub type LandmarkList = Vec<Landmark>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
            Handedness::Unknown => "Unknown",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "Left" => Handedness::Left,
            "Right" => Handedness::Right,
            _ => Handedness::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub score: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    pub fn handedness(&self) -> Handedness {
        Handedness::from_label(&self.label)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    /// Radians, clockwise.
    pub rotation: f32,
    pub rect_id: i64,
}

/// One physical hand: same-index entries of every observed stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectedHand {
    /// Empty when the landmarks stream is not observed.
    pub landmarks: LandmarkList,
    pub handedness: Option<Classification>,
    pub rect: Option<NormalizedRect>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    pub hands: Vec<DetectedHand>,
}

impl DetectionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_length() {
        let err = Frame::new(3, 2, 3, vec![0; 17]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                expected: 18,
                actual: 17,
                ..
            }
        ));
    }

    #[test]
    fn frame_rejects_unsupported_channels() {
        let err = Frame::new(2, 2, 2, vec![0; 8]).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedChannels { channels: 2 }));
    }

    #[test]
    fn empty_frame_is_valid() {
        let frame = Frame::new(0, 0, 4, Vec::new()).unwrap();
        assert_eq!(frame.channels(), 4);
        assert!(frame.data().is_empty());
    }

    #[test]
    fn handedness_label_round_trips() {
        for hand in [Handedness::Left, Handedness::Right] {
            assert_eq!(Handedness::from_label(hand.label()), hand);
        }
        assert_eq!(Handedness::from_label("left"), Handedness::Unknown);
    }
}
