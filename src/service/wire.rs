//! Messages exchanged with clients. Transports encode these however they
//! like; the service only ever sees the decoded structs.

use serde::{Deserialize, Serialize};

use crate::{
    error::FrameError,
    pipeline::frame_buffer,
    types::{Frame, Landmark},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl TryFrom<Image> for Frame {
    type Error = FrameError;

    fn try_from(image: Image) -> Result<Self, Self::Error> {
        frame_buffer::to_internal(image.width, image.height, image.channels, image.data)
    }
}

impl From<Frame> for Image {
    fn from(frame: Frame) -> Self {
        let (width, height, channels, data) = frame_buffer::from_internal(frame);
        Self {
            width,
            height,
            channels,
            data,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandOptions {
    pub image: Image,
    pub return_image: bool,
    /// Hands whose handedness score is below this are left out of the reply.
    pub min_score: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandRect {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    pub rect_id: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Landmark> for Point {
    fn from(landmark: Landmark) -> Self {
        Self {
            x: landmark.x,
            y: landmark.y,
            z: landmark.z,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    pub label: String,
    pub score: f32,
    pub hand_rect: Option<HandRect>,
    pub landmarks: Vec<Point>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandsReply {
    pub hands: Vec<Hand>,
    pub image: Option<Image>,
}

