//! The request gateway: one unary call per capability, mapped onto either a
//! request-local filter or the shared hand-tracking pipeline.

pub mod hand_detection;
pub mod image_processing;
pub mod response;
pub mod status;
pub mod wire;

pub use hand_detection::{HandDetectionService, PendingDrawing, PendingHands};
pub use image_processing::ImageProcessingService;
pub use status::{Code, Status};
pub use wire::{Hand, HandOptions, HandRect, HandsReply, Image, Point};
