pub mod config;
pub mod error;
#[cfg(feature = "handpose-ort")]
pub mod model_download;
pub mod pipeline;
pub mod service;
pub mod types;

pub use config::{GraphConfig, ServiceConfig};
pub use error::{FrameError, PipelineError, PullError};
