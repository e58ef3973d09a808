use std::time::Duration;

use thiserror::Error;

/// Rejections raised before a frame ever reaches a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unsupported channel count {channels}, expected 1, 3 or 4")]
    UnsupportedChannels { channels: u32 },

    #[error(
        "frame buffer size mismatch for {width}x{height}x{channels}: got {actual}, expected {expected}"
    )]
    LengthMismatch {
        width: u32,
        height: u32,
        channels: u32,
        expected: usize,
        actual: usize,
    },

    #[error("frame dimensions {width}x{height}x{channels} overflow addressable memory")]
    SizeOverflow {
        width: u32,
        height: u32,
        channels: u32,
    },
}

/// Why a blocking pull on an output stream returned without a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PullError {
    #[error("deadline elapsed")]
    Timeout,
    #[error("stream closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid frame shape: {0}")]
    InvalidFrameShape(#[from] FrameError),

    #[error("pipeline initialisation failed: {0}")]
    PipelineInit(String),

    #[error("unknown output stream `{0}`")]
    UnknownChannel(String),

    #[error("input `{stream}` saturated ({capacity} frames queued)")]
    Backpressure { stream: String, capacity: usize },

    #[error("no packet on `{channel}` within {timeout:?}")]
    PipelineStall { channel: String, timeout: Duration },

    #[error("`{channel}` reported {actual} entries for {expected} detected hands")]
    CorrelationMismatch {
        channel: String,
        expected: usize,
        actual: usize,
    },

    #[error("output stream `{0}` closed")]
    ChannelClosed(String),

    #[error("invalid pipeline state transition: {from} -> {to}")]
    InvalidState {
        from: &'static str,
        to: &'static str,
    },

    #[error("`{channel}` carried a {found} packet, expected {expected}")]
    PacketType {
        channel: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{channel}` produced a packet at {found}us while frame {expected}us is in flight")]
    UnexpectedTimestamp {
        channel: String,
        expected: u64,
        found: u64,
    },

    #[error("request cancelled before its frame was submitted")]
    Cancelled,
}

impl PipelineError {
    pub fn init(reason: impl Into<String>) -> Self {
        Self::PipelineInit(reason.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Backpressure { .. } | PipelineError::PipelineStall { .. }
        )
    }
}
