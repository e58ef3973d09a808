use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, PipelineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    Cancelled = 1,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn is_retriable(&self) -> bool {
        matches!(
            self.code,
            Code::DeadlineExceeded | Code::ResourceExhausted
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}

impl From<FrameError> for Status {
    fn from(err: FrameError) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

impl From<PipelineError> for Status {
    fn from(err: PipelineError) -> Self {
        let code = match &err {
            PipelineError::InvalidFrameShape(_) => Code::InvalidArgument,
            PipelineError::Backpressure { .. } => Code::ResourceExhausted,
            PipelineError::PipelineStall { .. } => Code::DeadlineExceeded,
            PipelineError::CorrelationMismatch { .. }
            | PipelineError::PacketType { .. }
            | PipelineError::UnexpectedTimestamp { .. } => Code::DataLoss,
            PipelineError::ChannelClosed(_) => Code::Unavailable,
            PipelineError::Cancelled => Code::Cancelled,
            PipelineError::PipelineInit(_)
            | PipelineError::UnknownChannel(_)
            | PipelineError::InvalidState { .. } => Code::Internal,
        };
        Status::new(code, err.to_string())
    }
}
