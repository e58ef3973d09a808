//! The interface consumed from a streaming computation graph: one input
//! stream, several independently buffered output streams, blocking pulls.

use std::{fmt, time::Instant};

use crate::{
    error::{PipelineError, PullError},
    types::{Classification, Frame, LandmarkList, NormalizedRect},
};

/// Microseconds since an arbitrary monotonic epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn micros(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Frame(Frame),
    Count(usize),
    Landmarks(Vec<LandmarkList>),
    Classifications(Vec<Classification>),
    Rects(Vec<NormalizedRect>),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Frame(_) => "frame",
            Payload::Count(_) => "count",
            Payload::Landmarks(_) => "landmarks",
            Payload::Classifications(_) => "classifications",
            Payload::Rects(_) => "rects",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub timestamp: Timestamp,
    pub payload: Payload,
}

macro_rules! packet_getter {
    ($name:ident, $variant:ident, $ty:ty, $kind:literal) => {
        pub fn $name(self, channel: &str) -> Result<$ty, PipelineError> {
            match self.payload {
                Payload::$variant(value) => Ok(value),
                other => Err(PipelineError::PacketType {
                    channel: channel.to_string(),
                    expected: $kind,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl Packet {
    pub fn new(timestamp: Timestamp, payload: Payload) -> Self {
        Self { timestamp, payload }
    }

    packet_getter!(into_frame, Frame, Frame, "frame");
    packet_getter!(into_count, Count, usize, "count");
    packet_getter!(into_landmarks, Landmarks, Vec<LandmarkList>, "landmarks");
    packet_getter!(
        into_classifications,
        Classifications,
        Vec<Classification>,
        "classifications"
    );
    packet_getter!(into_rects, Rects, Vec<NormalizedRect>, "rects");
}

pub trait ChannelReader: Send {
    fn name(&self) -> &str;

    /// Blocks until the next packet is buffered, the deadline passes, or the
    /// stream is closed.
    fn pull_until(&mut self, deadline: Instant) -> Result<Packet, PullError>;
}

/// A long-lived graph instance. Results are correlated to inputs only by
/// submission order and timestamp; there are no request ids.
pub trait StreamingPipeline: Send {
    fn name(&self) -> &str;

    /// Only valid before [`StreamingPipeline::start`].
    fn register_channel(&mut self, name: &str) -> Result<Box<dyn ChannelReader>, PipelineError>;

    fn start(&mut self) -> Result<(), PipelineError>;

    /// Timestamps must be strictly increasing per instance.
    fn submit(&mut self, frame: Frame, timestamp: Timestamp) -> Result<(), PipelineError>;

    /// Closes the input, drains in-flight frames and releases the graph.
    /// Calling it again is a no-op.
    fn stop(&mut self) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getter_reports_mismatch() {
        let packet = Packet::new(Timestamp(5), Payload::Count(2));
        let err = packet.into_landmarks("landmarks").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PacketType {
                expected: "landmarks",
                found: "count",
                ..
            }
        ));
    }

    #[test]
    fn typed_getter_unwraps_payload() {
        let packet = Packet::new(Timestamp(5), Payload::Count(2));
        assert_eq!(packet.into_count("hand_count").unwrap(), 2);
    }
}
