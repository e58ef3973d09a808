use std::{
    cmp::Ordering,
    time::{Duration, Instant},
};

use super::graph::{ChannelReader, Packet, StreamingPipeline, Timestamp};
use crate::{
    error::{PipelineError, PullError},
    types::Frame,
};

#[derive(Debug)]
pub struct MonotonicClock {
    epoch: Instant,
    last: Option<u64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last: None,
        }
    }

    pub fn next(&mut self) -> Timestamp {
        let now = self.epoch.elapsed().as_micros() as u64;
        let micros = match self.last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last = Some(micros);
        Timestamp(micros)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct InFlight {
    pub timestamp: Timestamp,
    pub deadline: Instant,
}

/// Exclusively owns one streaming pipeline and exposes the submit/pull
/// primitives every single-frame service builds on.
pub struct FramePipeline {
    pipeline: Box<dyn StreamingPipeline>,
    clock: MonotonicClock,
    pull_timeout: Duration,
}

impl FramePipeline {
    pub fn new(pipeline: Box<dyn StreamingPipeline>, pull_timeout: Duration) -> Self {
        Self {
            pipeline,
            clock: MonotonicClock::new(),
            pull_timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.pipeline.name()
    }

    pub fn pull_timeout(&self) -> Duration {
        self.pull_timeout
    }

    pub fn register(&mut self, stream: &str) -> Result<Box<dyn ChannelReader>, PipelineError> {
        self.pipeline.register_channel(stream)
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.pipeline.start()
    }

    pub fn submit(&mut self, frame: Frame) -> Result<InFlight, PipelineError> {
        let deadline = Instant::now() + self.pull_timeout;
        let timestamp = self.clock.next();
        self.pipeline.submit(frame, timestamp)?;
        Ok(InFlight {
            timestamp,
            deadline,
        })
    }

    /// Pulls the packet `reader` produced for the in-flight frame.
    ///
    /// Leftovers from an earlier frame whose caller gave up are skipped, so a
    /// stall never shifts results onto later frames.
    pub fn pull(
        &self,
        reader: &mut dyn ChannelReader,
        in_flight: &InFlight,
    ) -> Result<Packet, PipelineError> {
        loop {
            let packet = reader
                .pull_until(in_flight.deadline)
                .map_err(|err| match err {
                    PullError::Timeout => PipelineError::PipelineStall {
                        channel: reader.name().to_string(),
                        timeout: self.pull_timeout,
                    },
                    PullError::Closed => PipelineError::ChannelClosed(reader.name().to_string()),
                })?;

            match packet.timestamp.cmp(&in_flight.timestamp) {
                Ordering::Equal => return Ok(packet),
                Ordering::Less => {
                    log::warn!(
                        "`{}` discarding stale packet from {} while waiting for {}",
                        reader.name(),
                        packet.timestamp,
                        in_flight.timestamp
                    );
                }
                Ordering::Greater => {
                    return Err(PipelineError::UnexpectedTimestamp {
                        channel: reader.name().to_string(),
                        expected: in_flight.timestamp.micros(),
                        found: packet.timestamp.micros(),
                    });
                }
            }
        }
    }

    pub fn stop(&mut self) -> Result<(), PipelineError> {
        self.pipeline.stop()
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Err(err) = self.pipeline.stop() {
            log::warn!("pipeline `{}` failed to drain: {err}", self.pipeline.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_strictly_increasing() {
        let mut clock = MonotonicClock::new();
        let mut previous = clock.next();
        for _ in 0..1_000 {
            let next = clock.next();
            assert!(next > previous);
            previous = next;
        }
    }
}
