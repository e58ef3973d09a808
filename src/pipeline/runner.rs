use std::{collections::HashMap, thread, time::Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};

use super::{
    graph::{ChannelReader, Packet, Payload, StreamingPipeline, Timestamp},
    state::PipelineState,
};
use crate::{
    config::GraphConfig,
    error::{PipelineError, PullError},
    types::Frame,
};

/// The computation a [`GraphRunner`] drives, one input frame at a time.
///
/// A stream absent from the returned list simply gets no packet for that
/// frame, which is how conditional outputs are expressed.
pub trait FrameGraph: Send + 'static {
    fn output_streams(&self) -> &[&'static str];

    fn process(&mut self, frame: Frame) -> anyhow::Result<Vec<(&'static str, Payload)>>;
}

type OutputMap = HashMap<&'static str, Vec<Sender<Packet>>>;

struct StreamReader {
    name: String,
    rx: Receiver<Packet>,
}

impl ChannelReader for StreamReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn pull_until(&mut self, deadline: Instant) -> Result<Packet, PullError> {
        self.rx.recv_deadline(deadline).map_err(|err| match err {
            RecvTimeoutError::Timeout => PullError::Timeout,
            RecvTimeoutError::Disconnected => PullError::Closed,
        })
    }
}

/// Runs a [`FrameGraph`] on a dedicated thread behind a bounded input queue.
pub struct GraphRunner {
    name: String,
    input_stream: String,
    state: PipelineState,
    graph: Option<Box<dyn FrameGraph>>,
    outputs: OutputMap,
    input_capacity: usize,
    input_tx: Option<Sender<(Timestamp, Frame)>>,
    last_timestamp: Option<Timestamp>,
    worker: Option<thread::JoinHandle<()>>,
}

impl GraphRunner {
    pub fn new(graph: impl FrameGraph, config: &GraphConfig) -> Self {
        let mut runner = Self {
            name: config.name.clone(),
            input_stream: config.input_stream.clone(),
            state: PipelineState::Uninitialized,
            graph: Some(Box::new(graph)),
            outputs: HashMap::new(),
            input_capacity: config.input_queue_capacity.max(1),
            input_tx: None,
            last_timestamp: None,
            worker: None,
        };
        runner.state = PipelineState::Configured;
        log::info!(
            "graph `{}` configured with input `{}`",
            runner.name,
            runner.input_stream
        );
        runner
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition_to(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidState {
                from: self.state.name(),
                to: next.name(),
            });
        }
        log::debug!(
            "graph `{}`: {} -> {}",
            self.name,
            self.state.name(),
            next.name()
        );
        self.state = next;
        Ok(())
    }
}

impl StreamingPipeline for GraphRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn register_channel(&mut self, name: &str) -> Result<Box<dyn ChannelReader>, PipelineError> {
        let graph = match (&self.state, &self.graph) {
            (PipelineState::Configured, Some(graph)) => graph,
            _ => {
                return Err(PipelineError::InvalidState {
                    from: self.state.name(),
                    to: PipelineState::Configured.name(),
                });
            }
        };
        let stream = graph
            .output_streams()
            .iter()
            .copied()
            .find(|stream| *stream == name)
            .ok_or_else(|| PipelineError::UnknownChannel(name.to_string()))?;

        let (tx, rx) = unbounded();
        self.outputs.entry(stream).or_default().push(tx);
        Ok(Box::new(StreamReader {
            name: stream.to_string(),
            rx,
        }))
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        self.transition_to(PipelineState::Running)?;

        let graph = self
            .graph
            .take()
            .ok_or_else(|| PipelineError::init("graph already consumed"))?;
        let outputs = std::mem::take(&mut self.outputs);
        let (input_tx, input_rx) = bounded(self.input_capacity);
        let name = self.name.clone();

        let worker = thread::Builder::new()
            .name(format!("graph-{}", self.name))
            .spawn(move || run_graph_loop(name, graph, input_rx, outputs))
            .map_err(|err| PipelineError::init(format!("failed to spawn graph worker: {err}")))?;

        self.input_tx = Some(input_tx);
        self.worker = Some(worker);
        log::info!("graph `{}` running", self.name);
        Ok(())
    }

    fn submit(&mut self, frame: Frame, timestamp: Timestamp) -> Result<(), PipelineError> {
        let input_tx = match (&self.state, &self.input_tx) {
            (PipelineState::Running, Some(tx)) => tx,
            _ => return Err(PipelineError::ChannelClosed(self.input_stream.clone())),
        };
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Err(PipelineError::UnexpectedTimestamp {
                    channel: self.input_stream.clone(),
                    expected: last.micros() + 1,
                    found: timestamp.micros(),
                });
            }
        }

        match input_tx.try_send((timestamp, frame)) {
            Ok(()) => {
                self.last_timestamp = Some(timestamp);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(PipelineError::Backpressure {
                stream: self.input_stream.clone(),
                capacity: self.input_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => {
                Err(PipelineError::ChannelClosed(self.input_stream.clone()))
            }
        }
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Running => {
                self.transition_to(PipelineState::Draining)?;
                self.input_tx.take();
                if let Some(worker) = self.worker.take() {
                    if worker.join().is_err() {
                        log::error!("graph `{}` worker panicked while draining", self.name);
                    }
                }
                self.transition_to(PipelineState::Stopped)?;
            }
            PipelineState::Configured => {
                self.graph.take();
                self.outputs.clear();
                self.transition_to(PipelineState::Stopped)?;
            }
            PipelineState::Uninitialized | PipelineState::Draining | PipelineState::Stopped => {
                return Ok(());
            }
        }
        log::info!("graph `{}` stopped", self.name);
        Ok(())
    }
}

impl Drop for GraphRunner {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("graph `{}` did not shut down cleanly: {err}", self.name);
        }
    }
}

fn run_graph_loop(
    name: String,
    mut graph: Box<dyn FrameGraph>,
    input_rx: Receiver<(Timestamp, Frame)>,
    outputs: OutputMap,
) {
    let mut processed = 0u64;

    while let Ok((timestamp, frame)) = input_rx.recv() {
        let emitted = match graph.process(frame) {
            Ok(emitted) => emitted,
            Err(err) => {
                // Dropping the senders closes every output stream.
                log::error!("graph `{name}` failed on frame {timestamp}: {err:?}");
                return;
            }
        };

        for (stream, payload) in emitted {
            match outputs.get(stream) {
                Some(senders) => fan_out(senders, Packet::new(timestamp, payload)),
                None => log::trace!("graph `{name}`: `{stream}` has no readers"),
            }
        }
        processed += 1;
    }

    log::debug!("graph `{name}` input closed after {processed} frames");
}

fn fan_out(senders: &[Sender<Packet>], packet: Packet) {
    if let Some((last, rest)) = senders.split_last() {
        for tx in rest {
            let _ = tx.send(packet.clone());
        }
        let _ = last.send(packet);
    }
}
