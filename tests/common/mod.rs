#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use frameland::{
    PipelineError, PullError, ServiceConfig,
    pipeline::{ChannelReader, Packet, Payload, StreamingPipeline, Timestamp, streams},
    types::{Classification, Frame, Landmark, NormalizedRect},
};

/// When a frame's scripted packets become visible to readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// As soon as the frame is submitted.
    Now,
    /// Only once the next frame is submitted, ahead of that frame's packets.
    Late,
    /// Never; every pull for this frame runs into its deadline.
    Never,
}

/// What the fake graph emits for one submitted frame.
#[derive(Clone, Debug)]
pub struct FrameScript {
    pub outputs: Vec<(&'static str, Payload)>,
    pub delivery: Delivery,
    /// Emit the submitted frame itself on `output_video`.
    pub echo_video: bool,
}

impl FrameScript {
    pub fn new(outputs: Vec<(&'static str, Payload)>) -> Self {
        Self {
            outputs,
            delivery: Delivery::Now,
            echo_video: true,
        }
    }

    pub fn delivered(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    fn hand_count(&self) -> Option<usize> {
        self.outputs.iter().find_map(|(stream, payload)| match payload {
            Payload::Count(n) if *stream == streams::HAND_COUNT => Some(*n),
            _ => None,
        })
    }
}

/// No hands: only the unconditional streams fire.
pub fn no_hands() -> FrameScript {
    FrameScript::new(vec![(streams::HAND_COUNT, Payload::Count(0))])
}

/// `n` hands where every field of hand `i` encodes `i`, so a test can tell
/// which source index ended up where.
pub fn hands(n: usize) -> FrameScript {
    FrameScript::new(vec![
        (streams::HAND_COUNT, Payload::Count(n)),
        (streams::LANDMARKS, Payload::Landmarks(landmark_lists(n))),
        (streams::HANDEDNESS, Payload::Classifications(labels(n))),
        (streams::HAND_RECTS, Payload::Rects(rects(n))),
    ])
}

pub fn landmark_lists(n: usize) -> Vec<Vec<Landmark>> {
    (0..n)
        .map(|i| {
            (0..21)
                .map(|j| Landmark::new(i as f32, j as f32, 0.0))
                .collect()
        })
        .collect()
}

pub fn labels(n: usize) -> Vec<Classification> {
    (0..n)
        .map(|i| {
            let label = if i % 2 == 0 { "Right" } else { "Left" };
            Classification::new(label, 0.5 + i as f32 / 100.0)
        })
        .collect()
}

pub fn rects(n: usize) -> Vec<NormalizedRect> {
    (0..n)
        .map(|i| NormalizedRect {
            x_center: 0.5,
            y_center: 0.5,
            width: 0.25,
            height: 0.25,
            rotation: 0.0,
            rect_id: i as i64,
        })
        .collect()
}

pub fn rgb_frame(width: u32, height: u32) -> Frame {
    let data = (0..width * height * 3).map(|v| v as u8).collect();
    Frame::new(width, height, 3, data).expect("valid test frame")
}

pub fn service_config(pull_timeout_ms: u64) -> ServiceConfig {
    ServiceConfig {
        pull_timeout_ms,
        queue_timeout_ms: 2_000,
        ..ServiceConfig::default()
    }
}

#[derive(Default)]
struct Shared {
    scripts: VecDeque<FrameScript>,
    registered: HashSet<String>,
    queues: HashMap<String, VecDeque<Packet>>,
    late: Vec<(String, Packet)>,
    /// Hand count of the most recently submitted frame.
    current_count: Option<usize>,
    gating_violations: Vec<String>,
    log: Vec<String>,
    submitted: usize,
    started: bool,
    closed: bool,
}

type SharedState = Arc<(Mutex<Shared>, Condvar)>;

fn lock(shared: &SharedState) -> MutexGuard<'_, Shared> {
    shared.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`StreamingPipeline`] that replays one [`FrameScript`] per submitted
/// frame and records every submit and pull in order.
///
/// Pulling a per-hand stream while the current frame's `hand_count` is zero
/// panics, so a gating bug fails the test on the spot.
pub struct ScriptedPipeline {
    shared: SharedState,
}

/// Test-side view of a [`ScriptedPipeline`] that has been handed off.
#[derive(Clone)]
pub struct ScriptHandle {
    shared: SharedState,
}

impl ScriptedPipeline {
    pub fn new(scripts: impl IntoIterator<Item = FrameScript>) -> (Self, ScriptHandle) {
        let shared: SharedState = Arc::default();
        lock(&shared).scripts.extend(scripts);
        (
            Self {
                shared: shared.clone(),
            },
            ScriptHandle { shared },
        )
    }
}

impl ScriptHandle {
    pub fn push(&self, script: FrameScript) {
        lock(&self.shared).scripts.push_back(script);
    }

    pub fn log(&self) -> Vec<String> {
        lock(&self.shared).log.clone()
    }

    pub fn submitted(&self) -> usize {
        lock(&self.shared).submitted
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }

    pub fn gating_violations(&self) -> Vec<String> {
        lock(&self.shared).gating_violations.clone()
    }

    /// Closes every stream as a shut-down graph would.
    pub fn close(&self) {
        lock(&self.shared).closed = true;
        self.shared.1.notify_all();
    }
}

impl StreamingPipeline for ScriptedPipeline {
    fn name(&self) -> &str {
        "scripted"
    }

    fn register_channel(&mut self, name: &str) -> Result<Box<dyn ChannelReader>, PipelineError> {
        let mut state = lock(&self.shared);
        if state.started {
            return Err(PipelineError::InvalidState {
                from: "Running",
                to: "Configured",
            });
        }
        if !streams::HAND_TRACKING_OUTPUTS.contains(&name) {
            return Err(PipelineError::UnknownChannel(name.to_string()));
        }
        state.registered.insert(name.to_string());
        Ok(Box::new(ScriptedReader {
            name: name.to_string(),
            shared: self.shared.clone(),
        }))
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        lock(&self.shared).started = true;
        Ok(())
    }

    fn submit(&mut self, frame: Frame, timestamp: Timestamp) -> Result<(), PipelineError> {
        let mut state = lock(&self.shared);
        if state.closed {
            return Err(PipelineError::ChannelClosed(streams::INPUT_VIDEO.to_string()));
        }
        state.submitted += 1;
        state.log.push(format!("submit@{}", timestamp.micros()));

        for (stream, packet) in std::mem::take(&mut state.late) {
            state.queues.entry(stream).or_default().push_back(packet);
        }

        let script = state.scripts.pop_front().unwrap_or_else(no_hands);
        state.current_count = script.hand_count();

        let mut outputs = script.outputs.clone();
        if script.echo_video {
            outputs.push((streams::OUTPUT_VIDEO, Payload::Frame(frame)));
        }
        for (stream, payload) in outputs {
            if !state.registered.contains(stream) {
                continue;
            }
            let packet = Packet::new(timestamp, payload);
            match script.delivery {
                Delivery::Now => state
                    .queues
                    .entry(stream.to_string())
                    .or_default()
                    .push_back(packet),
                Delivery::Late => state.late.push((stream.to_string(), packet)),
                Delivery::Never => {}
            }
        }
        drop(state);
        self.shared.1.notify_all();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        let mut state = lock(&self.shared);
        if !state.closed {
            state.closed = true;
            state.log.push("stop".to_string());
        }
        drop(state);
        self.shared.1.notify_all();
        Ok(())
    }
}

struct ScriptedReader {
    name: String,
    shared: SharedState,
}

impl ScriptedReader {
    fn is_gated(&self) -> bool {
        matches!(
            self.name.as_str(),
            streams::LANDMARKS | streams::HANDEDNESS | streams::HAND_RECTS
        )
    }
}

impl ChannelReader for ScriptedReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn pull_until(&mut self, deadline: Instant) -> Result<Packet, PullError> {
        let ready = &self.shared.1;
        let mut state = lock(&self.shared);

        if self.is_gated() && state.current_count == Some(0) {
            state.gating_violations.push(self.name.clone());
            drop(state);
            panic!("`{}` pulled for a frame without hands", self.name);
        }

        loop {
            if let Some(packet) = state
                .queues
                .get_mut(&self.name)
                .and_then(VecDeque::pop_front)
            {
                state
                    .log
                    .push(format!("pull:{}@{}", self.name, packet.timestamp.micros()));
                return Ok(packet);
            }
            if state.closed {
                return Err(PullError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                state.log.push(format!("timeout:{}", self.name));
                return Err(PullError::Timeout);
            }
            state = ready
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

/// Checks that every pull between two submits belongs to the frame submitted
/// first, i.e. no two frames' submit/pull sequences interleave.
pub fn assert_not_interleaved(log: &[String]) {
    let mut current: Option<&str> = None;
    for entry in log {
        if let Some(ts) = entry.strip_prefix("submit@") {
            current = Some(ts);
        } else if let Some(pull) = entry.strip_prefix("pull:") {
            let ts = pull.rsplit('@').next();
            assert_eq!(ts, current, "pull `{entry}` interleaved in {log:?}");
        }
    }
}

pub fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
