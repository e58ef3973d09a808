//! A dedicated thread owns the [`HandCorrelator`]; callers reach it through a
//! bounded FIFO queue. Only that thread ever submits to the pipeline, so at
//! most one frame is in flight and a frame's submit and pulls never
//! interleave with another request's.
//!
//! A request dropped or timed out while still queued is skipped without
//! submitting anything. Once its frame has been submitted it runs to
//! completion (or to the pull deadline); the pipeline has no way to withdraw
//! a submitted frame, so a late cancellation only discards the result.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};

use super::correlator::{Correlated, HandCorrelator};
use crate::{error::PipelineError, types::Frame};

const REQUEST_QUEUE: &str = "request_queue";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    pub queue_capacity: usize,
    /// Longest a caller waits for its turn plus its own pulls.
    pub max_wait: Duration,
}

struct Job {
    frame: Frame,
    want_annotated: bool,
    cancelled: Arc<AtomicBool>,
    reply_tx: Sender<Result<Correlated, PipelineError>>,
}

/// A queued request. Dropping it before the worker reaches it cancels it.
pub struct PendingDetection {
    cancelled: Arc<AtomicBool>,
    reply_rx: Receiver<Result<Correlated, PipelineError>>,
    max_wait: Duration,
}

impl PendingDetection {
    pub fn wait(self) -> Result<Correlated, PipelineError> {
        match self.reply_rx.recv_timeout(self.max_wait) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(PipelineError::PipelineStall {
                channel: REQUEST_QUEUE.to_string(),
                timeout: self.max_wait,
            }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PipelineError::ChannelClosed(REQUEST_QUEUE.to_string()))
            }
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Drop for PendingDetection {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct HandTracker {
    job_tx: Option<Sender<Job>>,
    worker: Option<thread::JoinHandle<()>>,
    config: TrackerConfig,
    observes_output_video: bool,
}

impl HandTracker {
    pub fn start(correlator: HandCorrelator, config: TrackerConfig) -> Result<Self, PipelineError> {
        let (job_tx, job_rx) = bounded(config.queue_capacity.max(1));
        let observes_output_video = correlator.observes_output_video();

        let worker = thread::Builder::new()
            .name("hand-tracker".into())
            .spawn(move || run_worker_loop(correlator, job_rx))
            .map_err(|err| PipelineError::init(format!("failed to spawn tracker worker: {err}")))?;

        Ok(Self {
            job_tx: Some(job_tx),
            worker: Some(worker),
            config,
            observes_output_video,
        })
    }

    pub fn observes_output_video(&self) -> bool {
        self.observes_output_video
    }

    /// Queues `frame` behind any earlier requests.
    pub fn enqueue(
        &self,
        frame: Frame,
        want_annotated: bool,
    ) -> Result<PendingDetection, PipelineError> {
        let job_tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| PipelineError::ChannelClosed(REQUEST_QUEUE.to_string()))?;
        let cancelled = Arc::new(AtomicBool::new(false));
        let (reply_tx, reply_rx) = bounded(1);

        let job = Job {
            frame,
            want_annotated,
            cancelled: cancelled.clone(),
            reply_tx,
        };
        match job_tx.try_send(job) {
            Ok(()) => Ok(PendingDetection {
                cancelled,
                reply_rx,
                max_wait: self.config.max_wait,
            }),
            Err(TrySendError::Full(_)) => Err(PipelineError::Backpressure {
                stream: REQUEST_QUEUE.to_string(),
                capacity: self.config.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => {
                Err(PipelineError::ChannelClosed(REQUEST_QUEUE.to_string()))
            }
        }
    }

    pub fn process(&self, frame: Frame, want_annotated: bool) -> Result<Correlated, PipelineError> {
        self.enqueue(frame, want_annotated)?.wait()
    }

    /// Stops accepting requests, finishes the queued ones and drains the
    /// pipeline.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.job_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("hand tracker worker panicked");
            }
        }
    }
}

impl Drop for HandTracker {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker_loop(mut correlator: HandCorrelator, job_rx: Receiver<Job>) {
    while let Ok(job) = job_rx.recv() {
        if job.cancelled.load(Ordering::SeqCst) {
            log::debug!("dropping cancelled request before submission");
            let _ = job.reply_tx.send(Err(PipelineError::Cancelled));
            continue;
        }

        let result = correlator.process(job.frame).map(|mut correlated| {
            if !job.want_annotated {
                correlated.annotated = None;
            }
            correlated
        });
        if let Err(err) = &result {
            log::warn!("hand tracking failed: {err}");
        }
        if job.reply_tx.send(result).is_err() {
            log::debug!("caller went away before its result was ready");
        }
    }

    if let Err(err) = correlator.shutdown() {
        log::warn!("hand correlator did not drain cleanly: {err}");
    }
    log::info!("hand tracker stopped");
}
