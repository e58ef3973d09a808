use crate::{
    config::ServiceConfig,
    error::PipelineError,
    pipeline::{
        GraphRunner, HandCorrelator, HandTracker, HandTrackingGraph, HandposeEngine,
        ObservedStreams, PendingDetection, StreamingPipeline, TrackerConfig, streams,
    },
    types::Frame,
};

use super::{
    response,
    status::Status,
    wire::{HandOptions, HandsReply, Image},
};

/// `DetectAndDraw` and `GetHands`, both served by one shared pipeline
/// instance. Share the service itself across request threads.
pub struct HandDetectionService {
    tracker: HandTracker,
}

impl HandDetectionService {
    pub fn start<E: HandposeEngine>(
        engine: E,
        config: &ServiceConfig,
    ) -> Result<Self, PipelineError> {
        let graph = HandTrackingGraph::new(engine, &config.graph);
        let runner = GraphRunner::new(graph, &config.graph);
        Self::with_pipeline(
            Box::new(runner),
            ObservedStreams::from_config(&config.graph),
            config,
        )
    }

    pub fn with_pipeline(
        pipeline: Box<dyn StreamingPipeline>,
        observed: ObservedStreams,
        config: &ServiceConfig,
    ) -> Result<Self, PipelineError> {
        let correlator = HandCorrelator::start(pipeline, observed, config.pull_timeout())?;
        let tracker = HandTracker::start(
            correlator,
            TrackerConfig {
                queue_capacity: config.request_queue_capacity,
                max_wait: config.queue_timeout() + config.pull_timeout(),
            },
        )?;
        Ok(Self { tracker })
    }

    pub fn detect_and_draw(&self, request: HandOptions) -> Result<Image, Status> {
        self.enqueue_detect_and_draw(request)?.wait()
    }

    /// Queues a `DetectAndDraw` call. Cancelling the returned call before
    /// its turn keeps the frame out of the pipeline.
    pub fn enqueue_detect_and_draw(&self, request: HandOptions) -> Result<PendingDrawing, Status> {
        if !self.tracker.observes_output_video() {
            return Err(Status::failed_precondition(format!(
                "`{}` is not observed by this service",
                streams::OUTPUT_VIDEO
            )));
        }

        let frame = Frame::try_from(request.image)?;
        let ticket = self.tracker.enqueue(frame, true)?;
        Ok(PendingDrawing { ticket })
    }

    pub fn get_hands(&self, request: HandOptions) -> Result<HandsReply, Status> {
        self.enqueue_get_hands(request)?.wait()
    }

    pub fn enqueue_get_hands(&self, request: HandOptions) -> Result<PendingHands, Status> {
        let want_image = request.return_image && self.tracker.observes_output_video();
        let frame = Frame::try_from(request.image)?;
        let ticket = self.tracker.enqueue(frame, want_image)?;
        Ok(PendingHands {
            ticket,
            min_score: request.min_score,
        })
    }

    /// Finishes queued requests and drains the pipeline.
    pub fn shutdown(self) {
        self.tracker.shutdown();
        log::info!("hand detection service stopped");
    }
}

pub struct PendingDrawing {
    ticket: PendingDetection,
}

impl PendingDrawing {
    pub fn cancel(&self) {
        self.ticket.cancel();
    }

    pub fn wait(self) -> Result<Image, Status> {
        let correlated = self.ticket.wait()?;
        correlated.annotated.map(Image::from).ok_or_else(|| {
            Status::from(PipelineError::ChannelClosed(streams::OUTPUT_VIDEO.to_string()))
        })
    }
}

pub struct PendingHands {
    ticket: PendingDetection,
    min_score: f32,
}

impl PendingHands {
    pub fn cancel(&self) {
        self.ticket.cancel();
    }

    pub fn wait(self) -> Result<HandsReply, Status> {
        let correlated = self.ticket.wait()?;
        log::debug!("GetHands found {} hands", correlated.detections.hand_count());
        Ok(response::hands_reply(
            correlated.detections,
            correlated.annotated,
            self.min_score,
        ))
    }
}
