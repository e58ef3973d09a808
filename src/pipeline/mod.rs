pub mod correlator;
pub mod frame_buffer;
pub mod frame_pipeline;
pub mod graph;
pub mod graphs;
pub mod recognizer;
pub mod runner;
pub mod state;
pub mod streams;
pub mod tracker;

// Re-exports for convenience
pub use correlator::{Correlated, HandCorrelator, ObservedStreams};
pub use frame_pipeline::FramePipeline;
pub use graph::{ChannelReader, Packet, Payload, StreamingPipeline, Timestamp};
pub use graphs::HandTrackingGraph;
pub use recognizer::{HandObservation, HandposeEngine};
pub use runner::{FrameGraph, GraphRunner};
pub use state::PipelineState;
pub use tracker::{HandTracker, PendingDetection, TrackerConfig};
