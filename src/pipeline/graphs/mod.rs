pub mod annotate;
pub mod hands;

pub use hands::HandTrackingGraph;
