//! Stream names shared by the hand-tracking graph and its readers.

pub const INPUT_VIDEO: &str = "input_video";
pub const OUTPUT_VIDEO: &str = "output_video";
pub const HAND_COUNT: &str = "hand_count";
pub const LANDMARKS: &str = "landmarks";
pub const HANDEDNESS: &str = "handedness";
pub const HAND_RECTS: &str = "multi_hand_rects";

pub const HAND_TRACKING_OUTPUTS: &[&str] =
    &[OUTPUT_VIDEO, HAND_COUNT, LANDMARKS, HANDEDNESS, HAND_RECTS];
