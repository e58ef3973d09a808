use std::sync::LazyLock;

use crate::pipeline::recognizer::common::PALM_INPUT_SIZE;

/// Feature-map strides of the palm detector's SSD heads. Consecutive layers
/// with the same stride share one grid.
const STRIDES: [u32; 4] = [8, 16, 16, 16];
const ANCHORS_PER_LAYER: usize = 2;
const ANCHOR_OFFSET: f32 = 0.5;

pub const NUM_ANCHORS: usize = 2016;

/// Normalized `[x_center, y_center]`; the model uses fixed-size anchors so
/// width and height are always 1.
pub static ANCHORS: LazyLock<Vec<[f32; 2]>> = LazyLock::new(generate_anchors);

fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    let mut layer = 0;
    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let mut same_stride = 0;
        while layer < STRIDES.len() && STRIDES[layer] == stride {
            same_stride += 1;
            layer += 1;
        }

        let grid = PALM_INPUT_SIZE.div_ceil(stride);
        let per_cell = same_stride * ANCHORS_PER_LAYER;
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + ANCHOR_OFFSET) / grid as f32,
                    (y as f32 + ANCHOR_OFFSET) / grid as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }
    anchors
}
