//! Sample makers shared by the unit tests

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::payload::{BatchBoundingBoxes, BatchMasks, BoundingBoxes, BoxFormat, CanvasSize, RaggedBatch, Tensor};

/// Deterministic values in [0, 1] that differ between neighbouring positions
fn pattern(shape: Vec<usize>) -> Tensor {
    Tensor::from_fn(shape, |i| (i % 251) as f32 / 250.0)
}

pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn make_image(channels: usize, height: usize, width: usize) -> Tensor {
    pattern(vec![channels, height, width])
}

pub fn make_batch_images(batch: usize, channels: usize, height: usize, width: usize) -> Tensor {
    pattern(vec![batch, channels, height, width])
}

pub fn make_video(frames: usize, channels: usize, height: usize, width: usize) -> Tensor {
    pattern(vec![frames, channels, height, width])
}

pub fn make_batch_videos(
    batch: usize,
    frames: usize,
    channels: usize,
    height: usize,
    width: usize,
) -> Tensor {
    pattern(vec![batch, frames, channels, height, width])
}

pub fn make_mask(height: usize, width: usize) -> Tensor {
    Tensor::from_fn(vec![height, width], |i| (i % 2) as f32)
}

/// XYXY box number `g`: at least 2 wide and exactly 3 tall, inside a
/// 16x16 canvas
fn make_box(g: usize) -> [f32; 4] {
    let x1 = (g % 4) as f32;
    let y1 = (g % 3) as f32;
    [x1, y1, x1 + 2.0 + (g % 5) as f32, y1 + 3.0]
}

pub fn make_bounding_boxes(count: usize, canvas_size: CanvasSize) -> BoundingBoxes {
    let data = (0..count).flat_map(make_box).collect();
    let tensor = Tensor::new(vec![count, 4], data).unwrap();
    BoundingBoxes::new(BoxFormat::Xyxy, canvas_size, tensor).unwrap()
}

/// XYXY boxes, `counts[i]` of them for item `i`
pub fn make_batch_bounding_boxes(counts: &[usize], canvas_size: CanvasSize) -> BatchBoundingBoxes {
    let total: usize = counts.iter().sum();
    let data = (0..total).flat_map(make_box).collect();
    let ragged = RaggedBatch::from_counts(vec![4], data, counts).unwrap();
    BatchBoundingBoxes::new(BoxFormat::Xyxy, canvas_size, ragged).unwrap()
}

/// `counts[i]` instance masks of size `height x width` for item `i`
pub fn make_batch_masks(counts: &[usize], height: usize, width: usize) -> BatchMasks {
    let total: usize = counts.iter().sum();
    let data = (0..total * height * width)
        .map(|i| ((i / width + i) % 2) as f32)
        .collect();
    let ragged = RaggedBatch::from_counts(vec![height, width], data, counts).unwrap();
    BatchMasks::new(ragged).unwrap()
}
