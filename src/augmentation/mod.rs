//! Augmentation Module
//!
//! Reference augmentations driven by the dispatch engine. Each one handles
//! every payload kind it declares, so an image and its boxes or masks stay
//! consistent.
//!
//! - **Flips**: horizontal and vertical mirroring
//! - **ColorJitter**: brightness and contrast factors, one per chunk
//! - **Resize**: nearest-neighbour resize (changes item shapes)
//! - **SanitizeBoundingBoxes**: drops degenerate boxes (changes box counts)

pub mod color;
pub mod flip;
pub mod resize;
pub mod sanitize;

pub use color::{check_range, ColorJitter, ColorJitterConfig, JitterRange};
pub use flip::{HorizontalFlip, VerticalFlip};
pub use resize::{Resize, ResizeConfig};
pub use sanitize::SanitizeBoundingBoxes;

use crate::payload::{BoxFormat, Tensor};
use crate::utils::error::{AugmentError, Result};

/// Height and width of the trailing `[H, W]` planes of a dense tensor
pub(crate) fn plane_dims(tensor: &Tensor, name: &'static str) -> Result<(usize, usize)> {
    let shape = tensor.shape();
    if shape.len() < 2 {
        return Err(AugmentError::Transform {
            name,
            reason: format!("expected at least 2 dimensions, got shape {:?}", shape),
        });
    }
    Ok((shape[shape.len() - 2], shape[shape.len() - 1]))
}

/// Rewrite every `[4]` box of `data` through corner coordinates
pub(crate) fn map_boxes(
    data: &mut [f32],
    format: BoxFormat,
    f: impl Fn([f32; 4]) -> [f32; 4],
) {
    for coords in data.chunks_exact_mut(4) {
        let xyxy = format.to_xyxy([coords[0], coords[1], coords[2], coords[3]]);
        coords.copy_from_slice(&format.from_xyxy(f(xyxy)));
    }
}
