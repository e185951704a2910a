//! Conversions from plain arrays and decoded images into typed payloads

use image::DynamicImage;

use super::{Payload, Tensor};
use crate::utils::error::{AugmentError, Result};

/// Wrap an array as an image
///
/// A 2-D `[H, W]` array gets a leading channel axis; anything with fewer
/// than two dimensions is rejected.
pub fn to_image(tensor: Tensor) -> Result<Payload> {
    match tensor.ndim() {
        0 | 1 => Err(AugmentError::InvalidInput(format!(
            "an image needs at least 2 dimensions, got {}",
            tensor.ndim()
        ))),
        2 => Ok(Payload::Image(tensor.with_leading_axis())),
        _ => Ok(Payload::Image(tensor)),
    }
}

/// Wrap a `[B, C, H, W]` (or higher) array as a batch of images
pub fn to_batch_images(tensor: Tensor) -> Result<Payload> {
    if tensor.ndim() < 4 {
        return Err(AugmentError::InvalidInput(format!(
            "a batch of images needs at least 4 dimensions, got {}",
            tensor.ndim()
        )));
    }
    Ok(Payload::BatchImages(tensor))
}

/// Convert a decoded image into a `[3, H, W]` image payload in [0, 1]
pub fn image_from_dynamic(img: &DynamicImage) -> Payload {
    Payload::Image(Tensor::from_dynamic_image(img))
}
