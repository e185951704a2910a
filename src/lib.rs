//! # batchaug
//!
//! Batched stochastic augmentation dispatch. Wraps an augmentation so it is
//! applied with probability `p`, either to a whole call or independently to
//! a random subset of the items of a batch, while images, videos, masks and
//! bounding boxes of the same sample stay consistent.
//!
//! ## Features
//!
//! - **Per-item selection** in batch mode, with exact expected counts
//! - **Chunked parameters**: selected items are split into chunks that each
//!   get their own randomly sampled parameters
//! - **Ragged payloads**: batched boxes and masks with per-item counts, kept
//!   consistent through an offsets table
//! - **Nested samples**: maps and sequences of payloads are flattened and
//!   rebuilt around the transform
//!
//! ## Modules
//!
//! - `payload`: tensors, ragged batches, box and mask containers, sample trees
//! - `transform`: the `BatchTransform` contract and `DispatchConfig`
//! - `dispatch`: the `RandomApply` engine (selection, chunking, merging)
//! - `augmentation`: flips, color jitter, resize and box sanitizing
//! - `utils`: error types and logging setup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchaug::{DispatchConfig, HorizontalFlip, Payload, RandomApply};
//!
//! let mut flip = RandomApply::new(HorizontalFlip, DispatchConfig::batch(0.5, 2))?;
//! let out = flip.forward_flat(vec![Payload::BatchImages(images), Payload::BatchBoundingBoxes(boxes)])?;
//! ```

pub mod augmentation;
pub mod dispatch;
pub mod payload;
pub mod transform;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used items for convenience
pub use augmentation::{
    ColorJitter, ColorJitterConfig, HorizontalFlip, JitterRange, Resize, ResizeConfig,
    SanitizeBoundingBoxes, VerticalFlip,
};
pub use dispatch::RandomApply;
pub use payload::{
    BatchBoundingBoxes, BatchMasks, BoundingBoxes, BoxFormat, Payload, PayloadKind, RaggedBatch,
    Sample, Tensor, TreeSpec,
};
pub use transform::{BatchTransform, DispatchConfig, ParamSet, ParamValue};
pub use utils::error::{AugmentError, Result};
