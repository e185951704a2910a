//! Payload Module
//!
//! The data the dispatch engine moves around:
//! - `Tensor`: dense arrays (images, videos, masks, untyped arrays)
//! - `RaggedBatch`: variable-length batched storage with an offsets table
//! - box and instance mask containers
//! - `Payload`: the closed set of kinds one flattened leaf can hold
//! - `Sample`: nested inputs and their flatten/unflatten round trip

pub mod boxes;
pub mod convert;
pub mod ragged;
pub mod tensor;
pub mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use boxes::{BatchBoundingBoxes, BatchMasks, BoundingBoxes, BoxFormat, CanvasSize};
pub use convert::{image_from_dynamic, to_batch_images, to_image};
pub use ragged::RaggedBatch;
pub use tensor::Tensor;
pub use tree::{Sample, TreeSpec};

use crate::utils::error::{AugmentError, Result};

/// Semantic kind of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Untyped,
    Image,
    BatchImages,
    Video,
    BatchVideos,
    Mask,
    BoundingBoxes,
    BatchBoundingBoxes,
    BatchMasks,
    Value,
}

impl PayloadKind {
    /// Every kind that carries array data
    pub const ARRAYS: [PayloadKind; 9] = [
        PayloadKind::Untyped,
        PayloadKind::Image,
        PayloadKind::BatchImages,
        PayloadKind::Video,
        PayloadKind::BatchVideos,
        PayloadKind::Mask,
        PayloadKind::BoundingBoxes,
        PayloadKind::BatchBoundingBoxes,
        PayloadKind::BatchMasks,
    ];

    /// Pixel data: untyped arrays plus image and video kinds
    pub const IMAGE_LIKE: [PayloadKind; 5] = [
        PayloadKind::Untyped,
        PayloadKind::Image,
        PayloadKind::BatchImages,
        PayloadKind::Video,
        PayloadKind::BatchVideos,
    ];

    /// Kinds whose leading axis counts independent items
    pub fn is_batched(&self) -> bool {
        matches!(
            self,
            PayloadKind::Untyped
                | PayloadKind::BatchImages
                | PayloadKind::BatchVideos
                | PayloadKind::BatchBoundingBoxes
                | PayloadKind::BatchMasks
        )
    }

    /// Kinds stored with an offsets table
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            PayloadKind::BatchBoundingBoxes | PayloadKind::BatchMasks
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PayloadKind::Untyped => "untyped",
            PayloadKind::Image => "image",
            PayloadKind::BatchImages => "batch_images",
            PayloadKind::Video => "video",
            PayloadKind::BatchVideos => "batch_videos",
            PayloadKind::Mask => "mask",
            PayloadKind::BoundingBoxes => "bounding_boxes",
            PayloadKind::BatchBoundingBoxes => "batch_bounding_boxes",
            PayloadKind::BatchMasks => "batch_masks",
            PayloadKind::Value => "value",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One leaf of a flattened input
///
/// Dense kinds use `[.., C, H, W]` layouts: an image is `[C, H, W]`, a video
/// `[T, C, H, W]`, and their batched forms add a leading item axis. A mask is
/// `[.., H, W]`. `Untyped` is a plain array whose leading axis is treated as
/// the item axis in batch mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Untyped(Tensor),
    Image(Tensor),
    BatchImages(Tensor),
    Video(Tensor),
    BatchVideos(Tensor),
    Mask(Tensor),
    BoundingBoxes(BoundingBoxes),
    BatchBoundingBoxes(BatchBoundingBoxes),
    BatchMasks(BatchMasks),
    /// Non-array data such as labels or metadata
    Value(serde_json::Value),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Untyped(_) => PayloadKind::Untyped,
            Payload::Image(_) => PayloadKind::Image,
            Payload::BatchImages(_) => PayloadKind::BatchImages,
            Payload::Video(_) => PayloadKind::Video,
            Payload::BatchVideos(_) => PayloadKind::BatchVideos,
            Payload::Mask(_) => PayloadKind::Mask,
            Payload::BoundingBoxes(_) => PayloadKind::BoundingBoxes,
            Payload::BatchBoundingBoxes(_) => PayloadKind::BatchBoundingBoxes,
            Payload::BatchMasks(_) => PayloadKind::BatchMasks,
            Payload::Value(_) => PayloadKind::Value,
        }
    }

    /// Dense storage of tensor-backed kinds
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Payload::Untyped(t)
            | Payload::Image(t)
            | Payload::BatchImages(t)
            | Payload::Video(t)
            | Payload::BatchVideos(t)
            | Payload::Mask(t) => Some(t),
            Payload::BoundingBoxes(b) => Some(b.tensor()),
            _ => None,
        }
    }

    pub fn as_tensor_mut(&mut self) -> Option<&mut Tensor> {
        match self {
            Payload::Untyped(t)
            | Payload::Image(t)
            | Payload::BatchImages(t)
            | Payload::Video(t)
            | Payload::BatchVideos(t)
            | Payload::Mask(t) => Some(t),
            Payload::BoundingBoxes(b) => Some(b.tensor_mut()),
            _ => None,
        }
    }

    fn missing(&self, capability: &'static str) -> AugmentError {
        AugmentError::MissingCapability {
            kind: self.kind(),
            capability,
        }
    }

    /// Number of independent items in a batched payload
    pub fn batch_size(&self) -> Result<usize> {
        match self {
            Payload::Untyped(t) | Payload::BatchImages(t) | Payload::BatchVideos(t) => {
                t.batch_size()
            }
            Payload::BatchBoundingBoxes(b) => Ok(b.batch_size()),
            Payload::BatchMasks(m) => Ok(m.batch_size()),
            _ => Err(self.missing("batch_size")),
        }
    }

    /// Offsets table of structured kinds
    pub fn offsets(&self) -> Option<&[usize]> {
        match self {
            Payload::BatchBoundingBoxes(b) => Some(b.boxes().offsets()),
            Payload::BatchMasks(m) => Some(m.masks().offsets()),
            _ => None,
        }
    }

    /// Extract the items at `indices` as a payload of the same kind
    pub fn select(&self, indices: &[usize]) -> Result<Payload> {
        match self {
            Payload::Untyped(t) => Ok(Payload::Untyped(t.select(indices)?)),
            Payload::BatchImages(t) => Ok(Payload::BatchImages(t.select(indices)?)),
            Payload::BatchVideos(t) => Ok(Payload::BatchVideos(t.select(indices)?)),
            Payload::BatchBoundingBoxes(b) => Ok(Payload::BatchBoundingBoxes(b.select(indices)?)),
            Payload::BatchMasks(m) => Ok(Payload::BatchMasks(m.select(indices)?)),
            _ => Err(self.missing("select")),
        }
    }

    /// Overwrite the items at `indices` with the items of `sub`
    pub fn write_slice(&mut self, indices: &[usize], sub: &Payload) -> Result<()> {
        if self.kind() != sub.kind() {
            return Err(AugmentError::KindMismatch {
                expected: self.kind(),
                got: sub.kind(),
            });
        }
        match (self, sub) {
            (Payload::Untyped(dst), Payload::Untyped(src))
            | (Payload::BatchImages(dst), Payload::BatchImages(src))
            | (Payload::BatchVideos(dst), Payload::BatchVideos(src)) => {
                dst.write_slice(indices, src)
            }
            (Payload::BatchBoundingBoxes(dst), Payload::BatchBoundingBoxes(src)) => {
                dst.write_slice(indices, src)
            }
            (Payload::BatchMasks(dst), Payload::BatchMasks(src)) => dst.write_slice(indices, src),
            (dst, _) => Err(dst.missing("write_slice")),
        }
    }

    /// Reassemble per-chunk outputs of one kind into a batch of `len` items
    ///
    /// Used for shape-altering transforms, whose outputs cannot be written
    /// over the input positionally.
    pub fn scatter(len: usize, parts: Vec<(Vec<usize>, Payload)>) -> Result<Payload> {
        let kind = match parts.first() {
            Some((_, payload)) => payload.kind(),
            None => {
                return Err(AugmentError::InvalidInput(
                    "cannot scatter zero parts".to_string(),
                ))
            }
        };
        if let Some((_, odd)) = parts.iter().find(|(_, p)| p.kind() != kind) {
            return Err(AugmentError::KindMismatch {
                expected: kind,
                got: odd.kind(),
            });
        }

        match kind {
            PayloadKind::Untyped | PayloadKind::BatchImages | PayloadKind::BatchVideos => {
                let dense = parts
                    .into_iter()
                    .map(|(positions, payload)| match payload {
                        Payload::Untyped(t) | Payload::BatchImages(t) | Payload::BatchVideos(t) => {
                            Ok((positions, t))
                        }
                        other => Err(other.missing("scatter")),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let tensor = Tensor::scatter(len, dense)?;
                Ok(match kind {
                    PayloadKind::Untyped => Payload::Untyped(tensor),
                    PayloadKind::BatchImages => Payload::BatchImages(tensor),
                    _ => Payload::BatchVideos(tensor),
                })
            }
            PayloadKind::BatchBoundingBoxes => {
                let mut meta = None;
                let mut ragged = Vec::with_capacity(parts.len());
                for (positions, payload) in parts {
                    if let Payload::BatchBoundingBoxes(b) = payload {
                        let this = (b.format, b.canvas_size);
                        match meta {
                            None => meta = Some(this),
                            Some(m) if m != this => {
                                return Err(AugmentError::Shape(format!(
                                    "chunk outputs disagree on box metadata: {:?} vs {:?}",
                                    this, m
                                )))
                            }
                            Some(_) => {}
                        }
                        ragged.push((positions, b.boxes().clone()));
                    }
                }
                let (format, canvas_size) = meta.ok_or_else(|| {
                    AugmentError::InvalidInput("cannot scatter zero parts".to_string())
                })?;
                Ok(Payload::BatchBoundingBoxes(BatchBoundingBoxes::new(
                    format,
                    canvas_size,
                    RaggedBatch::scatter(len, ragged)?,
                )?))
            }
            PayloadKind::BatchMasks => {
                let ragged = parts
                    .into_iter()
                    .filter_map(|(positions, payload)| match payload {
                        Payload::BatchMasks(m) => Some((positions, m.masks().clone())),
                        _ => None,
                    })
                    .collect();
                Ok(Payload::BatchMasks(BatchMasks::new(RaggedBatch::scatter(
                    len, ragged,
                )?)?))
            }
            _ => Err(AugmentError::MissingCapability {
                kind,
                capability: "scatter",
            }),
        }
    }

    /// Normalize storage to a compact layout
    pub fn compact(self) -> Payload {
        match self {
            Payload::Untyped(t) => Payload::Untyped(t.compact()),
            Payload::Image(t) => Payload::Image(t.compact()),
            Payload::BatchImages(t) => Payload::BatchImages(t.compact()),
            Payload::Video(t) => Payload::Video(t.compact()),
            Payload::BatchVideos(t) => Payload::BatchVideos(t.compact()),
            Payload::Mask(t) => Payload::Mask(t.compact()),
            Payload::BatchBoundingBoxes(b) => Payload::BatchBoundingBoxes(b.compact()),
            Payload::BatchMasks(m) => Payload::BatchMasks(m.compact()),
            other => other,
        }
    }
}
