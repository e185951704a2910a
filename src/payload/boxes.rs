//! Bounding box and instance mask containers

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::ragged::RaggedBatch;
use super::tensor::Tensor;
use crate::utils::error::{AugmentError, Result};

/// Coordinate layout of a box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoxFormat {
    /// Corners: x1, y1, x2, y2
    Xyxy,
    /// Top-left corner and size: x, y, w, h
    Xywh,
    /// Centre and size: cx, cy, w, h
    Cxcywh,
}

impl BoxFormat {
    /// Convert one box to corner coordinates
    pub fn to_xyxy(&self, b: [f32; 4]) -> [f32; 4] {
        match self {
            BoxFormat::Xyxy => b,
            BoxFormat::Xywh => [b[0], b[1], b[0] + b[2], b[1] + b[3]],
            BoxFormat::Cxcywh => {
                let (hw, hh) = (b[2] / 2.0, b[3] / 2.0);
                [b[0] - hw, b[1] - hh, b[0] + hw, b[1] + hh]
            }
        }
    }

    /// Convert corner coordinates back into this format
    pub fn from_xyxy(&self, b: [f32; 4]) -> [f32; 4] {
        match self {
            BoxFormat::Xyxy => b,
            BoxFormat::Xywh => [b[0], b[1], b[2] - b[0], b[3] - b[1]],
            BoxFormat::Cxcywh => [
                (b[0] + b[2]) / 2.0,
                (b[1] + b[3]) / 2.0,
                b[2] - b[0],
                b[3] - b[1],
            ],
        }
    }
}

impl fmt::Display for BoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxFormat::Xyxy => write!(f, "XYXY"),
            BoxFormat::Xywh => write!(f, "XYWH"),
            BoxFormat::Cxcywh => write!(f, "CXCYWH"),
        }
    }
}

/// Image extent the boxes live in, as (height, width)
pub type CanvasSize = (usize, usize);

/// Boxes of a single sample, stored as an `[N, 4]` tensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBoxes {
    pub format: BoxFormat,
    pub canvas_size: CanvasSize,
    tensor: Tensor,
}

impl BoundingBoxes {
    pub fn new(format: BoxFormat, canvas_size: CanvasSize, tensor: Tensor) -> Result<Self> {
        if tensor.ndim() != 2 || tensor.shape()[1] != 4 {
            return Err(AugmentError::Shape(format!(
                "bounding boxes must have shape [N, 4], got {:?}",
                tensor.shape()
            )));
        }
        Ok(Self {
            format,
            canvas_size,
            tensor,
        })
    }

    pub fn len(&self) -> usize {
        self.tensor.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn tensor_mut(&mut self) -> &mut Tensor {
        &mut self.tensor
    }

    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }
}

/// Boxes of a batch of samples; each sample holds its own number of boxes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchBoundingBoxes {
    pub format: BoxFormat,
    pub canvas_size: CanvasSize,
    boxes: RaggedBatch,
}

impl BatchBoundingBoxes {
    pub fn new(format: BoxFormat, canvas_size: CanvasSize, boxes: RaggedBatch) -> Result<Self> {
        if boxes.element_shape() != [4] {
            return Err(AugmentError::Shape(format!(
                "batched boxes must have element shape [4], got {:?}",
                boxes.element_shape()
            )));
        }
        Ok(Self {
            format,
            canvas_size,
            boxes,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.boxes.batch_size()
    }

    pub fn boxes(&self) -> &RaggedBatch {
        &self.boxes
    }

    pub fn boxes_mut(&mut self) -> &mut RaggedBatch {
        &mut self.boxes
    }

    /// Same metadata, different storage
    pub fn with_boxes(&self, boxes: RaggedBatch) -> Result<Self> {
        Self::new(self.format, self.canvas_size, boxes)
    }

    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        self.with_boxes(self.boxes.select(indices)?)
    }

    pub fn write_slice(&mut self, indices: &[usize], src: &BatchBoundingBoxes) -> Result<()> {
        if src.format != self.format || src.canvas_size != self.canvas_size {
            return Err(AugmentError::InvalidInput(format!(
                "cannot write {} boxes on a {:?} canvas into {} boxes on a {:?} canvas",
                src.format, src.canvas_size, self.format, self.canvas_size
            )));
        }
        self.boxes.write_slice(indices, &src.boxes)
    }

    pub fn compact(self) -> Self {
        Self {
            boxes: self.boxes.compact(),
            ..self
        }
    }
}

/// Per-instance masks of a batch of samples; elements are `[H, W]` planes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMasks {
    masks: RaggedBatch,
}

impl BatchMasks {
    pub fn new(masks: RaggedBatch) -> Result<Self> {
        if masks.element_shape().len() != 2 {
            return Err(AugmentError::Shape(format!(
                "batched masks must have element shape [H, W], got {:?}",
                masks.element_shape()
            )));
        }
        Ok(Self { masks })
    }

    pub fn batch_size(&self) -> usize {
        self.masks.batch_size()
    }

    pub fn masks(&self) -> &RaggedBatch {
        &self.masks
    }

    pub fn masks_mut(&mut self) -> &mut RaggedBatch {
        &mut self.masks
    }

    /// (height, width) of every mask plane
    pub fn plane_size(&self) -> (usize, usize) {
        let shape = self.masks.element_shape();
        (shape[0], shape[1])
    }

    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        Self::new(self.masks.select(indices)?)
    }

    pub fn write_slice(&mut self, indices: &[usize], src: &BatchMasks) -> Result<()> {
        self.masks.write_slice(indices, &src.masks)
    }

    pub fn compact(self) -> Self {
        Self {
            masks: self.masks.compact(),
        }
    }
}

impl<'de> Deserialize<'de> for BoundingBoxes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            format: BoxFormat,
            canvas_size: CanvasSize,
            tensor: Tensor,
        }

        let parts = Parts::deserialize(deserializer)?;
        BoundingBoxes::new(parts.format, parts.canvas_size, parts.tensor)
            .map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for BatchBoundingBoxes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            format: BoxFormat,
            canvas_size: CanvasSize,
            boxes: RaggedBatch,
        }

        let parts = Parts::deserialize(deserializer)?;
        BatchBoundingBoxes::new(parts.format, parts.canvas_size, parts.boxes)
            .map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for BatchMasks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            masks: RaggedBatch,
        }

        let parts = Parts::deserialize(deserializer)?;
        BatchMasks::new(parts.masks).map_err(serde::de::Error::custom)
    }
}
