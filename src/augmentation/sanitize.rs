//! Removal of degenerate bounding boxes
//!
//! Boxes narrower or shorter than `min_size` are dropped, so the number of
//! boxes per item changes and batched boxes go through the offsets-rebuilding
//! merge path.

use serde::{Deserialize, Deserializer, Serialize};

use crate::payload::{BoundingBoxes, BoxFormat, Payload, PayloadKind, RaggedBatch, Tensor};
use crate::transform::{BatchTransform, ParamSet};
use crate::utils::error::{AugmentError, Result};

const BOX_KINDS: [PayloadKind; 2] = [PayloadKind::BoundingBoxes, PayloadKind::BatchBoundingBoxes];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SanitizeBoundingBoxes {
    pub min_size: f32,
}

impl Default for SanitizeBoundingBoxes {
    fn default() -> Self {
        Self { min_size: 1.0 }
    }
}

impl SanitizeBoundingBoxes {
    pub fn new(min_size: f32) -> Result<Self> {
        if !min_size.is_finite() || min_size < 0.0 {
            return Err(AugmentError::Config(format!(
                "min_size must be a non-negative number, got {}",
                min_size
            )));
        }
        Ok(Self { min_size })
    }

    /// Boxes of `data` that are large enough, in order
    fn keep(&self, data: &[f32], format: BoxFormat) -> Vec<f32> {
        data.chunks_exact(4)
            .filter(|coords| {
                let b = format.to_xyxy([coords[0], coords[1], coords[2], coords[3]]);
                b[2] - b[0] >= self.min_size && b[3] - b[1] >= self.min_size
            })
            .flatten()
            .copied()
            .collect()
    }
}

impl BatchTransform for SanitizeBoundingBoxes {
    fn name(&self) -> &'static str {
        "SanitizeBoundingBoxes"
    }

    fn transformed_kinds(&self) -> &[PayloadKind] {
        &BOX_KINDS
    }

    fn apply(&self, payload: Payload, _params: &ParamSet) -> Result<Payload> {
        match payload {
            Payload::BoundingBoxes(b) => {
                let data = self.keep(b.tensor().data(), b.format);
                let tensor = Tensor::new(vec![data.len() / 4, 4], data)?;
                Ok(Payload::BoundingBoxes(BoundingBoxes::new(
                    b.format,
                    b.canvas_size,
                    tensor,
                )?))
            }
            Payload::BatchBoundingBoxes(b) => {
                let items = (0..b.batch_size())
                    .map(|i| Ok(self.keep(b.boxes().item(i)?, b.format)))
                    .collect::<Result<Vec<_>>>()?;
                let boxes = RaggedBatch::from_items(vec![4], items)?;
                Ok(Payload::BatchBoundingBoxes(b.with_boxes(boxes)?))
            }
            other => Ok(other),
        }
    }

    fn extra_repr(&self) -> String {
        format!("min_size={}", self.min_size)
    }
}

impl<'de> Deserialize<'de> for SanitizeBoundingBoxes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            min_size: f32,
        }

        let parts = Parts::deserialize(deserializer)?;
        SanitizeBoundingBoxes::new(parts.min_size).map_err(serde::de::Error::custom)
    }
}
