//! Variable-length batched storage
//!
//! A `RaggedBatch` packs B items whose element counts differ into one flat
//! buffer. Item `i` owns the elements `offsets[i]..offsets[i + 1]`; each
//! element has the fixed shape `element_shape` (`[4]` for boxes, `[H, W]`
//! for instance masks).

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::error::{AugmentError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaggedBatch {
    element_shape: Vec<usize>,
    data: Vec<f32>,
    offsets: Vec<usize>,
}

impl RaggedBatch {
    /// Create a batch from flat data and an offsets table (in elements)
    pub fn new(element_shape: Vec<usize>, data: Vec<f32>, offsets: Vec<usize>) -> Result<Self> {
        if offsets.first() != Some(&0) {
            return Err(AugmentError::Shape(
                "offsets table must start with 0".to_string(),
            ));
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(AugmentError::Shape(
                "offsets table must be non-decreasing".to_string(),
            ));
        }
        let element_len: usize = element_shape.iter().product();
        if element_len == 0 {
            return Err(AugmentError::Shape(format!(
                "element shape {:?} holds no values",
                element_shape
            )));
        }
        let total = offsets[offsets.len() - 1];
        if total * element_len != data.len() {
            return Err(AugmentError::Shape(format!(
                "offsets describe {} elements of {} values but data holds {} values",
                total,
                element_len,
                data.len()
            )));
        }
        Ok(Self {
            element_shape,
            data,
            offsets,
        })
    }

    /// Create a batch from flat data and per-item element counts
    pub fn from_counts(element_shape: Vec<usize>, data: Vec<f32>, counts: &[usize]) -> Result<Self> {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        offsets.push(0);
        let mut acc = 0;
        for &count in counts {
            acc += count;
            offsets.push(acc);
        }
        Self::new(element_shape, data, offsets)
    }

    /// Create a batch from one flat value buffer per item
    pub fn from_items(element_shape: Vec<usize>, items: Vec<Vec<f32>>) -> Result<Self> {
        let element_len: usize = element_shape.iter().product();
        let mut counts = Vec::with_capacity(items.len());
        let mut data = Vec::with_capacity(items.iter().map(Vec::len).sum());
        for (i, item) in items.into_iter().enumerate() {
            if element_len == 0 || item.len() % element_len != 0 {
                return Err(AugmentError::Shape(format!(
                    "item {} holds {} values, not a multiple of element size {}",
                    i,
                    item.len(),
                    element_len
                )));
            }
            counts.push(item.len() / element_len);
            data.extend(item);
        }
        Self::from_counts(element_shape, data, &counts)
    }

    /// A batch of `batch_size` items with no elements
    pub fn empty(element_shape: Vec<usize>, batch_size: usize) -> Result<Self> {
        Self::new(element_shape, Vec::new(), vec![0; batch_size + 1])
    }

    pub fn batch_size(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn element_shape(&self) -> &[usize] {
        &self.element_shape
    }

    pub fn element_len(&self) -> usize {
        self.element_shape.iter().product()
    }

    pub fn num_elements(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Element count of every item
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Flat values of item `index`
    pub fn item(&self, index: usize) -> Result<&[f32]> {
        let batch_size = self.batch_size();
        if index >= batch_size {
            return Err(AugmentError::IndexOutOfBounds { index, batch_size });
        }
        let len = self.element_len();
        Ok(&self.data[self.offsets[index] * len..self.offsets[index + 1] * len])
    }

    /// Gather the items at `indices`, renumbering the offsets table
    pub fn select(&self, indices: &[usize]) -> Result<RaggedBatch> {
        let mut items = Vec::with_capacity(indices.len());
        for &index in indices {
            items.push(self.item(index)?.to_vec());
        }
        Self::from_items(self.element_shape.clone(), items)
    }

    /// Replace the items at `indices` with the items of `src`, in order
    ///
    /// Element counts may change; the offsets table is rebuilt and every
    /// item outside `indices` is copied through untouched.
    pub fn write_slice(&mut self, indices: &[usize], src: &RaggedBatch) -> Result<()> {
        if src.element_shape != self.element_shape {
            return Err(AugmentError::Shape(format!(
                "cannot write elements of shape {:?} into elements of shape {:?}",
                src.element_shape, self.element_shape
            )));
        }
        if src.batch_size() != indices.len() {
            return Err(AugmentError::Shape(format!(
                "slice holds {} items but {} indices were given",
                src.batch_size(),
                indices.len()
            )));
        }

        let batch_size = self.batch_size();
        let mut replacement: HashMap<usize, usize> = HashMap::with_capacity(indices.len());
        for (j, &index) in indices.iter().enumerate() {
            if index >= batch_size {
                return Err(AugmentError::IndexOutOfBounds { index, batch_size });
            }
            if replacement.insert(index, j).is_some() {
                return Err(AugmentError::InvalidInput(format!(
                    "index {} written twice",
                    index
                )));
            }
        }

        let mut data = Vec::with_capacity(self.data.len() + src.data.len());
        let mut offsets = Vec::with_capacity(batch_size + 1);
        offsets.push(0);
        let mut total = 0;
        for i in 0..batch_size {
            let (values, count) = match replacement.get(&i) {
                Some(&j) => (src.item(j)?, src.offsets[j + 1] - src.offsets[j]),
                None => (self.item(i)?, self.offsets[i + 1] - self.offsets[i]),
            };
            data.extend_from_slice(values);
            total += count;
            offsets.push(total);
        }

        self.data = data;
        self.offsets = offsets;
        Ok(())
    }

    /// Rebuild a batch of `len` items from parts whose positions cover
    /// `0..len` exactly once
    pub fn scatter(len: usize, parts: Vec<(Vec<usize>, RaggedBatch)>) -> Result<RaggedBatch> {
        let element_shape = match parts.first() {
            Some((_, batch)) => batch.element_shape.clone(),
            None => {
                return Err(AugmentError::InvalidInput(
                    "cannot scatter zero parts".to_string(),
                ))
            }
        };

        let mut items: Vec<Option<Vec<f32>>> = vec![None; len];
        for (positions, batch) in parts {
            if batch.element_shape != element_shape {
                return Err(AugmentError::Shape(format!(
                    "chunk outputs disagree on element shape: {:?} vs {:?}",
                    batch.element_shape, element_shape
                )));
            }
            if batch.batch_size() != positions.len() {
                return Err(AugmentError::Shape(format!(
                    "chunk output holds {} items for {} positions",
                    batch.batch_size(),
                    positions.len()
                )));
            }
            for (j, &pos) in positions.iter().enumerate() {
                let slot = items.get_mut(pos).ok_or(AugmentError::IndexOutOfBounds {
                    index: pos,
                    batch_size: len,
                })?;
                if slot.is_some() {
                    return Err(AugmentError::InvalidInput(format!(
                        "position {} written twice",
                        pos
                    )));
                }
                *slot = Some(batch.item(j)?.to_vec());
            }
        }

        let items = items
            .into_iter()
            .enumerate()
            .map(|(pos, item)| {
                item.ok_or_else(|| {
                    AugmentError::InvalidInput(format!("position {} not covered by any chunk", pos))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_items(element_shape, items)
    }

    /// Drop spare capacity left over from rebuilding
    pub fn compact(mut self) -> Self {
        self.data.shrink_to_fit();
        self.offsets.shrink_to_fit();
        self
    }
}

impl<'de> Deserialize<'de> for RaggedBatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            element_shape: Vec<usize>,
            data: Vec<f32>,
            offsets: Vec<usize>,
        }

        let parts = Parts::deserialize(deserializer)?;
        RaggedBatch::new(parts.element_shape, parts.data, parts.offsets)
            .map_err(serde::de::Error::custom)
    }
}
