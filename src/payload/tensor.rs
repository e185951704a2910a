//! Dense row-major `f32` arrays whose leading axis is the item axis.

use image::DynamicImage;
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::error::{AugmentError, Result};

/// Owned dense array. `shape[0]` is the number of items when the array is
/// used as a batched payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor, checking that `data` matches `shape`
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(AugmentError::Shape(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Fill a tensor from its flat element index
    pub fn from_fn(shape: Vec<usize>, f: impl FnMut(usize) -> f32) -> Self {
        let len: usize = shape.iter().product();
        Self {
            shape,
            data: (0..len).map(f).collect(),
        }
    }

    /// Convert an RGB image into CHW data normalized to [0, 1]
    pub fn from_dynamic_image(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = Vec::with_capacity(3 * height as usize * width as usize);

        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    let pixel = rgb.get_pixel(x, y);
                    data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        Self {
            shape: vec![3, height as usize, width as usize],
            data,
        }
    }

    /// Stack equally shaped tensors along a new leading axis
    pub fn stack(items: &[Tensor]) -> Result<Self> {
        let first = items
            .first()
            .ok_or_else(|| AugmentError::InvalidInput("cannot stack zero tensors".to_string()))?;
        let mut shape = Vec::with_capacity(first.ndim() + 1);
        shape.push(items.len());
        shape.extend_from_slice(&first.shape);

        let mut data = Vec::with_capacity(items.len() * first.numel());
        for item in items {
            if item.shape != first.shape {
                return Err(AugmentError::Shape(format!(
                    "cannot stack {:?} with {:?}",
                    item.shape, first.shape
                )));
            }
            data.extend_from_slice(&item.data);
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Number of items along the leading axis
    pub fn batch_size(&self) -> Result<usize> {
        self.shape.first().copied().ok_or_else(|| {
            AugmentError::Shape("a zero-dimensional tensor has no batch axis".to_string())
        })
    }

    /// Shape of one item (everything after the leading axis)
    pub fn item_shape(&self) -> &[usize] {
        if self.shape.is_empty() {
            &[]
        } else {
            &self.shape[1..]
        }
    }

    pub fn item_len(&self) -> usize {
        self.item_shape().iter().product()
    }

    pub fn item(&self, index: usize) -> Result<&[f32]> {
        let batch_size = self.batch_size()?;
        if index >= batch_size {
            return Err(AugmentError::IndexOutOfBounds { index, batch_size });
        }
        let len = self.item_len();
        Ok(&self.data[index * len..(index + 1) * len])
    }

    /// Insert a leading axis of size one
    pub fn with_leading_axis(mut self) -> Self {
        self.shape.insert(0, 1);
        self
    }

    /// Gather the items at `indices` into a new tensor, in `indices` order
    pub fn select(&self, indices: &[usize]) -> Result<Tensor> {
        let batch_size = self.batch_size()?;
        let len = self.item_len();
        let mut data = Vec::with_capacity(indices.len() * len);
        for &index in indices {
            if index >= batch_size {
                return Err(AugmentError::IndexOutOfBounds { index, batch_size });
            }
            data.extend_from_slice(&self.data[index * len..(index + 1) * len]);
        }

        let mut shape = self.shape.clone();
        shape[0] = indices.len();
        Ok(Tensor { shape, data })
    }

    /// Overwrite the items at `indices` with the items of `src`, in order
    pub fn write_slice(&mut self, indices: &[usize], src: &Tensor) -> Result<()> {
        let batch_size = self.batch_size()?;
        if src.batch_size()? != indices.len() {
            return Err(AugmentError::Shape(format!(
                "slice holds {} items but {} indices were given",
                src.batch_size()?,
                indices.len()
            )));
        }
        if src.item_shape() != self.item_shape() {
            return Err(AugmentError::Shape(format!(
                "cannot write items of shape {:?} into items of shape {:?}",
                src.item_shape(),
                self.item_shape()
            )));
        }

        let len = self.item_len();
        for (j, &index) in indices.iter().enumerate() {
            if index >= batch_size {
                return Err(AugmentError::IndexOutOfBounds { index, batch_size });
            }
            self.data[index * len..(index + 1) * len]
                .copy_from_slice(&src.data[j * len..(j + 1) * len]);
        }
        Ok(())
    }

    /// Reassemble a batch of `len` items from parts whose positions cover
    /// `0..len` exactly once. All parts must share one item shape.
    pub fn scatter(len: usize, parts: Vec<(Vec<usize>, Tensor)>) -> Result<Tensor> {
        let item_shape = match parts.first() {
            Some((_, tensor)) => tensor.item_shape().to_vec(),
            None => {
                return Err(AugmentError::InvalidInput(
                    "cannot scatter zero parts".to_string(),
                ))
            }
        };
        let item_len: usize = item_shape.iter().product();

        let mut data = vec![0.0; len * item_len];
        let mut filled = vec![false; len];
        for (positions, tensor) in parts {
            if tensor.item_shape() != item_shape.as_slice() {
                return Err(AugmentError::Shape(format!(
                    "chunk outputs disagree on item shape: {:?} vs {:?}",
                    tensor.item_shape(),
                    item_shape
                )));
            }
            if tensor.batch_size()? != positions.len() {
                return Err(AugmentError::Shape(format!(
                    "chunk output holds {} items for {} positions",
                    tensor.batch_size()?,
                    positions.len()
                )));
            }
            for (j, &pos) in positions.iter().enumerate() {
                if pos >= len {
                    return Err(AugmentError::IndexOutOfBounds {
                        index: pos,
                        batch_size: len,
                    });
                }
                if filled[pos] {
                    return Err(AugmentError::InvalidInput(format!(
                        "position {} written twice",
                        pos
                    )));
                }
                filled[pos] = true;
                data[pos * item_len..(pos + 1) * item_len]
                    .copy_from_slice(&tensor.data[j * item_len..(j + 1) * item_len]);
            }
        }
        if let Some(missing) = filled.iter().position(|f| !f) {
            return Err(AugmentError::InvalidInput(format!(
                "position {} not covered by any chunk",
                missing
            )));
        }

        let mut shape = Vec::with_capacity(item_shape.len() + 1);
        shape.push(len);
        shape.extend_from_slice(&item_shape);
        Ok(Tensor { shape, data })
    }

    /// Drop spare capacity left over from slicing
    pub fn compact(mut self) -> Self {
        self.data.shrink_to_fit();
        self
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            shape: Vec<usize>,
            data: Vec<f32>,
        }

        let parts = Parts::deserialize(deserializer)?;
        Tensor::new(parts.shape, parts.data).map_err(serde::de::Error::custom)
    }
}
