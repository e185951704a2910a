//! Nearest-neighbour resize
//!
//! Changes the trailing `[H, W]` extent of every dense payload and mask and
//! rescales boxes to the new canvas. Outputs differ in shape from inputs, so
//! the engine never writes them back positionally.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{map_boxes, plane_dims};
use crate::payload::{BatchMasks, BoxFormat, CanvasSize, Payload, RaggedBatch, Tensor};
use crate::transform::{BatchTransform, ParamSet};
use crate::utils::error::{AugmentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeConfig {
    pub height: usize,
    pub width: usize,
}

#[derive(Debug, Clone)]
pub struct Resize {
    height: usize,
    width: usize,
}

impl Resize {
    pub fn new(config: ResizeConfig) -> Result<Self> {
        if config.height == 0 || config.width == 0 {
            return Err(AugmentError::Config(format!(
                "resize target must be positive, got {}x{}",
                config.height, config.width
            )));
        }
        Ok(Self {
            height: config.height,
            width: config.width,
        })
    }

    /// Resample `[.., in_h, in_w]` planes to the target size
    fn resize_planes(&self, data: &[f32], in_h: usize, in_w: usize) -> Result<Vec<f32>> {
        if in_h == 0 || in_w == 0 {
            return Err(AugmentError::Transform {
                name: self.name(),
                reason: format!("cannot resize an empty {}x{} plane", in_h, in_w),
            });
        }
        let (out_h, out_w) = (self.height, self.width);
        let num_planes = data.len() / (in_h * in_w);

        // nearest source row/column for every output row/column
        let rows: Vec<usize> = (0..out_h).map(|y| (y * in_h / out_h).min(in_h - 1)).collect();
        let cols: Vec<usize> = (0..out_w).map(|x| (x * in_w / out_w).min(in_w - 1)).collect();

        let mut output = vec![0.0; num_planes * out_h * out_w];
        output
            .par_chunks_mut(out_h * out_w)
            .zip(data.par_chunks(in_h * in_w))
            .for_each(|(dst, src)| {
                for (y, &sy) in rows.iter().enumerate() {
                    for (x, &sx) in cols.iter().enumerate() {
                        dst[y * out_w + x] = src[sy * in_w + sx];
                    }
                }
            });
        Ok(output)
    }

    fn resize_tensor(&self, tensor: &Tensor) -> Result<Tensor> {
        let (in_h, in_w) = plane_dims(tensor, self.name())?;
        let data = self.resize_planes(tensor.data(), in_h, in_w)?;
        let mut shape = tensor.shape().to_vec();
        let n = shape.len();
        shape[n - 2] = self.height;
        shape[n - 1] = self.width;
        Tensor::new(shape, data)
    }

    fn scale_boxes(&self, data: &mut [f32], format: BoxFormat, canvas: CanvasSize) {
        let sy = self.height as f32 / canvas.0.max(1) as f32;
        let sx = self.width as f32 / canvas.1.max(1) as f32;
        map_boxes(data, format, |b| [b[0] * sx, b[1] * sy, b[2] * sx, b[3] * sy]);
    }
}

impl BatchTransform for Resize {
    fn name(&self) -> &'static str {
        "Resize"
    }

    fn is_shape_altering(&self) -> bool {
        true
    }

    fn apply(&self, payload: Payload, _params: &ParamSet) -> Result<Payload> {
        let canvas = (self.height, self.width);
        Ok(match payload {
            Payload::Untyped(t) => Payload::Untyped(self.resize_tensor(&t)?),
            Payload::Image(t) => Payload::Image(self.resize_tensor(&t)?),
            Payload::BatchImages(t) => Payload::BatchImages(self.resize_tensor(&t)?),
            Payload::Video(t) => Payload::Video(self.resize_tensor(&t)?),
            Payload::BatchVideos(t) => Payload::BatchVideos(self.resize_tensor(&t)?),
            Payload::Mask(t) => Payload::Mask(self.resize_tensor(&t)?),
            Payload::BoundingBoxes(mut b) => {
                let (format, old) = (b.format, b.canvas_size);
                self.scale_boxes(b.tensor_mut().data_mut(), format, old);
                b.canvas_size = canvas;
                Payload::BoundingBoxes(b)
            }
            Payload::BatchBoundingBoxes(mut b) => {
                let (format, old) = (b.format, b.canvas_size);
                self.scale_boxes(b.boxes_mut().data_mut(), format, old);
                b.canvas_size = canvas;
                Payload::BatchBoundingBoxes(b)
            }
            Payload::BatchMasks(m) => {
                let (in_h, in_w) = m.plane_size();
                let data = self.resize_planes(m.masks().data(), in_h, in_w)?;
                let masks = RaggedBatch::new(
                    vec![self.height, self.width],
                    data,
                    m.masks().offsets().to_vec(),
                )?;
                Payload::BatchMasks(BatchMasks::new(masks)?)
            }
            other => other,
        })
    }

    fn extra_repr(&self) -> String {
        format!("size=({}, {})", self.height, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RandomApply;
    use crate::testing::{make_batch_bounding_boxes, make_batch_images, make_batch_masks};
    use crate::transform::DispatchConfig;

    fn resize(height: usize, width: usize) -> Resize {
        Resize::new(ResizeConfig { height, width }).unwrap()
    }

    #[test]
    fn test_rejects_empty_target() {
        assert!(Resize::new(ResizeConfig { height: 0, width: 4 }).is_err());
    }

    #[test]
    fn test_upscale_nearest() {
        let image = Tensor::new(vec![1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let out = resize(4, 4).apply(Payload::Image(image), &ParamSet::new()).unwrap();
        let t = out.as_tensor().unwrap();
        assert_eq!(t.shape(), &[1, 4, 4]);
        assert_eq!(
            t.data(),
            &[
                1.0, 1.0, 2.0, 2.0, //
                1.0, 1.0, 2.0, 2.0, //
                3.0, 3.0, 4.0, 4.0, //
                3.0, 3.0, 4.0, 4.0,
            ]
        );
    }

    #[test]
    fn test_downscale_keeps_leading_axes() {
        let images = make_batch_images(2, 3, 8, 6);
        let out = resize(4, 3)
            .apply(Payload::BatchImages(images), &ParamSet::new())
            .unwrap();
        assert_eq!(out.as_tensor().unwrap().shape(), &[2, 3, 4, 3]);
    }

    #[test]
    fn test_boxes_follow_canvas() {
        let boxes = make_batch_bounding_boxes(&[1], (16, 16));
        let out = resize(8, 32)
            .apply(Payload::BatchBoundingBoxes(boxes), &ParamSet::new())
            .unwrap();
        if let Payload::BatchBoundingBoxes(b) = out {
            assert_eq!(b.canvas_size, (8, 32));
            // first test box is [0, 0, 2, 3]
            assert_eq!(b.boxes().data(), &[0.0, 0.0, 4.0, 1.5]);
        } else {
            panic!("expected boxes");
        }
    }

    #[test]
    fn test_masks_keep_counts() {
        let masks = make_batch_masks(&[2, 0, 1], 4, 4);
        let out = resize(2, 2)
            .apply(Payload::BatchMasks(masks), &ParamSet::new())
            .unwrap();
        assert_eq!(out.offsets(), Some(&[0, 2, 2, 3][..]));
        if let Payload::BatchMasks(m) = out {
            assert_eq!(m.plane_size(), (2, 2));
        }
    }

    #[test]
    fn test_partial_probability_rejected_in_batch_mode() {
        assert!(RandomApply::new(resize(4, 4), DispatchConfig::batch(0.5, 1)).is_err());
    }

    #[test]
    fn test_multi_chunk_batch_resize() {
        let mut engine =
            RandomApply::new(resize(2, 2), DispatchConfig::batch(1.0, 2).with_seed(0)).unwrap();
        let out = engine
            .forward_batch(vec![
                Payload::BatchImages(make_batch_images(3, 1, 4, 4)),
                Payload::BatchMasks(make_batch_masks(&[1, 2, 0], 4, 4)),
            ])
            .unwrap();
        assert_eq!(out[0].as_tensor().unwrap().shape(), &[3, 1, 2, 2]);
        assert_eq!(out[1].offsets(), Some(&[0, 1, 3, 3][..]));
    }
}
