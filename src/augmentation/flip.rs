//! Horizontal and vertical flips
//!
//! Pixels, masks and boxes are mirrored together. Flips take no
//! parameters, so every chunk gets the same (empty) parameter set.

use rayon::prelude::*;

use super::{map_boxes, plane_dims};
use crate::payload::{BoxFormat, CanvasSize, Payload, Tensor};
use crate::transform::{BatchTransform, ParamSet};
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Mirror the trailing `[H, W]` planes of `data`
fn flip_planes(data: &mut [f32], height: usize, width: usize, axis: Axis) {
    if height == 0 || width == 0 {
        return;
    }
    match axis {
        Axis::Horizontal => data.par_chunks_mut(width).for_each(|row| row.reverse()),
        Axis::Vertical => data.par_chunks_mut(height * width).for_each(|plane| {
            for r in 0..height / 2 {
                let (top, bottom) = plane.split_at_mut((height - 1 - r) * width);
                top[r * width..(r + 1) * width].swap_with_slice(&mut bottom[..width]);
            }
        }),
    }
}

fn flip_tensor(tensor: &mut Tensor, axis: Axis, name: &'static str) -> Result<()> {
    let (height, width) = plane_dims(tensor, name)?;
    flip_planes(tensor.data_mut(), height, width, axis);
    Ok(())
}

fn flip_box_data(data: &mut [f32], format: BoxFormat, canvas: CanvasSize, axis: Axis) {
    let (height, width) = (canvas.0 as f32, canvas.1 as f32);
    match axis {
        Axis::Horizontal => map_boxes(data, format, |b| [width - b[2], b[1], width - b[0], b[3]]),
        Axis::Vertical => map_boxes(data, format, |b| [b[0], height - b[3], b[2], height - b[1]]),
    }
}

fn flip_payload(payload: Payload, axis: Axis, name: &'static str) -> Result<Payload> {
    let mut payload = payload;
    match &mut payload {
        Payload::Untyped(t)
        | Payload::Image(t)
        | Payload::BatchImages(t)
        | Payload::Video(t)
        | Payload::BatchVideos(t)
        | Payload::Mask(t) => flip_tensor(t, axis, name)?,
        Payload::BoundingBoxes(b) => {
            let (format, canvas) = (b.format, b.canvas_size);
            flip_box_data(b.tensor_mut().data_mut(), format, canvas, axis);
        }
        Payload::BatchBoundingBoxes(b) => {
            let (format, canvas) = (b.format, b.canvas_size);
            flip_box_data(b.boxes_mut().data_mut(), format, canvas, axis);
        }
        Payload::BatchMasks(m) => {
            let (height, width) = m.plane_size();
            flip_planes(m.masks_mut().data_mut(), height, width, axis);
        }
        Payload::Value(_) => {}
    }
    Ok(payload)
}

/// Mirror along the width axis
#[derive(Debug, Clone, Copy, Default)]
pub struct HorizontalFlip;

impl BatchTransform for HorizontalFlip {
    fn name(&self) -> &'static str {
        "HorizontalFlip"
    }

    fn apply(&self, payload: Payload, _params: &ParamSet) -> Result<Payload> {
        flip_payload(payload, Axis::Horizontal, self.name())
    }
}

/// Mirror along the height axis
#[derive(Debug, Clone, Copy, Default)]
pub struct VerticalFlip;

impl BatchTransform for VerticalFlip {
    fn name(&self) -> &'static str {
        "VerticalFlip"
    }

    fn apply(&self, payload: Payload, _params: &ParamSet) -> Result<Payload> {
        flip_payload(payload, Axis::Vertical, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RandomApply;
    use crate::payload::{BatchBoundingBoxes, BatchMasks, BoundingBoxes, RaggedBatch};
    use crate::testing::{
        make_batch_bounding_boxes, make_batch_images, make_bounding_boxes, make_image, make_mask,
    };
    use crate::transform::DispatchConfig;

    #[test]
    fn test_horizontal_flip_image() {
        let image = Tensor::new(vec![1, 2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let out = HorizontalFlip
            .apply(Payload::Image(image), &ParamSet::new())
            .unwrap();
        assert_eq!(out.as_tensor().unwrap().data(), &[3.0, 2.0, 1.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn test_vertical_flip_image() {
        let image = Tensor::new(vec![1, 3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let out = VerticalFlip
            .apply(Payload::Image(image), &ParamSet::new())
            .unwrap();
        assert_eq!(out.as_tensor().unwrap().data(), &[5.0, 6.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_double_flip_is_identity() {
        let image = make_image(3, 5, 4);
        let once = HorizontalFlip
            .apply(Payload::Image(image.clone()), &ParamSet::new())
            .unwrap();
        let twice = HorizontalFlip.apply(once, &ParamSet::new()).unwrap();
        assert_eq!(twice, Payload::Image(image));
    }

    #[test]
    fn test_flip_boxes_every_format() {
        let xyxy = [1.0, 2.0, 4.0, 8.0];
        for format in [BoxFormat::Xyxy, BoxFormat::Xywh, BoxFormat::Cxcywh] {
            let tensor = Tensor::new(vec![1, 4], format.from_xyxy(xyxy).to_vec()).unwrap();
            let boxes = BoundingBoxes::new(format, (10, 10), tensor).unwrap();
            let out = HorizontalFlip
                .apply(Payload::BoundingBoxes(boxes), &ParamSet::new())
                .unwrap();
            let data = out.as_tensor().unwrap().data();
            let flipped = format.to_xyxy([data[0], data[1], data[2], data[3]]);
            assert_eq!(flipped, [6.0, 2.0, 9.0, 8.0], "format {}", format);
        }
    }

    #[test]
    fn test_vertical_flip_batch_boxes() {
        let ragged = RaggedBatch::from_counts(vec![4], vec![0.0, 1.0, 2.0, 3.0], &[1, 0]).unwrap();
        let boxes = BatchBoundingBoxes::new(BoxFormat::Xyxy, (10, 20), ragged).unwrap();
        let out = VerticalFlip
            .apply(Payload::BatchBoundingBoxes(boxes), &ParamSet::new())
            .unwrap();
        assert_eq!(out.offsets(), Some(&[0, 1, 1][..]));
        if let Payload::BatchBoundingBoxes(b) = out {
            assert_eq!(b.boxes().data(), &[0.0, 7.0, 2.0, 9.0]);
        }
    }

    #[test]
    fn test_flip_batch_masks() {
        let ragged = RaggedBatch::from_counts(vec![1, 2], vec![1.0, 0.0, 0.0, 1.0], &[2]).unwrap();
        let masks = BatchMasks::new(ragged).unwrap();
        let out = HorizontalFlip
            .apply(Payload::BatchMasks(masks), &ParamSet::new())
            .unwrap();
        if let Payload::BatchMasks(m) = out {
            assert_eq!(m.masks().data(), &[0.0, 1.0, 1.0, 0.0]);
        } else {
            panic!("expected masks");
        }
    }

    #[test]
    fn test_flip_rejects_vectors() {
        let result = HorizontalFlip.apply(Payload::Untyped(Tensor::zeros(vec![4])), &ParamSet::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_flip_keeps_images_and_boxes_consistent() {
        let mut engine =
            RandomApply::new(HorizontalFlip, DispatchConfig::batch(0.5, 2).with_seed(3)).unwrap();
        let images = make_batch_images(4, 1, 4, 4);
        let boxes = make_batch_bounding_boxes(&[1, 1, 1, 1], (4, 16));
        let out = engine
            .forward_batch(vec![
                Payload::BatchImages(images.clone()),
                Payload::BatchBoundingBoxes(boxes.clone()),
            ])
            .unwrap();

        let out_images = out[0].as_tensor().unwrap();
        let out_boxes = match &out[1] {
            Payload::BatchBoundingBoxes(b) => b,
            _ => panic!("expected boxes"),
        };
        let mut flipped = 0;
        for i in 0..4 {
            let image_changed = out_images.item(i).unwrap() != images.item(i).unwrap();
            let boxes_changed = out_boxes.boxes().item(i).unwrap() != boxes.boxes().item(i).unwrap();
            assert_eq!(image_changed, boxes_changed, "item {}", i);
            flipped += usize::from(image_changed);
        }
        assert_eq!(flipped, 2);
    }

    #[test]
    fn test_single_mode_flips_image_mask_and_boxes_together() {
        let mut engine =
            RandomApply::new(VerticalFlip, DispatchConfig::single(1.0).with_seed(5)).unwrap();
        let image = make_image(3, 4, 4);
        let mask = make_mask(4, 4);
        let boxes = make_bounding_boxes(2, (4, 8));
        let out = engine
            .forward_flat(vec![
                Payload::Image(image.clone()),
                Payload::Mask(mask.clone()),
                Payload::BoundingBoxes(boxes),
            ])
            .unwrap();

        let params = ParamSet::new();
        let expected_image = VerticalFlip.apply(Payload::Image(image), &params).unwrap();
        let expected_mask = VerticalFlip.apply(Payload::Mask(mask), &params).unwrap();
        assert_eq!(out[0], expected_image);
        assert_eq!(out[1], expected_mask);
        // boxes [0, 0, 2, 3] and [1, 1, 4, 4] on a canvas of height 4
        assert_eq!(
            out[2].as_tensor().unwrap().data(),
            &[0.0, 1.0, 2.0, 4.0, 1.0, 0.0, 4.0, 3.0]
        );
    }
}
