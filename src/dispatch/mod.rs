//! Dispatch Module
//!
//! `RandomApply` decides, per call, whether and where a `BatchTransform` is
//! applied. In single mode the whole call is transformed or skipped. In
//! batch mode each item of the batch is considered on its own:
//!
//! 1. classify which payloads the transform touches
//! 2. draw the items to transform
//! 3. split them into chunks, each with its own sampled parameters
//! 4. transform the selected slice chunk by chunk and merge it back

pub mod applicability;
pub mod chunks;
pub mod merge;
pub mod selection;

use std::fmt;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

pub use applicability::needs_transform_list;
pub use chunks::{partition_chunks, resolve_num_chunks};
pub use selection::{sample_selection, selection_count};

use crate::payload::{Payload, Sample};
use crate::transform::{BatchTransform, DispatchConfig};
use crate::utils::error::{AugmentError, Result};
use merge::{ChunkPlan, Staged};

/// Applies a transform with probability `p`, per call or per batch item
pub struct RandomApply<T> {
    transform: T,
    config: DispatchConfig,
    rng: ChaCha8Rng,
    always: bool,
}

impl<T: BatchTransform> RandomApply<T> {
    /// Validate `config` against `transform` and build the engine
    pub fn new(transform: T, config: DispatchConfig) -> Result<Self> {
        config.validate(transform.is_shape_altering())?;
        if config.permute_chunks && config.num_chunks == 1 {
            warn!(
                "{}: permute_chunks has no effect with a single chunk",
                transform.name()
            );
        }

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            transform,
            config,
            rng,
            always: false,
        })
    }

    /// Engine that applies the transform on every call (`p` forced to 1)
    pub fn always(transform: T, config: DispatchConfig) -> Result<Self> {
        let mut engine = Self::new(transform, DispatchConfig { p: 1.0, ..config })?;
        engine.always = true;
        Ok(engine)
    }

    /// Replace the random source
    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Transform a nested sample, keeping its structure
    pub fn forward(&mut self, sample: Sample) -> Result<Sample> {
        let (flat, spec) = sample.flatten();
        let outputs = self.forward_flat(flat)?;
        spec.unflatten(outputs)
    }

    /// Transform an already flattened sample
    pub fn forward_flat(&mut self, flat: Vec<Payload>) -> Result<Vec<Payload>> {
        self.transform.check_inputs(&flat)?;
        if self.config.batch_transform {
            self.forward_batch(flat)
        } else {
            self.forward_single(flat)
        }
    }

    /// Apply the transform to every eligible payload with probability `p`,
    /// using one parameter set for the whole call
    pub fn forward_single(&mut self, flat: Vec<Payload>) -> Result<Vec<Payload>> {
        let p = self.config.p;
        if p == 0.0 || (p < 1.0 && self.rng.gen::<f64>() >= p) {
            trace!("{} skipped", self.transform.name());
            return Ok(flat);
        }

        let needs = needs_transform_list(&flat, self.transform.transformed_kinds(), false);
        let chunks = vec![vec![0]];
        let params = {
            let eligible: Vec<&Payload> = flat
                .iter()
                .zip(&needs)
                .filter(|&(_, &n)| n)
                .map(|(payload, _)| payload)
                .collect();
            self.transform
                .sample_params(&eligible, &chunks, &mut self.rng)?
        };
        let params = params.into_iter().next().ok_or_else(|| {
            AugmentError::Config(format!(
                "{} produced no parameter set",
                self.transform.name()
            ))
        })?;

        flat.into_iter()
            .zip(needs)
            .map(|(payload, needs_transform)| {
                if needs_transform {
                    self.transform.apply(payload, &params)
                } else {
                    Ok(payload)
                }
            })
            .collect()
    }

    /// Apply the transform to a random subset of the batch items
    ///
    /// Every eligible payload must hold the same number of items. Payloads
    /// that are not eligible come back untouched, in their original position.
    pub fn forward_batch(&mut self, flat: Vec<Payload>) -> Result<Vec<Payload>> {
        let p = self.config.p;
        if p == 0.0 {
            trace!("{} skipped, p is 0", self.transform.name());
            return Ok(flat);
        }

        let needs = needs_transform_list(&flat, self.transform.transformed_kinds(), true);
        let batch_size = match reference_batch_size(&flat, &needs)? {
            Some(batch_size) => batch_size,
            None => {
                trace!("{} has nothing to transform", self.transform.name());
                return Ok(flat);
            }
        };

        let selection = if p == 1.0 {
            None
        } else {
            match sample_selection(p, batch_size, &mut self.rng) {
                None => {
                    trace!("{} selected no item", self.transform.name());
                    return Ok(flat);
                }
                Some(indices) if indices.len() == batch_size => None,
                Some(indices) => Some(indices),
            }
        };
        let selected = selection.as_ref().map_or(batch_size, Vec::len);
        if selected == 0 {
            return Ok(flat);
        }

        let num_chunks = resolve_num_chunks(self.config.num_chunks, selected);
        let positions: Vec<usize> = (0..selected).collect();
        let chunks = partition_chunks(
            &positions,
            num_chunks,
            self.config.permute_chunks,
            &mut self.rng,
        );
        debug!(
            "{}: transforming {} of {} items in {} chunks",
            self.transform.name(),
            selected,
            batch_size,
            chunks.len()
        );

        let staged = flat
            .into_iter()
            .zip(&needs)
            .map(|(payload, &n)| {
                Staged::stage(payload, n, selection.as_deref(), self.config.inplace)
            })
            .collect::<Result<Vec<_>>>()?;

        let params = {
            let eligible: Vec<&Payload> = staged.iter().filter_map(Staged::working).collect();
            self.transform
                .sample_params(&eligible, &chunks, &mut self.rng)?
        };
        let plan = ChunkPlan {
            chunks: &chunks,
            params: &params,
            shape_altering: self.transform.is_shape_altering(),
        };

        staged
            .into_iter()
            .map(|s| s.finish(&self.transform, &plan, selection.as_deref()))
            .collect()
    }
}

/// Batch size shared by every eligible payload, `None` when none is eligible
fn reference_batch_size(flat: &[Payload], needs: &[bool]) -> Result<Option<usize>> {
    let mut reference = None;
    for (payload, _) in flat.iter().zip(needs).filter(|&(_, &n)| n) {
        let batch_size = payload.batch_size()?;
        match reference {
            None => reference = Some(batch_size),
            Some(expected) if expected != batch_size => {
                return Err(AugmentError::BatchSizeMismatch {
                    expected,
                    got: batch_size,
                })
            }
            Some(_) => {}
        }
    }
    Ok(reference)
}

impl<T: BatchTransform> fmt::Display for RandomApply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exclude = Vec::new();
        if self.always {
            exclude.push("p");
        }

        let parts: Vec<String> = [self.transform.extra_repr(), self.config.describe(&exclude)]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        write!(f, "{}({})", self.transform.name(), parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{PayloadKind, Tensor};
    use crate::testing::{make_batch_bounding_boxes, make_batch_images, make_image};
    use crate::transform::ParamSet;
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Adds 1 + chunk number to every dense element
    struct Mark;

    impl BatchTransform for Mark {
        fn name(&self) -> &'static str {
            "Mark"
        }

        fn sample_params(
            &self,
            _eligible: &[&Payload],
            chunks: &[Vec<usize>],
            _rng: &mut dyn RngCore,
        ) -> Result<Vec<ParamSet>> {
            Ok((0..chunks.len())
                .map(|i| ParamSet::new().with_float("value", (i + 1) as f64))
                .collect())
        }

        fn apply(&self, mut payload: Payload, params: &ParamSet) -> Result<Payload> {
            let value = params.get_float("value")? as f32;
            if let Some(t) = payload.as_tensor_mut() {
                t.data_mut().iter_mut().for_each(|v| *v += value);
            }
            Ok(payload)
        }
    }

    struct Failing;

    impl BatchTransform for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn apply(&self, _payload: Payload, _params: &ParamSet) -> Result<Payload> {
            Err(AugmentError::Transform {
                name: "Failing",
                reason: "kernel error".to_string(),
            })
        }
    }

    fn engine(config: DispatchConfig) -> RandomApply<Mark> {
        RandomApply::new(Mark, config.with_seed(11)).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(RandomApply::new(Mark, DispatchConfig::single(2.0)).is_err());
    }

    #[test]
    fn test_single_p_zero_is_identity() {
        let mut e = engine(DispatchConfig::single(0.0));
        let flat = vec![Payload::Image(make_image(3, 2, 2)), Payload::Value(json!(1))];
        assert_eq!(e.forward_flat(flat.clone()).unwrap(), flat);
    }

    #[test]
    fn test_single_p_one_transforms_eligible() {
        let mut e = engine(DispatchConfig::single(1.0));
        let image = make_image(1, 1, 2);
        let flat = vec![Payload::Image(image.clone()), Payload::Value(json!("label"))];
        let out = e.forward_flat(flat).unwrap();

        let expected: Vec<f32> = image.data().iter().map(|v| v + 1.0).collect();
        assert_eq!(out[0].as_tensor().unwrap().data(), expected.as_slice());
        assert_eq!(out[1], Payload::Value(json!("label")));
    }

    #[test]
    fn test_single_rate_matches_probability() {
        let mut e = engine(DispatchConfig::single(0.3));
        let trials = 5_000;
        let mut applied = 0;
        for _ in 0..trials {
            let out = e
                .forward_single(vec![Payload::Image(Tensor::zeros(vec![1, 1, 1]))])
                .unwrap();
            if out[0].as_tensor().unwrap().data()[0] != 0.0 {
                applied += 1;
            }
        }
        let rate = applied as f64 / trials as f64;
        assert!((rate - 0.3).abs() < 0.03, "rate was {}", rate);
    }

    #[test]
    fn test_batch_p_zero_is_identity() {
        let mut e = engine(DispatchConfig::batch(0.0, 1));
        let flat = vec![Payload::BatchImages(make_batch_images(4, 1, 2, 2))];
        assert_eq!(e.forward_flat(flat.clone()).unwrap(), flat);
    }

    #[test]
    fn test_batch_p_one_transforms_every_item() {
        let mut e = engine(DispatchConfig::batch(1.0, 2));
        let images = Tensor::zeros(vec![4, 1, 1, 1]);
        let ptr = images.data().as_ptr();
        let out = e.forward_batch(vec![Payload::BatchImages(images)]).unwrap();
        let t = out[0].as_tensor().unwrap();
        assert_eq!(t.data(), &[1.0, 1.0, 2.0, 2.0]);
        // every item selected: the payload is transformed without a copy
        assert_eq!(t.data().as_ptr(), ptr);
    }

    #[test]
    fn test_batch_one_chunk_per_item() {
        let mut e = engine(DispatchConfig::batch(1.0, -1));
        let out = e
            .forward_batch(vec![Payload::BatchImages(Tensor::zeros(vec![3, 1, 1, 1]))])
            .unwrap();
        assert_eq!(out[0].as_tensor().unwrap().data(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_batch_partial_selection() {
        let mut e = engine(DispatchConfig::batch(0.5, 1));
        for _ in 0..50 {
            let out = e
                .forward_batch(vec![Payload::BatchImages(Tensor::zeros(vec![6, 1, 1, 1]))])
                .unwrap();
            let changed = out[0]
                .as_tensor()
                .unwrap()
                .data()
                .iter()
                .filter(|&&v| v != 0.0)
                .count();
            assert_eq!(changed, 3);
        }
    }

    #[test]
    fn test_batch_not_inplace_allocates_new_buffer() {
        let mut e = engine(DispatchConfig::batch(0.4, 1));
        let images = make_batch_images(5, 1, 2, 2);
        let original = images.clone();
        let ptr = images.data().as_ptr();

        let out = e.forward_batch(vec![Payload::BatchImages(images)]).unwrap();
        let t = out[0].as_tensor().unwrap();
        assert_ne!(t.data().as_ptr(), ptr);

        let changed: Vec<usize> = (0..5)
            .filter(|&i| t.item(i).unwrap() != original.item(i).unwrap())
            .collect();
        assert_eq!(changed.len(), 2);
        for i in changed {
            let expected: Vec<f32> = original.item(i).unwrap().iter().map(|v| v + 1.0).collect();
            assert_eq!(t.item(i).unwrap(), expected.as_slice());
        }
    }

    #[test]
    fn test_batch_inplace_reuses_buffer() {
        let mut e = engine(DispatchConfig::batch(0.4, 1).with_inplace(true));
        let images = make_batch_images(5, 1, 2, 2);
        let ptr = images.data().as_ptr();

        let out = e.forward_batch(vec![Payload::BatchImages(images)]).unwrap();
        assert_eq!(out[0].as_tensor().unwrap().data().as_ptr(), ptr);
    }

    #[test]
    fn test_partial_batch_keeps_pass_through_positions() {
        let mut e = engine(DispatchConfig::batch(0.5, 2));
        let label = Payload::Value(json!({"class": 4}));
        let boxes = Payload::BatchBoundingBoxes(make_batch_bounding_boxes(&[1, 2, 0, 1], (16, 16)));
        let flat = vec![
            label.clone(),
            Payload::BatchImages(make_batch_images(4, 1, 2, 2)),
            boxes.clone(),
        ];

        let out = e.forward_batch(flat).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], label);
        assert_eq!(out[1].kind(), PayloadKind::BatchImages);
        // Mark only shifts dense data, so the boxes come back unchanged
        assert_eq!(out[2], boxes);
    }

    #[test]
    fn test_untyped_next_to_images_passes_through() {
        let mut e = engine(DispatchConfig::batch(1.0, 1));
        let extra = Payload::Untyped(Tensor::zeros(vec![7, 2]));
        let flat = vec![
            Payload::BatchImages(Tensor::zeros(vec![2, 1, 1, 1])),
            extra.clone(),
        ];
        let out = e.forward_batch(flat).unwrap();
        assert_eq!(out[1], extra);
        assert_eq!(out[0].as_tensor().unwrap().data(), &[1.0, 1.0]);
    }

    #[test]
    fn test_batch_size_mismatch() {
        let mut e = engine(DispatchConfig::batch(0.5, 1));
        let flat = vec![
            Payload::BatchImages(make_batch_images(4, 1, 2, 2)),
            Payload::BatchBoundingBoxes(make_batch_bounding_boxes(&[1, 1, 1], (16, 16))),
        ];
        assert!(matches!(
            e.forward_batch(flat),
            Err(AugmentError::BatchSizeMismatch {
                expected: 4,
                got: 3
            })
        ));
    }

    #[test]
    fn test_single_item_kinds_need_batch_axis_in_batch_mode() {
        let mut e = engine(DispatchConfig::batch(0.5, 1));
        let flat = vec![Payload::Image(make_image(3, 2, 2))];
        assert!(matches!(
            e.forward_batch(flat),
            Err(AugmentError::MissingCapability { .. })
        ));
    }

    #[test]
    fn test_transform_error_aborts_call() {
        let mut e = RandomApply::new(Failing, DispatchConfig::batch(0.5, 2).with_seed(1)).unwrap();
        let flat = vec![Payload::BatchImages(make_batch_images(4, 1, 2, 2))];
        assert!(matches!(
            e.forward_batch(flat),
            Err(AugmentError::Transform { name: "Failing", .. })
        ));
    }

    #[test]
    fn test_forward_keeps_tree_structure() {
        let mut e = engine(DispatchConfig::single(1.0));
        let mut target = BTreeMap::new();
        target.insert("label".to_string(), Sample::Leaf(Payload::Value(json!(2))));
        let sample = Sample::Seq(vec![
            Sample::Leaf(Payload::Image(Tensor::zeros(vec![1, 1, 1]))),
            Sample::Map(target.clone()),
        ]);

        let out = e.forward(sample).unwrap();
        let expected = Sample::Seq(vec![
            Sample::Leaf(Payload::Image(Tensor::new(vec![1, 1, 1], vec![1.0]).unwrap())),
            Sample::Map(target),
        ]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_same_seed_same_result() {
        let run = || {
            let mut e = engine(DispatchConfig::batch(0.5, 3).with_permute_chunks(true));
            e.forward_batch(vec![Payload::BatchImages(Tensor::zeros(vec![8, 1, 1, 1]))])
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_display() {
        let e = engine(DispatchConfig::batch(0.5, 2));
        assert_eq!(
            e.to_string(),
            "Mark(p=0.5, inplace=false, num_chunks=2, permute_chunks=false, seed=11, batch_transform=true)"
        );

        let always = RandomApply::always(Mark, DispatchConfig::default()).unwrap();
        assert_eq!(always.to_string(), "Mark()");
    }
}
