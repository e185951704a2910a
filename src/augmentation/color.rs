//! Colour jitter
//!
//! Random brightness and contrast factors, drawn once per chunk and applied
//! in a random order. Works on pixel data in [0, 1]; annotations pass
//! through untouched.

use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::payload::{Payload, PayloadKind, Tensor};
use crate::transform::{BatchTransform, ParamSet, ParamValue};
use crate::utils::error::{AugmentError, Result};

/// A jitter strength: either `v` (meaning `[1 - v, 1 + v]`) or an explicit
/// `[lo, hi]` range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JitterRange {
    Scalar(f64),
    Range(f64, f64),
}

impl Default for JitterRange {
    fn default() -> Self {
        JitterRange::Scalar(0.0)
    }
}

/// Turn a jitter strength into a factor range around `center`
///
/// Returns `None` for the neutral range `[center, center]`.
pub fn check_range(
    value: JitterRange,
    name: &str,
    center: f64,
    bound: (f64, f64),
    clip_first_on_zero: bool,
) -> Result<Option<(f64, f64)>> {
    let (lo, hi) = match value {
        JitterRange::Scalar(v) => {
            if v < 0.0 {
                return Err(AugmentError::Config(format!(
                    "if {} is a single number, it must be non negative",
                    name
                )));
            }
            let lo = center - v;
            (if clip_first_on_zero { lo.max(0.0) } else { lo }, center + v)
        }
        JitterRange::Range(lo, hi) => (lo, hi),
    };

    if !lo.is_finite() || !hi.is_finite() {
        return Err(AugmentError::Config(format!(
            "{} range must be finite, got [{}, {}]",
            name, lo, hi
        )));
    }
    if !(bound.0 <= lo && lo <= hi && hi <= bound.1) {
        return Err(AugmentError::Config(format!(
            "{} values should be between {:?}, but got [{}, {}]",
            name, bound, lo, hi
        )));
    }

    if lo == center && hi == center {
        Ok(None)
    } else {
        Ok(Some((lo, hi)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorJitterConfig {
    #[serde(default)]
    pub brightness: JitterRange,
    #[serde(default)]
    pub contrast: JitterRange,
}

#[derive(Debug, Clone)]
pub struct ColorJitter {
    brightness: Option<(f64, f64)>,
    contrast: Option<(f64, f64)>,
}

const BRIGHTNESS: usize = 0;
const CONTRAST: usize = 1;

impl ColorJitter {
    pub fn new(config: &ColorJitterConfig) -> Result<Self> {
        Ok(Self {
            brightness: check_range(config.brightness, "brightness", 1.0, (0.0, f64::INFINITY), true)?,
            contrast: check_range(config.contrast, "contrast", 1.0, (0.0, f64::INFINITY), true)?,
        })
    }

    pub fn brightness(&self) -> Option<(f64, f64)> {
        self.brightness
    }

    pub fn contrast(&self) -> Option<(f64, f64)> {
        self.contrast
    }
}

/// Number of values in one image and its channel count
///
/// Dense layouts end in `[C, H, W]`; a bare `[H, W]` array is one
/// single-channel image.
fn image_layout(tensor: &Tensor, name: &'static str) -> Result<(usize, usize)> {
    let shape = tensor.shape();
    match shape.len() {
        0 | 1 => Err(AugmentError::Transform {
            name,
            reason: format!("expected at least 2 dimensions, got shape {:?}", shape),
        }),
        2 => Ok((shape[0] * shape[1], 1)),
        n => Ok((shape[n - 3..].iter().product(), shape[n - 3])),
    }
}

fn adjust_brightness(data: &mut [f32], factor: f32) {
    data.par_iter_mut()
        .for_each(|v| *v = (*v * factor).clamp(0.0, 1.0));
}

/// Blend every image with its mean luminance
fn adjust_contrast(data: &mut [f32], image_len: usize, channels: usize, factor: f32) {
    if image_len == 0 {
        return;
    }
    let plane = image_len / channels;
    data.par_chunks_mut(image_len).for_each(|image| {
        let mean = if channels == 3 && plane > 0 {
            let (r, rest) = image.split_at(plane);
            let (g, b) = rest.split_at(plane);
            let sum: f64 = r
                .iter()
                .zip(g)
                .zip(b)
                .map(|((&r, &g), &b)| 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64)
                .sum();
            (sum / plane as f64) as f32
        } else {
            (image.iter().map(|&v| v as f64).sum::<f64>() / image.len() as f64) as f32
        };
        for v in image.iter_mut() {
            *v = (mean + factor * (*v - mean)).clamp(0.0, 1.0);
        }
    });
}

impl BatchTransform for ColorJitter {
    fn name(&self) -> &'static str {
        "ColorJitter"
    }

    fn transformed_kinds(&self) -> &[PayloadKind] {
        &PayloadKind::IMAGE_LIKE
    }

    fn sample_params(
        &self,
        _eligible: &[&Payload],
        chunks: &[Vec<usize>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<ParamSet>> {
        let mut params = Vec::with_capacity(chunks.len());
        for _ in chunks {
            let mut order = vec![BRIGHTNESS, CONTRAST];
            order.shuffle(&mut *rng);

            let mut set = ParamSet::new().with("order", ParamValue::Indices(order));
            if let Some((lo, hi)) = self.brightness {
                set = set.with_float("brightness", rng.gen_range(lo..=hi));
            }
            if let Some((lo, hi)) = self.contrast {
                set = set.with_float("contrast", rng.gen_range(lo..=hi));
            }
            params.push(set);
        }
        Ok(params)
    }

    fn apply(&self, payload: Payload, params: &ParamSet) -> Result<Payload> {
        let kind = payload.kind();
        if !self.transformed_kinds().contains(&kind) {
            return Ok(payload);
        }
        let mut payload = payload;
        let tensor = payload.as_tensor_mut().ok_or(AugmentError::MissingCapability {
            kind,
            capability: "tensor",
        })?;
        let (image_len, channels) = image_layout(tensor, self.name())?;

        for &op in params.get_indices("order")? {
            match op {
                BRIGHTNESS if self.brightness.is_some() => {
                    let factor = params.get_float("brightness")? as f32;
                    adjust_brightness(tensor.data_mut(), factor);
                }
                CONTRAST if self.contrast.is_some() => {
                    let factor = params.get_float("contrast")? as f32;
                    adjust_contrast(tensor.data_mut(), image_len, channels, factor);
                }
                _ => {}
            }
        }
        Ok(payload)
    }

    fn extra_repr(&self) -> String {
        let mut parts = Vec::new();
        if let Some((lo, hi)) = self.brightness {
            parts.push(format!("brightness=({}, {})", lo, hi));
        }
        if let Some((lo, hi)) = self.contrast {
            parts.push(format!("contrast=({}, {})", lo, hi));
        }
        parts.join(", ")
    }
}
