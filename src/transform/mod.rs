//! Transform Module
//!
//! The contract between the dispatch engine and the augmentations it drives.
//! A transform samples one `ParamSet` per chunk and applies it to one
//! payload slice at a time; it never sees the selection logic.

pub mod config;

use std::collections::BTreeMap;

use rand::RngCore;

pub use config::DispatchConfig;

use crate::payload::{Payload, PayloadKind};
use crate::utils::error::{AugmentError, Result};

/// A single sampled parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Floats(Vec<f64>),
    Indices(Vec<usize>),
}

/// Immutable parameters shared by every payload of one chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a value
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn with_float(self, key: impl Into<String>, value: f64) -> Self {
        self.with(key, ParamValue::Float(value))
    }

    pub fn with_bool(self, key: impl Into<String>, value: bool) -> Self {
        self.with(key, ParamValue::Bool(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Result<&ParamValue> {
        self.values
            .get(key)
            .ok_or_else(|| AugmentError::MissingParam(key.to_string()))
    }

    fn wrong_type(key: &str, expected: &str, got: &ParamValue) -> AugmentError {
        AugmentError::InvalidInput(format!(
            "parameter '{}' should be {}, got {:?}",
            key, expected, got
        ))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(Self::wrong_type(key, "a bool", other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(Self::wrong_type(key, "an integer", other)),
        }
    }

    /// Float value; integers are widened
    pub fn get_float(&self, key: &str) -> Result<f64> {
        match self.get(key)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(Self::wrong_type(key, "a float", other)),
        }
    }

    pub fn get_floats(&self, key: &str) -> Result<&[f64]> {
        match self.get(key)? {
            ParamValue::Floats(v) => Ok(v),
            other => Err(Self::wrong_type(key, "a list of floats", other)),
        }
    }

    pub fn get_indices(&self, key: &str) -> Result<&[usize]> {
        match self.get(key)? {
            ParamValue::Indices(v) => Ok(v),
            other => Err(Self::wrong_type(key, "a list of indices", other)),
        }
    }
}

/// An augmentation the dispatch engine can drive
///
/// `apply` receives one payload slice by value and returns its transformed
/// version. Transforms that keep shapes are free to mutate the buffer they
/// were handed.
pub trait BatchTransform {
    fn name(&self) -> &'static str;

    /// Payload kinds this transform knows how to handle
    fn transformed_kinds(&self) -> &[PayloadKind] {
        &PayloadKind::ARRAYS
    }

    /// Whether outputs may differ in per-item shape from inputs
    fn is_shape_altering(&self) -> bool {
        false
    }

    /// Validation hook run on the flattened input before dispatch
    fn check_inputs(&self, _flat: &[Payload]) -> Result<()> {
        Ok(())
    }

    /// Sample one parameter set per chunk
    ///
    /// `eligible` holds the payloads that will be transformed, `chunks` the
    /// item positions of each chunk.
    fn sample_params(
        &self,
        _eligible: &[&Payload],
        chunks: &[Vec<usize>],
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<ParamSet>> {
        Ok(vec![ParamSet::new(); chunks.len()])
    }

    fn apply(&self, payload: Payload, params: &ParamSet) -> Result<Payload>;

    /// Transform-specific fields for the engine's representation
    fn extra_repr(&self) -> String {
        String::new()
    }
}
