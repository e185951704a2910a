//! Dispatch configuration
//!
//! How often and how a transform is applied: the probability `p`, single vs.
//! batch mode, the number of independently parameterized chunks, and whether
//! buffers may be reused.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{AugmentError, Result, ResultExt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Probability of applying the transform (per call or per item)
    pub p: f64,

    /// Reuse the input buffers instead of cloning them first
    pub inplace: bool,

    /// Number of chunks with their own parameters; -1 means one per item
    pub num_chunks: i64,

    /// Shuffle the selection before splitting it into chunks
    pub permute_chunks: bool,

    /// Treat the leading axis of batched payloads as independent items
    pub batch_transform: bool,

    /// Seed for the engine's random source; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            p: 1.0,
            inplace: false,
            num_chunks: 1,
            permute_chunks: false,
            batch_transform: false,
            seed: None,
        }
    }
}

impl DispatchConfig {
    /// Apply to the whole call with probability `p`
    pub fn single(p: f64) -> Self {
        Self {
            p,
            ..Default::default()
        }
    }

    /// Apply to each item of a batch with probability `p`
    pub fn batch(p: f64, num_chunks: i64) -> Self {
        Self {
            p,
            num_chunks,
            batch_transform: true,
            ..Default::default()
        }
    }

    pub fn with_inplace(mut self, inplace: bool) -> Self {
        self.inplace = inplace;
        self
    }

    pub fn with_permute_chunks(mut self, permute_chunks: bool) -> Self {
        self.permute_chunks = permute_chunks;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the configuration against the transform it will drive
    pub fn validate(&self, is_shape_altering: bool) -> Result<()> {
        if !self.p.is_finite() || !(0.0..=1.0).contains(&self.p) {
            return Err(AugmentError::Config(format!(
                "p should be a probability in [0, 1], got {}",
                self.p
            )));
        }

        if is_shape_altering && self.batch_transform && self.p > 0.0 && self.p < 1.0 {
            return Err(AugmentError::Config(format!(
                "a shape-altering transform in batch mode needs p of 0 or 1, got {}",
                self.p
            )));
        }

        if is_shape_altering && self.inplace {
            return Err(AugmentError::Config(
                "a shape-altering transform cannot run in place".to_string(),
            ));
        }

        if !self.batch_transform && self.num_chunks != 1 {
            return Err(AugmentError::Config(format!(
                "num_chunks must be 1 outside batch mode, got {}",
                self.num_chunks
            )));
        }

        if self.num_chunks == 0 || self.num_chunks < -1 {
            return Err(AugmentError::Config(format!(
                "num_chunks should be -1 or at least 1, got {}",
                self.num_chunks
            )));
        }

        Ok(())
    }

    /// `name=value` pairs, leaving out `exclude`
    ///
    /// Outside batch mode the batch-only fields are never shown.
    pub fn describe(&self, exclude: &[&str]) -> String {
        let mut hidden: Vec<&str> = exclude.to_vec();
        if !self.batch_transform {
            hidden.extend(["inplace", "num_chunks", "permute_chunks"]);
        }

        let mut fields = vec![
            ("p", self.p.to_string()),
            ("inplace", self.inplace.to_string()),
            ("num_chunks", self.num_chunks.to_string()),
            ("permute_chunks", self.permute_chunks.to_string()),
        ];
        if let Some(seed) = self.seed {
            fields.push(("seed", seed.to_string()));
        }
        if self.batch_transform {
            fields.push(("batch_transform", "true".to_string()));
        }

        fields
            .into_iter()
            .filter(|(name, _)| !hidden.contains(name))
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .with_context(|| format!("invalid dispatch config {}", path.display()))
    }
}

impl fmt::Display for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe(&[]))
    }
}
