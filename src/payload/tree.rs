//! Nested sample structure
//!
//! Inputs arrive as arbitrary nestings of sequences and string-keyed maps.
//! `flatten` walks them depth-first (map entries in key order) so the engine
//! can work on a flat payload list, and `TreeSpec::unflatten` puts the
//! results back in the same shape.

use std::collections::BTreeMap;

use super::Payload;
use crate::utils::error::{AugmentError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Leaf(Payload),
    Seq(Vec<Sample>),
    Map(BTreeMap<String, Sample>),
}

/// Structure of a flattened `Sample`, without its leaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSpec {
    Leaf,
    Seq(Vec<TreeSpec>),
    Map(Vec<(String, TreeSpec)>),
}

impl From<Payload> for Sample {
    fn from(payload: Payload) -> Self {
        Sample::Leaf(payload)
    }
}

impl Sample {
    /// Split into the leaves in depth-first order and the tree structure
    pub fn flatten(self) -> (Vec<Payload>, TreeSpec) {
        let mut leaves = Vec::new();
        let spec = self.flatten_into(&mut leaves);
        (leaves, spec)
    }

    fn flatten_into(self, leaves: &mut Vec<Payload>) -> TreeSpec {
        match self {
            Sample::Leaf(payload) => {
                leaves.push(payload);
                TreeSpec::Leaf
            }
            Sample::Seq(items) => {
                TreeSpec::Seq(items.into_iter().map(|s| s.flatten_into(leaves)).collect())
            }
            Sample::Map(entries) => TreeSpec::Map(
                entries
                    .into_iter()
                    .map(|(key, s)| (key, s.flatten_into(leaves)))
                    .collect(),
            ),
        }
    }

    /// Leaves in flatten order, borrowed
    pub fn leaves(&self) -> Vec<&Payload> {
        match self {
            Sample::Leaf(payload) => vec![payload],
            Sample::Seq(items) => items.iter().flat_map(Sample::leaves).collect(),
            Sample::Map(entries) => entries.values().flat_map(Sample::leaves).collect(),
        }
    }
}

impl TreeSpec {
    pub fn num_leaves(&self) -> usize {
        match self {
            TreeSpec::Leaf => 1,
            TreeSpec::Seq(items) => items.iter().map(TreeSpec::num_leaves).sum(),
            TreeSpec::Map(entries) => entries.iter().map(|(_, s)| s.num_leaves()).sum(),
        }
    }

    /// Rebuild a sample of this shape from leaves in flatten order
    pub fn unflatten(&self, leaves: Vec<Payload>) -> Result<Sample> {
        let expected = self.num_leaves();
        if leaves.len() != expected {
            return Err(AugmentError::InvalidInput(format!(
                "tree has {} leaves but {} payloads were given",
                expected,
                leaves.len()
            )));
        }
        let mut iter = leaves.into_iter();
        self.build(&mut iter)
    }

    fn build(&self, leaves: &mut std::vec::IntoIter<Payload>) -> Result<Sample> {
        match self {
            TreeSpec::Leaf => leaves
                .next()
                .map(Sample::Leaf)
                .ok_or_else(|| AugmentError::InvalidInput("ran out of leaves".to_string())),
            TreeSpec::Seq(items) => Ok(Sample::Seq(
                items
                    .iter()
                    .map(|spec| spec.build(leaves))
                    .collect::<Result<Vec<_>>>()?,
            )),
            TreeSpec::Map(entries) => Ok(Sample::Map(
                entries
                    .iter()
                    .map(|(key, spec)| Ok((key.clone(), spec.build(leaves)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> Sample {
        let mut target = BTreeMap::new();
        target.insert("labels".to_string(), Sample::Leaf(Payload::Value(json!([1, 2]))));
        target.insert("boxes".to_string(), Sample::Leaf(Payload::Value(json!("b"))));

        Sample::Seq(vec![
            Sample::Leaf(Payload::Value(json!("image"))),
            Sample::Map(target),
        ])
    }

    #[test]
    fn test_flatten_order_is_depth_first_by_key() {
        let (leaves, spec) = nested().flatten();
        assert_eq!(
            leaves,
            vec![
                Payload::Value(json!("image")),
                Payload::Value(json!("b")),
                Payload::Value(json!([1, 2])),
            ]
        );
        assert_eq!(spec.num_leaves(), 3);
    }

    #[test]
    fn test_unflatten_roundtrip() {
        let sample = nested();
        let (leaves, spec) = sample.clone().flatten();
        assert_eq!(spec.unflatten(leaves).unwrap(), sample);
    }

    #[test]
    fn test_unflatten_leaf_count_mismatch() {
        let (mut leaves, spec) = nested().flatten();
        leaves.pop();
        assert!(matches!(
            spec.unflatten(leaves),
            Err(AugmentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_borrowed_leaves_match_flatten() {
        let sample = nested();
        let borrowed: Vec<Payload> = sample.leaves().into_iter().cloned().collect();
        let (owned, _) = sample.flatten();
        assert_eq!(borrowed, owned);
    }
}
