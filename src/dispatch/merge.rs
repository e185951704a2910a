//! Slicing payloads, running chunks and writing results back
//!
//! Every eligible payload goes through three steps: `stage` extracts the
//! part of the batch to transform, `run` applies the transform chunk by
//! chunk, and `finish` merges the result into the untouched remainder of
//! the batch.

use crate::payload::Payload;
use crate::transform::{BatchTransform, ParamSet};
use crate::utils::error::{AugmentError, Result};

/// Chunks of the working slice and the parameters sampled for each
pub struct ChunkPlan<'a> {
    pub chunks: &'a [Vec<usize>],
    pub params: &'a [ParamSet],
    pub shape_altering: bool,
}

/// One flattened payload, ready for the transform
pub enum Staged {
    /// Not eligible; returned as is
    PassThrough(Payload),
    /// Every item is transformed; the payload itself is the working slice
    Whole(Payload),
    /// Only the selected items are transformed
    Subset { full: Payload, slice: Payload },
}

impl Staged {
    /// Prepare `payload` for a call that transforms `selection`
    /// (`None` meaning every item)
    ///
    /// Outside in-place mode the full payload is cloned before anything is
    /// written back, so the caller's buffer is never reused.
    pub fn stage(
        payload: Payload,
        needs_transform: bool,
        selection: Option<&[usize]>,
        inplace: bool,
    ) -> Result<Staged> {
        if !needs_transform {
            return Ok(Staged::PassThrough(payload));
        }
        match selection {
            None => Ok(Staged::Whole(payload)),
            Some(indices) => {
                let full = if inplace { payload } else { payload.clone() };
                let slice = full.select(indices)?;
                Ok(Staged::Subset { full, slice })
            }
        }
    }

    /// The payload the transform will see, if any
    pub fn working(&self) -> Option<&Payload> {
        match self {
            Staged::PassThrough(_) => None,
            Staged::Whole(payload) => Some(payload),
            Staged::Subset { slice, .. } => Some(slice),
        }
    }

    /// Transform the working slice and merge it back
    pub fn finish<T: BatchTransform + ?Sized>(
        self,
        transform: &T,
        plan: &ChunkPlan<'_>,
        selection: Option<&[usize]>,
    ) -> Result<Payload> {
        match self {
            Staged::PassThrough(payload) => Ok(payload),
            Staged::Whole(payload) => Ok(run(transform, payload, plan)?.compact()),
            Staged::Subset { mut full, slice } => {
                let indices = selection.ok_or_else(|| {
                    AugmentError::InvalidInput("subset staged without a selection".to_string())
                })?;
                let output = run(transform, slice, plan)?;
                full.write_slice(indices, &output)?;
                Ok(full.compact())
            }
        }
    }
}

/// Apply the transform to `slice`, one parameter set per chunk
///
/// Chunk positions index into `slice`. Shape-preserving outputs are written
/// back over their chunk; shape-altering outputs are reassembled into item
/// order.
pub fn run<T: BatchTransform + ?Sized>(
    transform: &T,
    slice: Payload,
    plan: &ChunkPlan<'_>,
) -> Result<Payload> {
    if plan.chunks.len() != plan.params.len() {
        return Err(AugmentError::Config(format!(
            "{} produced {} parameter sets for {} chunks",
            transform.name(),
            plan.params.len(),
            plan.chunks.len()
        )));
    }

    match plan.chunks.len() {
        0 => Ok(slice),
        1 => transform.apply(slice, &plan.params[0]),
        _ if plan.shape_altering => {
            let len = slice.batch_size()?;
            let mut parts = Vec::with_capacity(plan.chunks.len());
            for (chunk, params) in plan.chunks.iter().zip(plan.params) {
                let output = transform.apply(slice.select(chunk)?, params)?;
                parts.push((chunk.clone(), output));
            }
            Payload::scatter(len, parts)
        }
        _ => {
            let mut slice = slice;
            for (chunk, params) in plan.chunks.iter().zip(plan.params) {
                let output = transform.apply(slice.select(chunk)?, params)?;
                slice.write_slice(chunk, &output)?;
            }
            Ok(slice)
        }
    }
}
