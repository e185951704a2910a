//! Which items of a batch get transformed
//!
//! With `p * B` items expected, the sampler transforms exactly
//! `floor(p * B)` or `ceil(p * B)` items, picking the larger count with
//! probability equal to the fractional part. Below one expected item a
//! single Bernoulli trial decides whether one item is transformed.

use rand::prelude::*;

/// Number of items to transform in a batch of `batch_size`
pub fn selection_count(p: f64, batch_size: usize, rng: &mut dyn RngCore) -> usize {
    if p <= 0.0 || batch_size == 0 {
        return 0;
    }
    if p >= 1.0 {
        return batch_size;
    }

    let target = p * batch_size as f64;
    let floor = target.floor();
    let ceil = target.ceil();

    if floor == 0.0 {
        if rng.gen::<f64>() < p {
            1
        } else {
            0
        }
    } else if floor == ceil {
        floor as usize
    } else {
        let fraction = target - floor;
        if fraction < rng.gen::<f64>() {
            floor as usize
        } else {
            ceil as usize
        }
    }
}

/// Draw the item indices to transform, `None` when nothing is selected
///
/// Indices are unique and in `[0, batch_size)`, in draw order.
pub fn sample_selection(p: f64, batch_size: usize, rng: &mut dyn RngCore) -> Option<Vec<usize>> {
    if p >= 1.0 && batch_size > 0 {
        return Some((0..batch_size).collect());
    }

    match selection_count(p, batch_size, rng) {
        0 => None,
        1 => Some(vec![rng.gen_range(0..batch_size)]),
        n => {
            let mut perm: Vec<usize> = (0..batch_size).collect();
            perm.shuffle(rng);
            perm.truncate(n);
            Some(perm)
        }
    }
}
