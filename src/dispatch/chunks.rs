//! Splitting a selection into independently parameterized chunks

use rand::prelude::*;

/// Effective chunk count for `selected` items; -1 requests one per item
pub fn resolve_num_chunks(requested: i64, selected: usize) -> usize {
    if requested < 0 {
        selected
    } else {
        (requested as usize).min(selected)
    }
}

/// Split `selection` into `num_chunks` contiguous groups
///
/// Group sizes differ by at most one, larger groups first. With `permute`
/// the selection is shuffled before splitting.
pub fn partition_chunks(
    selection: &[usize],
    num_chunks: usize,
    permute: bool,
    rng: &mut dyn RngCore,
) -> Vec<Vec<usize>> {
    let len = selection.len();
    if len == 0 {
        return Vec::new();
    }
    let num_chunks = num_chunks.clamp(1, len);

    let mut order = selection.to_vec();
    if permute {
        order.shuffle(rng);
    }

    let base = len / num_chunks;
    let extra = len % num_chunks;
    let mut chunks = Vec::with_capacity(num_chunks);
    let mut start = 0;
    for i in 0..num_chunks {
        let size = base + usize::from(i < extra);
        chunks.push(order[start..start + size].to_vec());
        start += size;
    }
    chunks
}
