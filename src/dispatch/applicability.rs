//! Which flattened payloads a transform should touch
//!
//! Typed payloads are eligible whenever the transform handles their kind.
//! Untyped arrays are ambiguous: a sample may carry plain arrays next to its
//! images (landmarks, attributes) that must not be treated as pixels. They
//! are only transformed when the sample has no typed image or video, and
//! then only the first one in flatten order.

use crate::payload::{Payload, PayloadKind};

const SINGLE_IMAGE_KINDS: [PayloadKind; 4] = [
    PayloadKind::Image,
    PayloadKind::BatchImages,
    PayloadKind::Video,
    PayloadKind::BatchVideos,
];

const BATCH_IMAGE_KINDS: [PayloadKind; 2] = [PayloadKind::BatchImages, PayloadKind::BatchVideos];

/// One flag per payload: `true` when the transform must be applied to it
pub fn needs_transform_list(
    flat: &[Payload],
    transformed_kinds: &[PayloadKind],
    batch_mode: bool,
) -> Vec<bool> {
    let image_kinds: &[PayloadKind] = if batch_mode {
        &BATCH_IMAGE_KINDS
    } else {
        &SINGLE_IMAGE_KINDS
    };
    let mut transform_untyped = !flat.iter().any(|p| image_kinds.contains(&p.kind()));

    flat.iter()
        .map(|payload| {
            let kind = payload.kind();
            if !transformed_kinds.contains(&kind) {
                false
            } else if kind == PayloadKind::Untyped {
                let eligible = transform_untyped;
                transform_untyped = false;
                eligible
            } else {
                true
            }
        })
        .collect()
}
