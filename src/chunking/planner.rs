use crate::types::{Chunk, ChunkConfig};

use super::spans::EPS;

/// Fixed-length chunks for transcripts without usable timestamps
pub(super) fn fixed_length_chunks(duration: f64, config: ChunkConfig) -> Vec<Chunk> {
    let length = config.target_duration;
    if !duration.is_finite() || duration <= EPS || length.is_nan() || length <= EPS {
        return Vec::new();
    }
    let count = ((duration - EPS) / length).ceil().max(1.0) as usize;
    (0..count)
        .map(|index| Chunk {
            index,
            start: index as f64 * length,
            end: ((index + 1) as f64 * length).min(duration),
            segment_start_index: None,
            segment_end_index: None,
        })
        .collect()
}
