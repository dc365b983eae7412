//! Chunk partitioning
//!
//! Splits the full timeline into practice chunks of roughly one minute,
//! cutting at transcript segment boundaries whenever the transcript carries
//! timestamps and falling back to fixed-length windows otherwise. Chunks are
//! always derived from scratch; callers rebuild them whenever the segment list
//! or the duration changes.

mod accumulator;
mod planner;
mod spans;

#[cfg(test)]
mod tests;

use tracing::debug;

use crate::transcript::has_timing;
use crate::types::{Chunk, ChunkConfig, TranscriptSegment};

use accumulator::ChunkAccumulator;
use planner::fixed_length_chunks;
use spans::{build_spans, timeline_end};

/// Pure function to determine practice chunks for a transcript and duration
pub fn partition(segments: &[TranscriptSegment], duration: f64, config: ChunkConfig) -> Vec<Chunk> {
    if !has_timing(segments) {
        let chunks = fixed_length_chunks(duration, config);
        debug!(duration, chunks = chunks.len(), "fixed-length chunking");
        return chunks;
    }

    let Some(end) = timeline_end(segments, duration) else {
        return Vec::new();
    };
    let mut accumulator = ChunkAccumulator::new(config);
    for span in build_spans(segments, end) {
        accumulator.handle_span(span);
    }
    let chunks = accumulator.finish(end);
    debug!(
        duration = end,
        segments = segments.len(),
        chunks = chunks.len(),
        "segment-aware chunking"
    );
    chunks
}
