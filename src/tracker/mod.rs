//! Playback position tracking
//!
//! Maps a continuous playback position onto the transcript and the chunk list.
//! Every lookup is a pure function of its inputs so it can run on each
//! position update without holding state.

use std::ops::Range;

use crate::transcript::timed_segments;
use crate::types::{Chunk, TranscriptSegment};

/// Index of the transcript segment being spoken at `position`.
///
/// Returns `None` only for an empty transcript.
pub fn active_segment_index(
    segments: &[TranscriptSegment],
    position: f64,
    duration: f64,
) -> Option<usize> {
    if segments.is_empty() {
        return None;
    }
    let timed = timed_segments(segments);
    let (Some(first), Some(last)) = (timed.first(), timed.last()) else {
        return Some(proportional_index(segments.len(), position, duration));
    };

    if position < first.start {
        return Some(first.index);
    }
    if position >= last.end {
        return Some(last.index);
    }
    if let Some(containing) = timed
        .iter()
        .find(|segment| position >= segment.start && position < segment.end)
    {
        return Some(containing.index);
    }
    // In a gap between segments: nearest start wins, earlier one on ties.
    timed
        .iter()
        .min_by(|a, b| {
            (a.start - position)
                .abs()
                .total_cmp(&(b.start - position).abs())
        })
        .map(|segment| segment.index)
}

fn proportional_index(count: usize, position: f64, duration: f64) -> usize {
    if count == 0 || !duration.is_finite() || duration <= 0.0 || !position.is_finite() {
        return 0;
    }
    let scaled = (position / duration * count as f64).floor();
    if scaled <= 0.0 {
        0
    } else {
        (scaled as usize).min(count - 1)
    }
}

/// Index of the chunk containing `position`, clamped to the chunk list.
pub fn active_chunk_index(chunks: &[Chunk], position: f64) -> Option<usize> {
    let last = chunks.len().checked_sub(1)?;
    if position.is_nan() || position < chunks[0].start {
        return Some(0);
    }
    Some(
        chunks
            .iter()
            .position(|chunk| chunk.contains(position))
            .unwrap_or(last),
    )
}

/// Segment indices (into the untrimmed list) that belong to `chunk`.
pub fn chunk_segment_range(
    segments: &[TranscriptSegment],
    chunk: &Chunk,
    duration: f64,
) -> Range<usize> {
    if let (Some(first), Some(last)) = (chunk.segment_start_index, chunk.segment_end_index) {
        let end = (last + 1).min(segments.len());
        return first.min(end)..end;
    }
    if segments.iter().any(TranscriptSegment::is_timed) {
        // Chunk without explicit segments (e.g. trailing silence): collect the
        // contiguous run of timed segments starting inside it.
        let inside: Vec<usize> = timed_segments(segments)
            .into_iter()
            .filter(|segment| chunk.contains(segment.start))
            .map(|segment| segment.index)
            .collect();
        return match (inside.iter().min(), inside.iter().max()) {
            (Some(&first), Some(&last)) => first..last + 1,
            _ => 0..0,
        };
    }
    if !duration.is_finite() || duration <= 0.0 {
        return 0..0;
    }
    let count = segments.len() as f64;
    let first = ((chunk.start / duration) * count).floor().max(0.0) as usize;
    let end = ((chunk.end / duration) * count).ceil().max(0.0) as usize;
    let end = end.min(segments.len());
    first.min(end)..end
}

/// Maps the globally active segment into the active chunk's own index space.
///
/// `None` when the active segment lies outside the chunk.
pub fn chunk_relative_segment_index(
    segments: &[TranscriptSegment],
    chunk: &Chunk,
    active_index: Option<usize>,
    duration: f64,
) -> Option<usize> {
    let active = segments.get(active_index?)?;
    let range = chunk_segment_range(segments, chunk, duration);
    let members = &segments[range];
    members.iter().position(|candidate| match (active.bounds(), candidate.bounds()) {
        (Some(a), Some(b)) => a == b,
        (None, None) => candidate.text == active.text,
        _ => false,
    })
}

/// Everything the tracker derives from a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackedPosition {
    pub segment_index: Option<usize>,
    pub chunk_index: Option<usize>,
    pub chunk_segment_index: Option<usize>,
}

/// Locate `position` against the transcript and the active chunk.
pub fn locate(
    segments: &[TranscriptSegment],
    chunks: &[Chunk],
    active_chunk: Option<usize>,
    position: f64,
    duration: f64,
) -> TrackedPosition {
    let segment_index = active_segment_index(segments, position, duration);
    let chunk_index = active_chunk_index(chunks, position);
    let chunk_segment_index = active_chunk
        .and_then(|index| chunks.get(index))
        .and_then(|chunk| chunk_relative_segment_index(segments, chunk, segment_index, duration));
    TrackedPosition {
        segment_index,
        chunk_index,
        chunk_segment_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::timed(2.0, 5.0, "uno"),
            TranscriptSegment::timed(5.0, 9.0, "dos"),
            TranscriptSegment::timed(12.0, 15.0, "tres"),
        ]
    }

    fn chunk(index: usize, start: f64, end: f64, segments: Option<(usize, usize)>) -> Chunk {
        Chunk {
            index,
            start,
            end,
            segment_start_index: segments.map(|(first, _)| first),
            segment_end_index: segments.map(|(_, last)| last),
        }
    }

    #[test]
    fn start_is_inclusive_and_end_is_exclusive() {
        let segments = timed();
        assert_eq!(active_segment_index(&segments, 5.0, 15.0), Some(1));
        assert_eq!(active_segment_index(&segments, 4.999, 15.0), Some(0));
        assert_eq!(active_segment_index(&segments, 2.0, 15.0), Some(0));
    }

    #[test]
    fn clamps_before_first_and_after_last() {
        let segments = timed();
        assert_eq!(active_segment_index(&segments, 0.5, 15.0), Some(0));
        assert_eq!(active_segment_index(&segments, 15.0, 15.0), Some(2));
        assert_eq!(active_segment_index(&segments, 99.0, 15.0), Some(2));
    }

    #[test]
    fn gaps_pick_the_nearest_start() {
        let segments = timed();
        assert_eq!(active_segment_index(&segments, 11.0, 15.0), Some(2));
        assert_eq!(active_segment_index(&segments, 9.5, 15.0), Some(2));
    }

    #[test]
    fn untimed_segments_scale_proportionally() {
        let segments: Vec<TranscriptSegment> = ["a", "b", "c", "d"]
            .iter()
            .map(|text| TranscriptSegment::untimed(*text))
            .collect();
        assert_eq!(active_segment_index(&segments, 0.0, 100.0), Some(0));
        assert_eq!(active_segment_index(&segments, 50.0, 100.0), Some(2));
        assert_eq!(active_segment_index(&segments, 100.0, 100.0), Some(3));
        assert_eq!(active_segment_index(&segments, 10.0, 0.0), Some(0));
        assert_eq!(active_segment_index(&[], 10.0, 100.0), None);
    }

    #[test]
    fn chunk_index_uses_half_open_windows() {
        let chunks = vec![chunk(0, 0.0, 60.0, None), chunk(1, 60.0, 100.0, None)];
        assert_eq!(active_chunk_index(&chunks, 59.9), Some(0));
        assert_eq!(active_chunk_index(&chunks, 60.0), Some(1));
        assert_eq!(active_chunk_index(&chunks, 150.0), Some(1));
        assert_eq!(active_chunk_index(&chunks, -1.0), Some(0));
        assert_eq!(active_chunk_index(&[], 10.0), None);
    }

    #[test]
    fn relative_index_follows_chunk_membership() {
        let segments = timed();
        let second = chunk(1, 9.0, 15.0, Some((2, 2)));
        assert_eq!(
            chunk_relative_segment_index(&segments, &second, Some(2), 15.0),
            Some(0)
        );
        assert_eq!(
            chunk_relative_segment_index(&segments, &second, Some(0), 15.0),
            None
        );
    }

    #[test]
    fn relative_index_matches_text_for_untimed_transcripts() {
        let segments: Vec<TranscriptSegment> = ["a", "b", "c", "d"]
            .iter()
            .map(|text| TranscriptSegment::untimed(*text))
            .collect();
        let second_half = chunk(1, 60.0, 120.0, None);
        assert_eq!(chunk_segment_range(&segments, &second_half, 120.0), 2..4);
        assert_eq!(
            chunk_relative_segment_index(&segments, &second_half, Some(3), 120.0),
            Some(1)
        );
    }

    #[test]
    fn locate_combines_all_lookups() {
        let segments = timed();
        let chunks = vec![
            chunk(0, 0.0, 9.0, Some((0, 1))),
            chunk(1, 9.0, 15.0, Some((2, 2))),
        ];
        let tracked = locate(&segments, &chunks, Some(0), 6.0, 15.0);
        assert_eq!(
            tracked,
            TrackedPosition {
                segment_index: Some(1),
                chunk_index: Some(0),
                chunk_segment_index: Some(1),
            }
        );
    }
}
