use super::partition;
use crate::types::{Chunk, ChunkConfig, TranscriptSegment};

fn lengths(chunks: &[Chunk]) -> Vec<f64> {
    chunks.iter().map(Chunk::duration).collect()
}

fn assert_contiguous(chunks: &[Chunk], duration: f64) {
    assert!(!chunks.is_empty());
    assert_eq!(chunks[0].start, 0.0);
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    for (index, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, index);
        assert!(chunk.end > chunk.start);
    }
    assert!((chunks.last().unwrap().end - duration).abs() < 1e-9);
}

/// Segments of the given lengths laid end to end from zero.
fn back_to_back(lengths: &[f64]) -> Vec<TranscriptSegment> {
    let mut start = 0.0;
    lengths
        .iter()
        .enumerate()
        .map(|(idx, length)| {
            let segment = TranscriptSegment::timed(start, start + length, format!("s{}", idx));
            start += length;
            segment
        })
        .collect()
}

#[test]
fn test_fixed_length_without_timestamps() {
    let segments = vec![
        TranscriptSegment::untimed("Hola."),
        TranscriptSegment::untimed("Adiós."),
    ];
    let chunks = partition(&segments, 185.0, ChunkConfig::default());

    assert_eq!(lengths(&chunks), vec![60.0, 60.0, 60.0, 5.0]);
    assert_contiguous(&chunks, 185.0);
    assert!(chunks.iter().all(|chunk| chunk.segment_start_index.is_none()));
}

#[test]
fn test_empty_without_duration() {
    assert!(partition(&[], 0.0, ChunkConfig::default()).is_empty());
    assert!(partition(&[], f64::NAN, ChunkConfig::default()).is_empty());
    let untimed = vec![TranscriptSegment::untimed("a")];
    assert!(partition(&untimed, -3.0, ChunkConfig::default()).is_empty());
}

#[test]
fn test_cuts_at_segment_closest_to_target() {
    let segments = vec![
        TranscriptSegment::timed(0.0, 58.0, "a"),
        TranscriptSegment::timed(58.0, 64.0, "b"),
        TranscriptSegment::timed(64.0, 121.0, "c"),
    ];
    let chunks = partition(&segments, 121.0, ChunkConfig::default());

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].end, 58.0);
    assert_eq!(chunks[0].segment_start_index, Some(0));
    assert_eq!(chunks[0].segment_end_index, Some(0));
    assert_eq!(chunks[1].segment_start_index, Some(1));
    assert_eq!(chunks[1].segment_end_index, Some(2));
    assert_contiguous(&chunks, 121.0);
}

#[test]
fn test_prefers_current_segment_when_closer() {
    let segments = back_to_back(&[50.0, 12.0, 50.0]);
    let chunks = partition(&segments, 112.0, ChunkConfig::default());

    // 62s (current) is closer to 60 than 50s (previous).
    assert_eq!(chunks[0].end, 62.0);
    assert_contiguous(&chunks, 112.0);
}

#[test]
fn test_rejects_out_of_band_previous_cut() {
    // Previous cut would leave 20s, far below the 45s minimum.
    let segments = back_to_back(&[20.0, 50.0, 30.0]);
    let chunks = partition(&segments, 100.0, ChunkConfig::default());

    assert_eq!(chunks[0].end, 70.0);
    assert_eq!(chunks[0].segment_end_index, Some(1));
    assert_contiguous(&chunks, 100.0);
}

#[test]
fn test_oversized_segment_is_not_split() {
    let segments = back_to_back(&[10.0, 120.0, 30.0]);
    let chunks = partition(&segments, 160.0, ChunkConfig::default());

    assert_eq!(chunks[0].start, 0.0);
    assert_eq!(chunks[0].end, 130.0);
    assert_eq!(chunks.len(), 2);
    assert_contiguous(&chunks, 160.0);
}

#[test]
fn test_chunks_stay_in_band_for_long_timelines() {
    let pattern = [7.0, 4.5, 9.0, 3.0, 6.5, 8.0, 5.0, 2.5];
    let lengths_in: Vec<f64> = pattern.iter().cycle().take(120).copied().collect();
    let total: f64 = lengths_in.iter().sum();
    let segments = back_to_back(&lengths_in);
    let config = ChunkConfig::default();
    let chunks = partition(&segments, total, config);

    assert_contiguous(&chunks, total);
    for chunk in &chunks[..chunks.len() - 1] {
        assert!(
            config.accepts(chunk.duration()),
            "chunk {} has length {}",
            chunk.index,
            chunk.duration()
        );
    }
}

#[test]
fn test_boundaries_fall_on_segment_edges() {
    let segments = back_to_back(&[13.0, 17.0, 11.0, 19.0, 23.0, 8.0, 14.0, 16.0]);
    let edges: Vec<f64> = segments.iter().filter_map(|s| s.end).collect();
    let chunks = partition(&segments, 121.0, ChunkConfig::default());

    for chunk in &chunks[..chunks.len() - 1] {
        assert!(edges.contains(&chunk.end), "cut at {} is mid-segment", chunk.end);
    }
}

#[test]
fn test_trailing_silence_becomes_final_chunk() {
    let segments = back_to_back(&[30.0, 30.0]);
    let chunks = partition(&segments, 70.0, ChunkConfig::default());

    assert_eq!(lengths(&chunks), vec![60.0, 10.0]);
    assert_eq!(chunks[1].segment_start_index, None);
}

#[test]
fn test_unsorted_and_untimed_segments_are_tolerated() {
    let segments = vec![
        TranscriptSegment::timed(60.0, 100.0, "late"),
        TranscriptSegment::untimed("no timing"),
        TranscriptSegment::timed(0.0, 60.0, "early"),
    ];
    let chunks = partition(&segments, 100.0, ChunkConfig::default());

    assert_eq!(chunks[0].end, 60.0);
    assert_eq!(chunks[0].segment_start_index, Some(2));
    assert_eq!(chunks[1].segment_start_index, Some(0));
    assert_contiguous(&chunks, 100.0);
}

#[test]
fn test_unknown_duration_uses_transcript_extent() {
    let segments = back_to_back(&[40.0, 40.0]);
    let chunks = partition(&segments, 0.0, ChunkConfig::default());

    assert_contiguous(&chunks, 80.0);
}
