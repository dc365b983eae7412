use crate::transcript::timed_segments;
use crate::types::TranscriptSegment;

pub(super) const EPS: f64 = 1e-9;

#[derive(Clone, Copy, Debug)]
pub(super) struct Span {
    pub(super) segment_idx: usize,
    pub(super) start_time: f64,
    pub(super) end_time: f64,
}

/// Timed segments sorted by start and clamped to the timeline.
pub(super) fn build_spans(segments: &[TranscriptSegment], timeline_end: f64) -> Vec<Span> {
    timed_segments(segments)
        .into_iter()
        .filter(|segment| segment.start < timeline_end - EPS)
        .map(|segment| Span {
            segment_idx: segment.index,
            start_time: segment.start,
            end_time: segment.end.min(timeline_end),
        })
        .collect()
}

/// The timeline covered by chunks: the known duration, or the transcript's
/// own extent while the duration is still unknown.
pub(super) fn timeline_end(segments: &[TranscriptSegment], duration: f64) -> Option<f64> {
    if duration.is_finite() && duration > EPS {
        return Some(duration);
    }
    timed_segments(segments)
        .iter()
        .map(|segment| segment.end)
        .fold(None, |acc: Option<f64>, end| Some(acc.map_or(end, |a| a.max(end))))
        .filter(|end| *end > EPS)
}
