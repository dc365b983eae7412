//! Transcript normalization
//!
//! Turns whatever the transcript source hands over (persisted documents,
//! page-level segments, or plain text) into a canonical segment list. Bad
//! timestamps degrade the affected segment to an untimed unit instead of
//! failing the whole transcript.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::types::TranscriptSegment;

/// Normalized transcript segments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
}

/// A timed segment paired with its index in the transcript
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSegment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptDocument {
    Bare(Vec<TranscriptSegment>),
    Wrapped { segments: Vec<TranscriptSegment> },
}

impl Transcript {
    pub fn normalize(raw: Vec<TranscriptSegment>) -> Self {
        let mut segments: Vec<TranscriptSegment> = raw
            .into_iter()
            .map(sanitize_segment)
            .filter(|segment| !segment.text.is_empty() || segment.is_timed())
            .collect();

        if !segments.is_empty() && segments.iter().all(TranscriptSegment::is_timed) {
            segments.sort_by(|a, b| a.start.unwrap_or(0.0).total_cmp(&b.start.unwrap_or(0.0)));
        }
        remove_overlaps(&mut segments);
        Self { segments }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let document: TranscriptDocument =
            serde_json::from_str(raw).context("Failed to parse transcript JSON")?;
        let segments = match document {
            TranscriptDocument::Bare(segments) => segments,
            TranscriptDocument::Wrapped { segments } => segments,
        };
        Ok(Self::normalize(segments))
    }

    /// Read a JSON transcript, or plain prose from a `.txt` file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript file {:?}", path))?;
        let plain = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        let transcript = if plain {
            Self::from_plain_text(&data)
        } else {
            Self::from_json(&data).with_context(|| format!("Invalid transcript in {:?}", path))?
        };
        debug!(
            path = %path.display(),
            segments = transcript.segments.len(),
            timed = transcript.has_timing(),
            "loaded transcript"
        );
        Ok(transcript)
    }

    /// Sentence-splitting fallback for sources that only carry prose.
    pub fn from_plain_text(text: &str) -> Self {
        let segments = split_sentences(text)
            .into_iter()
            .map(TranscriptSegment::untimed)
            .collect();
        Self::normalize(segments)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn has_timing(&self) -> bool {
        has_timing(&self.segments)
    }

    pub fn timed(&self) -> Vec<TimedSegment> {
        timed_segments(&self.segments)
    }

    /// End of the last timed segment, usable as a duration hint.
    pub fn timed_end(&self) -> Option<f64> {
        self.timed().last().map(|segment| segment.end)
    }
}

pub fn has_timing(segments: &[TranscriptSegment]) -> bool {
    segments.iter().any(TranscriptSegment::is_timed)
}

/// Timed segments sorted by start, keeping their original indices.
pub fn timed_segments(segments: &[TranscriptSegment]) -> Vec<TimedSegment> {
    let mut timed: Vec<TimedSegment> = segments
        .iter()
        .enumerate()
        .filter_map(|(index, segment)| {
            segment
                .bounds()
                .map(|(start, end)| TimedSegment { index, start, end })
        })
        .collect();
    timed.sort_by(|a, b| a.start.total_cmp(&b.start));
    timed
}

fn sanitize_segment(segment: TranscriptSegment) -> TranscriptSegment {
    let text = segment.text.trim().to_string();
    match segment.bounds() {
        Some((start, end)) => TranscriptSegment::timed(start, end, text),
        None => TranscriptSegment::untimed(text),
    }
}

// Timed segments may abut but never overlap; a late start is pulled up to the
// previous end. Walks the timed segments in start order, so mixed lists that
// keep their source order are trimmed the same way as sorted ones.
fn remove_overlaps(segments: &mut [TranscriptSegment]) {
    let mut previous_end: Option<f64> = None;
    for timed in timed_segments(segments) {
        let segment = &mut segments[timed.index];
        if let Some(prev) = previous_end.filter(|prev| timed.start < *prev) {
            segment.start = Some(prev);
            segment.end = Some(timed.end.max(prev));
        }
        previous_end = Some(timed.end.max(previous_end.unwrap_or(0.0)));
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        current.push(ch);
        let terminal = matches!(ch, '.' | '!' | '?' | '…' | '。' | '！' | '？');
        let at_break = match chars.peek() {
            None => true,
            Some(next) => next.is_whitespace() || matches!(ch, '。' | '！' | '？'),
        };
        if terminal && at_break {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}
