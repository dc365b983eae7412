use crate::types::{Chunk, ChunkConfig};

use super::spans::{Span, EPS};

/// Where a chunk may be cut once the target length has been reached.
#[derive(Clone, Copy)]
enum Cut {
    Previous,
    Current,
}

pub(super) struct ChunkAccumulator {
    chunks: Vec<Chunk>,
    config: ChunkConfig,
    current_start: f64,
    first_segment: Option<usize>,
    previous: Option<Span>,
}

impl ChunkAccumulator {
    pub(super) fn new(config: ChunkConfig) -> Self {
        Self {
            chunks: Vec::new(),
            config,
            current_start: 0.0,
            first_segment: None,
            previous: None,
        }
    }

    pub(super) fn handle_span(&mut self, span: Span) {
        loop {
            if span.end_time <= self.current_start + EPS {
                // Fully inside an already emitted chunk.
                return;
            }
            let current = span.end_time - self.current_start;
            if current < self.config.target_duration {
                self.attach_span(span);
                return;
            }
            match self.choose_cut(current) {
                Cut::Previous => {
                    // The current span opens the next chunk and is re-evaluated
                    // against the new start.
                    if let Some(previous) = self.previous {
                        self.emit(previous.end_time, Some(previous.segment_idx));
                    }
                }
                Cut::Current => {
                    self.attach_span(span);
                    self.emit(span.end_time, Some(span.segment_idx));
                    return;
                }
            }
        }
    }

    /// Close the timeline with whatever remains after the last cut.
    pub(super) fn finish(mut self, timeline_end: f64) -> Vec<Chunk> {
        if timeline_end - self.current_start > EPS {
            let last_segment = self.previous.map(|span| span.segment_idx);
            self.emit(timeline_end, last_segment);
        } else if let Some(last) = self.chunks.last_mut() {
            // Absorb float dust so the final chunk ends exactly at the timeline end.
            last.end = timeline_end.max(last.end);
        }
        self.chunks
    }

    fn choose_cut(&self, current: f64) -> Cut {
        let config = self.config;
        let previous = self
            .previous
            .map(|span| span.end_time - self.current_start)
            .filter(|duration| *duration > EPS);
        let previous_ok = previous.filter(|duration| config.accepts(*duration));
        let current_ok = config.accepts(current);

        match (previous_ok, current_ok) {
            (Some(prev), true) => {
                let target = config.target_duration;
                if (prev - target).abs() <= (current - target).abs() {
                    Cut::Previous
                } else {
                    Cut::Current
                }
            }
            (Some(_), false) => Cut::Previous,
            (None, true) => Cut::Current,
            (None, false) => match previous {
                Some(prev) if prev >= config.min_duration => Cut::Previous,
                // Oversized chunk rather than a mid-sentence cut.
                _ => Cut::Current,
            },
        }
    }

    fn attach_span(&mut self, span: Span) {
        if self.first_segment.is_none() {
            self.first_segment = Some(span.segment_idx);
        }
        self.previous = Some(span);
    }

    fn emit(&mut self, end: f64, last_segment: Option<usize>) {
        let first_segment = self.first_segment.take();
        self.chunks.push(Chunk {
            index: self.chunks.len(),
            start: self.current_start,
            end,
            segment_start_index: first_segment,
            segment_end_index: first_segment.and(last_segment),
        });
        self.current_start = end;
        self.previous = None;
    }
}
