use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::{debug, info};

use crate::types::{Chunk, Pass};

use super::{Intent, PassSettings, PassState, PositionUpdate, Rejection, Transition};

/// Furthest point reached by continuous playback for one (chunk, pass).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coverage {
    chunk_index: usize,
    pass: Pass,
    frontier: f64,
}

/// Active-mode progress: the chunk being practised, its pass, and the
/// completion record of every chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveState {
    settings: PassSettings,
    chunk_index: usize,
    active_pass: Pass,
    progress: BTreeMap<usize, PassState>,
    completed_chunks: BTreeSet<usize>,
    coverage: Option<Coverage>,
    last_timestamp: Option<Duration>,
}

impl Default for ActiveState {
    fn default() -> Self {
        Self::new(PassSettings::default())
    }
}

impl ActiveState {
    pub fn new(settings: PassSettings) -> Self {
        Self {
            settings,
            chunk_index: 0,
            active_pass: Pass::Listen,
            progress: BTreeMap::new(),
            completed_chunks: BTreeSet::new(),
            coverage: None,
            last_timestamp: None,
        }
    }

    pub fn settings(&self) -> PassSettings {
        self.settings
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn active_pass(&self) -> Pass {
        self.active_pass
    }

    pub fn pass_state(&self, chunk_index: usize) -> PassState {
        self.progress.get(&chunk_index).cloned().unwrap_or_default()
    }

    pub fn is_completed(&self, chunk_index: usize, pass: Pass) -> bool {
        self.progress
            .get(&chunk_index)
            .is_some_and(|state| state.is_completed(pass))
    }

    pub fn completed_passes(&self, chunk_index: usize) -> Vec<Pass> {
        self.pass_state(chunk_index).completed()
    }

    pub fn is_chunk_completed(&self, chunk_index: usize) -> bool {
        self.completed_chunks.contains(&chunk_index)
    }

    pub fn completed_chunks(&self) -> Vec<usize> {
        self.completed_chunks.iter().copied().collect()
    }

    /// Covered position for the active (chunk, pass), if playback started.
    pub fn covered_until(&self) -> Option<f64> {
        self.coverage
            .filter(|coverage| self.coverage_matches(coverage))
            .map(|coverage| coverage.frontier)
    }

    pub fn can_advance_to_next_step(&self) -> bool {
        match self.active_pass.next() {
            Some(Pass::ReadAdjust) => true,
            Some(_) => self.is_completed(self.chunk_index, self.active_pass),
            None => false,
        }
    }

    pub fn can_move_to_next_chunk(&self, chunk_count: usize) -> bool {
        self.chunk_index + 1 < chunk_count
            && self.is_completed(self.chunk_index, Pass::FinalListen)
    }

    /// Every chunk has its final listen completed.
    pub fn session_complete(&self, chunk_count: usize) -> bool {
        chunk_count > 0 && (0..chunk_count).all(|index| self.is_chunk_completed(index))
    }

    /// Bounds every seek is clamped to while practising the active chunk.
    pub fn seek_bounds(&self, chunks: &[Chunk]) -> Option<(f64, f64)> {
        chunks
            .get(self.chunk_index)
            .map(|chunk| (chunk.start, chunk.end))
    }

    /// Re-clamp after the chunk list was rebuilt.
    pub fn reconcile(&self, chunk_count: usize) -> ActiveState {
        let mut next = self.clone();
        next.coverage = None;
        let clamped = self.chunk_index.min(chunk_count.saturating_sub(1));
        if clamped != self.chunk_index {
            debug!(
                from = self.chunk_index,
                to = clamped,
                chunk_count,
                "clamped stale chunk index"
            );
            next.chunk_index = clamped;
            next.active_pass = Pass::Listen;
        }
        next
    }

    /// Apply one position sample: correct out-of-range positions first, then
    /// credit coverage and evaluate completion.
    pub fn advance(&self, chunks: &[Chunk], update: PositionUpdate) -> Transition {
        if self
            .last_timestamp
            .is_some_and(|last| update.timestamp < last)
        {
            return Transition::unchanged(self);
        }
        let mut next = self.clone();
        next.last_timestamp = Some(update.timestamp);
        let Some(chunk) = chunks.get(self.chunk_index) else {
            return Transition {
                state: next,
                intents: Vec::new(),
            };
        };
        if !update.position.is_finite() {
            return Transition {
                state: next,
                intents: Vec::new(),
            };
        }

        let settings = self.settings;
        let mut intents = Vec::new();

        let low = chunk.start - settings.boundary_tolerance;
        let high = chunk.end + settings.boundary_tolerance;
        if update.position < low || update.position > high {
            let overshot = update.position > high;
            let target = if overshot { chunk.end } else { chunk.start };
            debug!(
                position = update.position,
                target,
                chunk = chunk.index,
                "position outside active chunk; correcting"
            );
            intents.push(Intent::Seek(target));
            if update.is_playing && overshot {
                intents.push(Intent::Pause);
                // Playback ran past the end between two samples: still a
                // listen-through as long as it continued from the frontier.
                let mut coverage = next.current_coverage(chunk);
                if update.position <= coverage.frontier + settings.continuity_tolerance {
                    coverage.frontier = chunk.end;
                    next.coverage = Some(coverage);
                    next.credit_coverage(chunks, chunk, &mut intents);
                }
            }
            return Transition {
                state: next,
                intents,
            };
        }

        if !update.is_playing {
            return Transition {
                state: next,
                intents,
            };
        }

        let mut coverage = next.current_coverage(chunk);
        if update.position <= coverage.frontier + settings.continuity_tolerance {
            coverage.frontier = coverage.frontier.max(update.position);
        }
        next.coverage = Some(coverage);

        if update.position >= chunk.end - settings.completion_epsilon {
            intents.push(Intent::Pause);
        }
        next.credit_coverage(chunks, chunk, &mut intents);

        Transition {
            state: next,
            intents,
        }
    }

    /// Move to another pass of the active chunk.
    pub fn select_step(&self, chunks: &[Chunk], target: Pass) -> Result<Transition, Rejection> {
        let chunk = chunks.get(self.chunk_index).ok_or(Rejection::NoChunks)?;
        let current = self.active_pass;
        if target == current {
            return Ok(Transition::unchanged(self));
        }
        if target > current {
            if current.next() != Some(target) {
                return Err(Rejection::SkipsAhead {
                    from: current,
                    to: target,
                });
            }
            if target != Pass::ReadAdjust && !self.is_completed(chunk.index, current) {
                return Err(Rejection::PassNotCompleted(current));
            }
        }

        let mut next = self.clone();
        let mut intents = Vec::new();
        if target == Pass::ReadAdjust {
            intents.push(Intent::Pause);
        }
        next.active_pass = target;
        next.coverage = None;
        intents.push(Intent::Seek(chunk.start));
        debug!(
            chunk = chunk.index,
            from = current.number(),
            to = target.number(),
            "selected pass"
        );
        Ok(Transition {
            state: next,
            intents,
        })
    }

    /// Close the review pass and start the final listen from the chunk start.
    pub fn begin_final_listen(
        &self,
        chunks: &[Chunk],
        is_playing: bool,
    ) -> Result<Transition, Rejection> {
        let chunk = chunks.get(self.chunk_index).ok_or(Rejection::NoChunks)?;
        if self.active_pass != Pass::ReadAdjust {
            return Err(Rejection::NotInReview);
        }
        let mut next = self.clone();
        let mut intents = Vec::new();
        next.progress
            .entry(chunk.index)
            .or_default()
            .final_listen_committed = true;
        if !next.is_completed(chunk.index, Pass::ReadAdjust) {
            next.mark_completed(chunk.index, Pass::ReadAdjust, &mut intents);
        }
        next.active_pass = Pass::FinalListen;
        next.coverage = None;
        intents.push(Intent::Seek(chunk.start));
        if !is_playing {
            intents.push(Intent::Play);
        }
        info!(chunk = chunk.index, "final listen started");
        Ok(Transition {
            state: next,
            intents,
        })
    }

    /// Move on once the final listen of the active chunk is complete.
    pub fn advance_chunk(&self, chunks: &[Chunk]) -> Result<Transition, Rejection> {
        let chunk = chunks.get(self.chunk_index).ok_or(Rejection::NoChunks)?;
        if !self.is_completed(chunk.index, Pass::FinalListen) {
            return Err(Rejection::ChunkNotFinished(chunk.index));
        }
        let following = chunks.get(chunk.index + 1).ok_or(Rejection::LastChunk)?;
        let mut next = self.clone();
        let mut intents = Vec::new();
        next.enter_chunk(following, &mut intents);
        Ok(Transition {
            state: next,
            intents,
        })
    }

    /// Jump to a chunk from the chunk list. Earlier chunks are always
    /// reachable; later ones once their predecessor is finished.
    pub fn select_chunk(&self, chunks: &[Chunk], index: usize) -> Result<Transition, Rejection> {
        if chunks.is_empty() {
            return Err(Rejection::NoChunks);
        }
        let target = chunks.get(index).ok_or(Rejection::UnknownChunk(index))?;
        if index == self.chunk_index {
            return Ok(Transition::unchanged(self));
        }
        let unlocked =
            index < self.chunk_index || index == 0 || self.is_chunk_completed(index - 1);
        if !unlocked {
            return Err(Rejection::ChunkLocked(index));
        }
        let mut next = self.clone();
        let mut intents = Vec::new();
        next.enter_chunk(target, &mut intents);
        Ok(Transition {
            state: next,
            intents,
        })
    }

    /// Listen to the active pass again from the chunk start.
    pub fn restart_chunk(&self, chunks: &[Chunk]) -> Result<Transition, Rejection> {
        let chunk = chunks.get(self.chunk_index).ok_or(Rejection::NoChunks)?;
        let mut next = self.clone();
        next.coverage = None;
        Ok(Transition {
            state: next,
            intents: vec![Intent::Seek(chunk.start)],
        })
    }

    /// Complete the active pass once coverage reaches the chunk end.
    fn credit_coverage(&mut self, chunks: &[Chunk], chunk: &Chunk, intents: &mut Vec<Intent>) {
        let settings = self.settings;
        let pass = self.active_pass;
        let covered = self
            .covered_until()
            .is_some_and(|frontier| frontier >= chunk.end - settings.completion_epsilon);
        if !pass.completes_by_playback() || !covered || self.is_completed(chunk.index, pass) {
            return;
        }
        self.mark_completed(chunk.index, pass, intents);
        if pass != Pass::FinalListen {
            return;
        }
        self.completed_chunks.insert(chunk.index);
        intents.push(Intent::ChunkCompleted {
            chunk_index: chunk.index,
        });
        info!(chunk = chunk.index, "chunk completed");
        if settings.auto_advance_chunk {
            if let Some(following) = chunks.get(chunk.index + 1) {
                self.enter_chunk(following, intents);
            }
        }
    }

    fn enter_chunk(&mut self, chunk: &Chunk, intents: &mut Vec<Intent>) {
        debug!(from = self.chunk_index, to = chunk.index, "entering chunk");
        self.chunk_index = chunk.index;
        self.active_pass = Pass::Listen;
        self.coverage = None;
        intents.push(Intent::Seek(chunk.start));
    }

    fn mark_completed(&mut self, chunk_index: usize, pass: Pass, intents: &mut Vec<Intent>) {
        self.progress
            .entry(chunk_index)
            .or_default()
            .completed
            .insert(pass);
        intents.push(Intent::PassCompleted { chunk_index, pass });
        info!(chunk = chunk_index, pass = pass.number(), "pass completed");
    }

    fn coverage_matches(&self, coverage: &Coverage) -> bool {
        coverage.chunk_index == self.chunk_index && coverage.pass == self.active_pass
    }

    fn current_coverage(&self, chunk: &Chunk) -> Coverage {
        self.coverage
            .filter(|coverage| self.coverage_matches(coverage))
            .unwrap_or(Coverage {
                chunk_index: chunk.index,
                pass: self.active_pass,
                frontier: chunk.start,
            })
    }
}
