//! Active-listening engine
//!
//! Owns the transcript, the media duration and everything derived from them:
//! the chunk plan and the pass progress. Host operations return the intents
//! the caller has to execute on the player.

use serde::Serialize;
use tracing::{debug, info};

use crate::chunking::partition;
use crate::passes::{ActiveState, Intent, PassSettings, PositionUpdate, Rejection, Transition};
use crate::tracker::locate;
use crate::transcript::Transcript;
use crate::types::{Chunk, ChunkConfig, Pass, PlaybackState};

/// Everything a host needs to render the active-listening screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub chunks: Vec<Chunk>,
    pub active_chunk_index: usize,
    pub active_step: Pass,
    pub completed_passes: Vec<Pass>,
    pub completed_chunks: Vec<usize>,
    pub can_advance_to_next_step: bool,
    pub can_move_to_next_chunk: bool,
    pub session_complete: bool,
    pub playback_position_seconds: f64,
    pub playback_duration_seconds: f64,
    pub is_playing: bool,
    pub active_segment_index: Option<usize>,
    pub chunk_segment_index: Option<usize>,
}

pub struct ActiveListeningEngine {
    transcript: Transcript,
    duration: f64,
    chunk_config: ChunkConfig,
    chunks: Vec<Chunk>,
    state: ActiveState,
}

impl ActiveListeningEngine {
    pub fn new(
        transcript: Transcript,
        duration: f64,
        chunk_config: ChunkConfig,
        settings: PassSettings,
    ) -> Self {
        let mut engine = Self {
            transcript,
            duration,
            chunk_config,
            chunks: Vec::new(),
            state: ActiveState::new(settings),
        };
        engine.rebuild();
        engine
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn state(&self) -> &ActiveState {
        &self.state
    }

    pub fn active_chunk(&self) -> Option<&Chunk> {
        self.chunks.get(self.state.chunk_index())
    }

    pub fn seek_bounds(&self) -> Option<(f64, f64)> {
        self.state.seek_bounds(&self.chunks)
    }

    pub fn session_complete(&self) -> bool {
        self.state.session_complete(self.chunks.len())
    }

    pub fn set_transcript(&mut self, transcript: Transcript) {
        self.transcript = transcript;
        self.rebuild();
    }

    /// Adopt a new media duration; the chunk plan is rebuilt when it changes.
    pub fn set_duration(&mut self, duration: f64) {
        if duration == self.duration || !duration.is_finite() || duration <= 0.0 {
            return;
        }
        debug!(from = self.duration, to = duration, "media duration changed");
        self.duration = duration;
        self.rebuild();
    }

    /// Feed one position sample from the player.
    pub fn advance(&mut self, update: PositionUpdate) -> Vec<Intent> {
        let transition = self.state.advance(&self.chunks, update);
        self.apply(transition)
    }

    pub fn select_step(&mut self, pass: Pass) -> Result<Vec<Intent>, Rejection> {
        let transition = self.state.select_step(&self.chunks, pass)?;
        Ok(self.apply(transition))
    }

    pub fn begin_final_listen(&mut self, is_playing: bool) -> Result<Vec<Intent>, Rejection> {
        let transition = self.state.begin_final_listen(&self.chunks, is_playing)?;
        Ok(self.apply(transition))
    }

    pub fn advance_chunk(&mut self) -> Result<Vec<Intent>, Rejection> {
        let transition = self.state.advance_chunk(&self.chunks)?;
        Ok(self.apply(transition))
    }

    pub fn select_chunk(&mut self, index: usize) -> Result<Vec<Intent>, Rejection> {
        let transition = self.state.select_chunk(&self.chunks, index)?;
        Ok(self.apply(transition))
    }

    pub fn restart_chunk(&mut self) -> Result<Vec<Intent>, Rejection> {
        let transition = self.state.restart_chunk(&self.chunks)?;
        Ok(self.apply(transition))
    }

    pub fn view(&self, playback: &PlaybackState) -> HostView {
        let chunk_index = self.state.chunk_index();
        let duration = if playback.duration_seconds > 0.0 {
            playback.duration_seconds
        } else {
            self.duration
        };
        let tracked = locate(
            &self.transcript.segments,
            &self.chunks,
            (!self.chunks.is_empty()).then_some(chunk_index),
            playback.position_seconds,
            duration,
        );
        HostView {
            chunks: self.chunks.clone(),
            active_chunk_index: chunk_index,
            active_step: self.state.active_pass(),
            completed_passes: self.state.completed_passes(chunk_index),
            completed_chunks: self.state.completed_chunks(),
            can_advance_to_next_step: self.state.can_advance_to_next_step(),
            can_move_to_next_chunk: self.state.can_move_to_next_chunk(self.chunks.len()),
            session_complete: self.session_complete(),
            playback_position_seconds: playback.position_seconds,
            playback_duration_seconds: duration,
            is_playing: playback.is_playing,
            active_segment_index: tracked.segment_index,
            chunk_segment_index: tracked.chunk_segment_index,
        }
    }

    fn rebuild(&mut self) {
        self.chunks = partition(&self.transcript.segments, self.duration, self.chunk_config);
        self.state = self.state.reconcile(self.chunks.len());
        info!(
            chunks = self.chunks.len(),
            duration = self.duration,
            segments = self.transcript.len(),
            "chunk plan rebuilt"
        );
    }

    fn apply(&mut self, transition: Transition) -> Vec<Intent> {
        self.state = transition.state;
        transition.intents
    }
}
