//! Listening session driver
//!
//! Ties the engine to the player: each tick pulls a position from the active
//! source, runs it through the engine and carries out the returned intents on
//! the control surface. Hosts call the `on_*` operations in response to user
//! input and render [`SessionSnapshot`]s.

use std::time::Instant;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{ActiveListeningEngine, HostView};
use crate::passes::{Intent, PositionUpdate};
use crate::playback::{Clock, ControlSurface, PlaybackSource, SystemClock};
use crate::types::{ListeningMode, Pass, PlaybackState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub mode: ListeningMode,
    pub view: HostView,
    /// Intents executed during the last operation or tick.
    #[serde(skip)]
    pub intents: Vec<Intent>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn with_intents(mut self, intents: Vec<Intent>) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_error_message(mut self, message: String) -> Self {
        self.error = Some(message);
        self
    }
}

pub struct ListeningSession<P: PlaybackSource, C: Clock = SystemClock> {
    engine: ActiveListeningEngine,
    controls: ControlSurface<P>,
    clock: C,
    started_at: Instant,
    last_intents: Vec<Intent>,
    error: Option<String>,
}

impl<P: PlaybackSource, C: Clock> ListeningSession<P, C> {
    pub fn new(engine: ActiveListeningEngine, source: P, mode: ListeningMode, clock: C) -> Self {
        let started_at = clock.now();
        let mut session = Self {
            engine,
            controls: ControlSurface::new(source, mode),
            clock,
            started_at,
            last_intents: Vec::new(),
            error: None,
        };
        session.sync_bounds();
        info!(
            mode = ?mode,
            chunks = session.engine.chunks().len(),
            "listening session ready"
        );
        session
    }

    pub fn engine(&self) -> &ActiveListeningEngine {
        &self.engine
    }

    pub fn controls(&self) -> &ControlSurface<P> {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut ControlSurface<P> {
        &mut self.controls
    }

    pub fn mode(&self) -> ListeningMode {
        self.controls.mode()
    }

    pub fn playback(&self) -> PlaybackState {
        self.controls.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let snapshot = SessionSnapshot {
            mode: self.mode(),
            view: self.engine.view(&self.controls.state()),
            intents: Vec::new(),
            error: None,
        }
        .with_intents(self.last_intents.clone());
        match &self.error {
            Some(message) => snapshot.with_error_message(message.clone()),
            None => snapshot,
        }
    }

    /// Pull one update from the player and let the engine react to it.
    /// Returns `false` when the source had nothing new this tick.
    pub fn tick(&mut self) -> Result<bool> {
        let Some(state) = self.controls.refresh() else {
            return Ok(false);
        };
        if state.duration_seconds > 0.0 && state.duration_seconds != self.engine.duration() {
            self.engine.set_duration(state.duration_seconds);
            self.sync_bounds();
        }
        if self.mode() != ListeningMode::Active {
            self.last_intents.clear();
            return Ok(true);
        }
        let timestamp = self.clock.now().saturating_duration_since(self.started_at);
        let update = PositionUpdate::new(state.position_seconds, state.is_playing, timestamp);
        let intents = self.engine.advance(update);
        self.execute(intents)?;
        Ok(true)
    }

    pub fn on_seek(&mut self, seconds: f64) -> Result<f64> {
        let position = self.controls.seek(seconds);
        self.record(position)
    }

    pub fn on_scrub_change(&mut self, delta_seconds: f64) -> Result<f64> {
        let position = self.controls.scrub(delta_seconds);
        self.record(position)
    }

    /// Toggle playback. Starting playback at the end of the active chunk
    /// replays it from the chunk start instead of stopping straight away.
    pub fn on_play_pause(&mut self) -> Result<()> {
        let state = self.controls.state();
        if self.mode() == ListeningMode::Active && !state.is_playing {
            let epsilon = self.engine.state().settings().completion_epsilon;
            if let Some((start, end)) = self.engine.seek_bounds() {
                if state.position_seconds >= end - epsilon {
                    debug!(start, "replaying the chunk from its start");
                    let rewound = self.controls.seek(start).map(|_| ());
                    self.record(rewound)?;
                }
            }
        }
        let toggled = self.controls.play_pause();
        self.record(toggled)
    }

    pub fn on_set_rate(&mut self, rate: f32) -> Result<f32> {
        let applied = self.controls.set_rate(rate);
        self.record(applied)
    }

    pub fn on_skip_to_start(&mut self) -> Result<f64> {
        let position = self.controls.skip_to_start();
        self.record(position)
    }

    pub fn on_skip_to_end(&mut self) -> Result<f64> {
        let position = self.controls.skip_to_end();
        self.record(position)
    }

    pub fn on_select_chunk(&mut self, index: usize) -> Result<()> {
        let intents = self.engine.select_chunk(index)?;
        self.execute(intents)
    }

    pub fn on_select_step(&mut self, pass: Pass) -> Result<()> {
        let intents = self.engine.select_step(pass)?;
        self.execute(intents)
    }

    pub fn on_begin_final_listen(&mut self) -> Result<()> {
        let is_playing = self.controls.state().is_playing;
        let intents = self.engine.begin_final_listen(is_playing)?;
        self.execute(intents)
    }

    pub fn on_restart_chunk(&mut self) -> Result<()> {
        if self.mode() != ListeningMode::Active {
            let restarted = self.controls.restart_chunk().map(|_| ());
            return self.record(restarted);
        }
        let intents = self.engine.restart_chunk()?;
        self.execute(intents)?;
        if !self.controls.state().is_playing {
            let resumed = self.controls.play();
            self.record(resumed)?;
        }
        Ok(())
    }

    pub fn on_advance_chunk(&mut self) -> Result<()> {
        let intents = self.engine.advance_chunk()?;
        self.execute(intents)
    }

    /// Switch listening mode; audio is paused before the switch.
    pub fn switch_mode(&mut self, mode: ListeningMode) -> Result<()> {
        if mode == self.mode() {
            return Ok(());
        }
        let paused = self.controls.pause();
        self.record(paused)?;
        info!(from = ?self.mode(), to = ?mode, "switching listening mode");
        self.controls.set_mode(mode);
        self.sync_bounds();
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<()> {
        let paused = self.controls.pause();
        self.record(paused)?;
        info!("listening session shut down");
        Ok(())
    }

    fn execute(&mut self, intents: Vec<Intent>) -> Result<()> {
        self.sync_bounds();
        for intent in &intents {
            let outcome = match *intent {
                Intent::Seek(target) => self.controls.seek(target).map(|_| ()),
                Intent::Pause => self.controls.pause(),
                Intent::Play => self.controls.play(),
                Intent::PassCompleted { chunk_index, pass } => {
                    debug!(chunk = chunk_index, pass = pass.number(), "pass completion reported");
                    Ok(())
                }
                Intent::ChunkCompleted { chunk_index } => {
                    debug!(chunk = chunk_index, "chunk completion reported");
                    Ok(())
                }
            };
            if let Err(err) = outcome {
                self.last_intents = intents.clone();
                return self.record(Err(err));
            }
        }
        self.last_intents = intents;
        self.error = None;
        Ok(())
    }

    fn record<T>(&mut self, outcome: crate::playback::Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.error = None;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "player command failed");
                self.error = Some(err.to_string());
                Err(anyhow!(err))
            }
        }
    }

    fn sync_bounds(&mut self) {
        let bounds = match self.mode() {
            ListeningMode::Active => self.engine.seek_bounds(),
            _ => None,
        };
        self.controls.set_bounds(bounds);
    }
}

impl<P: PlaybackSource, C: Clock> Drop for ListeningSession<P, C> {
    fn drop(&mut self) {
        if self.controls.state().is_playing {
            let _ = self.controls.pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::passes::PassSettings;
    use crate::playback::local::LocalPlayback;
    use crate::playback::ManualClock;
    use crate::transcript::Transcript;
    use crate::types::{ChunkConfig, TranscriptSegment};

    fn session(clock: &ManualClock) -> ListeningSession<LocalPlayback<ManualClock>, ManualClock> {
        let transcript = Transcript::normalize(vec![
            TranscriptSegment::timed(0.0, 5.0, "uno"),
            TranscriptSegment::timed(5.0, 10.0, "dos"),
            TranscriptSegment::timed(10.0, 15.0, "tres"),
            TranscriptSegment::timed(15.0, 20.0, "cuatro"),
        ]);
        let engine = ActiveListeningEngine::new(
            transcript,
            20.0,
            ChunkConfig::new(10.0),
            PassSettings::default(),
        );
        ListeningSession::new(
            engine,
            LocalPlayback::silent(20.0, clock.clone()),
            ListeningMode::Active,
            clock.clone(),
        )
    }

    #[test]
    fn seeks_stay_inside_the_active_chunk() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        assert_eq!(session.on_seek(14.0).unwrap(), 10.0);
        assert_eq!(session.on_scrub_change(-20.0).unwrap(), 0.0);
    }

    #[test]
    fn playback_to_the_chunk_end_completes_the_pass_and_pauses() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        session.on_play_pause().unwrap();
        for _ in 0..101 {
            clock.advance(Duration::from_millis(100));
            session.tick().unwrap();
        }
        let snapshot = session.snapshot();
        assert_eq!(snapshot.view.completed_passes, vec![Pass::Listen]);
        assert!(snapshot.view.can_advance_to_next_step);
        assert!(!snapshot.view.is_playing);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn play_at_the_chunk_end_replays_from_the_start() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        session.on_play_pause().unwrap();
        for _ in 0..101 {
            clock.advance(Duration::from_millis(100));
            session.tick().unwrap();
        }
        assert!(!session.playback().is_playing);

        session.on_play_pause().unwrap();
        assert_eq!(session.playback().position_seconds, 0.0);
        for _ in 0..5 {
            clock.advance(Duration::from_millis(100));
            session.tick().unwrap();
        }
        let state = session.playback();
        assert!(state.is_playing);
        assert!(state.position_seconds > 0.0 && state.position_seconds < 1.0);
    }

    #[test]
    fn locked_steps_are_rejected_without_touching_playback() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        let err = session.on_select_step(Pass::ListenRead).unwrap_err();
        assert!(err.to_string().contains("pass 1"));
        assert!(session.on_select_chunk(1).is_err());
        assert!(!session.playback().is_playing);
    }

    #[test]
    fn switching_mode_pauses_and_releases_the_chunk_bounds() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        session.on_play_pause().unwrap();
        session.switch_mode(ListeningMode::Extensive).unwrap();
        assert!(!session.playback().is_playing);
        assert_eq!(session.on_seek(14.0).unwrap(), 14.0);
    }
}
