use tracing::{debug, warn};

use crate::types::{ListeningMode, PlaybackState};

use super::{PlaybackError, PlaybackSource, Result, MAX_RATE, MIN_RATE};

/// Transport controls over the active player. In active mode every seek is
/// kept inside the practised chunk; other modes only keep it inside the media.
pub struct ControlSurface<P: PlaybackSource> {
    source: P,
    mode: ListeningMode,
    bounds: Option<(f64, f64)>,
    state: PlaybackState,
}

impl<P: PlaybackSource> ControlSurface<P> {
    pub fn new(source: P, mode: ListeningMode) -> Self {
        let state = source.state();
        Self {
            source,
            mode,
            bounds: None,
            state,
        }
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut P {
        &mut self.source
    }

    pub fn mode(&self) -> ListeningMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ListeningMode) {
        self.mode = mode;
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.bounds
    }

    /// Chunk the seeks are confined to while in active mode.
    pub fn set_bounds(&mut self, bounds: Option<(f64, f64)>) {
        self.bounds = bounds;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Pull a snapshot from the source, if it has one for this tick.
    pub fn refresh(&mut self) -> Option<PlaybackState> {
        let polled = self.source.poll()?;
        self.state = polled;
        Some(polled)
    }

    pub fn clamp_target(&self, target: f64) -> f64 {
        if let (ListeningMode::Active, Some((start, end))) = (self.mode, self.bounds) {
            return target.clamp(start, end.max(start));
        }
        let duration = self.state.duration_seconds;
        if duration > 0.0 {
            target.clamp(0.0, duration)
        } else {
            target.max(0.0)
        }
    }

    pub fn play(&mut self) -> Result<()> {
        self.source.play()?;
        self.sync();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.source.pause()?;
        self.sync();
        Ok(())
    }

    pub fn play_pause(&mut self) -> Result<()> {
        if self.state.is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Seek to `target` after clamping; returns the position actually used.
    pub fn seek(&mut self, target: f64) -> Result<f64> {
        if !target.is_finite() {
            return Err(PlaybackError::new(format!("invalid seek target {}", target)));
        }
        let clamped = self.clamp_target(target);
        if clamped != target {
            debug!(requested = target, clamped, "seek target clamped");
        }
        self.source.seek(clamped)?;
        self.sync();
        Ok(clamped)
    }

    /// Relative seek from the current position.
    pub fn scrub(&mut self, delta_seconds: f64) -> Result<f64> {
        let position = self.source.state().position_seconds;
        self.seek(position + delta_seconds)
    }

    /// Set the playback rate, clamped to the supported range.
    pub fn set_rate(&mut self, rate: f32) -> Result<f32> {
        if !rate.is_finite() {
            return Err(PlaybackError::new(format!("invalid playback rate {}", rate)));
        }
        let clamped = rate.clamp(MIN_RATE, MAX_RATE);
        if let Err(err) = self.source.set_rate(clamped) {
            warn!(rate = clamped, error = %err, "playback rate change refused");
            return Err(err);
        }
        self.sync();
        Ok(clamped)
    }

    /// Back to the start of the chunk and keep listening.
    pub fn restart_chunk(&mut self) -> Result<f64> {
        let position = self.skip_to_start()?;
        if !self.state.is_playing {
            self.play()?;
        }
        Ok(position)
    }

    pub fn skip_to_start(&mut self) -> Result<f64> {
        let start = match (self.mode, self.bounds) {
            (ListeningMode::Active, Some((start, _))) => start,
            _ => 0.0,
        };
        self.seek(start)
    }

    pub fn skip_to_end(&mut self) -> Result<f64> {
        let end = match (self.mode, self.bounds) {
            (ListeningMode::Active, Some((_, end))) => end,
            _ => self.state.duration_seconds,
        };
        self.seek(end)
    }

    fn sync(&mut self) {
        self.state = self.source.state();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::playback::local::LocalPlayback;
    use crate::playback::remote::{MockDevice, RemotePlayback, RemoteSettings};
    use crate::playback::ManualClock;

    fn active_surface(clock: &ManualClock) -> ControlSurface<LocalPlayback<ManualClock>> {
        let mut surface =
            ControlSurface::new(LocalPlayback::silent(180.0, clock.clone()), ListeningMode::Active);
        surface.set_bounds(Some((60.0, 120.0)));
        surface
    }

    #[test]
    fn active_mode_confines_seeks_to_the_chunk() {
        let clock = ManualClock::new();
        let mut surface = active_surface(&clock);
        assert_eq!(surface.seek(10.0).unwrap(), 60.0);
        assert_eq!(surface.seek(150.0).unwrap(), 120.0);
        assert_eq!(surface.scrub(-5.0).unwrap(), 115.0);
        assert_eq!(surface.skip_to_start().unwrap(), 60.0);
        assert_eq!(surface.skip_to_end().unwrap(), 120.0);
    }

    #[test]
    fn other_modes_clamp_to_the_media() {
        let clock = ManualClock::new();
        let mut surface = active_surface(&clock);
        surface.set_mode(ListeningMode::Extensive);
        assert_eq!(surface.seek(10.0).unwrap(), 10.0);
        assert_eq!(surface.seek(500.0).unwrap(), 180.0);
        assert_eq!(surface.seek(-3.0).unwrap(), 0.0);
        assert!(surface.seek(f64::INFINITY).is_err());
    }

    #[test]
    fn rate_is_clamped_and_nan_rejected() {
        let clock = ManualClock::new();
        let mut surface = active_surface(&clock);
        assert_eq!(surface.set_rate(3.0).unwrap(), MAX_RATE);
        assert_eq!(surface.set_rate(0.1).unwrap(), MIN_RATE);
        assert_eq!(surface.state().rate, MIN_RATE);
        assert!(surface.set_rate(f32::NAN).is_err());
    }

    #[test]
    fn restart_chunk_rewinds_and_plays() {
        let clock = ManualClock::new();
        let mut surface = active_surface(&clock);
        surface.seek(100.0).unwrap();
        assert_eq!(surface.restart_chunk().unwrap(), 60.0);
        assert!(surface.state().is_playing);

        clock.advance(Duration::from_secs(2));
        surface.play_pause().unwrap();
        assert!(!surface.state().is_playing);
        assert_eq!(surface.state().position_seconds, 62.0);
    }

    #[test]
    fn remote_rate_changes_surface_as_errors() {
        let clock = ManualClock::new();
        let remote = RemotePlayback::new(
            MockDevice::new(90_000),
            clock.clone(),
            RemoteSettings::default(),
        );
        let mut surface = ControlSurface::new(remote, ListeningMode::Intensive);
        assert!(surface.set_rate(1.5).is_err());
        assert_eq!(surface.set_rate(1.0).unwrap(), 1.0);
    }
}
