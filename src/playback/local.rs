use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, info};

use crate::audio::decoder::decode_audio;
use crate::audio::playback::AudioOutput;
use crate::types::{AudioData, PlaybackState};

use super::{Clock, PlaybackError, PlaybackSource, Result, SystemClock};

/// Media-element style clock: `current_time`, `duration`, `paused`,
/// `playback_rate`, advanced from wall time while playing.
#[derive(Debug, Clone)]
pub struct MediaElement {
    duration: f64,
    rate: f32,
    base_position: f64,
    started_at: Option<Instant>,
}

impl MediaElement {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            rate: 1.0,
            base_position: 0.0,
            started_at: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn paused(&self) -> bool {
        self.started_at.is_none()
    }

    pub fn playback_rate(&self) -> f32 {
        self.rate
    }

    pub fn current_time(&self, now: Instant) -> f64 {
        match self.started_at {
            Some(started) => {
                let elapsed = now.saturating_duration_since(started).as_secs_f64();
                (self.base_position + elapsed * self.rate as f64).min(self.duration)
            }
            None => self.base_position,
        }
    }

    pub fn ended(&self, now: Instant) -> bool {
        self.current_time(now) >= self.duration
    }

    pub fn play(&mut self, now: Instant) {
        if !self.paused() {
            return;
        }
        if self.base_position >= self.duration {
            self.base_position = 0.0;
        }
        self.started_at = Some(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.base_position = self.current_time(now);
        self.started_at = None;
    }

    pub fn seek(&mut self, now: Instant, seconds: f64) {
        self.base_position = seconds.clamp(0.0, self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
    }

    pub fn set_rate(&mut self, now: Instant, rate: f32) {
        self.base_position = self.current_time(now);
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
        self.rate = rate;
    }

    pub fn snapshot(&self, now: Instant) -> PlaybackState {
        PlaybackState {
            position_seconds: self.current_time(now),
            duration_seconds: self.duration,
            is_playing: !self.paused(),
            rate: self.rate,
        }
    }
}

/// Local audio playback: media-element timing plus an optional audible
/// output. Without an output device the element still keeps time, which is
/// what headless runs and tests rely on.
pub struct LocalPlayback<C: Clock = SystemClock> {
    element: MediaElement,
    output: Option<AudioOutput>,
    clock: C,
}

impl LocalPlayback<SystemClock> {
    /// Decode `path` and open the default output device.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let audio = decode_audio(path)
            .with_context(|| format!("Failed to decode audio file {:?}", path))?;
        info!(
            path = %path.display(),
            duration_seconds = audio.duration_seconds(),
            sample_rate = audio.sample_rate,
            "decoded local audio"
        );
        Self::with_audio(audio, SystemClock).context("Failed to open audio output")
    }
}

impl<C: Clock> LocalPlayback<C> {
    pub fn with_audio(audio: AudioData, clock: C) -> Result<Self> {
        let duration = audio.duration_seconds();
        let output = AudioOutput::open(audio)?;
        Ok(Self {
            element: MediaElement::new(duration),
            output: Some(output),
            clock,
        })
    }

    /// Time-keeping only, no audible output.
    pub fn silent(duration: f64, clock: C) -> Self {
        Self {
            element: MediaElement::new(duration),
            output: None,
            clock,
        }
    }

    pub fn element(&self) -> &MediaElement {
        &self.element
    }

    fn restart_output(&mut self) -> Result<()> {
        let now = self.clock.now();
        let position = self.element.current_time(now);
        let rate = self.element.playback_rate();
        if let Some(output) = self.output.as_mut() {
            output.start_at(position, rate)?;
        }
        Ok(())
    }
}

impl<C: Clock> PlaybackSource for LocalPlayback<C> {
    fn play(&mut self) -> Result<()> {
        if self.element.duration() <= 0.0 {
            return Err(PlaybackError::new("no audio loaded"));
        }
        let now = self.clock.now();
        self.element.play(now);
        self.restart_output()
    }

    fn pause(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.element.pause(now);
        if let Some(output) = self.output.as_mut() {
            output.stop();
        }
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(PlaybackError::new(format!("invalid seek target {}", seconds)));
        }
        let now = self.clock.now();
        self.element.seek(now, seconds);
        debug!(target = seconds, "local seek");
        if !self.element.paused() {
            self.restart_output()?;
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        let now = self.clock.now();
        self.element.set_rate(now, rate);
        if let Some(output) = self.output.as_mut() {
            output.set_speed(rate);
        }
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        self.element.snapshot(self.clock.now())
    }

    // Every tick is a time update; no throttling for local playback.
    fn poll(&mut self) -> Option<PlaybackState> {
        let now = self.clock.now();
        if !self.element.paused() && self.element.ended(now) {
            self.element.pause(now);
            if let Some(output) = self.output.as_mut() {
                output.stop();
            }
            debug!("local playback reached end of media");
        }
        Some(self.element.snapshot(now))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::playback::ManualClock;

    #[test]
    fn element_advances_with_rate_while_playing() {
        let clock = ManualClock::new();
        let mut player = LocalPlayback::silent(30.0, clock.clone());
        player.play().unwrap();
        clock.advance(Duration::from_secs(2));
        player.set_rate(1.5).unwrap();
        clock.advance(Duration::from_secs(2));

        let state = player.poll().unwrap();
        assert!((state.position_seconds - 5.0).abs() < 1e-9);
        assert!(state.is_playing);
        assert_eq!(state.rate, 1.5);
    }

    #[test]
    fn pause_freezes_position_and_seek_clamps_to_media() {
        let clock = ManualClock::new();
        let mut player = LocalPlayback::silent(10.0, clock.clone());
        player.play().unwrap();
        clock.advance(Duration::from_secs(3));
        player.pause().unwrap();
        clock.advance(Duration::from_secs(3));
        assert_eq!(player.state().position_seconds, 3.0);

        player.seek(42.0).unwrap();
        assert_eq!(player.state().position_seconds, 10.0);
        assert!(player.seek(f64::NAN).is_err());
    }

    #[test]
    fn playback_stops_at_end_of_media() {
        let clock = ManualClock::new();
        let mut player = LocalPlayback::silent(4.0, clock.clone());
        player.play().unwrap();
        clock.advance(Duration::from_secs(6));
        let state = player.poll().unwrap();
        assert!(!state.is_playing);
        assert_eq!(state.position_seconds, 4.0);

        // Playing again from the end restarts the media.
        player.play().unwrap();
        assert_eq!(player.state().position_seconds, 0.0);
    }

    #[test]
    fn empty_media_cannot_play() {
        let mut player = LocalPlayback::silent(0.0, ManualClock::new());
        assert!(player.play().is_err());
    }
}
