use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::types::PlaybackState;

use super::{Clock, PlaybackError, PlaybackSource, Result, SystemClock};

/// State reported by a remote device, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteState {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub paused: bool,
}

/// A remotely controlled player (e.g. a streaming client on another device).
/// Commands are fire-and-forget; the device reports back through the channel
/// returned by [`RemoteDevice::subscribe`].
pub trait RemoteDevice {
    fn seek(&mut self, position_ms: u64) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    /// Ask the device to push a fresh state snapshot.
    fn request_state(&mut self) -> Result<()>;
    fn subscribe(&mut self) -> Receiver<RemoteState>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteSettings {
    /// How often the device is asked for its state.
    pub poll_interval: Duration,
    /// Minimum spacing between snapshots handed to the session.
    pub min_update_interval: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            min_update_interval: Duration::from_millis(250),
        }
    }
}

/// [`PlaybackSource`] over a [`RemoteDevice`]. Between device reports the
/// position is extrapolated from the last one.
pub struct RemotePlayback<D: RemoteDevice, C: Clock = SystemClock> {
    device: D,
    updates: Receiver<RemoteState>,
    clock: C,
    settings: RemoteSettings,
    snapshot: PlaybackState,
    anchored_at: Instant,
    last_poll: Option<Instant>,
    last_emitted: Option<Instant>,
}

impl<D: RemoteDevice, C: Clock> RemotePlayback<D, C> {
    pub fn new(mut device: D, clock: C, settings: RemoteSettings) -> Self {
        let updates = device.subscribe();
        let anchored_at = clock.now();
        Self {
            device,
            updates,
            clock,
            settings,
            snapshot: PlaybackState::default(),
            anchored_at,
            last_poll: None,
            last_emitted: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn current(&self, now: Instant) -> PlaybackState {
        let mut state = self.snapshot;
        if state.is_playing {
            let elapsed = now.saturating_duration_since(self.anchored_at).as_secs_f64();
            let mut position = state.position_seconds + elapsed * state.rate as f64;
            if state.duration_seconds > 0.0 {
                position = position.min(state.duration_seconds);
            }
            state.position_seconds = position;
        }
        state
    }

    /// Re-anchor extrapolation at `now` with the given changes applied.
    fn rebase(&mut self, now: Instant, change: impl FnOnce(&mut PlaybackState)) {
        self.snapshot = self.current(now);
        self.anchored_at = now;
        change(&mut self.snapshot);
    }

    fn request_if_due(&mut self, now: Instant) {
        let due = self
            .last_poll
            .map_or(true, |last| now.duration_since(last) >= self.settings.poll_interval);
        if !due {
            return;
        }
        self.last_poll = Some(now);
        if let Err(err) = self.device.request_state() {
            warn!(error = %err, "remote state request failed");
        }
    }

    fn latest_report(&mut self) -> Option<RemoteState> {
        let mut latest = None;
        loop {
            match self.updates.try_recv() {
                Ok(report) => latest = Some(report),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("remote device state channel closed");
                    break;
                }
            }
        }
        latest
    }
}

impl<D: RemoteDevice, C: Clock> PlaybackSource for RemotePlayback<D, C> {
    fn play(&mut self) -> Result<()> {
        self.device.resume()?;
        let now = self.clock.now();
        self.rebase(now, |state| state.is_playing = true);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.device.pause()?;
        let now = self.clock.now();
        self.rebase(now, |state| state.is_playing = false);
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlaybackError::new(format!("invalid seek target {}", seconds)));
        }
        self.device.seek((seconds * 1000.0).round() as u64)?;
        let now = self.clock.now();
        self.rebase(now, |state| state.position_seconds = seconds);
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        if (rate - 1.0).abs() < f32::EPSILON {
            return Ok(());
        }
        Err(PlaybackError::new(
            "playback rate cannot be changed on a remote device",
        ))
    }

    fn state(&self) -> PlaybackState {
        self.current(self.clock.now())
    }

    fn poll(&mut self) -> Option<PlaybackState> {
        let now = self.clock.now();
        self.request_if_due(now);
        if let Some(report) = self.latest_report() {
            self.snapshot = PlaybackState {
                position_seconds: report.position_ms as f64 / 1000.0,
                duration_seconds: report.duration_ms as f64 / 1000.0,
                is_playing: !report.paused,
                rate: 1.0,
            };
            self.anchored_at = now;
        }
        let throttled = self.last_emitted.is_some_and(|last| {
            now.duration_since(last) < self.settings.min_update_interval
        });
        if throttled {
            return None;
        }
        self.last_emitted = Some(now);
        Some(self.current(now))
    }
}

/// Commands received by a [`MockDevice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Seek(u64),
    Pause,
    Resume,
    RequestState,
}

/// Scriptable in-process device for tests and demos.
pub struct MockDevice {
    state: RemoteState,
    subscribers: Vec<Sender<RemoteState>>,
    commands: Vec<DeviceCommand>,
    fail_commands: bool,
}

impl MockDevice {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            state: RemoteState {
                position_ms: 0,
                duration_ms,
                paused: true,
            },
            subscribers: Vec::new(),
            commands: Vec::new(),
            fail_commands: false,
        }
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Make every following command fail, as a lost device would.
    pub fn set_failing(&mut self, failing: bool) {
        self.fail_commands = failing;
    }

    /// Move the device's own playhead, as if it had been playing.
    pub fn set_position(&mut self, position_ms: u64) {
        self.state.position_ms = position_ms.min(self.state.duration_ms);
    }

    pub fn push_state(&mut self) {
        let state = self.state;
        self.subscribers.retain(|tx| tx.send(state).is_ok());
    }

    fn command(&mut self, command: DeviceCommand) -> Result<()> {
        if self.fail_commands {
            return Err(PlaybackError::new("remote device unavailable"));
        }
        self.commands.push(command);
        Ok(())
    }
}

impl RemoteDevice for MockDevice {
    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.command(DeviceCommand::Seek(position_ms))?;
        self.set_position(position_ms);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.command(DeviceCommand::Pause)?;
        self.state.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.command(DeviceCommand::Resume)?;
        self.state.paused = false;
        Ok(())
    }

    fn request_state(&mut self) -> Result<()> {
        self.command(DeviceCommand::RequestState)?;
        self.push_state();
        Ok(())
    }

    fn subscribe(&mut self) -> Receiver<RemoteState> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::ManualClock;

    fn remote(clock: &ManualClock) -> RemotePlayback<MockDevice, ManualClock> {
        RemotePlayback::new(MockDevice::new(120_000), clock.clone(), RemoteSettings::default())
    }

    #[test]
    fn updates_are_rate_limited() {
        let clock = ManualClock::new();
        let mut player = remote(&clock);

        assert!(player.poll().is_some());
        clock.advance(Duration::from_millis(100));
        assert!(player.poll().is_none());
        clock.advance(Duration::from_millis(200));
        assert!(player.poll().is_some());
    }

    #[test]
    fn device_is_polled_on_its_interval() {
        let clock = ManualClock::new();
        let mut player = remote(&clock);
        for _ in 0..8 {
            player.poll();
            clock.advance(Duration::from_millis(250));
        }
        let requests = player
            .device()
            .commands()
            .iter()
            .filter(|command| **command == DeviceCommand::RequestState)
            .count();
        assert_eq!(requests, 2);
    }

    #[test]
    fn reports_replace_the_extrapolated_position() {
        let clock = ManualClock::new();
        let mut player = remote(&clock);
        player.play().unwrap();
        clock.advance(Duration::from_millis(500));
        assert!((player.state().position_seconds - 0.5).abs() < 1e-9);

        player.device_mut().set_position(30_000);
        player.device_mut().push_state();
        let state = player.poll().unwrap();
        assert_eq!(state.position_seconds, 30.0);
        assert_eq!(state.duration_seconds, 120.0);
        assert!(state.is_playing);
    }

    #[test]
    fn commands_are_forwarded_and_failures_reported() {
        let clock = ManualClock::new();
        let mut player = remote(&clock);
        player.seek(12.5).unwrap();
        player.pause().unwrap();
        assert_eq!(
            player.device().commands(),
            &[DeviceCommand::Seek(12_500), DeviceCommand::Pause]
        );
        assert_eq!(player.state().position_seconds, 12.5);

        player.device_mut().set_failing(true);
        let err = player.play().unwrap_err();
        assert_eq!(err.message(), "remote device unavailable");
        assert!(!player.state().is_playing);
        assert!(player.set_rate(1.5).is_err());
    }
}
