//! Player-agnostic playback control
//!
//! The session talks to whichever player is active through [`PlaybackSource`].
//! [`local::LocalPlayback`] follows media-element semantics over decoded
//! audio; [`remote::RemotePlayback`] drives a remote device that only accepts
//! asynchronous commands and reports its state back over a channel.

pub mod control;
pub mod local;
pub mod remote;

use std::cell::Cell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::PlaybackState;

pub use control::ControlSurface;

/// Convenient alias for results returned by playback modules.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// A command the underlying player refused or could not carry out.
#[derive(Debug, Clone)]
pub struct PlaybackError {
    message: Arc<str>,
}

impl PlaybackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Arc::from(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for PlaybackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for PlaybackError {}

/// Capability interface over a concrete player.
pub trait PlaybackSource {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek(&mut self, seconds: f64) -> Result<()>;
    fn set_rate(&mut self, rate: f32) -> Result<()>;
    /// Latest known snapshot.
    fn state(&self) -> PlaybackState;
    /// A snapshot to apply now, if the source has one for this tick.
    fn poll(&mut self) -> Option<PlaybackState>;
}

impl<P: PlaybackSource + ?Sized> PlaybackSource for Box<P> {
    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        (**self).seek(seconds)
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        (**self).set_rate(rate)
    }

    fn state(&self) -> PlaybackState {
        (**self).state()
    }

    fn poll(&mut self) -> Option<PlaybackState> {
        (**self).poll()
    }
}

/// Monotonic time source shared by players and the session.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock; clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }
}

pub const MIN_RATE: f32 = 0.5;
pub const MAX_RATE: f32 = 2.0;
