//! Four-pass mastery state machine
//!
//! Each chunk is practised in four passes (listen, listen + read, read +
//! adjust, final listen). Passes 1, 2 and 4 complete only after playback has
//! continuously covered the chunk up to its end; pass 3 completes when the
//! learner explicitly begins the final listen. All transitions are pure: they
//! take the current [`ActiveState`] and return a new one together with the
//! side effects the caller has to carry out.

mod machine;


use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::types::Pass;

pub use machine::ActiveState;

/// Thresholds for completion and boundary handling (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSettings {
    /// Coverage within this distance of the chunk end counts as complete.
    pub completion_epsilon: f64,
    /// Positions further than this outside the chunk are pulled back.
    pub boundary_tolerance: f64,
    /// Largest forward step between updates still treated as continuous play.
    pub continuity_tolerance: f64,
    /// Move to the next chunk as soon as the final listen completes.
    pub auto_advance_chunk: bool,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            completion_epsilon: 0.05,
            boundary_tolerance: 0.2,
            continuity_tolerance: 2.5,
            auto_advance_chunk: true,
        }
    }
}

/// Progress of one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassState {
    completed: BTreeSet<Pass>,
    final_listen_committed: bool,
}

impl PassState {
    pub fn is_completed(&self, pass: Pass) -> bool {
        self.completed.contains(&pass)
    }

    pub fn completed(&self) -> Vec<Pass> {
        self.completed.iter().copied().collect()
    }

    /// Pass 3 was closed by an explicit "begin final listen".
    pub fn is_committed(&self) -> bool {
        self.final_listen_committed
    }
}

/// One position sample from whichever adapter owns the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    pub position: f64,
    pub is_playing: bool,
    /// Monotonic time of the sample; older samples than the last applied one
    /// are dropped.
    pub timestamp: Duration,
}

impl PositionUpdate {
    pub fn new(position: f64, is_playing: bool, timestamp: Duration) -> Self {
        Self {
            position,
            is_playing,
            timestamp,
        }
    }
}

/// Side effects requested by a transition, in execution order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Seek(f64),
    Pause,
    Play,
    PassCompleted { chunk_index: usize, pass: Pass },
    ChunkCompleted { chunk_index: usize },
}

/// Why a requested transition was refused. The state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoChunks,
    UnknownChunk(usize),
    ChunkLocked(usize),
    PassNotCompleted(Pass),
    SkipsAhead { from: Pass, to: Pass },
    ChunkNotFinished(usize),
    LastChunk,
    NotInReview,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NoChunks => write!(f, "no chunks available yet"),
            Rejection::UnknownChunk(index) => write!(f, "chunk {} does not exist", index + 1),
            Rejection::ChunkLocked(index) => write!(
                f,
                "chunk {} is locked until the previous chunk is finished",
                index + 1
            ),
            Rejection::PassNotCompleted(pass) => {
                write!(f, "pass {} ({}) is not completed", pass.number(), pass.label())
            }
            Rejection::SkipsAhead { from, to } => write!(
                f,
                "cannot jump from pass {} to pass {}",
                from.number(),
                to.number()
            ),
            Rejection::ChunkNotFinished(index) => {
                write!(f, "final listen of chunk {} is not completed", index + 1)
            }
            Rejection::LastChunk => write!(f, "already on the last chunk"),
            Rejection::NotInReview => write!(f, "final listen can only begin from pass 3"),
        }
    }
}

impl Error for Rejection {}

/// Result of an applied transition
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ActiveState,
    pub intents: Vec<Intent>,
}

impl Transition {
    fn unchanged(state: &ActiveState) -> Self {
        Self {
            state: state.clone(),
            intents: Vec::new(),
        }
    }
}
