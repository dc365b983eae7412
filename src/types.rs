//! Core types for the active-listening engine

use serde::{Deserialize, Serialize};

/// Decoded audio (mono, f32 samples)
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 44100)
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A single transcript utterance. Timestamps are optional; segments without
/// both of them act as sequential units with no time mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default, alias = "startTime", alias = "start_time")]
    pub start: Option<f64>, // seconds
    #[serde(default, alias = "endTime", alias = "end_time")]
    pub end: Option<f64>, // seconds
    #[serde(default)]
    pub text: String,
}

impl TranscriptSegment {
    pub fn timed(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            text: text.into(),
        }
    }

    pub fn untimed(text: impl Into<String>) -> Self {
        Self {
            start: None,
            end: None,
            text: text.into(),
        }
    }

    /// Both timestamps, when present and usable.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.start, self.end) {
            (Some(start), Some(end))
                if start.is_finite() && end.is_finite() && start >= 0.0 && end >= start =>
            {
                Some((start, end))
            }
            _ => None,
        }
    }

    pub fn is_timed(&self) -> bool {
        self.bounds().is_some()
    }
}

/// A practice window of the full timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub index: usize,
    pub start: f64, // seconds
    pub end: f64,   // seconds
    /// First transcript segment (index into the untrimmed list) inside the chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_start_index: Option<usize>,
    /// Last transcript segment (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_end_index: Option<usize>,
}

impl Chunk {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open containment, `[start, end)`.
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position < self.end
    }

    pub fn clamp(&self, position: f64) -> f64 {
        position.clamp(self.start, self.end)
    }
}

/// Configuration for the chunking strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkConfig {
    pub target_duration: f64, // target chunk duration in seconds
    pub min_duration: f64,    // shortest acceptable segment-aware chunk
    pub max_duration: f64,    // longest acceptable segment-aware chunk
}

pub const DEFAULT_CHUNK_SECONDS: f64 = 60.0;

impl ChunkConfig {
    pub fn new(target_duration: f64) -> Self {
        Self {
            target_duration,
            min_duration: target_duration * 0.75, // 45s at the default target
            max_duration: target_duration * 1.25, // 75s at the default target
        }
    }

    pub fn accepts(&self, duration: f64) -> bool {
        duration >= self.min_duration && duration <= self.max_duration
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SECONDS)
    }
}

/// The four listening strategies applied to every chunk, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Pass {
    Listen,
    ListenRead,
    ReadAdjust,
    FinalListen,
}

impl Pass {
    pub const ALL: [Pass; 4] = [
        Pass::Listen,
        Pass::ListenRead,
        Pass::ReadAdjust,
        Pass::FinalListen,
    ];

    pub fn number(self) -> u8 {
        match self {
            Pass::Listen => 1,
            Pass::ListenRead => 2,
            Pass::ReadAdjust => 3,
            Pass::FinalListen => 4,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Pass::Listen),
            2 => Some(Pass::ListenRead),
            3 => Some(Pass::ReadAdjust),
            4 => Some(Pass::FinalListen),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Pass::Listen => "Listen",
            Pass::ListenRead => "Listen + Read",
            Pass::ReadAdjust => "Read + Adjust",
            Pass::FinalListen => "Final Listen",
        }
    }

    /// Passes completed by listening all the way through the chunk.
    pub fn completes_by_playback(self) -> bool {
        !matches!(self, Pass::ReadAdjust)
    }
}

impl From<Pass> for u8 {
    fn from(pass: Pass) -> Self {
        pass.number()
    }
}

/// Listening Lab modes. Only `Active` drives the chunk/pass engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListeningMode {
    #[default]
    Extensive,
    Active,
    Intensive,
}

/// Transient player snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
    pub rate: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            position_seconds: 0.0,
            duration_seconds: 0.0,
            is_playing: false,
            rate: 1.0,
        }
    }
}
