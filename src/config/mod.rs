use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::passes::PassSettings;
use crate::playback::{MAX_RATE, MIN_RATE};
use crate::types::{ChunkConfig, ListeningMode, DEFAULT_CHUNK_SECONDS};

/// Tunables for a listening session, loaded from an optional JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabConfig {
    #[serde(alias = "chunk_seconds")]
    pub chunk_seconds: f64,
    /// Shortest segment-aware chunk; 75% of `chunk_seconds` when unset.
    #[serde(alias = "min_chunk_seconds")]
    pub min_chunk_seconds: Option<f64>,
    /// Longest segment-aware chunk; 125% of `chunk_seconds` when unset.
    #[serde(alias = "max_chunk_seconds")]
    pub max_chunk_seconds: Option<f64>,
    #[serde(alias = "completion_epsilon")]
    pub completion_epsilon: f64,
    #[serde(alias = "boundary_tolerance")]
    pub boundary_tolerance: f64,
    #[serde(alias = "continuity_tolerance")]
    pub continuity_tolerance: f64,
    #[serde(alias = "auto_advance_chunk")]
    pub auto_advance_chunk: bool,
    pub mode: ListeningMode,
    #[serde(alias = "playback_rate")]
    pub playback_rate: f32,
    #[serde(alias = "tick_ms")]
    pub tick_ms: u64,
}

impl Default for LabConfig {
    fn default() -> Self {
        let passes = PassSettings::default();
        Self {
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            min_chunk_seconds: None,
            max_chunk_seconds: None,
            completion_epsilon: passes.completion_epsilon,
            boundary_tolerance: passes.boundary_tolerance,
            continuity_tolerance: passes.continuity_tolerance,
            auto_advance_chunk: passes.auto_advance_chunk,
            mode: ListeningMode::Active,
            playback_rate: 1.0,
            tick_ms: 100,
        }
    }
}

impl LabConfig {
    /// Defaults, or the JSON file at `path` layered over them.
    pub fn from_override(path: Option<PathBuf>) -> Result<Self> {
        let config = match path {
            Some(custom) => Self::load(&custom)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {:?}", path))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file at {:?}", path))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.chunk_seconds.is_finite() && self.chunk_seconds > 0.0,
            "chunkSeconds must be positive, got {}",
            self.chunk_seconds
        );
        let chunking = self.chunk_config();
        ensure!(
            chunking.min_duration > 0.0 && chunking.min_duration <= chunking.target_duration,
            "minChunkSeconds must lie in (0, chunkSeconds]"
        );
        ensure!(
            chunking.max_duration >= chunking.target_duration,
            "maxChunkSeconds must be at least chunkSeconds"
        );
        for (name, value) in [
            ("completionEpsilon", self.completion_epsilon),
            ("boundaryTolerance", self.boundary_tolerance),
            ("continuityTolerance", self.continuity_tolerance),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{} must be a non-negative number, got {}",
                name,
                value
            );
        }
        ensure!(
            (MIN_RATE..=MAX_RATE).contains(&self.playback_rate),
            "playbackRate must lie within {}..={}",
            MIN_RATE,
            MAX_RATE
        );
        ensure!(self.tick_ms > 0, "tickMs must be positive");
        Ok(())
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        let defaults = ChunkConfig::new(self.chunk_seconds);
        ChunkConfig {
            target_duration: self.chunk_seconds,
            min_duration: self.min_chunk_seconds.unwrap_or(defaults.min_duration),
            max_duration: self.max_chunk_seconds.unwrap_or(defaults.max_duration),
        }
    }

    pub fn pass_settings(&self) -> PassSettings {
        PassSettings {
            completion_epsilon: self.completion_epsilon,
            boundary_tolerance: self.boundary_tolerance,
            continuity_tolerance: self.continuity_tolerance,
            auto_advance_chunk: self.auto_advance_chunk,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
