pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod engine;
pub mod passes;
pub mod playback;
pub mod session;
pub mod tracker;
pub mod transcript;
pub mod types;
