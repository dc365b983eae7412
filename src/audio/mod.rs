pub mod decoder;
pub mod playback;
