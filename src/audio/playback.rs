use std::sync::Arc;
use std::time::Duration;

use rodio::source::{Source, UniformSourceIterator};
use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::playback::{PlaybackError, Result};
use crate::types::AudioData;

/// Mono samples shared between restarts so a seek never copies the track.
#[derive(Clone)]
pub struct SharedSamples {
    samples: Arc<[f32]>,
    sample_rate: u32,
    cursor: usize,
}

impl SharedSamples {
    pub fn new(samples: Arc<[f32]>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            cursor: 0,
        }
    }

    /// Same samples, starting `seconds` into the track.
    pub fn starting_at(&self, seconds: f64) -> Self {
        let offset = (seconds.max(0.0) * self.sample_rate as f64) as usize;
        Self {
            samples: Arc::clone(&self.samples),
            sample_rate: self.sample_rate,
            cursor: offset.min(self.samples.len()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.cursor
    }
}

impl Iterator for SharedSamples {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.samples.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl Source for SharedSamples {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.remaining())
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.samples.len() as f64 / self.sample_rate.max(1) as f64,
        ))
    }
}

/// Audible output for local playback. Each start builds a fresh sink from the
/// requested offset; dropping the previous sink stops it.
pub struct AudioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    track: SharedSamples,
}

impl AudioOutput {
    pub fn open(audio: AudioData) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|err| PlaybackError::new(format!("failed to open output stream: {}", err)))?;
        let track = SharedSamples::new(Arc::from(audio.samples), audio.sample_rate);
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            track,
        })
    }

    pub fn start_at(&mut self, seconds: f64, speed: f32) -> Result<()> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|err| PlaybackError::new(format!("failed to create sink: {}", err)))?;
        sink.append(ensure_stereo(self.track.starting_at(seconds)));
        sink.set_volume(1.0);
        sink.set_speed(speed);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    pub fn set_speed(&mut self, speed: f32) {
        if let Some(sink) = self.sink.as_ref() {
            sink.set_speed(speed);
        }
    }
}

fn ensure_stereo<S>(source: S) -> Box<dyn Source<Item = f32> + Send>
where
    S: Source<Item = f32> + Send + 'static,
{
    if source.channels() == 2 {
        Box::new(source)
    } else {
        let sample_rate = source.sample_rate();
        Box::new(UniformSourceIterator::new(source, 2, sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_offset_skips_whole_seconds_of_samples() {
        let track = SharedSamples::new(Arc::from(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]), 2);
        let tail: Vec<f32> = track.starting_at(1.0).collect();
        assert_eq!(tail, vec![0.3, 0.4, 0.5, 0.6]);
        assert_eq!(track.starting_at(10.0).remaining(), 0);
        assert_eq!(track.total_duration(), Some(Duration::from_secs(3)));
    }
}
