use std::f32::consts::PI;
use std::path::Path;

use anyhow::Result;
use approx::assert_abs_diff_eq;
use assert_cmd::Command;
use listening_lab::audio::decoder::decode_audio;
use predicates::prelude::*;
use tempfile::tempdir;

const SAMPLE_RATE: u32 = 16_000;

fn write_tone(path: &Path, channels: u16, seconds: f32) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (SAMPLE_RATE as f32 * seconds) as usize;
    for index in 0..frames {
        let t = index as f32 / SAMPLE_RATE as f32;
        let sample = ((2.0 * PI * 220.0 * t).sin() * 0.5 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

#[test]
fn decodes_wav_to_mono_samples() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tone.wav");
    write_tone(&path, 2, 1.5)?;

    let audio = decode_audio(&path)?;
    assert_eq!(audio.sample_rate, SAMPLE_RATE);
    assert_abs_diff_eq!(audio.duration_seconds(), 1.5, epsilon = 0.01);
    let peak = audio.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    assert!(peak > 0.4 && peak <= 0.51, "unexpected peak {}", peak);
    Ok(())
}

#[test]
fn missing_audio_file_is_an_error() {
    let err = decode_audio("/nonexistent/tone.wav").unwrap_err();
    assert!(err.to_string().contains("Failed to open audio file"));
}

#[test]
fn chunk_plan_takes_its_duration_from_audio() -> Result<()> {
    let dir = tempdir()?;
    let audio = dir.path().join("tone.wav");
    write_tone(&audio, 1, 1.5)?;
    let transcript = dir.path().join("story.txt");
    std::fs::write(&transcript, "Uno. Dos. Tres.")?;

    Command::cargo_bin("listening-lab")?
        .args(["chunks", "--target", "0.5", "--transcript"])
        .arg(&transcript)
        .arg("--audio")
        .arg(&audio)
        .assert()
        .success()
        .stdout(predicate::str::contains("chunk   3"))
        .stdout(predicate::str::contains("chunk   4").not());
    Ok(())
}
