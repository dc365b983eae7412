use std::path::PathBuf;

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::types::{ListeningMode, Pass};

#[derive(Parser, Debug)]
#[command(
    name = "listening-lab",
    version,
    about = "Active-listening practice: one-minute chunks, four passes each"
)]
pub struct Cli {
    /// Optional JSON config file overriding the built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the chunk plan for a transcript.
    Chunks(ChunksArgs),
    /// Practise an audio file interactively in the terminal.
    Practice(PracticeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ChunksArgs {
    /// Transcript file (JSON segments, or plain text with a .txt extension).
    #[arg(long)]
    pub transcript: PathBuf,
    /// Media duration in seconds; defaults to the transcript's own extent.
    #[arg(long)]
    pub duration: Option<f64>,
    /// Audio file to take the duration from.
    #[arg(long, conflicts_with = "duration")]
    pub audio: Option<PathBuf>,
    /// Target chunk length in seconds.
    #[arg(long)]
    pub target: Option<f64>,
    /// Emit the plan as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ChunksArgs {
    pub fn validate(&self) -> Result<()> {
        if let Some(duration) = self.duration {
            ensure!(
                duration.is_finite() && duration > 0.0,
                "duration must be positive, got {}",
                duration
            );
        }
        if let Some(target) = self.target {
            ensure!(
                target.is_finite() && target > 0.0,
                "target must be positive, got {}",
                target
            );
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct PracticeArgs {
    /// Audio file to practise with.
    #[arg(long)]
    pub audio: PathBuf,
    /// Transcript file; without one the audio is cut into fixed-length chunks.
    #[arg(long)]
    pub transcript: Option<PathBuf>,
    /// Keep time without opening an audio output device.
    #[arg(long)]
    pub silent: bool,
    /// Listening mode to start in (extensive, active, intensive).
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<ListeningMode>,
}

/// One line typed during a practice session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PracticeCommand {
    PlayPause,
    Seek(f64),
    Scrub(f64),
    Rate(f32),
    Step(Pass),
    BeginFinalListen,
    NextChunk,
    Chunk(usize),
    Restart,
    Mode(ListeningMode),
    Status,
    Help,
    Quit,
}

pub const PRACTICE_HELP: &str = "\
commands:
  p                play / pause
  s <seconds>      seek
  f | b            scrub forward / back 5 s
  rate <x>         playback rate (0.5 - 2.0)
  step <1-4>       select pass
  final            begin the final listen
  next             next chunk
  chunk <n>        jump to chunk n
  r                restart the chunk
  mode <name>      extensive, active or intensive
  status | help | q";

const SCRUB_SECONDS: f64 = 5.0;

impl PracticeCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            bail!("empty command");
        };
        let argument = words.next();
        let command = match (head, argument) {
            ("p" | "play" | "pause", None) => PracticeCommand::PlayPause,
            ("s" | "seek", Some(raw)) => PracticeCommand::Seek(parse_number(raw, "seek target")?),
            ("f", None) => PracticeCommand::Scrub(SCRUB_SECONDS),
            ("b", None) => PracticeCommand::Scrub(-SCRUB_SECONDS),
            ("rate", Some(raw)) => PracticeCommand::Rate(parse_number(raw, "rate")? as f32),
            ("step", Some(raw)) => {
                let number: u8 = raw
                    .parse()
                    .with_context(|| format!("invalid pass number '{}'", raw))?;
                let pass = Pass::from_number(number)
                    .with_context(|| format!("pass must be 1-4, got {}", number))?;
                PracticeCommand::Step(pass)
            }
            ("final", None) => PracticeCommand::BeginFinalListen,
            ("next", None) => PracticeCommand::NextChunk,
            ("chunk", Some(raw)) => {
                let number: usize = raw
                    .parse()
                    .with_context(|| format!("invalid chunk number '{}'", raw))?;
                ensure!(number > 0, "chunks are numbered from 1");
                PracticeCommand::Chunk(number - 1)
            }
            ("r" | "restart", None) => PracticeCommand::Restart,
            ("mode", Some(raw)) => PracticeCommand::Mode(parse_mode(raw)?),
            ("status", None) => PracticeCommand::Status,
            ("h" | "help", None) => PracticeCommand::Help,
            ("q" | "quit", None) => PracticeCommand::Quit,
            _ => bail!("unknown command '{}'", line.trim()),
        };
        ensure!(words.next().is_none(), "too many arguments in '{}'", line.trim());
        Ok(command)
    }
}

fn parse_number(raw: &str, label: &str) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .with_context(|| format!("invalid {} '{}'", label, raw))?;
    ensure!(value.is_finite(), "{} must be finite", label);
    Ok(value)
}

pub fn parse_mode(raw: &str) -> Result<ListeningMode> {
    match raw.to_ascii_lowercase().as_str() {
        "extensive" => Ok(ListeningMode::Extensive),
        "active" => Ok(ListeningMode::Active),
        "intensive" => Ok(ListeningMode::Intensive),
        other => bail!("unknown listening mode '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, PracticeCommand};
    use crate::types::{ListeningMode, Pass};
    use clap::Parser;

    #[test]
    fn parses_chunks_subcommand() {
        let cli = Cli::try_parse_from([
            "listening-lab",
            "chunks",
            "--transcript",
            "talk.json",
            "--duration",
            "185",
            "--json",
        ])
        .unwrap();
        let Command::Chunks(args) = cli.command else {
            panic!("expected chunks subcommand");
        };
        assert_eq!(args.duration, Some(185.0));
        assert!(args.json);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn rejects_duration_together_with_audio() {
        let parsed = Cli::try_parse_from([
            "listening-lab",
            "chunks",
            "--transcript",
            "talk.json",
            "--duration",
            "10",
            "--audio",
            "talk.wav",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn practice_mode_flag_is_parsed() {
        let cli = Cli::try_parse_from([
            "listening-lab",
            "practice",
            "--audio",
            "talk.wav",
            "--mode",
            "Intensive",
        ])
        .unwrap();
        let Command::Practice(args) = cli.command else {
            panic!("expected practice subcommand");
        };
        assert_eq!(args.mode, Some(ListeningMode::Intensive));
        assert!(!args.silent);
    }

    #[test]
    fn parses_practice_commands() {
        assert_eq!(PracticeCommand::parse("p").unwrap(), PracticeCommand::PlayPause);
        assert_eq!(PracticeCommand::parse("s 12.5").unwrap(), PracticeCommand::Seek(12.5));
        assert_eq!(PracticeCommand::parse(" b ").unwrap(), PracticeCommand::Scrub(-5.0));
        assert_eq!(
            PracticeCommand::parse("step 3").unwrap(),
            PracticeCommand::Step(Pass::ReadAdjust)
        );
        assert_eq!(PracticeCommand::parse("chunk 2").unwrap(), PracticeCommand::Chunk(1));
        assert!(PracticeCommand::parse("step 5").is_err());
        assert!(PracticeCommand::parse("chunk 0").is_err());
        assert!(PracticeCommand::parse("s nan").is_err());
        assert!(PracticeCommand::parse("dance").is_err());
    }
}
