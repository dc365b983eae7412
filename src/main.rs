use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use listening_lab::audio::decoder::decode_audio;
use listening_lab::chunking::partition;
use listening_lab::cli::{ChunksArgs, Cli, Command, PracticeArgs, PracticeCommand, PRACTICE_HELP};
use listening_lab::config::LabConfig;
use listening_lab::engine::ActiveListeningEngine;
use listening_lab::playback::local::LocalPlayback;
use listening_lab::playback::{PlaybackSource, SystemClock};
use listening_lab::session::{ListeningSession, SessionSnapshot};
use listening_lab::transcript::Transcript;
use listening_lab::types::{ChunkConfig, ListeningMode};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = LabConfig::from_override(cli.config.clone())
        .context("Failed to load configuration")?;
    match &cli.command {
        Command::Chunks(args) => handle_chunks(args, &config),
        Command::Practice(args) => handle_practice(args, &config),
    }
}

fn handle_chunks(args: &ChunksArgs, config: &LabConfig) -> Result<()> {
    args.validate()
        .context("Failed to validate command-line arguments")?;
    let transcript = Transcript::load(&args.transcript)?;
    let duration = match (&args.audio, args.duration) {
        (Some(audio), _) => decode_audio(audio)
            .with_context(|| format!("Failed to decode audio file {:?}", audio))?
            .duration_seconds(),
        (None, Some(duration)) => duration,
        (None, None) => transcript.timed_end().unwrap_or(0.0),
    };
    let chunk_config = match args.target {
        Some(target) => ChunkConfig::new(target),
        None => config.chunk_config(),
    };
    let chunks = partition(&transcript.segments, duration, chunk_config);
    info!(chunks = chunks.len(), duration, "chunk plan ready");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }
    if chunks.is_empty() {
        println!("No chunks: the transcript has no timing and no duration is known.");
        return Ok(());
    }
    for chunk in &chunks {
        let segments = match (chunk.segment_start_index, chunk.segment_end_index) {
            (Some(first), Some(last)) => format!("segments {}-{}", first + 1, last + 1),
            _ => "no segments".to_string(),
        };
        println!(
            "chunk {:>3}  {:>8.2}s - {:>8.2}s  ({:>6.2}s, {})",
            chunk.index + 1,
            chunk.start,
            chunk.end,
            chunk.duration(),
            segments
        );
    }
    Ok(())
}

fn handle_practice(args: &PracticeArgs, config: &LabConfig) -> Result<()> {
    let transcript = match &args.transcript {
        Some(path) => Transcript::load(path)?,
        None => Transcript::default(),
    };
    let player = open_player(&args.audio, args.silent)?;
    let duration = player.state().duration_seconds;
    let engine = ActiveListeningEngine::new(
        transcript,
        duration,
        config.chunk_config(),
        config.pass_settings(),
    );
    let mode = args.mode.unwrap_or(config.mode);
    let mut session = ListeningSession::new(engine, player, mode, SystemClock);
    if let Err(err) = session.on_set_rate(config.playback_rate) {
        warn!(error = %err, "initial playback rate not applied");
    }

    println!("{}", PRACTICE_HELP);
    print_status(&session.snapshot());
    let input = spawn_input_reader();
    let mut last_key = status_key(&session.snapshot());
    loop {
        match input.recv_timeout(config.tick_interval()) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match PracticeCommand::parse(&line) {
                    Ok(PracticeCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(err) = apply_command(&mut session, command) {
                            println!("! {:#}", err);
                        }
                        print_status(&session.snapshot());
                    }
                    Err(err) => println!("! {:#}", err),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Err(err) = session.tick() {
            println!("! {:#}", err);
        }
        let snapshot = session.snapshot();
        let key = status_key(&snapshot);
        if key != last_key {
            print_status(&snapshot);
            last_key = key;
        }
        if snapshot.view.session_complete && !snapshot.view.is_playing {
            println!("All chunks completed.");
            break;
        }
    }
    session.shutdown()
}

fn open_player(path: &Path, silent: bool) -> Result<Box<dyn PlaybackSource>> {
    if silent {
        let audio = decode_audio(path)
            .with_context(|| format!("Failed to decode audio file {:?}", path))?;
        return Ok(Box::new(LocalPlayback::silent(
            audio.duration_seconds(),
            SystemClock,
        )));
    }
    Ok(Box::new(LocalPlayback::from_file(path)?))
}

fn spawn_input_reader() -> Receiver<String> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn apply_command<P: PlaybackSource>(
    session: &mut ListeningSession<P>,
    command: PracticeCommand,
) -> Result<()> {
    match command {
        PracticeCommand::PlayPause => session.on_play_pause(),
        PracticeCommand::Seek(target) => session.on_seek(target).map(|_| ()),
        PracticeCommand::Scrub(delta) => session.on_scrub_change(delta).map(|_| ()),
        PracticeCommand::Rate(rate) => session.on_set_rate(rate).map(|_| ()),
        PracticeCommand::Step(pass) => session.on_select_step(pass),
        PracticeCommand::BeginFinalListen => session.on_begin_final_listen(),
        PracticeCommand::NextChunk => session.on_advance_chunk(),
        PracticeCommand::Chunk(index) => session.on_select_chunk(index),
        PracticeCommand::Restart => session.on_restart_chunk(),
        PracticeCommand::Mode(mode) => session.switch_mode(mode),
        PracticeCommand::Status => Ok(()),
        PracticeCommand::Help => {
            println!("{}", PRACTICE_HELP);
            Ok(())
        }
        PracticeCommand::Quit => Ok(()),
    }
}

/// What has to change before the status line is printed again.
fn status_key(snapshot: &SessionSnapshot) -> (ListeningMode, usize, u8, usize, bool) {
    let view = &snapshot.view;
    (
        snapshot.mode,
        view.active_chunk_index,
        view.active_step.number(),
        view.completed_passes.len(),
        view.is_playing,
    )
}

fn print_status(snapshot: &SessionSnapshot) {
    let view = &snapshot.view;
    let passes: Vec<String> = view
        .completed_passes
        .iter()
        .map(|pass| pass.number().to_string())
        .collect();
    match snapshot.mode {
        ListeningMode::Active if !view.chunks.is_empty() => {
            let chunk = &view.chunks[view.active_chunk_index.min(view.chunks.len() - 1)];
            println!(
                "[chunk {}/{} {:.1}-{:.1}s] pass {} ({}) done [{}] at {:.1}s {}",
                view.active_chunk_index + 1,
                view.chunks.len(),
                chunk.start,
                chunk.end,
                view.active_step.number(),
                view.active_step.label(),
                passes.join(","),
                view.playback_position_seconds,
                if view.is_playing { "playing" } else { "paused" }
            );
        }
        mode => println!(
            "[{:?}] at {:.1}s / {:.1}s {}",
            mode,
            view.playback_position_seconds,
            view.playback_duration_seconds,
            if view.is_playing { "playing" } else { "paused" }
        ),
    }
    if let Some(error) = &snapshot.error {
        println!("! player: {}", error);
    }
}
