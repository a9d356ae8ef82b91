use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use jackbox::config::{Config, SourceKind, TriggerKind};
use jackbox::counter::JackCounter;
use jackbox::diagnostics::TracingSink;
use jackbox::driver::{CaptureHandle, FrameLoop, FrameLoopOptions, LoopExit};
use jackbox::logging;
use jackbox::pose::{JsonLinesSource, PoseSource, TcpPoseSource};
use jackbox::trigger::{CompletionTrigger, LogTrigger, OscTrigger};

/// Counts jumping jacks from pose keypoints and opens the box at the target.
#[derive(Parser, Debug)]
#[command(name = "jackbox", version = env!("GIT_VERSION"), about)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "jackbox.toml")]
    config: PathBuf,

    /// Replay a PoseNet JSON-lines recording instead of the configured source
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = logging::init("jackbox", &cli.log_level)?;
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::load_or_default(&cli.config)
    };

    info!(version = env!("GIT_VERSION"), log = %log_path.display(), "jackbox");
    info!(
        goal = config.counter.target,
        threshold = config.counter.confidence_threshold,
        interval_ms = config.frame_loop.interval_ms,
        policy = ?config.frame_loop.on_inference_error,
        "counter config"
    );

    let trigger: Box<dyn CompletionTrigger + Send> = match config.trigger.kind {
        TriggerKind::Osc => {
            let t = OscTrigger::new(&config.trigger.target_addr, &config.trigger.osc_address)
                .context("failed to create OSC trigger")?;
            info!(target_addr = %t.target_addr(), address = %config.trigger.osc_address, "OSC trigger ready");
            Box::new(t)
        }
        TriggerKind::Log => Box::new(LogTrigger),
    };

    let capture = CaptureHandle::new(true);
    let quit = CancellationToken::new();
    spawn_ctrl_c(capture.clone(), quit.clone());
    spawn_console(capture.clone(), quit.clone());
    info!("commands: 's' + Enter start, 'x' + Enter stop, 'q' + Enter quit");

    let counter = JackCounter::from_config(&config.counter);
    let options = FrameLoopOptions::from(&config.frame_loop);

    match (cli.replay, config.source.kind) {
        (Some(path), _) => {
            let source = JsonLinesSource::open(&path).await?;
            let frame_loop = FrameLoop::new(source, trigger, TracingSink, counter, capture, options);
            run(frame_loop, quit, false).await
        }
        (None, SourceKind::Replay) => {
            let source = JsonLinesSource::open(&config.source.replay_path).await?;
            let frame_loop = FrameLoop::new(source, trigger, TracingSink, counter, capture, options);
            run(frame_loop, quit, false).await
        }
        (None, SourceKind::Tcp) => {
            let source = TcpPoseSource::bind(&config.source.listen_addr).await?;
            let frame_loop = FrameLoop::new(source, trigger, TracingSink, counter, capture, options);
            run(frame_loop, quit, true).await
        }
    }
}

/// Runs rounds until quit. With `reconnect`, an exhausted source (the TCP
/// client went away) waits for the next client instead of ending the program.
async fn run<S: PoseSource>(
    mut frame_loop: FrameLoop<S, Box<dyn CompletionTrigger + Send>, TracingSink>,
    quit: CancellationToken,
    reconnect: bool,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = quit.cancelled() => break,
            _ = frame_loop.capture().wait_until(true) => {}
        }

        let exit = tokio::select! {
            exit = frame_loop.run() => exit,
            _ = quit.cancelled() => break,
        };

        match exit {
            LoopExit::Completed => info!("target reached; 's' + Enter for another round"),
            LoopExit::Stopped => info!("capture paused"),
            LoopExit::Halted => {
                warn!("halted on inference error");
                break;
            }
            LoopExit::SourceExhausted if reconnect => {
                info!("inference client gone, waiting for the next one");
            }
            LoopExit::SourceExhausted => {
                info!("pose source exhausted");
                break;
            }
        }
    }
    info!(count = frame_loop.counter().count(), "bye");
    Ok(())
}

fn spawn_ctrl_c(capture: CaptureHandle, quit: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            capture.stop();
            quit.cancel();
        }
    });
}

fn spawn_console(capture: CaptureHandle, quit: CancellationToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => match line.trim() {
                    "s" => capture.start(),
                    "x" => capture.stop(),
                    "q" => {
                        capture.stop();
                        quit.cancel();
                        break;
                    }
                    "" => {}
                    other => eprintln!("unknown command: {}", other),
                },
            }
        }
    });
}
