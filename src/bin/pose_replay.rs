//! Pose replay: streams a PoseNet JSON-lines recording to a running counter
//! over TCP, standing in for the live inference process.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use jackbox::config::Config;
use jackbox::logging;
use jackbox::pose::parse_posenet_json;
use jackbox::protocol::{self, PoseMessage};

#[derive(Parser, Debug)]
#[command(name = "pose_replay", version = env!("GIT_VERSION"), about)]
struct Cli {
    /// Recording to send (one PoseNet JSON object per line)
    recording: PathBuf,

    /// Path to configuration file
    #[arg(short, long, default_value = "jackbox.toml")]
    config: PathBuf,

    /// Frames per second, overrides replay.fps
    #[arg(long)]
    fps: Option<f32>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init("pose_replay", &cli.log_level)?;
    let config = Config::load_or_default(&cli.config);
    let fps = cli.fps.unwrap_or(config.replay.fps);
    anyhow::ensure!(fps > 0.0, "fps must be positive, got {}", fps);

    let file = tokio::fs::File::open(&cli.recording)
        .await
        .with_context(|| format!("failed to open {}", cli.recording.display()))?;
    let mut lines = BufReader::new(file).lines();

    let stream = TcpStream::connect(&config.replay.counter_addr)
        .await
        .with_context(|| format!("failed to connect to {}", config.replay.counter_addr))?;
    stream.set_nodelay(true)?;
    let mut framed = protocol::message_stream(stream);
    info!(counter = %config.replay.counter_addr, fps, "replaying {}", cli.recording.display());

    let mut ticker = tokio::time::interval(Duration::from_secs_f32(1.0 / fps));
    let mut frame_id = 0u64;
    let mut failed = 0u64;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        ticker.tick().await;
        frame_id += 1;
        // 壊れた行は推論失敗として送る
        let msg = match parse_posenet_json(&line) {
            Ok(pose) => PoseMessage::Pose { frame_id, pose },
            Err(e) => {
                failed += 1;
                warn!(frame_id, error = %e, "unreadable line");
                PoseMessage::InferenceFailed {
                    frame_id,
                    reason: e.to_string(),
                }
            }
        };
        if let Err(e) = protocol::send_message(&mut framed, &msg).await {
            // カウンタ側が目標到達などで切断した
            warn!(error = %e, "counter went away");
            return Ok(());
        }
    }

    protocol::send_message(&mut framed, &PoseMessage::EndOfStream).await?;
    info!(frames = frame_id, failed, "replay finished");
    Ok(())
}
