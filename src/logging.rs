use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "logs";

/// コンソールと `logs/<name>_<timestamp>.log` の両方へ出力する
///
/// `RUST_LOG` があればそちらを優先。戻り値はログファイルのパス
pub fn init(name: &str, default_level: &str) -> Result<PathBuf> {
    fs::create_dir_all(LOG_DIR).context("failed to create log directory")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = PathBuf::from(format!("{}/{}_{}.log", LOG_DIR, name, ts));
    let file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(path)
}
