use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::counter::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TARGET};
use crate::trigger::{DEFAULT_OSC_ADDRESS, DEFAULT_TRIGGER_ADDR};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub frame_loop: FrameLoopConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CounterConfig {
    /// 箱を開けるまでの回数
    #[serde(default = "default_target")]
    pub target: u32,
    /// 手首の信頼度閾値（これを超えた姿勢のみ評価）
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_target() -> u32 { DEFAULT_TARGET }
fn default_confidence_threshold() -> f32 { DEFAULT_CONFIDENCE_THRESHOLD }

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// 推論失敗時の方針
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceErrorPolicy {
    /// ログに残して次のフレームへ
    #[default]
    Continue,
    /// ループを止める
    Halt,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FrameLoopConfig {
    /// サイクル間の待ち時間（ミリ秒）
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// 推論待ちのタイムアウト（ミリ秒）。未設定なら無制限
    #[serde(default)]
    pub inference_timeout_ms: Option<u64>,
    #[serde(default)]
    pub on_inference_error: InferenceErrorPolicy,
}

fn default_interval_ms() -> u64 { 1 }

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            inference_timeout_ms: None,
            on_inference_error: InferenceErrorPolicy::default(),
        }
    }
}

impl FrameLoopConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// 推論プロセスからTCPで受け取る
    #[default]
    Tcp,
    /// PoseNet JSON-lines ファイルを再生
    Replay,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_source_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_replay_path")]
    pub replay_path: String,
}

fn default_source_listen_addr() -> String { "127.0.0.1:9100".to_string() }
fn default_replay_path() -> String { "poses.jsonl".to_string() }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            listen_addr: default_source_listen_addr(),
            replay_path: default_replay_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    #[default]
    Osc,
    /// ログ出力のみ（ドライラン）
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TriggerConfig {
    #[serde(default)]
    pub kind: TriggerKind,
    #[serde(default = "default_trigger_addr")]
    pub target_addr: String,
    #[serde(default = "default_osc_address")]
    pub osc_address: String,
}

fn default_trigger_addr() -> String { DEFAULT_TRIGGER_ADDR.to_string() }
fn default_osc_address() -> String { DEFAULT_OSC_ADDRESS.to_string() }

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            kind: TriggerKind::default(),
            target_addr: default_trigger_addr(),
            osc_address: default_osc_address(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_trigger_addr")]
    pub listen_addr: String,
    /// シリアルデバイス（ボーレートは stty 等で事前に設定）
    #[serde(default = "default_device")]
    pub device: String,
    /// 受信時にデバイスへ書き込むバイト列
    #[serde(default = "default_payload")]
    pub payload: String,
}

fn default_device() -> String { "/dev/ttyACM0".to_string() }
fn default_payload() -> String { "5".to_string() }

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_trigger_addr(),
            device: default_device(),
            payload: default_payload(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    #[serde(default = "default_source_listen_addr")]
    pub counter_addr: String,
    #[serde(default = "default_replay_fps")]
    pub fps: f32,
}

fn default_replay_fps() -> f32 { 30.0 }

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            counter_addr: default_source_listen_addr(),
            fps: default_replay_fps(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// ファイルがない、または不正な場合はデフォルト値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config not found, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "invalid config, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.counter.target == 0 {
            bail!("counter.target must be at least 1");
        }
        let threshold = self.counter.confidence_threshold;
        // ゲートは閾値を厳密に超えた場合だけ通すので 1.0 では何も通らない
        if !(0.0..1.0).contains(&threshold) {
            bail!("counter.confidence_threshold must be within [0, 1), got {}", threshold);
        }
        if !(self.replay.fps > 0.0) {
            bail!("replay.fps must be positive, got {}", self.replay.fps);
        }
        if self.relay.payload.is_empty() {
            bail!("relay.payload must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.counter.target, 15);
        assert_eq!(config.counter.confidence_threshold, 0.2);
        assert_eq!(config.frame_loop.interval(), Duration::from_millis(1));
        assert_eq!(config.frame_loop.inference_timeout(), None);
        assert_eq!(config.frame_loop.on_inference_error, InferenceErrorPolicy::Continue);
        assert_eq!(config.source.kind, SourceKind::Tcp);
        assert_eq!(config.trigger.osc_address, "/jackbox/open");
        assert_eq!(config.relay.device, "/dev/ttyACM0");
        assert_eq!(config.relay.payload, "5");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"
[counter]
target = 5

[frame_loop]
inference_timeout_ms = 2000
on_inference_error = "halt"

[source]
kind = "replay"
replay_path = "session.jsonl"

[trigger]
kind = "log"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.counter.target, 5);
        assert_eq!(config.counter.confidence_threshold, 0.2);
        assert_eq!(config.frame_loop.interval_ms, 1);
        assert_eq!(config.frame_loop.inference_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.frame_loop.on_inference_error, InferenceErrorPolicy::Halt);
        assert_eq!(config.source.kind, SourceKind::Replay);
        assert_eq!(config.source.replay_path, "session.jsonl");
        assert_eq!(config.trigger.kind, TriggerKind::Log);
        assert_eq!(config.relay.listen_addr, config.trigger.target_addr);
    }

    #[test]
    fn test_load_rejects_zero_target() {
        let file = write_config("[counter]\ntarget = 0\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_threshold_out_of_range() {
        let file = write_config("[counter]\nconfidence_threshold = 1.5\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_threshold_no_pose_can_pass() {
        let file = write_config("[counter]\nconfidence_threshold = 1.0\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("[0, 1)"));

        let file = write_config("[counter]\nconfidence_threshold = 0.0\n");
        assert_eq!(Config::load(file.path()).unwrap().counter.confidence_threshold, 0.0);
    }

    #[test]
    fn test_load_rejects_unknown_policy() {
        let file = write_config("[frame_loop]\non_inference_error = \"retry\"\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/jackbox.toml");
        assert_eq!(config.counter.target, 15);
    }

    #[test]
    fn test_load_or_default_invalid_file() {
        let file = write_config("[counter\n");
        let config = Config::load_or_default(file.path());
        assert_eq!(config.counter.target, 15);
    }
}
