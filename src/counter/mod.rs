pub mod gate;
pub mod score;
pub mod state;

pub use gate::{ConfidenceGate, DEFAULT_CONFIDENCE_THRESHOLD};
pub use score::{CompletionEvent, ScoreCounter, DEFAULT_TARGET};
pub use state::{RepEvent, RepState, RepStateMachine};

use tracing::{info, warn};

use crate::config::CounterConfig;
use crate::diagnostics::{DiagnosticsSink, Snapshot};
use crate::pose::Pose;
use crate::trigger::CompletionTrigger;

/// 1サイクルの処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 信頼度ゲートで破棄
    Dropped,
    /// 遷移なし
    Idle,
    /// 腕が下りて再アーム
    Rearmed,
    /// 1回カウント
    Rep { count: u32 },
    /// 目標到達。トリガー発火済み、カウントは 0 に戻っている
    Completed,
}

/// ジャンピングジャックカウンタ
///
/// ゲート → 状態機械 → スコア → (到達時) トリガー の順に1姿勢を処理する。
/// 状態とスコアはこの構造体だけが持ち、フレームループから `&mut` で渡される。
#[derive(Debug, Default)]
pub struct JackCounter {
    gate: ConfidenceGate,
    machine: RepStateMachine,
    score: ScoreCounter,
}

impl JackCounter {
    pub fn new(gate: ConfidenceGate, target: u32) -> Self {
        Self {
            gate,
            machine: RepStateMachine::new(),
            score: ScoreCounter::new(target),
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(ConfidenceGate::new(config.confidence_threshold), config.target)
    }

    pub fn state(&self) -> RepState {
        self.machine.state()
    }

    pub fn count(&self) -> u32 {
        self.score.count()
    }

    pub fn target(&self) -> u32 {
        self.score.target()
    }

    pub fn process<T, D>(&mut self, pose: &Pose, trigger: &T, sink: &mut D) -> CycleOutcome
    where
        T: CompletionTrigger + ?Sized,
        D: DiagnosticsSink + ?Sized,
    {
        if !self.gate.passes(pose) {
            return CycleOutcome::Dropped;
        }

        let before = self.machine.state();
        let outcome = match self.machine.update(pose) {
            Some(rep) => match self.score.record(rep) {
                Some(CompletionEvent) => {
                    info!(goal = self.score.target(), "target reached, opening box");
                    if let Err(e) = trigger.signal_completion() {
                        warn!(error = %e, "completion signal not delivered");
                    }
                    CycleOutcome::Completed
                }
                None => {
                    info!(count = self.score.count(), goal = self.score.target(), "rep");
                    CycleOutcome::Rep {
                        count: self.score.count(),
                    }
                }
            },
            None if before != self.machine.state() => CycleOutcome::Rearmed,
            None => CycleOutcome::Idle,
        };

        sink.publish(&Snapshot::capture(
            pose,
            self.machine.state(),
            self.score.count(),
            self.score.target(),
        ));
        outcome
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::Cell;

    use crate::diagnostics::{DiagnosticsSink, Snapshot};
    use crate::error::TriggerError;
    use crate::pose::{Keypoint, KeypointIndex, Pose};
    use crate::trigger::CompletionTrigger;

    pub const NOSE_Y: f32 = 40.0;
    pub const SHOULDER_Y: f32 = 90.0;

    pub fn make_pose(wrist_y: f32, confidence: f32) -> Pose {
        let mut pose = Pose::default();
        pose.set(KeypointIndex::Nose, Keypoint::new(160.0, NOSE_Y, 0.9));
        pose.set(KeypointIndex::LeftEye, Keypoint::new(150.0, NOSE_Y - 8.0, 0.9));
        pose.set(KeypointIndex::LeftShoulder, Keypoint::new(130.0, SHOULDER_Y, 0.9));
        pose.set(KeypointIndex::RightShoulder, Keypoint::new(190.0, SHOULDER_Y, 0.9));
        pose.set(KeypointIndex::LeftWrist, Keypoint::new(90.0, wrist_y, confidence));
        pose.set(KeypointIndex::RightWrist, Keypoint::new(230.0, wrist_y, confidence));
        pose
    }

    pub fn raised() -> Pose {
        make_pose(20.0, 0.9)
    }

    pub fn lowered() -> Pose {
        make_pose(180.0, 0.9)
    }

    /// 呼び出し回数を数えるトリガー
    #[derive(Default)]
    pub struct CountingTrigger {
        pub calls: Cell<u32>,
        pub fail: bool,
    }

    impl CompletionTrigger for CountingTrigger {
        fn signal_completion(&self) -> Result<(), TriggerError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(TriggerError::Io(std::io::Error::other("relay unreachable")));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingSink {
        pub snapshots: Vec<Snapshot>,
    }

    impl DiagnosticsSink for RecordingSink {
        fn publish(&mut self, snapshot: &Snapshot) {
            self.snapshots.push(*snapshot);
        }
    }
}
