use std::fmt;

use serde::Serialize;

use crate::pose::{KeypointIndex, Pose};

/// レップ検出の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RepState {
    /// 腕が上がるのを待っている（初期状態）
    #[default]
    WaitingForRaise,
    /// 腕が頭より下に戻るのを待っている
    WaitingForLower,
}

impl fmt::Display for RepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForRaise => write!(f, "waiting-for-raise"),
            Self::WaitingForLower => write!(f, "waiting-for-lower"),
        }
    }
}

/// 1回分のジャンピングジャック
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepEvent;

/// ヒステリシス付き2状態の検出器
///
/// - WaitingForRaise → WaitingForLower: 両手首が左肩より上（y が小さい）。RepEvent を発行
/// - WaitingForLower → WaitingForRaise: 両手首が鼻より下（y が大きい）。再アームのみ
///
/// 比較はすべて厳密。等しい場合は遷移しない。腕を上げている間の連続フレームを
/// 1回として数えるため、頭より下まで下ろさない限り次はカウントされない。
#[derive(Debug, Default)]
pub struct RepStateMachine {
    state: RepState,
}

impl RepStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    /// 信頼度ゲートを通過した姿勢で状態を更新
    pub fn update(&mut self, pose: &Pose) -> Option<RepEvent> {
        let left_wrist = pose.get(KeypointIndex::LeftWrist).y;
        let right_wrist = pose.get(KeypointIndex::RightWrist).y;

        match self.state {
            RepState::WaitingForRaise => {
                let shoulder = pose.get(KeypointIndex::LeftShoulder).y;
                if left_wrist < shoulder && right_wrist < shoulder {
                    self.state = RepState::WaitingForLower;
                    return Some(RepEvent);
                }
            }
            RepState::WaitingForLower => {
                let nose = pose.get(KeypointIndex::Nose).y;
                if left_wrist > nose && right_wrist > nose {
                    self.state = RepState::WaitingForRaise;
                }
            }
        }
        None
    }

    pub fn reset(&mut self) {
        self.state = RepState::WaitingForRaise;
    }
}
