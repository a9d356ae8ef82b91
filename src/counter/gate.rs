use crate::pose::{KeypointIndex, Pose};

/// 手首の信頼度閾値のデフォルト
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.2;

/// 信頼度ゲート
///
/// 両手首の信頼度が閾値を超えた姿勢だけを通す。低信頼度のキーポイントは
/// ノイズの可能性が高く、状態遷移に使うと誤カウントになる。
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceGate {
    threshold: f32,
}

impl ConfidenceGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// 両手首が閾値を厳密に超えていれば true
    pub fn passes(&self, pose: &Pose) -> bool {
        pose.get(KeypointIndex::LeftWrist).is_confident(self.threshold)
            && pose.get(KeypointIndex::RightWrist).is_confident(self.threshold)
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    fn wrists(left: f32, right: f32) -> Pose {
        let mut pose = Pose::default();
        pose.set(KeypointIndex::LeftWrist, Keypoint::new(100.0, 50.0, left));
        pose.set(KeypointIndex::RightWrist, Keypoint::new(200.0, 50.0, right));
        pose
    }

    #[test]
    fn test_passes_when_both_wrists_confident() {
        let gate = ConfidenceGate::default();
        assert!(gate.passes(&wrists(0.9, 0.21)));
    }

    #[test]
    fn test_rejects_single_weak_wrist() {
        let gate = ConfidenceGate::default();
        assert!(!gate.passes(&wrists(0.1, 0.9)));
        assert!(!gate.passes(&wrists(0.9, 0.1)));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let gate = ConfidenceGate::default();
        assert!(!gate.passes(&wrists(0.2, 0.2)));
        assert!(!gate.passes(&wrists(0.9, 0.2)));
    }

    #[test]
    fn test_ignores_other_keypoints() {
        // 鼻や肩の信頼度は判定に使わない
        let gate = ConfidenceGate::new(0.5);
        let pose = wrists(0.6, 0.6);
        assert_eq!(pose.get(KeypointIndex::Nose).confidence, 0.0);
        assert!(gate.passes(&pose));
    }
}
