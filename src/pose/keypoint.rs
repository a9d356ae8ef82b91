use serde::{Deserialize, Serialize};

/// PoseNet / MoveNet 共通の 17 キーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    /// PoseNet の部位名 (例: "leftWrist")
    pub fn part_name(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "leftEye",
            Self::RightEye => "rightEye",
            Self::LeftEar => "leftEar",
            Self::RightEar => "rightEar",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::LeftElbow => "leftElbow",
            Self::RightElbow => "rightElbow",
            Self::LeftWrist => "leftWrist",
            Self::RightWrist => "rightWrist",
            Self::LeftHip => "leftHip",
            Self::RightHip => "rightHip",
            Self::LeftKnee => "leftKnee",
            Self::RightKnee => "rightKnee",
            Self::LeftAnkle => "leftAnkle",
            Self::RightAnkle => "rightAnkle",
        }
    }

    /// 部位名からインデックスを引く。未知の名前は None
    pub fn from_part_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.part_name() == name)
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    /// X座標 (画像座標系、単位はソース依存)
    pub x: f32,
    /// Y座標 (下向きが正)
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値を厳密に超えているか
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }
}

/// 17キーポイントからなる姿勢
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    pub fn set(&mut self, index: KeypointIndex, keypoint: Keypoint) {
        self.keypoints[index as usize] = keypoint;
    }
}
