//! PoseNet `estimateSinglePose` の JSON 出力を `Pose` に変換する。
//!
//! ```json
//! {"score": 0.8, "keypoints": [{"part": "nose", "score": 0.99, "position": {"x": 160.2, "y": 41.0}}]}
//! ```

use serde::Deserialize;

use super::keypoint::{Keypoint, KeypointIndex, Pose};

#[derive(Debug, Deserialize)]
struct PoseNetPose {
    keypoints: Vec<PoseNetKeypoint>,
}

#[derive(Debug, Deserialize)]
struct PoseNetKeypoint {
    part: String,
    score: f32,
    position: PoseNetPosition,
}

#[derive(Debug, Deserialize)]
struct PoseNetPosition {
    x: f32,
    y: f32,
}

/// 1行分のJSONをパース。未知の部位は無視し、欠けた部位は信頼度0のまま
pub fn parse_posenet_json(json: &str) -> Result<Pose, serde_json::Error> {
    let raw: PoseNetPose = serde_json::from_str(json)?;
    let mut pose = Pose::default();
    for kp in raw.keypoints {
        if let Some(index) = KeypointIndex::from_part_name(&kp.part) {
            pose.set(index, Keypoint::new(kp.position.x, kp.position.y, kp.score));
        }
    }
    Ok(pose)
}
