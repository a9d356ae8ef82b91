pub mod keypoint;
pub mod posenet;
pub mod source;

pub use keypoint::{Keypoint, KeypointIndex, Pose};
pub use posenet::parse_posenet_json;
pub use source::{JsonLinesSource, PoseSource, TcpPoseSource};
