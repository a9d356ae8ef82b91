//! Read-only snapshots of the counter for optional display.

use serde::Serialize;
use tracing::debug;

use crate::counter::RepState;
use crate::pose::{KeypointIndex, Pose};

/// 直近に評価した姿勢とカウンタの状態
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: RepState,
    pub count: u32,
    pub target: u32,
    pub left_wrist_y: f32,
    pub right_wrist_y: f32,
    pub nose_y: f32,
    pub left_eye_y: f32,
}

impl Snapshot {
    pub fn capture(pose: &Pose, state: RepState, count: u32, target: u32) -> Self {
        Self {
            state,
            count,
            target,
            left_wrist_y: pose.get(KeypointIndex::LeftWrist).y,
            right_wrist_y: pose.get(KeypointIndex::RightWrist).y,
            nose_y: pose.get(KeypointIndex::Nose).y,
            left_eye_y: pose.get(KeypointIndex::LeftEye).y,
        }
    }
}

/// Receives a snapshot after every gated pose. Has no influence on counting.
pub trait DiagnosticsSink {
    fn publish(&mut self, snapshot: &Snapshot);
}

/// Writes each snapshot as a debug-level log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn publish(&mut self, s: &Snapshot) {
        debug!(
            state = %s.state,
            count = s.count,
            goal = s.target,
            left_wrist_y = s.left_wrist_y,
            right_wrist_y = s.right_wrist_y,
            nose_y = s.nose_y,
            eye_y = s.left_eye_y,
            "snapshot"
        );
    }
}

#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn publish(&mut self, _snapshot: &Snapshot) {}
}

impl<D: DiagnosticsSink + ?Sized> DiagnosticsSink for Box<D> {
    fn publish(&mut self, snapshot: &Snapshot) {
        (**self).publish(snapshot)
    }
}
