use super::state::RepEvent;

/// 箱を開けるまでの回数
pub const DEFAULT_TARGET: u32 = 15;

/// 目標回数に到達した
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent;

/// レップ数の積算
///
/// 目標到達で CompletionEvent を1回だけ返し、即座に 0 に戻る。
/// 減算やスキップはしない。
#[derive(Debug)]
pub struct ScoreCounter {
    count: u32,
    target: u32,
}

impl ScoreCounter {
    /// `target` は 1 以上（設定読み込み時に検証済み）
    pub fn new(target: u32) -> Self {
        Self {
            count: 0,
            target: target.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn record(&mut self, _event: RepEvent) -> Option<CompletionEvent> {
        self.count += 1;
        if self.count == self.target {
            self.count = 0;
            return Some(CompletionEvent);
        }
        None
    }
}

impl Default for ScoreCounter {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET)
    }
}
