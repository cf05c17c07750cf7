/// 扫码会话控制器 (Scan Session Controller)
///
/// 独立工作线程持有状态机, 命令与视频帧在同一线程上按顺序处理:
/// - Controller: 对外接口 start()/stop()/subscribe(), Drop 时自动停止
/// - Worker:     状态机 + 解码循环
/// - Events:     事件广播 (状态变化 / 解码结果 / 失败)
pub mod controller;
pub mod events;
mod worker;

pub use controller::{PendingStart, ScanController};
pub use events::ScanEvent;

use serde::{Deserialize, Serialize};
use std::fmt;

/// 会话状态
///
/// `Idle → Starting → Active → Stopping → Idle`, `Starting`/`Active` 可进入 `Failed`.
/// 只有 `Starting`/`Active`/`Stopping` 期间持有视频流资源.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Starting => "starting",
            ScanStatus::Active => "active",
            ScanStatus::Stopping => "stopping",
            ScanStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
