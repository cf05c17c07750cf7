//! 扫码会话错误类型 (Scan session errors)

/// Result type alias
pub type Result<T> = std::result::Result<T, ScanError>;

/// 会话级错误
///
/// 需要 `Clone`: 同一个错误既返回给调用方, 也通过事件通道广播给订阅者.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// 枚举结果为空
    #[error("no camera devices available")]
    NoDevicesAvailable,

    /// 平台拒绝访问摄像头
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    /// 会话不在 Idle 状态时调用 start()
    #[error("scan session already running")]
    AlreadyRunning,

    /// 打开视频流失败
    #[error("stream acquisition failed: {0}")]
    StreamAcquisitionFailed(String),

    /// 会话进行中视频流中断 (设备断开等), 对会话是致命的
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// 设备枚举后端的其他错误
    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),

    /// 设备选择器没有匹配到任何设备
    #[error("no device matches {0}")]
    DeviceNotFound(String),

    /// Starting 期间被 stop() 取消
    #[error("start cancelled by stop")]
    Cancelled,

    /// 工作线程已退出
    #[error("scan controller is closed")]
    ControllerClosed,
}

impl ScanError {
    /// 从IO错误归类: 权限错误单独映射, 其余交给 `fallback`
    pub fn from_io(err: &std::io::Error, fallback: fn(String) -> ScanError) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(err.to_string()),
            _ => fallback(err.to_string()),
        }
    }
}

/// 单帧解码错误 (瞬时的, 解码循环会吞掉)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 检测到了码但无法解出内容 (纠错失败等)
    #[error("symbol found but unreadable: {0}")]
    Unreadable(String),

    /// 帧数据本身不可用
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_permission_denied() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let mapped = ScanError::from_io(&err, ScanError::EnumerationFailed);
        assert!(matches!(mapped, ScanError::PermissionDenied(_)));

        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let mapped = ScanError::from_io(&err, ScanError::StreamAcquisitionFailed);
        assert_eq!(mapped, ScanError::StreamAcquisitionFailed("gone".to_string()));
    }
}
