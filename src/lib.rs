// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 扫码配置参数
pub mod decode; // 解码引擎接口
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod session; // 扫码会话控制器

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils; // 测试用模拟设备/视频源/解码引擎

pub use crate::config::ScanConfig;
pub use crate::decode::{BarcodeFormat, DecodeEngine, DecodeResult, QrEngine};
pub use crate::error::{DecodeError, Result, ScanError};
pub use crate::input::{
    DeviceDescriptor, DeviceEnumerator, DeviceSelector, StreamSource, VideoFrame, VideoStream,
};
pub use crate::session::{PendingStart, ScanController, ScanEvent, ScanStatus};

/// 本地时间字符串, 用于打印解码结果
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d %H{}%M{}%S%.3f",
        delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_time_string_uses_delimiter() {
        let s = gen_time_string("-");
        // 2024-01-02 03-04-05.678
        assert_eq!(s.len(), 23);
        assert_eq!(s.matches('-').count(), 4);
    }
}
