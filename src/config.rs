//! 扫码配置 - 通过JSON文件调整参数

use crate::input::{DeviceSelector, ReplayOptions, StreamOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 扫码会话配置
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    // === 设备选择 ===
    pub device: DeviceSelector,

    // === 视频流参数 ===
    pub stream: StreamOptions,

    // === 图片序列回放 ===
    pub replay: ReplayOptions,
}

impl ScanConfig {
    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "配置已加载");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "配置文件解析失败, 使用默认值");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "配置文件不存在, 创建默认配置");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    tracing::error!(path = %path.display(), error = %e, "保存配置失败");
                } else {
                    tracing::debug!(path = %path.display(), "配置已保存");
                }
            }
            Err(e) => tracing::error!(error = %e, "序列化配置失败"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("codescan.json");

        let config = ScanConfig::load(&path);
        assert_eq!(config, ScanConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("codescan.json");
        fs::write(
            &path,
            r#"{ "device": { "by_label": "brio" }, "stream": { "framerate": 15 } }"#,
        )
        .unwrap();

        let config = ScanConfig::load(&path);
        assert_eq!(config.device, DeviceSelector::ByLabel("brio".into()));
        assert_eq!(config.stream.framerate, 15);
        assert_eq!(config.stream.frame_queue, StreamOptions::default().frame_queue);
        assert_eq!(config.replay, ReplayOptions::default());
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("codescan.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ScanConfig::load(&path), ScanConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("codescan.json");
        let config = ScanConfig {
            device: DeviceSelector::ById("/dev/video2".into()),
            ..Default::default()
        };
        config.save(&path);
        assert_eq!(ScanConfig::load(&path), config);
    }
}
