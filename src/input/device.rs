//! 设备枚举 (Device Enumerator)

use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 视频设备信息
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// 设备标识, 在当前已连接的设备中唯一
    pub id: String,
    /// 可读名称
    pub label: String,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

/// 列出可用的摄像头设备
///
/// 调用会阻塞 (查询硬件, 首次调用可能触发系统权限弹窗), 控制器总是在辅助线程上调用它.
/// 实现不得返回空列表: 没有设备时返回 [`ScanError::NoDevicesAvailable`].
/// 实现内部不重试, 由调用方决定.
pub trait DeviceEnumerator: Send + Sync {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>>;
}

/// 设备选择策略
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelector {
    /// 第一个枚举到的设备
    #[default]
    First,
    /// 按设备ID精确匹配
    ById(String),
    /// 按名称子串匹配 (不区分大小写)
    ByLabel(String),
}

impl DeviceSelector {
    /// 从候选设备中选出一个
    pub fn select(&self, devices: &[DeviceDescriptor]) -> Result<DeviceDescriptor> {
        let found = match self {
            DeviceSelector::First => devices.first(),
            DeviceSelector::ById(id) => devices.iter().find(|d| &d.id == id),
            DeviceSelector::ByLabel(label) => {
                let needle = label.to_lowercase();
                devices
                    .iter()
                    .find(|d| d.label.to_lowercase().contains(&needle))
            }
        };

        match (found, self) {
            (Some(device), _) => Ok(device.clone()),
            (None, DeviceSelector::First) => Err(ScanError::NoDevicesAvailable),
            (None, _) => Err(ScanError::DeviceNotFound(self.to_string())),
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::First => write!(f, "first device"),
            DeviceSelector::ById(id) => write!(f, "id '{}'", id),
            DeviceSelector::ByLabel(label) => write!(f, "label '{}'", label),
        }
    }
}

/// 包装枚举结果: 空列表视为无设备
pub(crate) fn non_empty(devices: Vec<DeviceDescriptor>) -> Result<Vec<DeviceDescriptor>> {
    if devices.is_empty() {
        Err(ScanError::NoDevicesAvailable)
    } else {
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::new("/dev/video0", "Integrated Camera"),
            DeviceDescriptor::new("/dev/video2", "Logitech BRIO"),
        ]
    }

    #[test]
    fn test_select_first_is_default() {
        let selected = DeviceSelector::default().select(&devices()).unwrap();
        assert_eq!(selected.id, "/dev/video0");
    }

    #[test]
    fn test_select_by_id_and_label() {
        let by_id = DeviceSelector::ById("/dev/video2".into())
            .select(&devices())
            .unwrap();
        assert_eq!(by_id.label, "Logitech BRIO");

        let by_label = DeviceSelector::ByLabel("brio".into())
            .select(&devices())
            .unwrap();
        assert_eq!(by_label.id, "/dev/video2");
    }

    #[test]
    fn test_select_missing_device() {
        let err = DeviceSelector::ById("/dev/video9".into())
            .select(&devices())
            .unwrap_err();
        assert_eq!(err, ScanError::DeviceNotFound("id '/dev/video9'".into()));

        assert_eq!(
            DeviceSelector::First.select(&[]).unwrap_err(),
            ScanError::NoDevicesAvailable
        );
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(vec![]).unwrap_err(), ScanError::NoDevicesAvailable);
        assert_eq!(non_empty(devices()).unwrap().len(), 2);
    }

    #[test]
    fn test_selector_serde() {
        let json = serde_json::to_string(&DeviceSelector::ById("cam".into())).unwrap();
        assert_eq!(json, r#"{"by_id":"cam"}"#);
        let back: DeviceSelector = serde_json::from_str(r#""first""#).unwrap();
        assert_eq!(back, DeviceSelector::First);
    }
}
