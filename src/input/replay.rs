//! 图片序列回放输入 - 把目录里的图片当作一路摄像头
//!
//! 根目录下每个包含图片的子目录是一个"设备", 设备ID为子目录名.
//! 适用于无摄像头环境下的联调和离线回放.

use super::device::{non_empty, DeviceDescriptor, DeviceEnumerator};
use super::stream::{FrameSender, StreamEvent, StreamOptions, StreamSource, VideoStream};
use crate::error::{Result, ScanError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// 回放参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    pub fps: u32,
    /// 播完后从头循环; 否则播完即视为流中断
    pub looped: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            fps: 10,
            looped: true,
        }
    }
}

/// 目录中的图片文件, 按文件名排序
fn image_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 回放设备枚举
pub struct ReplayEnumerator {
    root: PathBuf,
}

impl ReplayEnumerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DeviceEnumerator for ReplayEnumerator {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| ScanError::from_io(&e, ScanError::EnumerationFailed))?;

        let mut devices = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ScanError::from_io(&e, ScanError::EnumerationFailed))?
                .path();
            if !path.is_dir() {
                continue;
            }
            let frames = image_files(&path)
                .map_err(|e| ScanError::from_io(&e, ScanError::EnumerationFailed))?;
            if frames.is_empty() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                devices.push(DeviceDescriptor::new(name, path.display().to_string()));
            }
        }
        devices.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!(root = %self.root.display(), count = devices.len(), "回放设备扫描完成");
        non_empty(devices)
    }
}

/// 回放视频源
pub struct ReplaySource {
    root: PathBuf,
    options: ReplayOptions,
}

impl ReplaySource {
    pub fn new(root: impl Into<PathBuf>, options: ReplayOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }
}

impl StreamSource for ReplaySource {
    fn open(
        &self,
        device: &DeviceDescriptor,
        options: &StreamOptions,
    ) -> Result<Box<dyn VideoStream>> {
        let dir = self.root.join(&device.id);
        let files = image_files(&dir)
            .map_err(|e| ScanError::from_io(&e, ScanError::StreamAcquisitionFailed))?;
        if files.is_empty() {
            return Err(ScanError::StreamAcquisitionFailed(format!(
                "no frames in {}",
                dir.display()
            )));
        }

        let (tx, rx) = crossbeam_channel::bounded(options.frame_queue.max(1));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let fps = self.options.fps.max(1);
        let looped = self.options.looped;

        let handle = std::thread::Builder::new()
            .name(format!("replay-{}", device.id))
            .spawn(move || replay_loop(files, fps, looped, FrameSender::new(tx), stop_rx))
            .map_err(|e| ScanError::StreamAcquisitionFailed(e.to_string()))?;

        tracing::info!(device = %device.id, fps, looped, "回放流已打开");

        Ok(Box::new(ReplayStream {
            rx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }))
    }
}

/// 回放线程: 按帧率读取图片并发送
fn replay_loop(
    files: Vec<PathBuf>,
    fps: u32,
    looped: bool,
    mut sender: FrameSender,
    stop_rx: Receiver<()>,
) {
    let interval = Duration::from_secs_f64(1.0 / fps as f64);

    loop {
        for path in &files {
            let started = Instant::now();

            let alive = match image::open(path) {
                Ok(img) => sender.send_frame(img.to_luma8()),
                Err(e) => sender.send_frame_error(format!("{}: {}", path.display(), e)),
            };
            if !alive {
                return;
            }

            // 等待下一帧; stop 端断开时立即退出
            match stop_rx.recv_timeout(interval.saturating_sub(started.elapsed())) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => return,
            }
        }

        if !looped {
            sender.send_interrupted("end of stream");
            return;
        }
    }
}

/// 回放流句柄
struct ReplayStream {
    rx: Receiver<StreamEvent>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl VideoStream for ReplayStream {
    fn frames(&self) -> Receiver<StreamEvent> {
        self.rx.clone()
    }

    fn close(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("回放线程异常退出");
            }
        }
    }
}

impl Drop for ReplayStream {
    fn drop(&mut self) {
        self.close();
    }
}
