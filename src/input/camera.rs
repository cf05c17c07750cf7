//! 摄像头输入模块 - 基于FFmpeg的本地摄像头
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use super::decode_filter::LumaFilter;
use super::device::{non_empty, DeviceDescriptor, DeviceEnumerator};
use super::stream::{
    watch_stop, FrameSender, StreamEvent, StreamOptions, StreamSource, VideoStream,
};
use crate::error::{Result, ScanError};
use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_RETRIES: usize = 3;
const STOP_POLL: Duration = Duration::from_millis(100);

#[cfg(target_os = "windows")]
const INPUT_FORMAT: &str = "dshow"; // DirectShow
#[cfg(target_os = "macos")]
const INPUT_FORMAT: &str = "avfoundation"; // AVFoundation
#[cfg(target_os = "linux")]
const INPUT_FORMAT: &str = "v4l2"; // Video4Linux2
#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
const INPUT_FORMAT: &str = "video4linux2";

/// 格式化摄像头URL - 根据平台选择
fn format_camera_url(index: usize, name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("video={}", name)
    } else if cfg!(target_os = "linux") {
        format!("/dev/video{}", index)
    } else {
        format!("{}", index)
    }
}

/// FFmpeg错误信息中的权限类错误
fn classify(msg: String) -> ScanError {
    let lower = msg.to_lowercase();
    if lower.contains("permission denied") || lower.contains("not authorized") {
        ScanError::PermissionDenied(msg)
    } else {
        ScanError::StreamAcquisitionFailed(msg)
    }
}

/// FFmpeg设备枚举
#[derive(Default)]
pub struct FfmpegEnumerator;

impl DeviceEnumerator for FfmpegEnumerator {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let names = ez_ffmpeg::device::get_input_video_devices().map_err(|e| {
            match classify(e.to_string()) {
                ScanError::StreamAcquisitionFailed(msg) => ScanError::EnumerationFailed(msg),
                other => other,
            }
        })?;

        let devices: Vec<_> = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| DeviceDescriptor::new(format_camera_url(index, &name), name))
            .collect();

        tracing::info!(count = devices.len(), "摄像头设备扫描完成");
        for device in &devices {
            tracing::debug!(id = %device.id, label = %device.label, "发现摄像头");
        }
        non_empty(devices)
    }
}

/// FFmpeg摄像头视频源
#[derive(Default)]
pub struct FfmpegSource;

impl StreamSource for FfmpegSource {
    fn open(
        &self,
        device: &DeviceDescriptor,
        options: &StreamOptions,
    ) -> Result<Box<dyn VideoStream>> {
        let (tx, rx) = crossbeam_channel::bounded(options.frame_queue.max(1));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let url = device.id.clone();
        let framerate = options.framerate.to_string();
        let video_size = options.video_size.clone();

        let handle = std::thread::Builder::new()
            .name(format!("camera-{}", device.label))
            .spawn(move || {
                camera_loop(
                    &url,
                    &framerate,
                    video_size.as_deref(),
                    tx,
                    stop_rx,
                    ready_tx,
                )
            })
            .map_err(|e| ScanError::StreamAcquisitionFailed(e.to_string()))?;

        let mut stream = CameraStream {
            rx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!(device = %device.id, "摄像头连接成功");
                Ok(Box::new(stream))
            }
            Ok(Err(e)) => {
                stream.close();
                Err(e)
            }
            Err(_) => {
                stream.close();
                Err(ScanError::StreamAcquisitionFailed(
                    "camera thread exited during startup".to_string(),
                ))
            }
        }
    }
}

/// 摄像头解码线程: 构建管线(失败重试), 运行直到结束或被关闭
fn camera_loop(
    url: &str,
    framerate: &str,
    video_size: Option<&str>,
    tx: Sender<StreamEvent>,
    stop_rx: Receiver<()>,
    ready: Sender<Result<()>>,
) {
    let mut retry_count = 0;

    let sch = loop {
        let filter = LumaFilter::new(FrameSender::new(tx.clone()));
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("luma", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let input = match video_size {
            Some(size) => Input::new(url)
                .set_format(INPUT_FORMAT)
                .set_input_opts([("framerate", framerate), ("video_size", size)].into()),
            None => Input::new(url)
                .set_format(INPUT_FORMAT)
                .set_input_opts([("framerate", framerate)].into()),
        };

        // 管线前端转成灰度, 过滤器只需拷贝 data[0]
        let ctx = match FfmpegContext::builder()
            .input(input)
            .filter_descs(["format=gray"].into())
            .output(out)
            .build()
        {
            Ok(ctx) => ctx,
            Err(e) => {
                retry_count += 1;
                tracing::warn!(url, attempt = retry_count, error = %e, "摄像头构建失败");
                if retry_count >= MAX_RETRIES {
                    let _ = ready.send(Err(classify(e.to_string())));
                    return;
                }
                // 摄像头可能被其他程序占用, 稍后重试
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        };

        match ctx.start() {
            Ok(sch) => break sch,
            Err(e) => {
                let _ = ready.send(Err(classify(e.to_string())));
                return;
            }
        }
    };

    let _ = ready.send(Ok(()));

    // 摄像头卡住时不会再有帧, 关闭信号在这里轮询
    let stopped = watch_stop(&stop_rx, STOP_POLL, || sch.is_ended());
    if stopped {
        sch.abort();
    }

    let result = sch.wait();
    if !stopped {
        let reason = match result {
            Ok(()) => "camera stream ended".to_string(),
            Err(e) => e.to_string(),
        };
        FrameSender::new(tx).send_interrupted(reason);
    }
    tracing::debug!(url, stopped, "摄像头解码循环结束");
}

/// 摄像头流句柄, 丢弃 stop_tx 即通知解码线程中止
struct CameraStream {
    rx: Receiver<StreamEvent>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl VideoStream for CameraStream {
    fn frames(&self) -> Receiver<StreamEvent> {
        self.rx.clone()
    }

    fn close(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("摄像头线程异常退出");
            }
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_permission_errors() {
        assert!(matches!(
            classify("Could not open /dev/video0: Permission denied".into()),
            ScanError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify("Device or resource busy".into()),
            ScanError::StreamAcquisitionFailed(_)
        ));
    }
}
