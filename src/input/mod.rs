/// 视频输入系统 (Video Input System)
///
/// 设备枚举与视频流采集, 采集在独立线程中运行
/// - Device:  设备描述与选择策略
/// - Stream:  视频流抽象, 帧通过有界channel交给解码循环
/// - Camera:  本地摄像头 (DirectShow/AVFoundation/V4L2, 需启用 `ffmpeg` 特性)
/// - Replay:  图片序列回放
pub mod device;
pub mod replay;
pub mod stream;

#[cfg(feature = "ffmpeg")]
pub mod camera;
#[cfg(feature = "ffmpeg")]
pub mod decode_filter;

pub use device::{DeviceDescriptor, DeviceEnumerator, DeviceSelector};
pub use replay::{ReplayEnumerator, ReplayOptions, ReplaySource};
pub use stream::{FrameSender, StreamEvent, StreamOptions, StreamSource, VideoFrame, VideoStream};

#[cfg(feature = "ffmpeg")]
pub use camera::{FfmpegEnumerator, FfmpegSource};
