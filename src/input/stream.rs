//! 视频流抽象 (Video stream)
//!
//! 采集端在自己的线程里产出帧, 通过有界 channel 交给会话的解码循环.
//! 队列满时丢帧, 采集线程永远不阻塞在解码上.

use super::device::DeviceDescriptor;
use crate::error::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const INTERRUPT_SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// 已采集的一帧 (亮度平面)
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub seq: u64, // 帧序号
    pub image: GrayImage,
    pub captured_at: Instant,
}

impl VideoFrame {
    pub fn new(seq: u64, image: GrayImage) -> Self {
        Self {
            seq,
            image,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 采集线程 → 解码循环 的消息
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Frame(VideoFrame),
    /// 单帧错误, 瞬时的
    FrameError(String),
    /// 流中断, 对会话是致命的
    Interrupted(String),
}

/// 视频流参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    pub framerate: u32,
    /// 例如 "1280x720"; None 表示由设备协商
    pub video_size: Option<String>,
    /// 帧队列容量
    pub frame_queue: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            framerate: 30,
            video_size: None,
            frame_queue: 4,
        }
    }
}

/// 打开绑定到某个设备的视频流
pub trait StreamSource: Send + Sync {
    fn open(&self, device: &DeviceDescriptor, options: &StreamOptions)
        -> Result<Box<dyn VideoStream>>;
}

/// 一个已打开的视频流, 由会话独占
pub trait VideoStream: Send {
    /// 帧接收端
    fn frames(&self) -> Receiver<StreamEvent>;

    /// 释放设备, 返回时资源已经释放; 必须可重复调用
    fn close(&mut self);
}

/// 采集端的发送器, 统计丢帧
pub struct FrameSender {
    tx: Sender<StreamEvent>,
    next_seq: u64,
    pub dropped_frames: u64,
}

impl FrameSender {
    pub fn new(tx: Sender<StreamEvent>) -> Self {
        Self {
            tx,
            next_seq: 0,
            dropped_frames: 0,
        }
    }

    /// 发送一帧; 队列满时丢弃. 接收端已断开时返回 false
    pub fn send_frame(&mut self, image: GrayImage) -> bool {
        self.next_seq += 1;
        let frame = VideoFrame::new(self.next_seq, image);
        match self.tx.try_send(StreamEvent::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_frames += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn send_frame_error(&self, msg: impl Into<String>) -> bool {
        !matches!(
            self.tx.try_send(StreamEvent::FrameError(msg.into())),
            Err(TrySendError::Disconnected(_))
        )
    }

    /// 致命错误要尽量送达: 队列满时等待消费端, 但不能无限期阻塞 close()
    pub fn send_interrupted(&self, msg: impl Into<String>) {
        let _ = self
            .tx
            .send_timeout(StreamEvent::Interrupted(msg.into()), INTERRUPT_SEND_TIMEOUT);
    }
}

/// 等待关闭信号或采集结束, 返回 true 表示收到关闭信号
///
/// 关闭信号是 `stop_rx` 收到消息或发送端被丢弃. 采集端卡住时不产出任何帧,
/// 所以不能只在帧回调里检查关闭.
#[cfg_attr(not(feature = "ffmpeg"), allow(dead_code))]
pub(crate) fn watch_stop(
    stop_rx: &Receiver<()>,
    poll: Duration,
    mut ended: impl FnMut() -> bool,
) -> bool {
    loop {
        match stop_rx.recv_timeout(poll) {
            Err(RecvTimeoutError::Timeout) => {
                if ended() {
                    return false;
                }
            }
            _ => return true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sender_drops_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sender = FrameSender::new(tx);

        assert!(sender.send_frame(GrayImage::new(2, 2)));
        assert!(sender.send_frame(GrayImage::new(2, 2)));
        assert_eq!(sender.dropped_frames, 1);

        match rx.try_recv().unwrap() {
            StreamEvent::Frame(frame) => assert_eq!(frame.seq, 1),
            other => panic!("unexpected event: {:?}", other),
        }

        drop(rx);
        assert!(!sender.send_frame(GrayImage::new(2, 2)));
    }

    #[test]
    fn test_watch_stop_returns_when_stalled_stream_is_closed() {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let closer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            drop(stop_tx);
        });

        // 流一直不结束, 只能靠关闭信号退出
        let started = Instant::now();
        assert!(watch_stop(&stop_rx, Duration::from_millis(5), || false));
        assert!(started.elapsed() < Duration::from_secs(2));
        closer.join().unwrap();
    }

    #[test]
    fn test_watch_stop_reports_natural_end() {
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let mut polls = 0;
        let stopped = watch_stop(&stop_rx, Duration::from_millis(1), || {
            polls += 1;
            polls == 3
        });
        assert!(!stopped);
        assert_eq!(polls, 3);
    }
}
