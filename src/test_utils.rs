//! 测试工具 - 可编排的设备枚举 / 视频源 / 解码引擎

use crate::decode::{DecodeEngine, DecodeResult};
use crate::error::{DecodeError, Result, ScanError};
use crate::input::{
    DeviceDescriptor, DeviceEnumerator, StreamEvent, StreamOptions, StreamSource, VideoFrame,
    VideoStream,
};
use crossbeam_channel::{Receiver, Sender};
use image::GrayImage;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 轮询等待条件成立
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// 测试设备
pub fn mock_device(index: usize) -> DeviceDescriptor {
    DeviceDescriptor::new(format!("mock{}", index), format!("Mock Camera {}", index))
}

/// Mock 设备枚举, clone 之间共享计数
#[derive(Clone)]
pub struct MockEnumerator {
    result: Result<Vec<DeviceDescriptor>>,
    gate: Option<Receiver<()>>,
    calls: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl MockEnumerator {
    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            result: Ok(devices),
            gate: None,
            calls: Arc::default(),
            finished: Arc::default(),
        }
    }

    pub fn failing(error: ScanError) -> Self {
        Self {
            result: Err(error),
            ..Self::with_devices(vec![])
        }
    }

    /// 枚举阻塞到返回的发送端发送或被丢弃
    pub fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::bounded(0);
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl DeviceEnumerator for MockEnumerator {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[derive(Default)]
struct SourceState {
    open_calls: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail: Mutex<Option<ScanError>>,
    feeds: Mutex<Vec<Sender<StreamEvent>>>,
    devices: Mutex<Vec<DeviceDescriptor>>,
}

/// Mock 视频源, 统计打开/关闭次数, 帧由测试通过 [`StreamFeed`] 注入
#[derive(Clone, Default)]
pub struct MockSource {
    state: Arc<SourceState>,
    gate: Option<Receiver<()>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: ScanError) -> Self {
        let source = Self::default();
        if let Ok(mut fail) = source.state.fail.lock() {
            *fail = Some(error);
        }
        source
    }

    /// open 阻塞到返回的发送端发送或被丢弃, 模拟打开很慢的设备
    pub fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::bounded(0);
        self.gate = Some(rx);
        (self, tx)
    }

    /// 进入 open 的次数 (包括仍在阻塞中的)
    pub fn open_calls(&self) -> usize {
        self.state.open_calls.load(Ordering::SeqCst)
    }

    /// 成功打开的次数
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// 当前未关闭的视频流数量
    pub fn live(&self) -> usize {
        self.opened() - self.closed()
    }

    /// 每次 open 收到的设备
    pub fn opened_devices(&self) -> Vec<DeviceDescriptor> {
        self.state
            .devices
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// 最近一次打开的视频流的注入端
    pub fn feed(&self) -> Option<StreamFeed> {
        self.state
            .feeds
            .lock()
            .ok()
            .and_then(|feeds| feeds.last().cloned())
            .map(|tx| StreamFeed { tx })
    }
}

impl StreamSource for MockSource {
    fn open(
        &self,
        device: &DeviceDescriptor,
        _options: &StreamOptions,
    ) -> Result<Box<dyn VideoStream>> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if let Some(error) = self.state.fail.lock().ok().and_then(|f| f.clone()) {
            return Err(error);
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut feeds) = self.state.feeds.lock() {
            feeds.push(tx);
        }
        if let Ok(mut devices) = self.state.devices.lock() {
            devices.push(device.clone());
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockStream {
            rx,
            state: self.state.clone(),
            closed: false,
        }))
    }
}

struct MockStream {
    rx: Receiver<StreamEvent>,
    state: Arc<SourceState>,
    closed: bool,
}

impl VideoStream for MockStream {
    fn frames(&self) -> Receiver<StreamEvent> {
        self.rx.clone()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 向 mock 视频流注入事件
#[derive(Clone)]
pub struct StreamFeed {
    tx: Sender<StreamEvent>,
}

impl StreamFeed {
    /// 注入一帧 4x4 空白帧
    pub fn frame(&self, seq: u64) -> bool {
        let frame = VideoFrame::new(seq, GrayImage::new(4, 4));
        self.tx.send(StreamEvent::Frame(frame)).is_ok()
    }

    pub fn frame_error(&self, msg: &str) -> bool {
        self.tx.send(StreamEvent::FrameError(msg.to_string())).is_ok()
    }

    pub fn interrupt(&self, reason: &str) -> bool {
        self.tx
            .send(StreamEvent::Interrupted(reason.to_string()))
            .is_ok()
    }
}

/// 按帧序号编排结果的解码引擎
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    hits: HashMap<u64, DecodeResult>,
    errors: HashSet<u64>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(mut self, seq: u64, result: DecodeResult) -> Self {
        self.hits.insert(seq, result);
        self
    }

    pub fn error(mut self, seq: u64) -> Self {
        self.errors.insert(seq);
        self
    }
}

impl DecodeEngine for ScriptedEngine {
    fn decode(&mut self, frame: &VideoFrame) -> std::result::Result<Option<DecodeResult>, DecodeError> {
        if self.errors.contains(&frame.seq) {
            return Err(DecodeError::Unreadable(format!("frame {}", frame.seq)));
        }
        Ok(self.hits.get(&frame.seq).cloned())
    }
}
