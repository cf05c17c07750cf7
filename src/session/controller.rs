//! 扫码会话控制器 - 对外接口
//!
//! `start()`/`stop()` 会阻塞到工作线程完成对应的状态转换. 二者可以从不同线程调用
//! (例如界面线程在 Starting 期间调用 `stop()` 取消启动); 重叠的命令按状态机规则拒绝,
//! 不排队. 控制器被丢弃时自动停止会话, 摄像头资源不会比控制器活得更久.

use super::events::ScanEvent;
use super::worker::{Command, Shared, Worker};
use super::ScanStatus;
use crate::config::ScanConfig;
use crate::decode::DecodeEngine;
use crate::error::{Result, ScanError};
use crate::input::{DeviceDescriptor, DeviceEnumerator, DeviceSelector, StreamSource};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// 扫码会话控制器
pub struct ScanController {
    shared: Arc<Shared>,
    cmd_tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    selector: DeviceSelector,
}

impl ScanController {
    /// 创建控制器并启动工作线程 (初始状态 Idle)
    pub fn new<E, S, D>(
        enumerator: E,
        source: S,
        engine: D,
        config: &ScanConfig,
    ) -> std::io::Result<Self>
    where
        E: DeviceEnumerator + 'static,
        S: StreamSource + 'static,
        D: DecodeEngine + 'static,
    {
        Self::from_parts(
            Arc::new(enumerator),
            Arc::new(source),
            Box::new(engine),
            config,
        )
    }

    pub fn from_parts(
        enumerator: Arc<dyn DeviceEnumerator>,
        source: Arc<dyn StreamSource>,
        engine: Box<dyn DecodeEngine>,
        config: &ScanConfig,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();

        let worker = Worker::new(
            shared.clone(),
            enumerator,
            source,
            engine,
            config.stream.clone(),
            cmd_rx,
        );
        let handle = std::thread::Builder::new()
            .name("scan-worker".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            cmd_tx,
            worker: Some(handle),
            selector: config.device.clone(),
        })
    }

    /// 用配置中的设备选择策略启动
    pub fn start(&self) -> Result<DeviceDescriptor> {
        self.start_with(self.selector.clone())
    }

    /// 启动扫码会话, 返回绑定的设备
    ///
    /// 只能在 Idle 状态调用, 否则返回 [`ScanError::AlreadyRunning`] 且不影响当前会话.
    /// 枚举/打开失败时控制器进入 Failed, 需要先 `stop()` 再重新 `start()`.
    pub fn start_with(&self, selector: DeviceSelector) -> Result<DeviceDescriptor> {
        self.request_start(selector)?.wait()
    }

    /// 发出 start 命令但不等待结果
    ///
    /// 调用方可以在同一线程上继续 `stop()` 或丢弃控制器来取消这次启动.
    pub fn request_start(&self, selector: DeviceSelector) -> Result<PendingStart> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.cmd_tx
            .send(Command::Start { selector, reply })
            .map_err(|_| ScanError::ControllerClosed)?;
        Ok(PendingStart { rx })
    }

    /// 停止会话, 返回时视频流已释放. Idle 状态下是空操作
    pub fn stop(&self) -> Result<()> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.cmd_tx
            .send(Command::Stop { reply })
            .map_err(|_| ScanError::ControllerClosed)?;
        rx.recv().map_err(|_| ScanError::ControllerClosed)?
    }

    pub fn status(&self) -> ScanStatus {
        self.shared.status()
    }

    /// 当前会话绑定的设备
    pub fn device(&self) -> Option<DeviceDescriptor> {
        self.shared
            .snapshot
            .lock()
            .ok()
            .and_then(|s| s.device.clone())
    }

    /// 当前持有的视频流资源的标识 (会话代数)
    pub fn session_id(&self) -> Option<u64> {
        self.shared.snapshot.lock().ok().and_then(|s| s.session_id)
    }

    /// 订阅事件
    ///
    /// 队列不限长度, 解码结果不去重, 每个命中的帧都会产生一条事件.
    /// 持有接收端却不消费会让队列按帧率增长; 消费可能跟不上时用 [`Self::subscribe_bounded`].
    pub fn subscribe(&self) -> Receiver<ScanEvent> {
        self.shared.bus.subscribe()
    }

    /// 有界订阅, 队列满时新事件对该订阅者丢弃
    pub fn subscribe_bounded(&self, capacity: usize) -> Receiver<ScanEvent> {
        self.shared.bus.subscribe_bounded(capacity)
    }
}

/// 尚未完成的 start 命令
pub struct PendingStart {
    rx: Receiver<Result<DeviceDescriptor>>,
}

impl PendingStart {
    /// 阻塞到会话进入 Active 或启动失败/被取消
    pub fn wait(self) -> Result<DeviceDescriptor> {
        self.rx.recv().map_err(|_| ScanError::ControllerClosed)?
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("扫码工作线程异常退出");
            }
        }
    }
}
