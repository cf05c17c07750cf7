//! 会话工作线程: 状态机 + 解码循环
//!
//! 所有状态转换都在这一个线程上发生. 设备枚举和打开视频流可能阻塞,
//! 放在辅助线程里执行, 结果通过这次启动专属的 channel 回到这里.
//! Starting 期间 stop(): 还在枚举时直接取消, 不等待枚举返回;
//! 已经在打开设备时等待打开完成并立即关闭, stop() 返回时不持有任何设备.

use super::events::{EventBus, ScanEvent};
use super::ScanStatus;
use crate::decode::DecodeEngine;
use crate::error::{Result, ScanError};
use crate::input::device::non_empty;
use crate::input::{
    DeviceDescriptor, DeviceEnumerator, DeviceSelector, StreamEvent, StreamOptions, StreamSource,
    VideoStream,
};
use crossbeam_channel::{never, select, Receiver, RecvError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// 控制器 → 工作线程
pub(crate) enum Command {
    Start {
        selector: DeviceSelector,
        reply: Sender<Result<DeviceDescriptor>>,
    },
    Stop {
        reply: Sender<Result<()>>,
    },
    Shutdown,
}

/// 控制器与工作线程共享的状态快照
#[derive(Default)]
pub(crate) struct Snapshot {
    pub status: ScanStatus,
    pub device: Option<DeviceDescriptor>,
    pub session_id: Option<u64>,
}

#[derive(Default)]
pub(crate) struct Shared {
    pub snapshot: Mutex<Snapshot>,
    pub bus: EventBus,
}

impl Shared {
    pub fn status(&self) -> ScanStatus {
        self.snapshot
            .lock()
            .map(|s| s.status)
            .unwrap_or(ScanStatus::Failed)
    }

    fn update(&self, f: impl FnOnce(&mut Snapshot)) {
        if let Ok(mut snapshot) = self.snapshot.lock() {
            f(&mut snapshot);
        }
    }
}

/// 视频流守卫: 无论从哪条路径被丢弃, 都会关闭视频流
struct OwnedStream(Box<dyn VideoStream>);

impl Drop for OwnedStream {
    fn drop(&mut self) {
        self.0.close();
    }
}

type Acquired = (DeviceDescriptor, OwnedStream);

/// 启动进行到哪一步, 辅助线程与工作线程在锁内交接
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Enumerating,
    Opening,
    Cancelled,
}

/// 进行中的启动
struct Acquisition {
    generation: u64,
    phase: Arc<Mutex<Phase>>,
    rx: Receiver<Result<Acquired>>,
}

/// 单个会话的解码统计
struct SessionStats {
    started: Instant,
    last_report: Instant,
    window_frames: u64,
    frames: u64,
    decoded: u64,
    frame_errors: u64,
    decode_errors: u64,
}

impl SessionStats {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_report: now,
            window_frames: 0,
            frames: 0,
            decoded: 0,
            frame_errors: 0,
            decode_errors: 0,
        }
    }

    fn on_frame(&mut self, session: u64) {
        self.frames += 1;
        self.window_frames += 1;

        // 每秒输出一次解码统计
        let elapsed = self.last_report.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            tracing::debug!(
                session,
                fps = format_args!("{:.1}", self.window_frames as f64 / elapsed),
                frames = self.frames,
                decoded = self.decoded,
                "解码统计"
            );
            self.last_report = Instant::now();
            self.window_frames = 0;
        }
    }
}

/// 活动会话, 独占视频流
struct Session {
    id: u64,
    device: DeviceDescriptor,
    stream: OwnedStream,
    frames: Receiver<StreamEvent>,
    stats: SessionStats,
}

impl Session {
    fn new(id: u64, device: DeviceDescriptor, stream: OwnedStream) -> Self {
        let frames = stream.0.frames();
        Self {
            id,
            device,
            stream,
            frames,
            stats: SessionStats::new(),
        }
    }
}

// stream 字段在这之后被丢弃, 由 OwnedStream 关闭设备
impl Drop for Session {
    fn drop(&mut self) {
        tracing::info!(
            session = self.id,
            device = %self.device.id,
            secs = format_args!("{:.1}", self.stats.started.elapsed().as_secs_f64()),
            frames = self.stats.frames,
            decoded = self.stats.decoded,
            frame_errors = self.stats.frame_errors,
            decode_errors = self.stats.decode_errors,
            "会话结束"
        );
    }
}

pub(crate) struct Worker {
    shared: Arc<Shared>,
    enumerator: Arc<dyn DeviceEnumerator>,
    source: Arc<dyn StreamSource>,
    engine: Box<dyn DecodeEngine>,
    options: StreamOptions,
    cmd_rx: Receiver<Command>,
    /// 会话代数, 每次 start 递增, 用作 session_id
    generation: u64,
    acquisition: Option<Acquisition>,
    pending_start: Option<Sender<Result<DeviceDescriptor>>>,
    session: Option<Session>,
}

impl Worker {
    pub fn new(
        shared: Arc<Shared>,
        enumerator: Arc<dyn DeviceEnumerator>,
        source: Arc<dyn StreamSource>,
        engine: Box<dyn DecodeEngine>,
        options: StreamOptions,
        cmd_rx: Receiver<Command>,
    ) -> Self {
        Self {
            shared,
            enumerator,
            source,
            engine,
            options,
            cmd_rx,
            generation: 0,
            acquisition: None,
            pending_start: None,
            session: None,
        }
    }

    /// 主循环: 命令 / 采集结果 / 视频帧
    pub fn run(mut self) {
        tracing::debug!("扫码工作线程启动");
        let cmd_rx = self.cmd_rx.clone();

        loop {
            let acquired = match &self.acquisition {
                Some(acquisition) => acquisition.rx.clone(),
                None => never(),
            };
            let frames = match &self.session {
                Some(session) => session.frames.clone(),
                None => never(),
            };

            select! {
                recv(cmd_rx) -> cmd => match cmd {
                    Ok(Command::Start { selector, reply }) => self.on_start(selector, reply),
                    Ok(Command::Stop { reply }) => {
                        self.on_stop();
                        let _ = reply.send(Ok(()));
                    }
                    Ok(Command::Shutdown) | Err(_) => {
                        self.on_stop();
                        break;
                    }
                },
                recv(acquired) -> result => {
                    self.acquisition.take();
                    self.on_acquired(result.unwrap_or_else(|_| {
                        Err(ScanError::StreamAcquisitionFailed(
                            "acquisition thread exited".to_string(),
                        ))
                    }));
                }
                recv(frames) -> event => self.on_stream_event(event),
            }
        }

        tracing::debug!("扫码工作线程退出");
    }

    fn status(&self) -> ScanStatus {
        self.shared.status()
    }

    fn transition(&self, to: ScanStatus) {
        let mut from = to;
        self.shared.update(|s| {
            from = s.status;
            s.status = to;
        });
        if from == to {
            return;
        }

        tracing::info!(session = self.generation, from = %from, to = %to, "会话状态变化");
        self.shared.bus.emit(ScanEvent::StateChanged { from, to });
    }

    fn on_start(&mut self, selector: DeviceSelector, reply: Sender<Result<DeviceDescriptor>>) {
        let status = self.status();
        if status != ScanStatus::Idle {
            tracing::warn!(status = %status, "会话未处于空闲状态, 拒绝 start");
            let _ = reply.send(Err(ScanError::AlreadyRunning));
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        self.transition(ScanStatus::Starting);
        self.pending_start = Some(reply);

        let phase = Arc::new(Mutex::new(Phase::Enumerating));
        let (tx, rx) = crossbeam_channel::bounded(1);

        let enumerator = self.enumerator.clone();
        let source = self.source.clone();
        let options = self.options.clone();
        let thread_phase = phase.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("scan-acquire-{}", generation))
            .spawn(move || {
                let result = acquire(&thread_phase, &*enumerator, &*source, &selector, &options);
                // 启动已被取消时接收端已丢弃, 视频流随 SendError 一起被关闭
                let _ = tx.send(result);
            });

        match spawned {
            Ok(_) => {
                self.acquisition = Some(Acquisition {
                    generation,
                    phase,
                    rx,
                })
            }
            Err(e) => self.on_acquired(Err(ScanError::StreamAcquisitionFailed(e.to_string()))),
        }
    }

    fn on_acquired(&mut self, result: Result<Acquired>) {
        let reply = self.pending_start.take();
        match result {
            Ok((device, stream)) => {
                self.session = Some(Session::new(self.generation, device.clone(), stream));
                self.shared.update(|s| {
                    s.device = Some(device.clone());
                    s.session_id = Some(self.generation);
                });
                tracing::info!(session = self.generation, device = %device, "开始扫码");
                self.transition(ScanStatus::Active);
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(device));
                }
            }
            Err(e) => {
                tracing::warn!(session = self.generation, error = %e, "会话启动失败");
                self.transition(ScanStatus::Failed);
                self.shared.bus.emit(ScanEvent::Failed(e.clone()));
                if let Some(reply) = reply {
                    let _ = reply.send(Err(e));
                }
            }
        }
    }

    fn on_stop(&mut self) {
        match self.status() {
            ScanStatus::Idle => {}
            ScanStatus::Starting => {
                self.transition(ScanStatus::Stopping);
                if let Some(acquisition) = self.acquisition.take() {
                    self.cancel(acquisition);
                }
                self.transition(ScanStatus::Idle);
                if let Some(reply) = self.pending_start.take() {
                    let _ = reply.send(Err(ScanError::Cancelled));
                }
                tracing::info!(session = self.generation, "启动已取消");
            }
            ScanStatus::Active | ScanStatus::Stopping => {
                self.transition(ScanStatus::Stopping);
                self.release();
                self.transition(ScanStatus::Idle);
            }
            ScanStatus::Failed => {
                self.transition(ScanStatus::Stopping);
                self.transition(ScanStatus::Idle);
            }
        }
    }

    /// 取消进行中的启动
    ///
    /// 还在枚举: 标记取消后直接返回, 辅助线程不会再打开设备.
    /// 正在打开: 等待打开返回, 拿到的视频流在这里关闭.
    fn cancel(&self, acquisition: Acquisition) {
        let opening = match acquisition.phase.lock() {
            Ok(phase) if *phase == Phase::Opening => true,
            Ok(mut phase) => {
                *phase = Phase::Cancelled;
                false
            }
            Err(_) => false,
        };
        if !opening {
            return;
        }

        tracing::debug!(generation = acquisition.generation, "等待设备打开完成后关闭");
        if let Ok(Ok((device, stream))) = acquisition.rx.recv() {
            drop(stream);
            tracing::debug!(
                generation = acquisition.generation,
                device = %device.id,
                "已关闭取消启动时打开的视频流"
            );
        }
    }

    /// 释放视频流, 返回时设备已关闭
    fn release(&mut self) {
        self.session.take();
        self.shared.update(|s| {
            s.device = None;
            s.session_id = None;
        });
    }

    /// 会话致命错误: 先释放资源, 再进入 Failed 并广播一次
    fn fail(&mut self, error: ScanError) {
        tracing::error!(error = %error, "视频流中断");
        self.release();
        self.transition(ScanStatus::Failed);
        self.shared.bus.emit(ScanEvent::Failed(error));
    }

    fn on_stream_event(&mut self, event: std::result::Result<StreamEvent, RecvError>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match event {
            Ok(StreamEvent::Frame(frame)) => {
                session.stats.on_frame(session.id);
                match self.engine.decode(&frame) {
                    Ok(Some(result)) => {
                        session.stats.decoded += 1;
                        tracing::debug!(
                            session = session.id,
                            frame = frame.seq,
                            format = %result.format,
                            "识别到码"
                        );
                        self.shared.bus.emit(ScanEvent::Decoded(result));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // 单帧误读很常见, 不上报
                        session.stats.decode_errors += 1;
                        tracing::trace!(frame = frame.seq, error = %e, "解码失败");
                    }
                }
            }
            Ok(StreamEvent::FrameError(e)) => {
                session.stats.frame_errors += 1;
                tracing::trace!(session = session.id, error = %e, "帧错误");
            }
            Ok(StreamEvent::Interrupted(reason)) => {
                self.fail(ScanError::StreamInterrupted(reason));
            }
            Err(_) => {
                self.fail(ScanError::StreamInterrupted(
                    "stream closed unexpectedly".to_string(),
                ));
            }
        }
    }
}

/// 辅助线程: 枚举设备, 选择设备, 打开视频流
fn acquire(
    phase: &Mutex<Phase>,
    enumerator: &dyn DeviceEnumerator,
    source: &dyn StreamSource,
    selector: &DeviceSelector,
    options: &StreamOptions,
) -> Result<Acquired> {
    let devices = non_empty(enumerator.list_devices()?)?;
    tracing::debug!(count = devices.len(), "设备枚举完成");
    let device = selector.select(&devices)?;

    // 进入打开阶段之后, 取消方会等待本次打开返回
    {
        let mut phase = phase.lock().map_err(|_| ScanError::Cancelled)?;
        if *phase == Phase::Cancelled {
            return Err(ScanError::Cancelled);
        }
        *phase = Phase::Opening;
    }

    let stream = OwnedStream(source.open(&device, options)?);
    Ok((device, stream))
}
