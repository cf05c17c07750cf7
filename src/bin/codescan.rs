/// 扫码会话 (Scan Session)
///
/// 打开摄像头(或图片序列), 连续识别二维码并打印结果
///
/// 系统架构:
/// 1. 采集线程: 视频流采集 (ffmpeg 或图片回放)
/// 2. 会话线程: 状态机 + 解码循环
/// 3. 主线程:   等待回车停止, 打印事件
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use codescan_rs::input::{ReplayEnumerator, ReplaySource};
use codescan_rs::{
    gen_time_string, DeviceEnumerator, DeviceSelector, QrEngine, ScanConfig, ScanController,
    ScanEvent, StreamSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// 本地摄像头 (需启用 ffmpeg 特性)
    Camera,
    /// 图片序列目录, 每个子目录是一个设备
    Replay,
}

/// 扫码参数
#[derive(Parser, Debug)]
#[command(author, version, about = "扫码会话 - 摄像头连续识别二维码", long_about = None)]
struct Args {
    /// 视频来源
    #[arg(short, long, value_enum, default_value = "replay")]
    source: SourceKind,

    /// 图片序列根目录 (replay 模式)
    #[arg(short, long, default_value = "frames")]
    dir: PathBuf,

    /// 设备ID或名称 (不指定时使用配置文件, 默认第一个设备)
    #[arg(long)]
    device: Option<String>,

    /// 配置文件
    #[arg(short, long, default_value = "codescan.json")]
    config: PathBuf,

    /// 只列出可用设备
    #[arg(short, long)]
    list_devices: bool,

    /// 回放帧率 (replay 模式)
    #[arg(long)]
    fps: Option<u32>,

    /// 循环回放 (replay 模式)
    #[arg(long = "loop")]
    looped: Option<bool>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ScanConfig::load(&args.config);
    if let Some(fps) = args.fps {
        config.replay.fps = fps;
    }
    if let Some(looped) = args.looped {
        config.replay.looped = looped;
    }

    let (enumerator, source) = open_source(&args, &config)?;

    if args.list_devices {
        let devices = enumerator.list_devices().context("枚举设备失败")?;
        println!("✅ 找到 {} 个视频设备:\n", devices.len());
        for device in &devices {
            println!("  📹 [{}] {}", device.id, device.label);
        }
        return Ok(());
    }

    let selector = match &args.device {
        Some(name) => {
            let devices = enumerator.list_devices().context("枚举设备失败")?;
            if devices.iter().any(|d| &d.id == name) {
                DeviceSelector::ById(name.clone())
            } else {
                DeviceSelector::ByLabel(name.clone())
            }
        }
        None => config.device.clone(),
    };

    let scanner = ScanController::from_parts(enumerator, source, Box::new(QrEngine::new()), &config)
        .context("启动扫码线程失败")?;
    let events = scanner.subscribe();

    println!("🚀 扫码会话启动");
    let device = scanner
        .start_with(selector)
        .context("无法启动扫码会话")?;
    println!("📹 设备: {}", device);
    println!("⏎  按回车停止\n");

    // 回车 → 停止
    let (quit_tx, quit_rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = quit_tx.send(());
    });

    let mut decoded = 0u64;
    loop {
        crossbeam_channel::select! {
            recv(events) -> event => match event {
                Ok(ScanEvent::Decoded(result)) => {
                    decoded += 1;
                    println!("[{}] {} ({})", gen_time_string(":"), result.text, result.format);
                }
                Ok(ScanEvent::Failed(e)) => {
                    eprintln!("❌ 会话失败: {}", e);
                    break;
                }
                Ok(ScanEvent::StateChanged { .. }) => {}
                Err(_) => break,
            },
            recv(quit_rx) -> _ => break,
        }
    }

    scanner.stop().context("停止扫码会话失败")?;
    println!("\n✅ 扫码结束, 共识别 {} 次", decoded);
    Ok(())
}

type Backend = (Arc<dyn DeviceEnumerator>, Arc<dyn StreamSource>);

fn open_source(args: &Args, config: &ScanConfig) -> Result<Backend> {
    match args.source {
        SourceKind::Replay => {
            if !args.dir.is_dir() {
                bail!("图片序列目录不存在: {}", args.dir.display());
            }
            Ok((
                Arc::new(ReplayEnumerator::new(&args.dir)),
                Arc::new(ReplaySource::new(&args.dir, config.replay.clone())),
            ))
        }
        SourceKind::Camera => camera_backend(),
    }
}

#[cfg(feature = "ffmpeg")]
fn camera_backend() -> Result<Backend> {
    use codescan_rs::input::{FfmpegEnumerator, FfmpegSource};
    Ok((Arc::new(FfmpegEnumerator), Arc::new(FfmpegSource)))
}

#[cfg(not(feature = "ffmpeg"))]
fn camera_backend() -> Result<Backend> {
    bail!("摄像头采集需要启用 ffmpeg 特性: cargo run --features ffmpeg --bin codescan")
}
