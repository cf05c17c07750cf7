/// 测试设备列表获取功能
///
/// cargo run --example list_devices -- ./frames
/// cargo run --example list_devices --features ffmpeg
use codescan_rs::DeviceEnumerator;

fn main() {
    println!("🔍 开始扫描视频设备...\n");

    let enumerator = enumerator();
    match enumerator.list_devices() {
        Ok(devices) => {
            println!("✅ 找到 {} 个视频设备:\n", devices.len());
            for device in &devices {
                println!("  📹 [{}] {}", device.id, device.label);
            }
        }
        Err(e) => println!("⚠️  {}", e),
    }

    println!("\n✅ 设备扫描完成");
}

#[cfg(feature = "ffmpeg")]
fn enumerator() -> Box<dyn DeviceEnumerator> {
    match std::env::args().nth(1) {
        Some(dir) => Box::new(codescan_rs::input::ReplayEnumerator::new(dir)),
        None => Box::new(codescan_rs::input::FfmpegEnumerator),
    }
}

#[cfg(not(feature = "ffmpeg"))]
fn enumerator() -> Box<dyn DeviceEnumerator> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| "frames".to_string());
    Box::new(codescan_rs::input::ReplayEnumerator::new(dir))
}
