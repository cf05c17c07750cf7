//! 图片序列回放 + 会话控制器的端到端测试

use codescan_rs::input::{ReplayEnumerator, ReplayOptions, ReplaySource};
use codescan_rs::{
    BarcodeFormat, DecodeError, DecodeResult, ScanConfig, ScanController, ScanError, ScanEvent,
    ScanStatus, VideoFrame,
};
use image::GrayImage;
use std::path::Path;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn write_frames(dir: &Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        GrayImage::from_pixel(8, 8, image::Luma([(i * 40) as u8]))
            .save(dir.join(format!("{:03}.png", i)))
            .unwrap();
    }
}

fn brightness_engine(
) -> impl FnMut(&VideoFrame) -> Result<Option<DecodeResult>, DecodeError> + Send {
    |frame: &VideoFrame| {
        let level = frame.image.get_pixel(0, 0).0[0];
        Ok(Some(DecodeResult::new(
            format!("level-{}", level),
            BarcodeFormat::Code128,
        )))
    }
}

#[test]
fn test_replay_session_decodes_until_end_of_stream() {
    let tmp = tempfile::tempdir().unwrap();
    write_frames(&tmp.path().join("cam0"), 3);

    let config = ScanConfig {
        replay: ReplayOptions {
            fps: 100,
            looped: false,
        },
        ..Default::default()
    };
    let scanner = ScanController::new(
        ReplayEnumerator::new(tmp.path()),
        ReplaySource::new(tmp.path(), config.replay.clone()),
        brightness_engine(),
        &config,
    )
    .unwrap();
    let events = scanner.subscribe();

    let device = scanner.start().unwrap();
    assert_eq!(device.id, "cam0");

    let mut decoded = Vec::new();
    let failure = loop {
        match events.recv_timeout(TIMEOUT).unwrap() {
            ScanEvent::Decoded(result) => decoded.push(result.text),
            ScanEvent::Failed(e) => break e,
            ScanEvent::StateChanged { .. } => {}
        }
    };

    assert_eq!(decoded, vec!["level-0", "level-40", "level-80"]);
    assert_eq!(failure, ScanError::StreamInterrupted("end of stream".into()));
    assert_eq!(scanner.status(), ScanStatus::Failed);

    scanner.stop().unwrap();
    assert_eq!(scanner.status(), ScanStatus::Idle);
}

#[test]
fn test_replay_without_devices() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("empty")).unwrap();

    let scanner = ScanController::new(
        ReplayEnumerator::new(tmp.path()),
        ReplaySource::new(tmp.path(), ReplayOptions::default()),
        brightness_engine(),
        &ScanConfig::default(),
    )
    .unwrap();

    assert_eq!(scanner.start().unwrap_err(), ScanError::NoDevicesAvailable);
    assert_eq!(scanner.status(), ScanStatus::Failed);
}
