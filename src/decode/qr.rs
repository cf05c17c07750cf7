//! 二维码引擎 - 委托给 rqrr

use super::{BarcodeFormat, DecodeEngine, DecodeResult};
use crate::error::DecodeError;
use crate::input::VideoFrame;

/// 基于 rqrr 的 QR 解码
#[derive(Debug, Default)]
pub struct QrEngine {
    pub frames: u64,
    pub hits: u64,
}

impl QrEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecodeEngine for QrEngine {
    fn decode(&mut self, frame: &VideoFrame) -> Result<Option<DecodeResult>, DecodeError> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        if w == 0 || h == 0 {
            return Err(DecodeError::InvalidFrame(format!("{}x{}", w, h)));
        }
        self.frames += 1;

        let luma = frame.image.as_raw();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| luma[y * w + x]);
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Ok(None);
        }

        // 一帧可能有多个码, 取第一个能解出的
        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((_meta, text)) => {
                    self.hits += 1;
                    return Ok(Some(DecodeResult::new(text, BarcodeFormat::QrCode)));
                }
                Err(e) => last_error = Some(format!("{:?}", e)),
            }
        }

        Err(DecodeError::Unreadable(
            last_error.unwrap_or_else(|| "no decodable grid".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_blank_frame_is_no_match() {
        let mut engine = QrEngine::new();
        let frame = VideoFrame::new(1, GrayImage::from_pixel(64, 64, Luma([255])));
        assert_eq!(engine.decode(&frame).unwrap(), None);
        assert_eq!(engine.frames, 1);
        assert_eq!(engine.hits, 0);
    }

    #[test]
    fn test_empty_frame_is_invalid() {
        let mut engine = QrEngine::new();
        let frame = VideoFrame::new(1, GrayImage::new(0, 0));
        assert!(matches!(
            engine.decode(&frame),
            Err(DecodeError::InvalidFrame(_))
        ));
    }
}
