/// 解码引擎接口 (Decode Engine)
///
/// 像素级的码检测与纠错由外部引擎完成, 这里只定义接缝:
/// - DecodeEngine: 输入一帧, 输出解码结果 / 未命中 / 单帧错误
/// - DecodeResult: 解码内容 + 码制
/// - QrEngine:     基于 rqrr 的二维码引擎
pub mod format;
pub mod qr;

pub use format::{BarcodeFormat, UnknownFormat};
pub use qr::QrEngine;

use crate::error::DecodeError;
use crate::input::VideoFrame;
use serde::{Deserialize, Serialize};

/// 解码结果 (不可变, 原样转发给订阅者)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodeResult {
    pub text: String,
    pub format: BarcodeFormat,
}

impl DecodeResult {
    pub fn new(text: impl Into<String>, format: BarcodeFormat) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }
}

/// 解码引擎
///
/// `Ok(None)` 表示本帧未命中; `Err` 是单帧的瞬时错误, 解码循环不会上报.
pub trait DecodeEngine: Send {
    fn decode(&mut self, frame: &VideoFrame) -> Result<Option<DecodeResult>, DecodeError>;
}

impl<F> DecodeEngine for F
where
    F: FnMut(&VideoFrame) -> Result<Option<DecodeResult>, DecodeError> + Send,
{
    fn decode(&mut self, frame: &VideoFrame) -> Result<Option<DecodeResult>, DecodeError> {
        self(frame)
    }
}
