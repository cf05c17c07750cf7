//! 码制 (Symbology)

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 支持上报的码制, 固定集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BarcodeFormat {
    Aztec,
    Codabar,
    Code39,
    Code93,
    Code128,
    DataMatrix,
    Ean8,
    Ean13,
    Itf,
    MaxiCode,
    Pdf417,
    QrCode,
    MicroQrCode,
    Rss14,
    RssExpanded,
    UpcA,
    UpcE,
    UpcEanExtension,
}

/// 名称与别名 → 码制 (键为大写, 已去掉 '-' 和 '_')
static ALIASES: phf::Map<&'static str, BarcodeFormat> = phf_map! {
    "AZTEC" => BarcodeFormat::Aztec,
    "CODABAR" => BarcodeFormat::Codabar,
    "CODE39" => BarcodeFormat::Code39,
    "CODE93" => BarcodeFormat::Code93,
    "CODE128" => BarcodeFormat::Code128,
    "DATAMATRIX" => BarcodeFormat::DataMatrix,
    "DM" => BarcodeFormat::DataMatrix,
    "EAN8" => BarcodeFormat::Ean8,
    "EAN13" => BarcodeFormat::Ean13,
    "ITF" => BarcodeFormat::Itf,
    "MAXICODE" => BarcodeFormat::MaxiCode,
    "PDF417" => BarcodeFormat::Pdf417,
    "QR" => BarcodeFormat::QrCode,
    "QRCODE" => BarcodeFormat::QrCode,
    "MICROQR" => BarcodeFormat::MicroQrCode,
    "MICROQRCODE" => BarcodeFormat::MicroQrCode,
    "RSS14" => BarcodeFormat::Rss14,
    "RSSEXPANDED" => BarcodeFormat::RssExpanded,
    "UPCA" => BarcodeFormat::UpcA,
    "UPCE" => BarcodeFormat::UpcE,
    "UPCEANEXTENSION" => BarcodeFormat::UpcEanExtension,
};

impl BarcodeFormat {
    /// 标准名称
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::MaxiCode => "MAXICODE",
            BarcodeFormat::Pdf417 => "PDF_417",
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::MicroQrCode => "MICRO_QR_CODE",
            BarcodeFormat::Rss14 => "RSS_14",
            BarcodeFormat::RssExpanded => "RSS_EXPANDED",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::UpcEanExtension => "UPC_EAN_EXTENSION",
        }
    }

    /// 二维码制
    pub fn is_2d(&self) -> bool {
        matches!(
            self,
            BarcodeFormat::Aztec
                | BarcodeFormat::DataMatrix
                | BarcodeFormat::MaxiCode
                | BarcodeFormat::Pdf417
                | BarcodeFormat::QrCode
                | BarcodeFormat::MicroQrCode
        )
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知码制名称
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown barcode format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for BarcodeFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        ALIASES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

impl From<BarcodeFormat> for String {
    fn from(format: BarcodeFormat) -> Self {
        format.as_str().to_string()
    }
}

impl TryFrom<String> for BarcodeFormat {
    type Error = UnknownFormat;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
