//! 画像メディアタイプとData URLのユーティリティ
//!
//! 認識APIが受け付ける画像形式のみを扱う。

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 認識APIが受け付ける画像形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
    Heic,
    Heif,
}

impl MediaType {
    /// MIMEタイプ文字列
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
            MediaType::Heic => "image/heic",
            MediaType::Heif => "image/heif",
        }
    }

    /// MIMEタイプから判定（大文字小文字は区別しない）
    pub fn from_mime(mime: &str) -> Result<Self> {
        let normalized = mime.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "image/png" => Ok(MediaType::Png),
            "image/jpeg" | "image/jpg" => Ok(MediaType::Jpeg),
            "image/webp" => Ok(MediaType::Webp),
            "image/heic" => Ok(MediaType::Heic),
            "image/heif" => Ok(MediaType::Heif),
            _ => Err(Error::UnsupportedMediaType(mime.to_string())),
        }
    }

    /// 拡張子から判定
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(MediaType::Png),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "webp" => Some(MediaType::Webp),
            "heic" => Some(MediaType::Heic),
            "heif" => Some(MediaType::Heif),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// バイト列をBase64エンコード（認識APIのinline_data形式）
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Data URLを生成
///
/// "data:image/png;base64,iVBORw0..." 形式
pub fn to_data_url(media_type: MediaType, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type.as_mime(), encode_base64(bytes))
}

/// Data URLからBase64データ部分を抽出
pub fn extract_base64_from_data_url(data_url: &str) -> Option<&str> {
    data_url.split_once(',').map(|(_, data)| data)
}

/// Data URLからMIMEタイプを抽出
pub fn extract_mime_type_from_data_url(data_url: &str) -> Option<&str> {
    data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
}

/// Data URLをデコードして (メディアタイプ, バイト列) を返す
pub fn decode_data_url(data_url: &str) -> Result<(MediaType, Vec<u8>)> {
    let mime = extract_mime_type_from_data_url(data_url)
        .ok_or_else(|| Error::InvalidDataUrl("MIMEタイプがありません".into()))?;
    let media_type = MediaType::from_mime(mime)?;
    let data = extract_base64_from_data_url(data_url)
        .ok_or_else(|| Error::InvalidDataUrl("データ部がありません".into()))?;
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| Error::InvalidDataUrl(e.to_string()))?;
    Ok((media_type, bytes))
}
