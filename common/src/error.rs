//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
