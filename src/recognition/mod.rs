//! 画像認識クライアント
//!
//! 画像1枚を認識サービスに送り、抽出テキストを返す。
//! 内部でのリトライ・キャッシュは行わない。

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::store::ImageSource;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("APIキーが設定されていません")]
    MissingCredential,

    #[error("認識結果が空でした")]
    EmptyResponse,

    #[error("{0}")]
    Transport(String),

    #[error("画像が不正です: {0}")]
    InvalidImage(String),
}

impl RecognitionError {
    /// 設定を直さない限り成功しない失敗か
    pub fn is_configuration(&self) -> bool {
        matches!(self, RecognitionError::MissingCredential)
    }
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &ImageSource) -> Result<String, RecognitionError>;
}

/// 送信前の入力チェック（サイズは検証しない）
pub fn validate_image(image: &ImageSource) -> Result<(), RecognitionError> {
    if image.is_empty() {
        return Err(RecognitionError::InvalidImage(format!(
            "{} は空のファイルです",
            image.file_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_sheet_common::MediaType;

    #[test]
    fn test_validate_image_rejects_empty() {
        let image = ImageSource::new("empty.png", MediaType::Png, Vec::<u8>::new());
        assert!(matches!(
            validate_image(&image),
            Err(RecognitionError::InvalidImage(msg)) if msg.contains("empty.png")
        ));
    }

    #[test]
    fn test_validate_image_accepts_bytes() {
        let image = ImageSource::new("a.jpg", MediaType::Jpeg, vec![0xFFu8, 0xD8]);
        assert!(validate_image(&image).is_ok());
    }

    #[test]
    fn test_transport_error_carries_upstream_message() {
        let error = RecognitionError::Transport("API error 429: quota exceeded".into());
        assert_eq!(error.to_string(), "API error 429: quota exceeded");
        assert!(!error.is_configuration());
        assert!(RecognitionError::MissingCredential.is_configuration());
    }
}
