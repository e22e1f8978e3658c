use thiserror::Error;

use crate::recognition::RecognitionError;
use crate::store::{ItemId, TransitionError};
use crate::sync::SyncError;

/// 利用者が設定を直すまで解消しないエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Gemini APIキーが設定されていません。環境変数 GEMINI_API_KEY か `ocr-sheet-sync config --set-api-key KEY` で設定してください")]
    MissingCredential,

    #[error("同期先URLが設定されていません。`ocr-sheet-sync prefs --endpoint URL` で設定してください")]
    MissingSyncEndpoint,
}

#[derive(Error, Debug)]
pub enum OcrSyncError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("認識エラー: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("同期エラー: {0}")]
    SyncDispatch(#[from] SyncError),

    #[error("状態遷移エラー: {0}")]
    Transition(#[from] TransitionError),

    #[error("バッチ処理の実行中です")]
    BatchInProgress,

    #[error("項目が見つかりません: {0}")]
    ItemNotFound(ItemId),

    #[error("設定値の保存に失敗: {0}")]
    Preferences(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OcrSyncError>;
