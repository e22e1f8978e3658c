//! 同期クライアント
//!
//! 完了した項目のテキストを利用者が設定したエンドポイントへ送る。
//! 送信方式はfire-and-forgetで、成功は「送信できた」ことしか意味しない。

mod http;

pub use http::{HttpSyncClient, DEFAULT_SYNC_TIMEOUT};

use async_trait::async_trait;
use ocr_sheet_common::SyncRecord;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("送信できませんでした: {0}")]
    Dispatch(String),
}

#[async_trait]
pub trait SyncSink: Send + Sync {
    /// 1回だけ送信する。エンドポイントが空でないことは呼び出し側が保証する
    async fn dispatch(&self, endpoint: &str, record: &SyncRecord) -> Result<(), SyncError>;
}
