use async_trait::async_trait;
use ocr_sheet_common::SyncRecord;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{SyncError, SyncSink};
use crate::error::{OcrSyncError, Result};

/// プレーンテキストとして送る（プリフライトを発生させない形式）
const SYNC_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP POSTで送る同期クライアント
///
/// レスポンスは読まない。接続失敗やURL不正だけが失敗になり、
/// サーバ側のエラーは観測できないため成功扱いになる。
#[derive(Debug, Clone)]
pub struct HttpSyncClient {
    http: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrSyncError::Config(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl SyncSink for HttpSyncClient {
    #[instrument(skip(self, record), fields(file = %record.file_name))]
    async fn dispatch(&self, endpoint: &str, record: &SyncRecord) -> std::result::Result<(), SyncError> {
        let url = reqwest::Url::parse(endpoint.trim())
            .map_err(|e| SyncError::Dispatch(format!("URLが不正です: {}", e)))?;
        let body = serde_json::to_string(record).map_err(|e| SyncError::Dispatch(e.to_string()))?;

        self.http
            .post(url)
            .header(CONTENT_TYPE, SYNC_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::Dispatch(e.without_url().to_string()))?;

        debug!("同期リクエストを送信");
        Ok(())
    }
}
