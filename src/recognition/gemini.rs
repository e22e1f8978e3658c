//! Gemini API連携
//!
//! 画像をBase64のinline_dataとして固定のOCR指示と一緒に送る。

use async_trait::async_trait;
use ocr_sheet_common::{encode_base64, OCR_INSTRUCTION, OCR_TEMPERATURE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{validate_image, RecognitionError, Recognizer};
use crate::config::Config;
use crate::error::Result;
use crate::store::ImageSource;

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Gemini APIレスポンス
#[derive(Deserialize, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn build_request(image: &ImageSource) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: OCR_INSTRUCTION.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.media_type.as_mime().to_string(),
                        data: encode_base64(&image.bytes),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: OCR_TEMPERATURE,
        },
    }
}

/// 最初の候補のテキストパートを連結して返す
fn extract_text(response: GeminiResponse) -> std::result::Result<String, RecognitionError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(RecognitionError::EmptyResponse);
    }
    Ok(text.trim_end().to_string())
}

/// エラーレスポンスからサービス側のメッセージを取り出す
fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("API error {}: {}", status, envelope.error.message),
        Err(_) if body.trim().is_empty() => format!("API error {}", status),
        Err(_) => {
            let preview: String = body.chars().take(200).collect();
            format!("API error {}: {}", status, preview)
        }
    }
}

/// Gemini generateContent クライアント
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    url: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::error::OcrSyncError::Config(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: format!("{}/models/{}:generateContent", base_url.trim_end_matches('/'), model),
        })
    }

    /// 設定から生成（キー未設定でも生成でき、呼び出し時にMissingCredentialを返す）
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            &config.model,
            config.api_key().ok(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Recognizer for GeminiClient {
    #[instrument(skip(self, image), fields(file = %image.file_name, bytes = image.len()))]
    async fn recognize(&self, image: &ImageSource) -> std::result::Result<String, RecognitionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RecognitionError::MissingCredential)?;
        validate_image(image)?;

        let request = build_request(image);
        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RecognitionError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Transport(error_message(status.as_u16(), &body)));
        }

        let payload: GeminiResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Transport(format!("レスポンス解析エラー: {}", e.without_url())))?;

        let text = extract_text(payload)?;
        debug!(chars = text.chars().count(), "認識完了");
        Ok(text)
    }
}
