//! プロンプト定義
//!
//! 認識APIに送る固定指示。構造を保ったまま文字だけを書き起こさせ、
//! 前置きや説明文は出力させない。

/// OCR指示文
pub const OCR_INSTRUCTION: &str = "Extract all text from this image. \
Preserve the original structure, line breaks and layout as closely as possible. \
Output only the extracted text, with no introduction, commentary, or markdown formatting.";

/// 決定的な出力にするための低温度設定
pub const OCR_TEMPERATURE: f32 = 0.1;
