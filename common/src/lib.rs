//! OCR Sheet Sync Common Library
//!
//! CLIと他のフロントエンドで共有される型とユーティリティ

pub mod error;
pub mod export;
pub mod media;
pub mod prompts;
pub mod types;

pub use error::{Error, Result};
pub use export::{build_tsv, flatten_newlines, ExportRow, TSV_HEADERS};
pub use media::{decode_data_url, encode_base64, to_data_url, MediaType};
pub use prompts::{OCR_INSTRUCTION, OCR_TEMPERATURE};
pub use types::{SyncRecord, TIMESTAMP_FORMAT};
