//! エクスポート（共通ライブラリ）

pub mod tsv;

pub use tsv::{build_tsv, flatten_newlines, ExportRow, TSV_HEADERS};
