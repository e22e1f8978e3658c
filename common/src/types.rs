//! 同期レコードの型定義
//!
//! 同期エンドポイントへ送るJSONの形をCLI以外のフロントエンドとも共有する。

use serde::{Deserialize, Serialize};

/// タイムスタンプの表示形式（ローカル時刻、機械可読ではない）
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// 同期エンドポイントへ送る1件分のレコード
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub file_name: String,
    pub text: String,
    pub timestamp: String,
}

impl SyncRecord {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_record_wire_names() {
        let record = SyncRecord::new("a.png", "hello", "2026/01/18 10:00:00");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fileName"], "a.png");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["timestamp"], "2026/01/18 10:00:00");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }
}
