//! クリップボード用TSV生成
//!
//! 認識が完了した行だけを、ヘッダ行の下にタブ区切りで並べる。

/// ヘッダ行の列名
pub const TSV_HEADERS: [&str; 3] = ["File Name", "Extracted Text", "Timestamp"];

/// TSV出力対象のトレイト（異なる項目型に対応）
pub trait ExportRow {
    fn file_name(&self) -> &str;
    /// 認識完了時のみSome
    fn extracted_text(&self) -> Option<&str>;
}

/// テキスト内の改行をスペースに置換
pub fn flatten_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// 完了済みの行からTSVを生成
///
/// 完了済みが0件ならNone（コピーするものがない）。
pub fn build_tsv<'a, T, I>(rows: I, timestamp: &str) -> Option<String>
where
    T: ExportRow + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let lines: Vec<String> = rows
        .into_iter()
        .filter_map(|row| {
            row.extracted_text().map(|text| {
                format!("{}\t{}\t{}", row.file_name(), flatten_newlines(text), timestamp)
            })
        })
        .collect();

    if lines.is_empty() {
        return None;
    }

    let mut out = TSV_HEADERS.join("\t");
    for line in lines {
        out.push('\n');
        out.push_str(&line);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        name: &'static str,
        text: Option<&'static str>,
    }

    impl ExportRow for Row {
        fn file_name(&self) -> &str {
            self.name
        }
        fn extracted_text(&self) -> Option<&str> {
            self.text
        }
    }

    #[test]
    fn test_build_tsv_empty() {
        let rows: Vec<Row> = vec![];
        assert_eq!(build_tsv(&rows, "ts"), None);
    }

    #[test]
    fn test_build_tsv_no_completed_rows() {
        let rows = vec![Row { name: "a.png", text: None }, Row { name: "b.png", text: None }];
        assert_eq!(build_tsv(&rows, "ts"), None);
    }

    #[test]
    fn test_build_tsv_flattens_newlines() {
        let rows = vec![Row { name: "a.png", text: Some("line1\nline2") }];
        let tsv = build_tsv(&rows, "2026/01/18 10:00:00").unwrap();
        assert_eq!(
            tsv,
            "File Name\tExtracted Text\tTimestamp\na.png\tline1 line2\t2026/01/18 10:00:00"
        );
    }

    #[test]
    fn test_build_tsv_keeps_order_and_skips_incomplete() {
        let rows = vec![
            Row { name: "c.png", text: Some("third") },
            Row { name: "a.png", text: None },
            Row { name: "b.png", text: Some("x\r\ny") },
        ];
        let tsv = build_tsv(&rows, "t").unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "c.png\tthird\tt");
        assert_eq!(lines[2], "b.png\tx y\tt");
    }

    #[test]
    fn test_flatten_newlines() {
        assert_eq!(flatten_newlines("a\nb\r\nc\rd"), "a b c d");
        assert_eq!(flatten_newlines("no breaks"), "no breaks");
    }
}
