use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ocr-sheet-sync")]
#[command(about = "画像一括OCR・スプレッドシート同期ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像を読み込んで一括OCRを実行
    Run {
        /// 画像ファイルまたはフォルダ（複数可）
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// 完了後、未同期の結果をすべて同期する
        #[arg(long)]
        sync: bool,

        /// 失敗した項目をもう一度処理する
        #[arg(long)]
        retry_failed: bool,

        /// TSVを書き出す（`-` で標準出力）
        #[arg(short, long)]
        export: Option<ExportTarget>,
    },

    /// 同期先・自動同期の設定
    Prefs {
        /// 同期先URL（空文字で解除）
        #[arg(long)]
        endpoint: Option<String>,

        /// 認識完了時に自動で同期する
        #[arg(long)]
        auto_sync: Option<bool>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// モデル名を設定
        #[arg(long)]
        set_model: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// TSVの出力先
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportTarget {
    Stdout,
    File(PathBuf),
}

impl std::str::FromStr for ExportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("出力先が空です".to_string()),
            "-" => Ok(ExportTarget::Stdout),
            path => Ok(ExportTarget::File(PathBuf::from(path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_target_parse() {
        assert_eq!("-".parse::<ExportTarget>().unwrap(), ExportTarget::Stdout);
        assert_eq!(
            "out.tsv".parse::<ExportTarget>().unwrap(),
            ExportTarget::File(PathBuf::from("out.tsv"))
        );
        assert!("".parse::<ExportTarget>().is_err());
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "ocr-sheet-sync", "run", "a.png", "scans", "--sync", "--export", "-",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { paths, sync, retry_failed, export } => {
                assert_eq!(paths, vec![PathBuf::from("a.png"), PathBuf::from("scans")]);
                assert!(sync);
                assert!(!retry_failed);
                assert_eq!(export, Some(ExportTarget::Stdout));
            }
            _ => panic!("run command expected"),
        }
    }

    #[test]
    fn test_parse_prefs_command() {
        let cli = Cli::try_parse_from([
            "ocr-sheet-sync", "prefs", "--endpoint", "https://example.com/exec", "--auto-sync", "true",
        ])
        .unwrap();
        match cli.command {
            Commands::Prefs { endpoint, auto_sync, show } => {
                assert_eq!(endpoint.as_deref(), Some("https://example.com/exec"));
                assert_eq!(auto_sync, Some(true));
                assert!(!show);
            }
            _ => panic!("prefs command expected"),
        }
    }

    #[test]
    fn test_run_requires_paths() {
        assert!(Cli::try_parse_from(["ocr-sheet-sync", "run"]).is_err());
    }
}
