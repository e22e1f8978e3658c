use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_sheet_sync::{cli, config, error, orchestrator, preferences, recognition, scanner, store, sync};
use cli::{Cli, Commands, ExportTarget};
use config::Config;
use error::ConfigurationError;
use orchestrator::{BatchEvent, BatchOrchestrator, BatchOutcome, BatchSummary};
use preferences::{JsonFileBackend, Preferences};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use store::{ItemStore, RecognitionState, SyncState};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// 同期先が未設定なら対話で尋ねる（端末でなければ設定エラー）
fn ensure_endpoint(prefs: &Preferences) -> anyhow::Result<String> {
    let endpoint = prefs.sync_endpoint();
    if !endpoint.is_empty() {
        return Ok(endpoint);
    }
    if !std::io::stdin().is_terminal() {
        return Err(ConfigurationError::MissingSyncEndpoint.into());
    }

    println!("⚠ {}", ConfigurationError::MissingSyncEndpoint);
    let input: String = dialoguer::Input::new()
        .with_prompt("同期先URL")
        .interact_text()
        .context("同期先URLの入力に失敗")?;
    let input = input.trim().to_string();
    if input.is_empty() {
        return Err(ConfigurationError::MissingSyncEndpoint.into());
    }
    prefs.set_sync_endpoint(input.clone())?;
    println!("✔ 同期先を保存しました");
    Ok(input)
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

async fn run_pass(orchestrator: &BatchOrchestrator) -> Option<BatchSummary> {
    let pb = progress_bar(0);
    let bar = pb.clone();
    let outcome = orchestrator
        .run_batch_with(move |event| match event {
            BatchEvent::Started { total } => bar.set_length(total as u64),
            BatchEvent::Recognizing { item, .. } => bar.set_message(item.file_name().to_string()),
            BatchEvent::Recognized { .. } => bar.inc(1),
            BatchEvent::Synced { item } => bar.set_message(format!("{} (同期)", item.file_name())),
            BatchEvent::Finished { .. } => bar.set_message("完了"),
        })
        .await;
    pb.finish_and_clear();

    match outcome {
        BatchOutcome::Finished(summary) => Some(summary),
        BatchOutcome::AlreadyRunning => None,
    }
}

fn print_items(store: &ItemStore) {
    for item in store.snapshot() {
        let sync = match item.sync() {
            SyncState::Idle => String::new(),
            SyncState::Syncing => " [同期中]".to_string(),
            SyncState::Synced => " [同期済み]".to_string(),
            SyncState::SyncFailed { error } => format!(" [同期失敗: {}]", error),
        };
        match item.recognition() {
            RecognitionState::Completed { text } => {
                println!("✔ {}{} ({}文字)", item.file_name(), sync, text.chars().count());
            }
            RecognitionState::Failed { error } => println!("✖ {}: {}", item.file_name(), error),
            other => println!("- {}: {}", item.file_name(), other.label()),
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "  完了: {} / 失敗: {} / 同期: {} / 同期失敗: {}",
        summary.completed, summary.failed, summary.synced, summary.sync_failed
    );
    for notice in &summary.notices {
        println!("⚠ {}", notice);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load()?;
    let prefs = Arc::new(Preferences::load(JsonFileBackend::in_dir(&Config::config_dir()?))?);

    match cli.command {
        Commands::Run { paths, sync, retry_failed, export } => {
            println!("📄 ocr-sheet-sync - 一括OCR\n");

            // APIキーがなければ処理を始めない
            config.api_key()?;
            if sync || prefs.auto_sync() {
                ensure_endpoint(&prefs)?;
            }

            println!("[1/3] 画像を読み込み中...");
            let sources = scanner::load_images(&paths)?;
            println!("✔ {}枚の画像を検出\n", sources.len());

            let recognizer = Arc::new(recognition::GeminiClient::from_config(&config)?);
            let sink = Arc::new(sync::HttpSyncClient::new(sync::DEFAULT_SYNC_TIMEOUT)?);
            let orchestrator = BatchOrchestrator::new(ItemStore::new(), recognizer, sink, prefs.clone());
            orchestrator.store().add(sources);

            println!("[2/3] OCR実行中...{}", if prefs.auto_sync() { " (自動同期)" } else { "" });
            if let Some(summary) = run_pass(&orchestrator).await {
                print_summary(&summary);
                if retry_failed && summary.failed > 0 {
                    println!("- 失敗した{}件を再実行中...", summary.failed);
                    if let Some(retry) = run_pass(&orchestrator).await {
                        print_summary(&retry);
                    }
                }
            }
            println!();

            if sync {
                println!("- 未同期の結果を同期中...");
                let result = orchestrator.sync_all_completed().await?;
                println!("✔ 同期: {}件 / 失敗: {}件", result.synced, result.failed);
            }

            println!("[3/3] 結果");
            print_items(orchestrator.store());

            if let Some(target) = export {
                match orchestrator.export_tsv() {
                    None => println!("\nコピーする結果がありません"),
                    Some(tsv) => match target {
                        ExportTarget::Stdout => println!("\n{}", tsv),
                        ExportTarget::File(path) => {
                            std::fs::write(&path, format!("{}\n", tsv))
                                .with_context(|| format!("write {}", path.display()))?;
                            println!("\n✔ TSV出力: {}", path.display());
                        }
                    },
                }
            }

            let released = orchestrator.store().clear();
            tracing::debug!(released, "プレビューを解放");
            println!("\n✅ 完了");
        }

        Commands::Prefs { endpoint, auto_sync, show } => {
            if let Some(url) = endpoint {
                prefs.set_sync_endpoint(url.trim())?;
                println!("✔ 同期先を設定しました");
            }

            if let Some(enabled) = auto_sync {
                prefs.set_auto_sync(enabled)?;
                println!("✔ 自動同期を{}にしました", if enabled { "有効" } else { "無効" });
            }

            if show {
                let endpoint = prefs.sync_endpoint();
                println!("設定:");
                println!("  同期先: {}", if endpoint.is_empty() { "未設定" } else { endpoint.as_str() });
                println!("  自動同期: {}", if prefs.auto_sync() { "有効" } else { "無効" });
            }
        }

        Commands::Config { set_api_key, set_model, show } => {
            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if let Some(model) = set_model {
                config.set_model(model)?;
                println!("✔ モデルを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  APIエンドポイント: {}", config.api_base_url);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  APIキー: {}", if config.api_key().is_ok() { "設定済み" } else { "未設定" });
            }
        }
    }

    Ok(())
}
