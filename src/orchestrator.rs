//! バッチ処理オーケストレータ
//!
//! 未完了の項目を挿入順に1件ずつ認識し、結果をストアへ反映する。
//! 自動同期が有効なら、次の項目に進む前にその項目を同期する。
//!
//! 認識状態を変更するのは常にこのループ1本だけ。項目が処理中に削除された場合、
//! 後から届いた結果は `update` が何もしないことで捨てられる。
//! 処理中のFutureが破棄された場合、その項目はIdleに戻り次回のパスで再処理される。

use chrono::Local;
use ocr_sheet_common::{build_tsv, SyncRecord, TIMESTAMP_FORMAT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ConfigurationError, OcrSyncError, Result};
use crate::preferences::Preferences;
use crate::recognition::{RecognitionError, Recognizer};
use crate::store::{BatchItem, ItemId, ItemStore, SyncState, TransitionError};
use crate::sync::SyncSink;

/// タイムスタンプ生成関数
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// ローカル時刻の表示用文字列
pub fn local_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// バッチ処理の集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    pub synced: usize,
    pub sync_failed: usize,
    /// 利用者に設定の修正を求める通知（重複なし）
    pub notices: Vec<ConfigurationError>,
}

impl BatchSummary {
    fn notice(&mut self, notice: ConfigurationError) {
        if !self.notices.contains(&notice) {
            self.notices.push(notice);
        }
    }

    fn record_sync(&mut self, item: Option<&BatchItem>) {
        match item.map(|i| i.sync()) {
            Some(SyncState::Synced) => self.synced += 1,
            Some(SyncState::SyncFailed { .. }) => self.sync_failed += 1,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 既に実行中だったため何もしなかった
    AlreadyRunning,
    Finished(BatchSummary),
}

/// 進捗通知
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    Recognizing { index: usize, total: usize, item: BatchItem },
    Recognized { index: usize, total: usize, item: BatchItem },
    Synced { item: BatchItem },
    Finished { summary: BatchSummary },
}

/// 一括同期の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub synced: usize,
    pub failed: usize,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 認識中に処理が中断された（Futureが破棄された）項目をIdleに戻す
struct InFlight<'a> {
    store: &'a ItemStore,
    id: ItemId,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Ok(Some(_)) = self.store.update(self.id, |item| item.interrupt()) {
            warn!(item = %self.id, "認識が中断されたため未処理に戻しました");
        }
    }
}

pub struct BatchOrchestrator {
    store: ItemStore,
    recognizer: Arc<dyn Recognizer>,
    sink: Arc<dyn SyncSink>,
    preferences: Arc<Preferences>,
    clock: Clock,
    running: AtomicBool,
}

impl BatchOrchestrator {
    pub fn new(
        store: ItemStore,
        recognizer: Arc<dyn Recognizer>,
        sink: Arc<dyn SyncSink>,
        preferences: Arc<Preferences>,
    ) -> Self {
        Self {
            store,
            recognizer,
            sink,
            preferences,
            clock: Arc::new(local_timestamp),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    pub async fn run_batch(&self) -> BatchOutcome {
        self.run_batch_with(|_| {}).await
    }

    /// 未完了（Idle / Failed）の項目を順番に処理する
    pub async fn run_batch_with<F>(&self, mut on_event: F) -> BatchOutcome
    where
        F: FnMut(BatchEvent) + Send,
    {
        let Some(_guard) = self.try_begin() else {
            info!("バッチ処理は既に実行中です");
            return BatchOutcome::AlreadyRunning;
        };

        // 開始時点の対象だけを処理する（途中で追加された項目は次回）
        let eligible: Vec<ItemId> = self
            .store
            .snapshot()
            .iter()
            .filter(|item| !item.is_completed())
            .map(|item| item.id())
            .collect();

        let mut summary = BatchSummary::default();
        if eligible.is_empty() {
            debug!("処理対象がありません");
            return BatchOutcome::Finished(summary);
        }

        let total = eligible.len();
        info!(total, "バッチ処理を開始");
        on_event(BatchEvent::Started { total });

        for (index, id) in eligible.into_iter().enumerate() {
            if let Err(e) = self.process_item(id, index, total, &mut summary, &mut on_event).await {
                warn!(item = %id, error = %e, "認識を開始できません");
            }
        }

        info!(
            processed = summary.processed,
            completed = summary.completed,
            failed = summary.failed,
            synced = summary.synced,
            sync_failed = summary.sync_failed,
            "バッチ処理が完了"
        );
        on_event(BatchEvent::Finished {
            summary: summary.clone(),
        });
        BatchOutcome::Finished(summary)
    }

    /// 1項目を明示的に再認識する（完了済みも対象）
    pub async fn rerun_item(&self, id: ItemId) -> Result<Option<BatchItem>> {
        let Some(_guard) = self.try_begin() else {
            return Err(OcrSyncError::BatchInProgress);
        };
        if self.store.get(id).is_none() {
            return Err(OcrSyncError::ItemNotFound(id));
        }

        let mut summary = BatchSummary::default();
        self.process_item(id, 0, 1, &mut summary, &mut |_: BatchEvent| {}).await?;
        if let Some(notice) = summary.notices.into_iter().next() {
            warn!(item = %id, %notice, "設定の修正が必要です");
        }
        Ok(self.store.get(id))
    }

    async fn process_item<F>(
        &self,
        id: ItemId,
        index: usize,
        total: usize,
        summary: &mut BatchSummary,
        on_event: &mut F,
    ) -> std::result::Result<(), TransitionError>
    where
        F: FnMut(BatchEvent) + Send,
    {
        // 遷移の直前に読み直す。削除済みなら飛ばす
        let Some(item) = self.store.update(id, |item| item.start_recognition())? else {
            debug!(item = %id, "削除済みのためスキップ");
            return Ok(());
        };
        let mut in_flight = InFlight {
            store: &self.store,
            id,
            settled: false,
        };

        summary.processed += 1;
        on_event(BatchEvent::Recognizing {
            index,
            total,
            item: item.clone(),
        });

        let result = self.recognizer.recognize(item.source()).await;
        let applied = self.apply_recognition(id, result, summary);
        in_flight.settle();
        let Some(settled) = applied else {
            return Ok(());
        };
        on_event(BatchEvent::Recognized {
            index,
            total,
            item: settled.clone(),
        });

        if !settled.is_completed() || !self.preferences.auto_sync() {
            return Ok(());
        }

        let endpoint = self.preferences.sync_endpoint();
        if endpoint.is_empty() {
            summary.notice(ConfigurationError::MissingSyncEndpoint);
            return Ok(());
        }

        let synced = self.sync_one(id, &endpoint).await;
        summary.record_sync(synced.as_ref());
        if let Some(item) = synced {
            on_event(BatchEvent::Synced { item });
        }
        Ok(())
    }

    fn apply_recognition(
        &self,
        id: ItemId,
        result: std::result::Result<String, RecognitionError>,
        summary: &mut BatchSummary,
    ) -> Option<BatchItem> {
        let file_name = self.store.get(id).map(|i| i.file_name().to_string());
        let applied = match result {
            Ok(text) => self.store.update(id, move |item| item.complete(text)),
            Err(error) => {
                warn!(item = %id, file = ?file_name, %error, "認識に失敗");
                if error.is_configuration() {
                    summary.notice(ConfigurationError::MissingCredential);
                }
                self.store.update(id, |item| item.fail(error.to_string()))
            }
        };

        match applied {
            Ok(Some(item)) => {
                if item.is_completed() {
                    summary.completed += 1;
                    debug!(item = %id, "認識完了");
                } else {
                    summary.failed += 1;
                }
                Some(item)
            }
            Ok(None) => {
                debug!(item = %id, "処理中に削除されたため結果を破棄");
                None
            }
            Err(e) => {
                warn!(item = %id, error = %e, "認識結果を反映できません");
                None
            }
        }
    }

    /// 同期を1回試みる。項目が消えていればNone
    async fn sync_one(&self, id: ItemId, endpoint: &str) -> Option<BatchItem> {
        let item = match self.store.update(id, |item| item.begin_sync()) {
            Ok(Some(item)) => item,
            Ok(None) => return None,
            Err(e) => {
                debug!(item = %id, error = %e, "同期できる状態ではありません");
                return self.store.get(id);
            }
        };

        let record = SyncRecord::new(
            item.file_name(),
            item.extracted_text().unwrap_or_default(),
            (self.clock)(),
        );
        let outcome = self.sink.dispatch(endpoint, &record).await;

        let settled = match outcome {
            Ok(()) => self.store.update(id, |item| item.finish_sync()),
            Err(error) => {
                warn!(item = %id, %error, "同期に失敗");
                self.store.update(id, |item| item.fail_sync(error.to_string()))
            }
        };

        match settled {
            Ok(item) => item,
            Err(TransitionError::NotSyncing(_)) | Err(TransitionError::NotCompleted(_)) => {
                debug!(item = %id, "再認識されたため同期結果を破棄");
                self.store.get(id)
            }
            Err(e) => {
                warn!(item = %id, error = %e, "同期結果を反映できません");
                self.store.get(id)
            }
        }
    }

    fn require_endpoint(&self) -> Result<String> {
        let endpoint = self.preferences.sync_endpoint();
        if endpoint.is_empty() {
            return Err(ConfigurationError::MissingSyncEndpoint.into());
        }
        Ok(endpoint)
    }

    /// 1項目を手動で同期する
    ///
    /// 同期先が未設定なら同期クライアントを呼ばずに設定エラーを返す。
    /// 送信失敗は項目の同期状態に記録され、エラーにはならない。
    pub async fn sync_item(&self, id: ItemId) -> Result<Option<BatchItem>> {
        let endpoint = self.require_endpoint()?;
        let item = self.store.get(id).ok_or(OcrSyncError::ItemNotFound(id))?;
        if !item.is_completed() {
            return Err(TransitionError::NotCompleted(id).into());
        }
        Ok(self.sync_one(id, &endpoint).await)
    }

    /// 未同期の完了済み項目を順番に同期する
    pub async fn sync_all_completed(&self) -> Result<SyncSummary> {
        let endpoint = self.require_endpoint()?;
        let targets: Vec<ItemId> = self
            .store
            .snapshot()
            .iter()
            .filter(|item| item.is_completed() && item.sync() != &SyncState::Synced)
            .map(|item| item.id())
            .collect();

        let mut summary = SyncSummary::default();
        for id in targets {
            match self.sync_one(id, &endpoint).await.as_ref().map(|i| i.sync()) {
                Some(SyncState::Synced) => summary.synced += 1,
                Some(SyncState::SyncFailed { .. }) => summary.failed += 1,
                _ => {}
            }
        }
        info!(synced = summary.synced, failed = summary.failed, "一括同期が完了");
        Ok(summary)
    }

    /// 完了済み項目のTSV（0件ならNone）
    pub fn export_tsv(&self) -> Option<String> {
        self.export_tsv_at(&(self.clock)())
    }

    pub fn export_tsv_at(&self, timestamp: &str) -> Option<String> {
        let items = self.store.snapshot();
        build_tsv(&items, timestamp)
    }
}
