//! バッチ項目と状態遷移
//!
//! 認識状態と同期状態は独立した2軸。抽出テキストは `Completed` の中に
//! しか存在しないので、「完了時のみテキストあり」が型で保証される。

use ocr_sheet_common::{ExportRow, MediaType};
use std::sync::Arc;
use thiserror::Error;

use super::preview::PreviewRef;

/// 項目ID（ストア内で単調増加、再利用しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) u64);

impl ItemId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 元画像（バイト列・ファイル名・メディアタイプ）
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub file_name: String,
    pub media_type: MediaType,
    pub bytes: Arc<[u8]>,
}

impl ImageSource {
    pub fn new(file_name: impl Into<String>, media_type: MediaType, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecognitionState {
    #[default]
    Idle,
    Processing,
    Completed { text: String },
    Failed { error: String },
}

impl RecognitionState {
    pub fn label(&self) -> &'static str {
        match self {
            RecognitionState::Idle => "idle",
            RecognitionState::Processing => "processing",
            RecognitionState::Completed { .. } => "completed",
            RecognitionState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Synced,
    SyncFailed { error: String },
}

impl SyncState {
    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::SyncFailed { .. } => "sync-failed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{0} は認識処理中です")]
    AlreadyProcessing(ItemId),

    #[error("{0} は認識処理中ではありません")]
    NotProcessing(ItemId),

    #[error("{0} は認識が完了していないため同期できません")]
    NotCompleted(ItemId),

    #[error("{0} は同期要求されていません")]
    NotSyncing(ItemId),
}

/// アップロードされた画像1枚とその処理状態
#[derive(Debug, Clone)]
pub struct BatchItem {
    id: ItemId,
    source: ImageSource,
    preview: PreviewRef,
    recognition: RecognitionState,
    sync: SyncState,
}

impl BatchItem {
    pub(crate) fn new(id: ItemId, source: ImageSource, preview: PreviewRef) -> Self {
        Self {
            id,
            source,
            preview,
            recognition: RecognitionState::Idle,
            sync: SyncState::Idle,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        &self.source.file_name
    }

    pub fn preview(&self) -> &PreviewRef {
        &self.preview
    }

    pub fn recognition(&self) -> &RecognitionState {
        &self.recognition
    }

    pub fn sync(&self) -> &SyncState {
        &self.sync
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.recognition, RecognitionState::Completed { .. })
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.recognition, RecognitionState::Processing)
    }

    pub fn extracted_text(&self) -> Option<&str> {
        match &self.recognition {
            RecognitionState::Completed { text } => Some(text),
            _ => None,
        }
    }

    /// 認識失敗または同期失敗の内容
    pub fn error_detail(&self) -> Option<&str> {
        match (&self.recognition, &self.sync) {
            (RecognitionState::Failed { error }, _) => Some(error),
            (_, SyncState::SyncFailed { error }) => Some(error),
            _ => None,
        }
    }

    /// Idle / Failed / Completed → Processing
    ///
    /// 前回のテキスト・エラーを消し、同期状態もIdleに戻す。
    pub fn start_recognition(&mut self) -> Result<(), TransitionError> {
        if self.is_processing() {
            return Err(TransitionError::AlreadyProcessing(self.id));
        }
        self.recognition = RecognitionState::Processing;
        self.sync = SyncState::Idle;
        Ok(())
    }

    /// Processing → Completed
    pub fn complete(&mut self, text: String) -> Result<(), TransitionError> {
        if !self.is_processing() {
            return Err(TransitionError::NotProcessing(self.id));
        }
        self.recognition = RecognitionState::Completed { text };
        self.sync = SyncState::Idle;
        Ok(())
    }

    /// Processing → Failed
    pub fn fail(&mut self, error: String) -> Result<(), TransitionError> {
        if !self.is_processing() {
            return Err(TransitionError::NotProcessing(self.id));
        }
        self.recognition = RecognitionState::Failed { error };
        Ok(())
    }

    /// Processing → Idle（結果を反映する前に処理が中断された）
    pub fn interrupt(&mut self) -> Result<(), TransitionError> {
        if !self.is_processing() {
            return Err(TransitionError::NotProcessing(self.id));
        }
        self.recognition = RecognitionState::Idle;
        Ok(())
    }

    /// → Syncing（認識完了時のみ）
    pub fn begin_sync(&mut self) -> Result<(), TransitionError> {
        if !self.is_completed() {
            return Err(TransitionError::NotCompleted(self.id));
        }
        self.sync = SyncState::Syncing;
        Ok(())
    }

    /// Syncing → Synced
    ///
    /// 同じ項目への同期が重なった場合は最後に終わったものが勝つ。
    pub fn finish_sync(&mut self) -> Result<(), TransitionError> {
        self.check_sync_settle()?;
        self.sync = SyncState::Synced;
        Ok(())
    }

    /// Syncing → SyncFailed
    pub fn fail_sync(&mut self, error: String) -> Result<(), TransitionError> {
        self.check_sync_settle()?;
        self.sync = SyncState::SyncFailed { error };
        Ok(())
    }

    fn check_sync_settle(&self) -> Result<(), TransitionError> {
        if !self.is_completed() {
            return Err(TransitionError::NotCompleted(self.id));
        }
        // 再認識でIdleに戻った後の遅延結果は捨てる
        if self.sync == SyncState::Idle {
            return Err(TransitionError::NotSyncing(self.id));
        }
        Ok(())
    }
}

impl ExportRow for BatchItem {
    fn file_name(&self) -> &str {
        &self.source.file_name
    }

    fn extracted_text(&self) -> Option<&str> {
        BatchItem::extracted_text(self)
    }
}
