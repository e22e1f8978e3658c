//! プレビュー資源の管理
//!
//! プレビューは表示用の Data URL。ハンドルは項目だけが所有し、
//! ドロップ時にレジストリから一度だけ解放される。

use ocr_sheet_common::to_data_url;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

use super::item::ImageSource;

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
    released: AtomicUsize,
}

impl RegistryInner {
    fn release(&self, id: u64) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if removed {
            self.released.fetch_add(1, Ordering::SeqCst);
        } else {
            warn!(preview_id = id, "解放済みのプレビューを再度解放しようとしました");
        }
    }
}

/// 発行済みプレビューの台帳
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// プレビューを確保
    pub fn allocate(&self, source: &ImageSource) -> PreviewHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id);

        PreviewHandle {
            preview: PreviewRef {
                id,
                url: to_data_url(source.media_type, &source.bytes).into(),
            },
            registry: Arc::clone(&self.inner),
        }
    }

    /// 未解放のプレビュー数
    pub fn live_count(&self) -> usize {
        self.inner.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 解放済みの累計
    pub fn released_count(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub fn is_live(&self, preview: &PreviewRef) -> bool {
        self.inner
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&preview.id)
    }
}

/// 表示側に渡すプレビュー参照（解放後は無効）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRef {
    id: u64,
    url: Arc<str>,
}

impl PreviewRef {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            id: u64::MAX,
            url: Arc::from(""),
        }
    }
}

/// 所有ハンドル。ドロップで解放される
#[derive(Debug)]
pub struct PreviewHandle {
    preview: PreviewRef,
    registry: Arc<RegistryInner>,
}

impl PreviewHandle {
    pub fn preview(&self) -> &PreviewRef {
        &self.preview
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.preview.id);
    }
}
