//! バッチ項目ストア
//!
//! 項目の唯一の保持者。変更は `add` / `remove` / `update` / `clear` だけで行い、
//! 挿入順を保つ（並べ替えない）。ロックはawaitをまたいで保持しない。

mod item;
mod preview;

pub use item::{BatchItem, ImageSource, ItemId, RecognitionState, SyncState, TransitionError};
pub use preview::{PreviewHandle, PreviewRef, PreviewRegistry};

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

struct Entry {
    item: BatchItem,
    // ドロップ時にプレビューが解放される
    _preview: PreviewHandle,
}

#[derive(Default)]
struct StoreInner {
    next_id: u64,
    entries: Vec<Entry>,
}

impl StoreInner {
    fn position(&self, id: ItemId) -> Option<usize> {
        self.entries.iter().position(|e| e.item.id() == id)
    }
}

/// 順序付きの項目コレクション（クローンは同じ中身を共有する）
#[derive(Clone)]
pub struct ItemStore {
    inner: Arc<Mutex<StoreInner>>,
    previews: PreviewRegistry,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore {
    pub fn new() -> Self {
        Self::with_registry(PreviewRegistry::new())
    }

    pub fn with_registry(previews: PreviewRegistry) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            previews,
            revision: Arc::new(revision),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// 変更通知（値はリビジョン番号）
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// 末尾に追加（Idle/Idle、プレビューを新規確保）
    pub fn add(&self, sources: Vec<ImageSource>) -> Vec<ItemId> {
        if sources.is_empty() {
            return Vec::new();
        }

        let ids = {
            let mut inner = self.lock();
            let mut ids = Vec::with_capacity(sources.len());
            for source in sources {
                inner.next_id += 1;
                let id = ItemId(inner.next_id);
                let handle = self.previews.allocate(&source);
                let item = BatchItem::new(id, source, handle.preview().clone());
                inner.entries.push(Entry { item, _preview: handle });
                ids.push(id);
            }
            ids
        };

        debug!(count = ids.len(), "項目を追加");
        self.bump();
        ids
    }

    /// 削除してプレビューを解放（存在しなければ何もしない）
    pub fn remove(&self, id: ItemId) -> bool {
        let removed = {
            let mut inner = self.lock();
            inner.position(id).map(|pos| inner.entries.remove(pos))
        };

        match removed {
            Some(entry) => {
                drop(entry);
                debug!(item = %id, "項目を削除");
                self.bump();
                true
            }
            None => false,
        }
    }

    /// 1項目に状態遷移を適用し、遷移後の状態を返す
    ///
    /// IDが存在しなければ `Ok(None)`。遷移が不正なら項目は変更されない。
    pub fn update<F>(&self, id: ItemId, transform: F) -> Result<Option<BatchItem>, TransitionError>
    where
        F: FnOnce(&mut BatchItem) -> Result<(), TransitionError>,
    {
        let updated = {
            let mut inner = self.lock();
            let Some(pos) = inner.position(id) else {
                return Ok(None);
            };
            let item = &mut inner.entries[pos].item;
            let mut next = item.clone();
            transform(&mut next)?;
            *item = next.clone();
            next
        };

        self.bump();
        Ok(Some(updated))
    }

    /// 全削除（すべてのプレビューを解放）
    pub fn clear(&self) -> usize {
        let entries = std::mem::take(&mut self.lock().entries);
        let count = entries.len();
        drop(entries);

        if count > 0 {
            debug!(count, "全項目を削除");
            self.bump();
        }
        count
    }

    pub fn get(&self, id: ItemId) -> Option<BatchItem> {
        let inner = self.lock();
        inner.position(id).map(|pos| inner.entries[pos].item.clone())
    }

    /// 挿入順のスナップショット
    pub fn snapshot(&self) -> Vec<BatchItem> {
        self.lock().entries.iter().map(|e| e.item.clone()).collect()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.lock().entries.iter().map(|e| e.item.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_sheet_common::MediaType;
    use std::collections::HashSet;

    fn source(name: &str) -> ImageSource {
        ImageSource::new(name, MediaType::Png, vec![1u8, 2, 3])
    }

    fn names(store: &ItemStore) -> Vec<String> {
        store.snapshot().iter().map(|i| i.file_name().to_string()).collect()
    }

    #[test]
    fn test_add_preserves_order_and_state() {
        let store = ItemStore::new();
        let ids = store.add(vec![source("a.png"), source("b.png"), source("c.png")]);

        assert_eq!(ids.len(), 3);
        assert_eq!(names(&store), vec!["a.png", "b.png", "c.png"]);
        for item in store.snapshot() {
            assert_eq!(item.recognition(), &RecognitionState::Idle);
            assert_eq!(item.sync(), &SyncState::Idle);
        }
        assert_eq!(store.previews().live_count(), 3);
    }

    #[test]
    fn test_add_does_not_touch_existing_items() {
        let store = ItemStore::new();
        let ids = store.add(vec![source("a.png")]);
        store.update(ids[0], |item| item.start_recognition()).unwrap();

        store.add(vec![source("b.png")]);
        assert!(store.get(ids[0]).unwrap().is_processing());
    }

    #[test]
    fn test_remove_keeps_order_and_releases_preview() {
        let store = ItemStore::new();
        let ids = store.add(vec![source("a.png"), source("b.png"), source("c.png")]);

        assert!(store.remove(ids[1]));
        assert_eq!(names(&store), vec!["a.png", "c.png"]);
        assert_eq!(store.previews().live_count(), 2);
        assert_eq!(store.previews().released_count(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let store = ItemStore::new();
        let ids = store.add(vec![source("a.png")]);
        assert!(store.remove(ids[0]));
        assert!(!store.remove(ids[0]));
        assert_eq!(store.previews().released_count(), 1);
    }

    #[test]
    fn test_ids_unique_across_add_remove() {
        let store = ItemStore::new();
        let mut seen = HashSet::new();
        for round in 0..5 {
            let ids = store.add(vec![source("x.png"), source("y.png")]);
            for id in &ids {
                assert!(seen.insert(*id), "duplicate id in round {}", round);
            }
            store.remove(ids[0]);
        }
        let current: HashSet<ItemId> = store.ids().into_iter().collect();
        assert_eq!(current.len(), store.len());
    }

    #[test]
    fn test_update_returns_new_state() {
        let store = ItemStore::new();
        let ids = store.add(vec![source("a.png"), source("b.png")]);

        let updated = store
            .update(ids[0], |item| item.start_recognition())
            .unwrap()
            .unwrap();
        assert!(updated.is_processing());
        assert_eq!(store.get(ids[1]).unwrap().recognition(), &RecognitionState::Idle);
    }

    #[test]
    fn test_update_absent_is_noop() {
        let store = ItemStore::new();
        let ids = store.add(vec![source("a.png")]);
        store.remove(ids[0]);
        assert!(store.update(ids[0], |item| item.start_recognition()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_transition_leaves_item_unchanged() {
        let store = ItemStore::new();
        let ids = store.add(vec![source("a.png")]);
        let result = store.update(ids[0], |item| item.begin_sync());
        assert_eq!(result.unwrap_err(), TransitionError::NotCompleted(ids[0]));
        assert_eq!(store.get(ids[0]).unwrap().sync(), &SyncState::Idle);
    }

    #[test]
    fn test_clear_releases_everything() {
        let store = ItemStore::new();
        store.add(vec![source("a.png"), source("b.png")]);
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.previews().live_count(), 0);
        assert_eq!(store.previews().released_count(), 2);
        assert_eq!(store.clear(), 0);
        assert_eq!(store.previews().released_count(), 2);
    }

    #[test]
    fn test_subscribe_sees_changes() {
        let store = ItemStore::new();
        let rx = store.subscribe();
        let before = *rx.borrow();
        let ids = store.add(vec![source("a.png")]);
        store.remove(ids[0]);
        assert_eq!(*rx.borrow(), before + 2);
    }
}
