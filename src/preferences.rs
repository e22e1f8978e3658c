//! 利用者設定（同期先URL・自動同期フラグ）
//!
//! 起動時に一度だけ読み込み、変更のたびに即座に保存する。
//! 保存先は `PreferenceBackend` として差し替え可能。

use crate::error::{OcrSyncError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// 設定キー（保存名は固定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    SyncEndpoint,
    AutoSync,
}

impl PreferenceKey {
    pub fn name(&self) -> &'static str {
        match self {
            PreferenceKey::SyncEndpoint => "syncEndpoint",
            PreferenceKey::AutoSync => "autoSync",
        }
    }

    /// キーが保存されていないときの値
    pub fn default_value(&self) -> &'static str {
        match self {
            PreferenceKey::SyncEndpoint => "",
            PreferenceKey::AutoSync => "false",
        }
    }
}

/// 設定値の永続化先
pub trait PreferenceBackend: Send + Sync {
    fn load(&self) -> Result<HashMap<String, String>>;
    fn save(&self, values: &HashMap<String, String>) -> Result<()>;
}

/// JSONファイルに保存するバックエンド
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 設定ディレクトリ直下の既定ファイル
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PREFERENCES_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceBackend for JsonFileBackend {
    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(values) => Ok(values),
            Err(e) => {
                // 壊れたファイルは既定値で置き換える
                warn!(path = %self.path.display(), error = %e, "設定ファイルが不正なため既定値を使用");
                Ok(HashMap::new())
            }
        }
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// メモリ上のバックエンド
///
/// クローン同士で中身を共有するので、再起動を模したテストに使える。
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceBackend for MemoryBackend {
    fn load(&self) -> Result<HashMap<String, String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| OcrSyncError::Preferences(e.to_string()))?;
        Ok(values.clone())
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        let mut stored = self
            .values
            .lock()
            .map_err(|e| OcrSyncError::Preferences(e.to_string()))?;
        *stored = values.clone();
        Ok(())
    }
}

/// 利用者設定ストア
pub struct Preferences {
    backend: Box<dyn PreferenceBackend>,
    values: RwLock<HashMap<String, String>>,
}

impl Preferences {
    /// バックエンドから読み込む（プロセス起動時に一度）
    pub fn load(backend: impl PreferenceBackend + 'static) -> Result<Self> {
        let values = backend.load()?;
        debug!(count = values.len(), "設定を読み込みました");
        Ok(Self {
            backend: Box::new(backend),
            values: RwLock::new(values),
        })
    }

    /// 最後に保存された値、なければ既定値
    pub fn get(&self, key: PreferenceKey) -> String {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values
            .get(key.name())
            .cloned()
            .unwrap_or_else(|| key.default_value().to_string())
    }

    /// 値を設定して即座に保存する
    ///
    /// 保存に失敗した場合はメモリ上の値も変更しない。
    pub fn set(&self, key: PreferenceKey, value: impl Into<String>) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let mut next = values.clone();
        next.insert(key.name().to_string(), value.into());
        self.backend.save(&next)?;
        *values = next;
        debug!(key = key.name(), "設定を保存しました");
        Ok(())
    }

    pub fn sync_endpoint(&self) -> String {
        self.get(PreferenceKey::SyncEndpoint).trim().to_string()
    }

    pub fn auto_sync(&self) -> bool {
        self.get(PreferenceKey::AutoSync).trim().eq_ignore_ascii_case("true")
    }

    pub fn set_sync_endpoint(&self, url: impl Into<String>) -> Result<()> {
        self.set(PreferenceKey::SyncEndpoint, url)
    }

    pub fn set_auto_sync(&self, enabled: bool) -> Result<()> {
        self.set(PreferenceKey::AutoSync, enabled.to_string())
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("sync_endpoint", &self.sync_endpoint())
            .field("auto_sync", &self.auto_sync())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl PreferenceBackend for FailingBackend {
        fn load(&self) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
        fn save(&self, _values: &HashMap<String, String>) -> Result<()> {
            Err(OcrSyncError::Preferences("disk full".into()))
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let prefs = Preferences::load(MemoryBackend::new()).unwrap();
        assert_eq!(prefs.get(PreferenceKey::SyncEndpoint), "");
        assert_eq!(prefs.get(PreferenceKey::AutoSync), "false");
        assert_eq!(prefs.sync_endpoint(), "");
        assert!(!prefs.auto_sync());
    }

    #[test]
    fn test_set_is_visible_immediately() {
        let prefs = Preferences::load(MemoryBackend::new()).unwrap();
        prefs.set_sync_endpoint("https://example.com/hook").unwrap();
        prefs.set_auto_sync(true).unwrap();
        assert_eq!(prefs.sync_endpoint(), "https://example.com/hook");
        assert!(prefs.auto_sync());
    }

    #[test]
    fn test_values_survive_restart() {
        let backend = MemoryBackend::new();
        {
            let prefs = Preferences::load(backend.clone()).unwrap();
            prefs.set_sync_endpoint("https://example.com/hook").unwrap();
            prefs.set_auto_sync(true).unwrap();
        }
        let reloaded = Preferences::load(backend).unwrap();
        assert_eq!(reloaded.sync_endpoint(), "https://example.com/hook");
        assert!(reloaded.auto_sync());
    }

    #[test]
    fn test_failed_save_keeps_previous_value() {
        let prefs = Preferences::load(FailingBackend).unwrap();
        assert!(prefs.set_auto_sync(true).is_err());
        assert!(!prefs.auto_sync());
    }

    #[test]
    fn test_endpoint_is_not_validated() {
        let prefs = Preferences::load(MemoryBackend::new()).unwrap();
        prefs.set_sync_endpoint("not a url").unwrap();
        assert_eq!(prefs.sync_endpoint(), "not a url");
    }

    #[test]
    fn test_json_file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::in_dir(&dir.path().join("nested"));
        {
            let prefs = Preferences::load(backend.clone()).unwrap();
            prefs.set_sync_endpoint("https://script.example/exec").unwrap();
        }
        assert!(backend.path().exists());

        let content = std::fs::read_to_string(backend.path()).unwrap();
        assert!(content.contains("\"syncEndpoint\""));

        let prefs = Preferences::load(backend).unwrap();
        assert_eq!(prefs.sync_endpoint(), "https://script.example/exec");
        assert!(!prefs.auto_sync());
    }

    #[test]
    fn test_json_file_backend_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path());
        std::fs::write(backend.path(), "{not json").unwrap();

        let prefs = Preferences::load(backend).unwrap();
        assert_eq!(prefs.sync_endpoint(), "");
    }
}
