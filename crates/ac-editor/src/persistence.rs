//! Local persistence of the working diagram.
//!
//! The diagram document is written under a scoped key so each interview
//! problem keeps its own draft. Writes are debounced by [`AutoSaver`]: a
//! burst of edits produces one write after the quiet period.
//!
//! # Backends
//!
//! - [`MemoryStorage`]: in-process map, for tests and ephemeral sessions.
//! - [`FileStorage`]: one JSON file per key in a directory. Writes go to a
//!   temporary file that is then renamed over the target, so a crash never
//!   leaves a half-written document behind.
//!
//! Timing is explicit (`notify_at`/`tick_at` take an [`Instant`]) so the
//! debounce is deterministic under test.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

// ─── Errors ──────────────────────────────────────────────────────────────

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(io::Error),
    /// The document could not be serialized.
    Serialization(String),
    /// Backend is not usable (poisoned lock, missing directory…).
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(_) | StorageError::Unavailable(_) => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─── Backend trait ───────────────────────────────────────────────────────

/// Key/value store for serialized documents.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Load the document stored under `key`. `Ok(None)` on first run.
    fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the document stored under `key`.
    fn save(&self, key: &str, text: &str) -> StorageResult<()>;

    /// Forget `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Unavailable("lock poisoned".into())
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self.data.read().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn save(&self, key: &str, text: &str) -> StorageResult<()> {
        let mut guard = self.data.write().map_err(poisoned)?;
        guard.insert(key.to_string(), text.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self.data.write().map_err(poisoned)?;
        guard.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.data.read().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("MemoryStorage")
            .field("entries", &count)
            .finish()
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `key`. Bytes outside `[A-Za-z0-9_-]` are written as
    /// `%XX`, so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        self.dir.join(format!("{name}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "FileStorage"
    }

    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, text: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        log::trace!("{}: wrote {} bytes to {}", self.name(), text.len(), path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// ─── Scoping ─────────────────────────────────────────────────────────────

/// Which draft slot the editor works in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Interview mode: one draft per problem.
    Problem(String),
    /// Free design mode: a single global draft.
    FreeDesign,
}

impl StorageScope {
    pub fn key(&self) -> String {
        match self {
            StorageScope::Problem(id) => format!("archcanvas:problem:{id}"),
            StorageScope::FreeDesign => "archcanvas:free-design".to_string(),
        }
    }
}

// ─── Debounced writer ────────────────────────────────────────────────────

/// Debounced writer for one storage key.
///
/// Each [`notify_at`](Self::notify_at) replaces the pending text and pushes
/// the deadline out by the debounce period; [`tick_at`](Self::tick_at)
/// writes once the deadline has passed. Dropping the saver flushes whatever
/// is pending.
pub struct AutoSaver {
    backend: Arc<dyn StorageBackend>,
    key: String,
    debounce: Duration,
    pending: Option<(String, Instant)>,
}

impl AutoSaver {
    pub fn new(backend: Arc<dyn StorageBackend>, scope: &StorageScope, debounce: Duration) -> Self {
        Self {
            backend,
            key: scope.key(),
            debounce,
            pending: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Load the stored text for this saver's key.
    pub fn load(&self) -> StorageResult<Option<String>> {
        self.backend.load(&self.key)
    }

    /// Queue `text` for writing `debounce` after `now`.
    pub fn notify_at(&mut self, now: Instant, text: String) {
        self.pending = Some((text, now + self.debounce));
    }

    /// Write the pending text if its deadline has passed. Returns whether a
    /// write happened. On failure the text stays pending.
    pub fn tick_at(&mut self, now: Instant) -> StorageResult<bool> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.flush(),
            _ => Ok(false),
        }
    }

    /// Write the pending text now.
    pub fn flush(&mut self) -> StorageResult<bool> {
        let Some((text, deadline)) = self.pending.take() else {
            return Ok(false);
        };
        if let Err(e) = self.backend.save(&self.key, &text) {
            self.pending = Some((text, deadline));
            return Err(e);
        }
        log::debug!("autosave: {} bytes to {} ({})", text.len(), self.key, self.backend.name());
        Ok(true)
    }

    /// Drop the pending text without writing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("autosave: final flush of {} failed: {e}", self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn saver(backend: &Arc<MemoryStorage>) -> AutoSaver {
        AutoSaver::new(
            backend.clone(),
            &StorageScope::Problem("url-shortener".into()),
            Duration::from_millis(1000),
        )
    }

    #[test]
    fn debounce_waits_for_quiet_period() {
        let backend = Arc::new(MemoryStorage::new());
        let mut saver = saver(&backend);
        let t0 = Instant::now();

        saver.notify_at(t0, "one".into());
        saver.notify_at(t0 + Duration::from_millis(600), "two".into());
        assert!(!saver.tick_at(t0 + Duration::from_millis(1200)).unwrap());
        assert!(saver.tick_at(t0 + Duration::from_millis(1600)).unwrap());

        let key = StorageScope::Problem("url-shortener".into()).key();
        assert_eq!(backend.load(&key).unwrap().as_deref(), Some("two"));
        assert!(!saver.has_pending());
    }

    #[test]
    fn drop_flushes_pending() {
        let backend = Arc::new(MemoryStorage::new());
        {
            let mut saver = saver(&backend);
            saver.notify_at(Instant::now(), "last".into());
        }
        let key = StorageScope::Problem("url-shortener".into()).key();
        assert_eq!(backend.load(&key).unwrap().as_deref(), Some("last"));
    }

    #[test]
    fn cancel_discards_pending() {
        let backend = Arc::new(MemoryStorage::new());
        {
            let mut saver = saver(&backend);
            saver.notify_at(Instant::now(), "discarded".into());
            saver.cancel();
        }
        let key = StorageScope::Problem("url-shortener".into()).key();
        assert_eq!(backend.load(&key).unwrap(), None);
    }

    #[test]
    fn scopes_do_not_collide() {
        assert_ne!(
            StorageScope::Problem("a".into()).key(),
            StorageScope::Problem("b".into()).key()
        );
        assert_ne!(
            StorageScope::Problem("free-design".into()).key(),
            StorageScope::FreeDesign.key()
        );
    }

    #[test]
    fn file_storage_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("drafts")).unwrap();
        let key = StorageScope::Problem("chat/app".into()).key();

        assert_eq!(storage.load(&key).unwrap(), None);
        storage.save(&key, "{\"nodes\":[]}").unwrap();
        assert_eq!(storage.load(&key).unwrap().as_deref(), Some("{\"nodes\":[]}"));
        assert!(!storage.path_for(&key).with_extension("json.tmp").exists());

        storage.remove(&key).unwrap();
        storage.remove(&key).unwrap();
        assert_eq!(storage.load(&key).unwrap(), None);
    }

    #[test]
    fn similar_keys_get_separate_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path()).unwrap();
        let slash = StorageScope::Problem("chat/app".into()).key();
        let underscore = StorageScope::Problem("chat_app".into()).key();
        assert_ne!(storage.path_for(&slash), storage.path_for(&underscore));

        storage.save(&slash, "draft for chat/app").unwrap();
        assert_eq!(storage.load(&underscore).unwrap(), None);
        storage.save(&underscore, "draft for chat_app").unwrap();
        assert_eq!(
            storage.load(&slash).unwrap().as_deref(),
            Some("draft for chat/app")
        );
        assert_eq!(
            storage.path_for(&slash).file_name().and_then(|n| n.to_str()),
            Some("archcanvas%3Aproblem%3Achat%2Fapp.json")
        );
    }
}
