use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PaintError, Result};

// ============================================================================
// SAVED WORK RECORD
// ============================================================================

/// Magic tag of the saved-work record
const SAVED_WORK_MAGIC: &str = "SKP1";

/// A painted texture persisted between sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedWork {
    magic: String,
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded surface content.
    pub png: Vec<u8>,
}

impl SavedWork {
    pub fn new(timestamp_ms: u64, width: u32, height: u32, png: Vec<u8>) -> Self {
        Self {
            magic: SAVED_WORK_MAGIC.to_string(),
            timestamp_ms,
            width,
            height,
            png,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        let work: SavedWork = bincode::deserialize(raw)?;
        if work.magic != SAVED_WORK_MAGIC {
            return Err(PaintError::InvalidFormat(format!(
                "Unknown magic '{}'",
                work.magic
            )));
        }
        if work.width == 0 || work.height == 0 {
            return Err(PaintError::InvalidFormat(
                "Saved work dimensions cannot be zero".into(),
            ));
        }
        Ok(work)
    }
}

// ============================================================================
// STORES
// ============================================================================

/// Key-value slot holding at most one saved-work record.
pub trait WorkStore {
    fn save(&mut self, data: &[u8]) -> Result<()>;
    /// `None` when nothing is stored or the slot cannot be read.
    fn load(&self) -> Option<Vec<u8>>;
    fn clear(&mut self);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }
}

impl WorkStore for MemoryStore {
    fn save(&mut self, data: &[u8]) -> Result<()> {
        self.data = Some(data.to_vec());
        Ok(())
    }

    fn load(&self) -> Option<Vec<u8>> {
        self.data.clone()
    }

    fn clear(&mut self) {
        self.data = None;
    }
}

/// Single file holding the record as base64 text.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkStore for FileStore {
    fn save(&mut self, data: &[u8]) -> Result<()> {
        std::fs::write(&self.path, STANDARD.encode(data))?;
        Ok(())
    }

    fn load(&self) -> Option<Vec<u8>> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        match STANDARD.decode(text.trim()) {
            Ok(data) => Some(data),
            Err(e) => {
                crate::log_warn!("Saved work at {} is not valid base64: {}", self.path.display(), e);
                None
            }
        }
    }

    fn clear(&mut self) {
        if self.path.exists()
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            crate::log_warn!("Failed to remove saved work {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let work = SavedWork::new(1234, 4, 2, vec![1, 2, 3]);
        let raw = work.encode().unwrap();
        assert_eq!(SavedWork::decode(&raw).unwrap(), work);
    }

    #[test]
    fn test_record_rejects_garbage() {
        assert!(SavedWork::decode(b"garbage").is_err());
        let mut bad = SavedWork::new(0, 4, 4, Vec::new());
        bad.magic = "XXXX".to_string();
        assert!(matches!(
            SavedWork::decode(&bad.encode().unwrap()),
            Err(PaintError::InvalidFormat(_))
        ));
        let empty = SavedWork::new(0, 0, 4, Vec::new());
        assert!(SavedWork::decode(&empty.encode().unwrap()).is_err());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.load().is_none());
        store.save(b"abc").unwrap();
        assert_eq!(store.load().as_deref(), Some(&b"abc"[..]));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("work.b64"));
        assert!(store.load().is_none());

        store.save(&[0, 159, 146, 150, 255]).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "AJ+Slv8=");
        assert_eq!(store.load(), Some(vec![0, 159, 146, 150, 255]));

        store.clear();
        assert!(!store.path().exists());
        store.clear();
    }

    #[test]
    fn test_file_store_corrupt_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("work.b64");
        std::fs::write(&path, "@@not base64@@").unwrap();
        assert!(FileStore::new(path).load().is_none());
    }
}
