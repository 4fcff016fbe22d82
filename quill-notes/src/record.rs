//! Storage and fulltext boundary contracts.
//!
//! The core never performs the actual read/write I/O; it transforms the
//! `content` bytes and the `is_protected` flag and hands records back to the
//! storage collaborator.

use crate::error::{ContentError, ContentResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Raw note-content row as the storage collaborator sees it. For protected
/// rows, `content` holds an encoded [`crate::ProtectedEnvelope`]; otherwise
/// it holds the plaintext bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content_id: String,
    pub note_id: String,
    pub is_protected: bool,
    pub content: Vec<u8>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

/// Storage collaborator for content records. Implementations own the I/O.
pub trait ContentStore: Send + Sync {
    fn get(&self, content_id: &str) -> ContentResult<Option<ContentRecord>>;
    fn put(&self, record: &ContentRecord) -> ContentResult<()>;
    fn delete(&self, content_id: &str) -> ContentResult<()>;
    /// All records with `is_protected` set, for batch re-encryption.
    fn list_protected(&self) -> ContentResult<Vec<ContentRecord>>;
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryContentStore {
    records: RwLock<HashMap<String, ContentRecord>>,
}

impl ContentStore for MemoryContentStore {
    fn get(&self, content_id: &str) -> ContentResult<Option<ContentRecord>> {
        Ok(self.records.read().unwrap().get(content_id).cloned())
    }

    fn put(&self, record: &ContentRecord) -> ContentResult<()> {
        self.records
            .write()
            .unwrap()
            .insert(record.content_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, content_id: &str) -> ContentResult<()> {
        if self.records.write().unwrap().remove(content_id).is_none() {
            return Err(ContentError::Store(format!(
                "content not found: {content_id}"
            )));
        }
        Ok(())
    }

    fn list_protected(&self) -> ContentResult<Vec<ContentRecord>> {
        Ok(self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.is_protected)
            .cloned()
            .collect())
    }
}

/// Fulltext-index collaborator. Notified after a save only when plaintext
/// was actually available; locked saves carry nothing new to index.
pub trait FulltextIndex: Send + Sync {
    fn content_changed(&self, note_id: &str);
}

/// Fulltext sink that ignores notifications.
pub struct NoopFulltext;

impl FulltextIndex for NoopFulltext {
    fn content_changed(&self, _note_id: &str) {}
}
