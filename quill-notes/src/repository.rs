//! Load/save orchestration over the storage and fulltext collaborators.

use crate::content::NoteContent;
use crate::error::ContentResult;
use crate::record::{ContentStore, FulltextIndex};
use quill_session::SessionKeyStore;
use std::sync::Arc;
use tracing::debug;

/// Repository for protected note content. Owns no I/O itself; the store and
/// fulltext index are injected collaborators.
pub struct ContentRepository {
    store: Arc<dyn ContentStore>,
    session: Arc<SessionKeyStore>,
    fulltext: Arc<dyn FulltextIndex>,
}

impl ContentRepository {
    pub fn new(
        store: Arc<dyn ContentStore>,
        session: Arc<SessionKeyStore>,
        fulltext: Arc<dyn FulltextIndex>,
    ) -> Self {
        Self {
            store,
            session,
            fulltext,
        }
    }

    /// Loads content by id. A protected record loads even when the session
    /// is locked; reads on the result then fail with a typed error.
    pub fn load(&self, content_id: &str) -> ContentResult<Option<NoteContent>> {
        Ok(self
            .store
            .get(content_id)?
            .map(|record| NoteContent::from_record(record, &self.session)))
    }

    /// Saves content and, when plaintext was available, notifies the
    /// fulltext index. Locked saves persist ciphertext verbatim and are not
    /// re-indexed - there is nothing new to index.
    pub fn save(&self, content: &mut NoteContent) -> ContentResult<()> {
        let record = content.to_record(&self.session)?;
        self.store.put(&record)?;
        content.mark_saved(record.date_modified);

        if content.is_content_available() {
            debug!(note_id = %content.note_id(), "fulltext reindex triggered");
            self.fulltext.content_changed(content.note_id());
        }
        Ok(())
    }

    /// Deletes the record outright. Works regardless of session state; a
    /// delete needs no access to the plaintext.
    pub fn delete(&self, content_id: &str) -> ContentResult<()> {
        self.store.delete(content_id)
    }
}
