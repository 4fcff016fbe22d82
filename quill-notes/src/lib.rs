//! Protected note content for Quill.
//!
//! The entity layer over the session core: content marked protected is
//! encrypted at rest and transparently decrypted while an unlocked session
//! is active. While locked, a protected entity still loads - ciphertext is
//! retained verbatim so metadata-only edits can be saved without corrupting
//! or losing content - and reads fail with typed, recoverable errors.

mod content;
mod envelope;
mod error;
mod record;
mod repository;
pub mod rekey;

pub use content::NoteContent;
pub use envelope::ProtectedEnvelope;
pub use error::{ContentError, ContentResult};
pub use record::{ContentRecord, ContentStore, FulltextIndex, MemoryContentStore, NoopFulltext};
pub use repository::ContentRepository;
pub use rekey::RekeyOutcome;
