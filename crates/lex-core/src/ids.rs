//! ID generation and formatting helpers.
//!
//! Documents, reforms, sessions, and correlation IDs are all UUID v4 strings.
//! Chunk IDs derive from their document: `{document_id}-chunk-{index:04}`.

use uuid::Uuid;

/// New opaque document ID.
#[must_use]
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// New opaque reform ID.
#[must_use]
pub fn new_reform_id() -> String {
    Uuid::new_v4().to_string()
}

/// New correlation ID, attached at command creation and propagated through
/// every derived event and error.
#[must_use]
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// New session ID for a scraping run.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deterministic chunk ID: `{document_id}-chunk-{index:04}`.
#[must_use]
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{document_id}-chunk-{index:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_zero_padded() {
        assert_eq!(chunk_id("doc", 0), "doc-chunk-0000");
        assert_eq!(chunk_id("doc", 42), "doc-chunk-0042");
        assert_eq!(chunk_id("doc", 12345), "doc-chunk-12345");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_document_id(), new_document_id());
        assert_ne!(new_correlation_id(), new_correlation_id());
    }

    #[test]
    fn generated_ids_are_uuid_shaped() {
        let id = new_session_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }
}
