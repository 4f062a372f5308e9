use crate::error::Result;
use crate::models::Document;

/// Collection/id addressed document store with top-level merge writes.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Writes each top-level field of `fields` over the stored document,
    /// creating it when missing. Stored fields not named in `fields` are kept.
    fn merge(&self, collection: &str, id: &str, fields: &Document) -> Result<()>;

    /// Removes one document. A missing document is not an error.
    fn delete(&self, collection: &str, id: &str) -> Result<()>;
}
