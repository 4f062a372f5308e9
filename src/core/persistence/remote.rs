use serde_json::Value;

use super::document_store::DocumentStore;
use super::{DocumentRef, PersistenceAdapter, SessionDocument};
use crate::error::{AnalyticsError, Result};
use crate::models::{replace_empty, Aggregate, Document};

/// Stores the global aggregate under a fixed document id and each session
/// under its session id, merging field by field.
pub struct RemoteAdapter<S: DocumentStore> {
    store: S,
    collection: String,
    document_id: String,
}

impl<S: DocumentStore> RemoteAdapter<S> {
    pub fn new(store: S, collection: &str, document_id: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            document_id: document_id.to_string(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    fn write(&self, id: &str, aggregate: &Aggregate) -> Result<()> {
        match sanitize_keys(Value::Object(aggregate.to_document()?)) {
            Value::Object(fields) => self.store.merge(&self.collection, id, &fields),
            _ => Err(AnalyticsError::MalformedData(
                "aggregate did not serialize to an object".to_string(),
            )),
        }
    }
}

impl<S: DocumentStore> PersistenceAdapter for RemoteAdapter<S> {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn load(&self, target: DocumentRef<'_>) -> Result<Option<Document>> {
        let id = match target {
            DocumentRef::Global => self.document_id.as_str(),
            DocumentRef::Session(id) if id == self.document_id => return Ok(None),
            DocumentRef::Session(id) => id,
        };
        self.store.get(&self.collection, id)
    }

    fn save(&self, global: &Aggregate, session: Option<SessionDocument<'_>>) -> Result<()> {
        self.write(&self.document_id, global)?;
        if let Some(session) = session {
            if session.id == self.document_id {
                return Err(AnalyticsError::PermissionDenied(format!(
                    "session id {:?} collides with the aggregate document",
                    session.id
                )));
            }
            self.write(session.id, session.aggregate)?;
        }
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        if session_id.trim().is_empty() {
            return Err(AnalyticsError::NotFound("empty session id".to_string()));
        }
        if session_id == self.document_id {
            return Err(AnalyticsError::PermissionDenied(format!(
                "refusing to delete the aggregate document {:?}",
                self.document_id
            )));
        }
        self.store.delete(&self.collection, session_id)
    }
}

/// Rewrites empty or blank map keys to the empty sentinel, recursively through
/// maps and arrays. When a rewritten key collides with an existing one, numeric
/// values are summed; otherwise the first value wins. Sibling keys are never
/// dropped.
pub fn sanitize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Document::new();
            for (key, inner) in map {
                let key = replace_empty(&key);
                let inner = sanitize_keys(inner);
                match out.get_mut(&key) {
                    None => {
                        out.insert(key, inner);
                    }
                    Some(existing) => {
                        if let (Some(a), Some(b)) = (existing.as_u64(), inner.as_u64()) {
                            *existing = Value::from(a.saturating_add(b));
                        }
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_keys).collect()),
        other => other,
    }
}
