//! In-memory [`DocumentStore`] used by the dev server and the test
//! suites. Write versions are real here, so optimistic preconditions
//! behave the way they do against the hosted database.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Map, Value};

use super::{
    CollectionPath, DocPath, Document, DocumentStore, FieldOp, Precondition, StoreError,
    WriteBatch, WriteOp,
};
use async_trait::async_trait;

#[derive(Debug, Clone)]
struct StoredDoc {
    version: u64,
    data: Value,
}

#[derive(Debug, Default)]
struct State {
    docs: BTreeMap<String, StoredDoc>,
    next_id: u64,
    clock: u64,
}

/// Mutex-guarded document map keyed by full path. Ids are monotonic so
/// listings and pagination stay deterministic in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("state mutex poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let state = self.locked()?;
        Ok(state.docs.get(&path.to_string()).map(|doc| Document {
            path: path.clone(),
            version: doc.version,
            data: doc.data.clone(),
        }))
    }

    async fn allocate_id(&self, _collection: &CollectionPath) -> Result<String, StoreError> {
        let mut state = self.locked()?;
        state.next_id += 1;
        Ok(format!("{:06}", state.next_id))
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let state = self.locked()?;
        let prefix = format!("{collection}/");
        let mut documents = Vec::new();
        for (key, doc) in state.docs.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            if rest.contains('/') {
                continue;
            }
            documents.push(Document {
                path: collection.doc(rest),
                version: doc.version,
                data: doc.data.clone(),
            });
        }
        Ok(documents)
    }

    async fn list_group(&self, leaf: &str) -> Result<Vec<Document>, StoreError> {
        let state = self.locked()?;
        let mut documents = Vec::new();
        for (key, doc) in state.docs.iter() {
            let segments: Vec<&str> = key.split('/').collect();
            // document keys have an even segment count; the collection
            // name sits just before the document id
            if segments.len() < 2 || segments.len() % 2 != 0 {
                continue;
            }
            if segments[segments.len() - 2] != leaf {
                continue;
            }
            let collection = CollectionPath::new(segments[..segments.len() - 1].join("/"));
            documents.push(Document {
                path: collection.doc(segments[segments.len() - 1]),
                version: doc.version,
                data: doc.data.clone(),
            });
        }
        Ok(documents)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.locked()?;
        let ops = batch.into_ops();

        // validate every guard before touching anything so a failed
        // precondition leaves the whole batch unapplied
        for op in &ops {
            if let WriteOp::Update { path, guard, .. } = op {
                match state.docs.get(&path.to_string()) {
                    None => return Err(StoreError::NotFound(path.to_string())),
                    Some(doc) => {
                        if let Precondition::Version(expected) = guard {
                            if doc.version != *expected {
                                return Err(StoreError::Conflict(path.to_string()));
                            }
                        }
                    }
                }
            }
        }

        for op in ops {
            state.clock += 1;
            let version = state.clock;
            match op {
                WriteOp::Set { path, data } => {
                    state.docs.insert(path.to_string(), StoredDoc { version, data });
                }
                WriteOp::Update { path, patch, .. } => {
                    let key = path.to_string();
                    if let Some(doc) = state.docs.get_mut(&key) {
                        if !doc.data.is_object() {
                            doc.data = Value::Object(Map::new());
                        }
                        if let Value::Object(fields) = &mut doc.data {
                            for (field, op) in patch.fields() {
                                apply_field(fields, field, op);
                            }
                        }
                        doc.version = version;
                    }
                }
                WriteOp::Delete { path } => {
                    state.docs.remove(&path.to_string());
                }
            }
        }
        Ok(())
    }
}

fn apply_field(fields: &mut Map<String, Value>, path: &str, op: &FieldOp) {
    let Some((head, rest)) = path.split_once('.') else {
        apply_terminal(fields, path, op);
        return;
    };
    // removals never materialize intermediate maps
    if matches!(op, FieldOp::Remove) {
        if let Some(Value::Object(inner)) = fields.get_mut(head) {
            apply_field(inner, rest, op);
        }
        return;
    }
    let entry = fields
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(inner) = entry {
        apply_field(inner, rest, op);
    }
}

fn apply_terminal(fields: &mut Map<String, Value>, field: &str, op: &FieldOp) {
    match op {
        FieldOp::Set(value) => {
            fields.insert(field.to_string(), value.clone());
        }
        FieldOp::Remove => {
            fields.remove(field);
        }
        FieldOp::ArrayUnion(values) => {
            let entry = fields
                .entry(field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(items) = entry {
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
        }
        FieldOp::ArrayRemove(values) => {
            if let Some(Value::Array(items)) = fields.get_mut(field) {
                items.retain(|item| !values.contains(item));
            }
        }
    }
}
