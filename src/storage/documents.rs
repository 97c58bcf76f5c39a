//! JSON metadata documents kept in the bucket next to the files.
//!
//! A document lives at `documents/{collection}/{id}.json`. Collections may
//! be nested (`books/{user_id}`).

use crate::error::Result;
use crate::storage::ObjectStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Document store on top of an object store.
#[derive(Clone)]
pub struct DocumentStore {
    store: Arc<dyn ObjectStore>,
}

impl DocumentStore {
    /// Wrap an object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn key(collection: &str, id: &str) -> String {
        format!("documents/{}/{}.json", collection, id)
    }

    /// Write a document, replacing any previous version.
    pub async fn set<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        self.store.put_bytes(&Self::key(collection, id), bytes).await
    }

    /// Merge top-level fields into a document, creating it if absent.
    pub async fn merge(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        let key = Self::key(collection, id);

        let mut current = match self.store.get_bytes(&key).await? {
            Some(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            None => Map::new(),
        };
        current.extend(fields);

        let bytes = serde_json::to_vec_pretty(&Value::Object(current))?;
        self.store.put_bytes(&key, bytes).await
    }

    /// Read a document.
    pub async fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        match self.store.get_bytes(&Self::key(collection, id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read every document of a collection. Unparseable documents are skipped.
    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let prefix = format!("documents/{}/", collection);
        let mut docs = Vec::new();

        for key in self.store.list(&prefix).await? {
            // Only direct children of the collection.
            let Some(name) = key.strip_prefix(&prefix) else {
                continue;
            };
            if name.contains('/') || !name.ends_with(".json") {
                continue;
            }

            let Some(bytes) = self.store.get_bytes(&key).await? else {
                continue;
            };
            match serde_json::from_slice(&bytes) {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!(%key, error = %e, "Skipping malformed document"),
            }
        }

        Ok(docs)
    }
}
