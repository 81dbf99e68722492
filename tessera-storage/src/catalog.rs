//! Owns the lifecycle of a collection's `__collection_indexes` metadata
//! blob under optimistic concurrency, with a per-collection in-process
//! cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tessera_core::{EngineError, EngineResult, IndexDefinition, RetryConfig};
use tracing::debug;

use crate::object_store::{ObjectStore, PutOptions};

/// Well-known blob name for a collection's index metadata.
pub const CATALOG_BLOB_NAME: &str = "__collection_indexes";

/// Owns the index catalog for every collection the engine has touched.
/// Cheaply cloneable: the cache lives behind an `Arc`.
pub struct IndexCatalog {
    store: Arc<dyn ObjectStore>,
    cache: RwLock<HashMap<String, IndexDefinition>>,
}

impl IndexCatalog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load a collection's catalog, preferring the in-process cache.
    /// Readers tolerate a stale cached catalog for up to one inconsistent
    /// tag computation.
    pub async fn load_catalog(&self, collection: &str) -> EngineResult<IndexDefinition> {
        if let Some(cached) = self.cache.read().unwrap().get(collection) {
            return Ok(cached.clone());
        }
        self.load_catalog_fresh(collection).await
    }

    /// Load a collection's catalog directly from the store, bypassing and
    /// then repopulating the cache. Used before every catalog mutation and
    /// after a CAS conflict.
    pub async fn load_catalog_fresh(&self, collection: &str) -> EngineResult<IndexDefinition> {
        let catalog = match self.store.get(collection, CATALOG_BLOB_NAME).await {
            Ok(got) => {
                let mut parsed: IndexDefinition = serde_json::from_slice(&got.bytes)
                    .map_err(|e| EngineError::validation(format!("corrupt catalog blob: {e}")))?;
                parsed.etag = Some(got.etag);
                parsed
            }
            Err(tessera_core::StoreError::NotFound { .. }) => IndexDefinition::default(),
            Err(other) => return Err(other.into()),
        };
        self.cache
            .write()
            .unwrap()
            .insert(collection.to_string(), catalog.clone());
        Ok(catalog)
    }

    /// Persist a catalog with `If-Match`/`If-None-Match` CAS semantics.
    /// On precondition failure, refreshes the
    /// cache and returns `CatalogError::Conflict` wrapped in
    /// [`EngineError`]. Callers that want retry behavior should use
    /// [`Self::create_index`] instead of calling this directly.
    pub async fn save_catalog(
        &self,
        collection: &str,
        catalog: &IndexDefinition,
    ) -> EngineResult<IndexDefinition> {
        let bytes = serde_json::to_vec(catalog)
            .map_err(|e| EngineError::validation(format!("cannot serialize catalog: {e}")))?;

        let mut options = PutOptions::new();
        match &catalog.etag {
            Some(etag) => options = options.if_match(etag.clone()),
            None => options = options.if_none_match(),
        }

        match self
            .store
            .put(collection, CATALOG_BLOB_NAME, bytes, options)
            .await
        {
            Ok(result) => {
                let mut saved = catalog.clone();
                saved.etag = Some(result.etag);
                self.cache
                    .write()
                    .unwrap()
                    .insert(collection.to_string(), saved.clone());
                Ok(saved)
            }
            Err(tessera_core::StoreError::PreconditionFailed { .. }) => {
                self.load_catalog_fresh(collection).await?;
                Err(EngineError::conflict(collection, 1))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// `createIndex(collection, fields, { unique, hashed })` with
    /// CAS-conflict retry.
    ///
    /// The tag-cap check (`|indexedFields| <= max_indexed_fields`) fails
    /// immediately and is never retried; a `Conflict` from a losing CAS
    /// race is retried up to `retry.max_retries` times with exponential
    /// backoff, reapplying the same idempotent mutation against a freshly
    /// reloaded catalog each attempt.
    pub async fn create_index(
        &self,
        collection: &str,
        fields: &[String],
        unique: bool,
        hashed: bool,
        max_indexed_fields: usize,
        retry: &RetryConfig,
    ) -> EngineResult<IndexDefinition> {
        let mut attempt = 0u32;
        loop {
            let mut catalog = self.load_catalog_fresh(collection).await?;
            catalog.apply_create_index(fields, unique, hashed);
            catalog
                .check_invariants(max_indexed_fields)
                .map_err(|e| match e {
                    tessera_core::CatalogInvariantError::TagCapExceeded { limit, .. } => {
                        EngineError::Catalog(tessera_core::CatalogError::TagCapExceeded {
                            collection: collection.to_string(),
                            limit,
                        })
                    }
                    other => EngineError::validation(other.to_string()),
                })?;

            match self.save_catalog(collection, &catalog).await {
                Ok(saved) => return Ok(saved),
                Err(EngineError::Catalog(tessera_core::CatalogError::Conflict { .. })) => {
                    if attempt >= retry.max_retries {
                        return Err(EngineError::conflict(collection, attempt + 1));
                    }
                    let backoff = retry.backoff_for_attempt(attempt);
                    debug!(collection, attempt, ?backoff, "catalog CAS conflict, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Drop the cached catalog entry for a collection, evicted on
    /// `dropCollection`.
    pub fn evict(&self, collection: &str) {
        self.cache.write().unwrap().remove(collection);
    }
}
