//! The top-level `Engine` facade: wires the index catalog, planner/executor,
//! and write path together behind the public operations a caller of the
//! tag-indexed document store sees.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use serde_json::Map;
use tessera_core::{
    CollectionName, Document, DocumentId, EngineConfig, EngineResult, IdProvider, ParsedQuery,
    UuidV7IdProvider,
};
use tessera_storage::{IndexCatalog, ObjectStore};

use crate::executor;
use crate::planner::ExecutionMode;
use crate::write;

/// `createIndex` options. `hashed` declares at index-creation time that a
/// unique field's tag should be materialized as its SHA-256 hash rather
/// than the reversible escape.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateIndexOptions {
    pub unique: bool,
    pub hashed: bool,
}

/// `find` pagination options.
#[derive(Debug, Clone, Copy)]
pub struct FindOptions {
    pub offset: usize,
    pub limit: usize,
}

impl FindOptions {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

/// A single Tessera engine instance bound to one [`ObjectStore`].
///
/// Cheaply cloneable: every field is either an `Arc` or behind one.
pub struct Engine {
    store: Arc<dyn ObjectStore>,
    catalog: IndexCatalog,
    config: EngineConfig,
    id_provider: Arc<dyn IdProvider>,
    /// `listCollections` is not part of the abstract object-store contract,
    /// which names no "list containers" operation, so the engine keeps its
    /// own in-process registry of every collection it has touched (see
    /// DESIGN.md for this decision's rationale).
    known_collections: RwLock<BTreeSet<String>>,
}

impl Engine {
    /// Build an engine over `store` with the default UUIDv7 id provider.
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self::with_id_provider(store, config, Arc::new(UuidV7IdProvider))
    }

    /// Build an engine with a caller-supplied [`IdProvider`], for embedders
    /// with their own monotonic id service.
    pub fn with_id_provider(
        store: Arc<dyn ObjectStore>,
        config: EngineConfig,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        let catalog = IndexCatalog::new(store.clone());
        Self {
            store,
            catalog,
            config,
            id_provider,
            known_collections: RwLock::new(BTreeSet::new()),
        }
    }

    async fn register_collection(&self, collection: &str) -> EngineResult<String> {
        let container = CollectionName::sanitize(collection).as_str().to_string();
        self.store.ensure_container(&container).await?;
        self.known_collections
            .write()
            .unwrap()
            .insert(container.clone());
        Ok(container)
    }

    /// `createIndex(collection, fields, { unique, hashed })`.
    ///
    /// `collection` is sanitized into a container identifier before use;
    /// callers may pass either the raw or already-sanitized form.
    pub async fn create_index(
        &self,
        collection: &str,
        fields: &[String],
        options: CreateIndexOptions,
    ) -> EngineResult<()> {
        let container = self.register_collection(collection).await?;
        self.catalog
            .create_index(
                &container,
                fields,
                options.unique,
                options.hashed,
                self.config.max_indexed_fields,
                &self.config.catalog_retry,
            )
            .await?;
        Ok(())
    }

    /// `create(collection, data)`: mints a fresh id via this engine's
    /// [`IdProvider`].
    pub async fn create(&self, collection: &str, data: Map<String, serde_json::Value>) -> EngineResult<Document> {
        self.create_with_id(collection, self.id_provider.next_id(), data).await
    }

    /// `create(collection, data, id)` with a caller-supplied id.
    pub async fn create_with_id(
        &self,
        collection: &str,
        id: DocumentId,
        data: Map<String, serde_json::Value>,
    ) -> EngineResult<Document> {
        let container = self.register_collection(collection).await?;
        write::create(self.store.as_ref(), &self.catalog, &container, id, data).await
    }

    /// `read(collection, id)`.
    pub async fn read(&self, collection: &str, id: &str) -> EngineResult<Document> {
        let container = CollectionName::sanitize(collection);
        let got = self.store.get(container.as_str(), id).await.map_err(|e| match e {
            tessera_core::StoreError::NotFound { .. } => {
                tessera_core::EngineError::not_found(container.as_str(), id)
            }
            other => other.into(),
        })?;
        let fields: Map<String, serde_json::Value> = serde_json::from_slice(&got.bytes)
            .map_err(|e| tessera_core::EngineError::validation(format!("corrupt document blob: {e}")))?;
        Ok(Document::new(DocumentId::from_raw(id), fields))
    }

    /// `update(collection, id, data)`: full replacement.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, serde_json::Value>,
    ) -> EngineResult<Document> {
        let container = CollectionName::sanitize(collection);
        write::update(self.store.as_ref(), &self.catalog, container.as_str(), id, data).await
    }

    /// `delete(collection, id)`: idempotent.
    pub async fn delete(&self, collection: &str, id: &str) -> EngineResult<()> {
        let container = CollectionName::sanitize(collection);
        write::delete(self.store.as_ref(), container.as_str(), id).await
    }

    /// `find(collection, query, options)`.
    pub async fn find(
        &self,
        collection: &str,
        query: &ParsedQuery,
        options: FindOptions,
    ) -> EngineResult<(Vec<Document>, ExecutionMode)> {
        let container = CollectionName::sanitize(collection);
        let catalog = self.catalog.load_catalog(container.as_str()).await?;
        executor::find(
            self.store.as_ref(),
            container.as_str(),
            &catalog,
            query,
            options.offset,
            options.limit,
        )
        .await
    }

    /// `find` using the engine's configured default page size, for the
    /// omitted-`limit` case.
    pub async fn find_default_page(
        &self,
        collection: &str,
        query: &ParsedQuery,
    ) -> EngineResult<(Vec<Document>, ExecutionMode)> {
        self.find(collection, query, FindOptions::new(0, self.config.default_page_limit))
            .await
    }

    /// `count(collection, query)`.
    pub async fn count(&self, collection: &str, query: &ParsedQuery) -> EngineResult<usize> {
        let container = CollectionName::sanitize(collection);
        let catalog = self.catalog.load_catalog(container.as_str()).await?;
        executor::count(self.store.as_ref(), container.as_str(), &catalog, query).await
    }

    /// `dropCollection(collection)`: destroys the container and evicts the
    /// cached catalog and registry entry.
    pub async fn drop_collection(&self, collection: &str) -> EngineResult<()> {
        let container = CollectionName::sanitize(collection);
        self.store.drop_container(container.as_str()).await?;
        self.catalog.evict(container.as_str());
        self.known_collections.write().unwrap().remove(container.as_str());
        Ok(())
    }

    /// `listCollections()`: every collection this engine instance has
    /// created, written to, or indexed since it was constructed (see
    /// DESIGN.md for this decision's rationale).
    pub fn list_collections(&self) -> Vec<String> {
        self.known_collections.read().unwrap().iter().cloned().collect()
    }
}
