//! The abstract blob-store substrate contract.
//!
//! `ObjectStore` is the only seam between the engine and a concrete cloud
//! object-store SDK. Binding to a concrete SDK is out of scope for this
//! crate; it ships [`crate::memory::InMemoryObjectStore`] as a faithful
//! reference implementation, used both by tests and by embedders who want
//! a zero-dependency starting point.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tessera_core::StoreError;

use crate::tag_filter::TagFilter;

/// Preconditions and server-side tags for a [`ObjectStore::put`] call.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Blob tags to attach, server-side indexed and searchable via
    /// [`ObjectStore::find_by_tags`].
    pub tags: BTreeMap<String, String>,
    /// `If-Match: <etag>`, succeed only if the current entity tag matches.
    pub if_match: Option<String>,
    /// `If-None-Match: *`, succeed only if no object exists under this name.
    pub if_none_match: bool,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    pub fn if_none_match(mut self) -> Self {
        self.if_none_match = true;
        self
    }
}

/// Result of a successful [`ObjectStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub etag: String,
}

/// Result of a successful [`ObjectStore::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResult {
    pub bytes: Vec<u8>,
    pub etag: String,
}

/// One hit from [`ObjectStore::list`] or [`ObjectStore::find_by_tags`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListedObject {
    pub name: String,
}

/// The abstract object-store substrate.
///
/// Every method is a suspension point. Implementations must be `Send + Sync` so an
/// `Arc<dyn ObjectStore>` can be shared across concurrent callers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Idempotent container creation.
    async fn ensure_container(&self, container: &str) -> Result<(), StoreError>;

    /// Write an object, honoring `options.if_match`/`options.if_none_match`
    /// as a compare-and-swap precondition. Returns
    /// [`StoreError::PreconditionFailed`] if the precondition is not met.
    async fn put(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<PutResult, StoreError>;

    /// Fetch an object's bytes and current entity tag. Returns
    /// [`StoreError::NotFound`] if absent.
    async fn get(&self, container: &str, name: &str) -> Result<GetResult, StoreError>;

    /// Whether an object exists, without fetching its bytes.
    async fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError>;

    /// Idempotent delete: succeeds (and is a no-op) if the object is absent.
    async fn delete(&self, container: &str, name: &str) -> Result<(), StoreError>;

    /// List object names in a container, optionally restricted to a name
    /// prefix, in the store's natural (implementation-defined but stable)
    /// order. Includes every non-system blob; callers are responsible for
    /// skipping `__`-prefixed system names.
    async fn list(
        &self,
        container: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ListedObject>, StoreError>;

    /// Server-side tag search: return the names of every object in
    /// `container` whose tags satisfy the conjunctive `expr`.
    async fn find_by_tags(
        &self,
        container: &str,
        expr: &TagFilter,
    ) -> Result<Vec<ListedObject>, StoreError>;

    /// Destroy a container and everything in it.
    async fn drop_container(&self, container: &str) -> Result<(), StoreError>;
}
