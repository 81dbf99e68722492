//! An in-memory [`ObjectStore`] implementation: a faithful reference
//! backend for tests and for embedders without a cloud object store handy.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tessera_core::StoreError;

use crate::object_store::{GetResult, ListedObject, ObjectStore, PutOptions, PutResult};
use crate::tag_filter::TagFilter;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    etag: String,
    tags: BTreeMap<String, String>,
}

/// An in-process, non-persistent [`ObjectStore`]. Containers and their
/// objects are held in a `BTreeMap` so [`ObjectStore::list`] iterates in a
/// stable, lexicographic "natural order" matching what a real listing API
/// guarantees.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    containers: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    etag_counter: AtomicU64,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_etag(&self) -> String {
        let n = self.etag_counter.fetch_add(1, Ordering::SeqCst);
        format!("etag-{n:020}")
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn ensure_container(&self, container: &str) -> Result<(), StoreError> {
        self.containers
            .write()
            .unwrap()
            .entry(container.to_string())
            .or_default();
        Ok(())
    }

    async fn put(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<PutResult, StoreError> {
        let mut containers = self.containers.write().unwrap();
        let objects = containers.entry(container.to_string()).or_default();
        let existing = objects.get(name);

        if options.if_none_match && existing.is_some() {
            return Err(StoreError::PreconditionFailed {
                container: container.to_string(),
                name: name.to_string(),
            });
        }
        if let Some(expected) = &options.if_match {
            match existing {
                Some(obj) if &obj.etag == expected => {}
                _ => {
                    return Err(StoreError::PreconditionFailed {
                        container: container.to_string(),
                        name: name.to_string(),
                    })
                }
            }
        }

        let etag = self.next_etag();
        objects.insert(
            name.to_string(),
            StoredObject {
                bytes,
                etag: etag.clone(),
                tags: options.tags,
            },
        );
        Ok(PutResult { etag })
    }

    async fn get(&self, container: &str, name: &str) -> Result<GetResult, StoreError> {
        let containers = self.containers.read().unwrap();
        let object = containers
            .get(container)
            .and_then(|objects| objects.get(name))
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            })?;
        Ok(GetResult {
            bytes: object.bytes.clone(),
            etag: object.etag.clone(),
        })
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError> {
        let containers = self.containers.read().unwrap();
        Ok(containers
            .get(container)
            .is_some_and(|objects| objects.contains_key(name)))
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StoreError> {
        if let Some(objects) = self.containers.write().unwrap().get_mut(container) {
            objects.remove(name);
        }
        Ok(())
    }

    async fn list(
        &self,
        container: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ListedObject>, StoreError> {
        let containers = self.containers.read().unwrap();
        let Some(objects) = containers.get(container) else {
            return Ok(Vec::new());
        };
        Ok(objects
            .keys()
            .filter(|name| match prefix {
                Some(p) => name.starts_with(p),
                None => true,
            })
            .map(|name| ListedObject {
                name: name.clone(),
            })
            .collect())
    }

    async fn find_by_tags(
        &self,
        container: &str,
        expr: &TagFilter,
    ) -> Result<Vec<ListedObject>, StoreError> {
        let containers = self.containers.read().unwrap();
        let Some(objects) = containers.get(container) else {
            return Ok(Vec::new());
        };
        Ok(objects
            .iter()
            .filter(|(_, obj)| expr.matches(&obj.tags))
            .map(|(name, _)| ListedObject {
                name: name.clone(),
            })
            .collect())
    }

    async fn drop_container(&self, container: &str) -> Result<(), StoreError> {
        self.containers.write().unwrap().remove(container);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_filter::{TagAtom, TagOp};

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn put_then_get_round_trips_bytes_and_tags() {
        let store = InMemoryObjectStore::new();
        store.ensure_container("users").await.unwrap();
        store
            .put("users", "1", b"hello".to_vec(), PutOptions::new())
            .await
            .unwrap();
        let got = store.get("users", "1").await.unwrap();
        assert_eq!(got.bytes, b"hello");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get("users", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn if_none_match_rejects_existing_object() {
        let store = InMemoryObjectStore::new();
        store
            .put("c", "1", b"a".to_vec(), PutOptions::new().if_none_match())
            .await
            .unwrap();
        let err = store
            .put("c", "1", b"b".to_vec(), PutOptions::new().if_none_match())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn if_match_rejects_stale_etag() {
        let store = InMemoryObjectStore::new();
        let r1 = store
            .put("c", "1", b"a".to_vec(), PutOptions::new())
            .await
            .unwrap();
        // A second write with the correct etag succeeds and rotates it.
        let r2 = store
            .put("c", "1", b"b".to_vec(), PutOptions::new().if_match(r1.etag.clone()))
            .await
            .unwrap();
        assert_ne!(r1.etag, r2.etag);
        // A write with the now-stale etag fails.
        let err = store
            .put("c", "1", b"c".to_vec(), PutOptions::new().if_match(r1.etag))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryObjectStore::new();
        store.delete("c", "missing").await.unwrap();
        store
            .put("c", "1", b"a".to_vec(), PutOptions::new())
            .await
            .unwrap();
        store.delete("c", "1").await.unwrap();
        store.delete("c", "1").await.unwrap();
        assert!(!store.exists("c", "1").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_lexicographically_ordered() {
        let store = InMemoryObjectStore::new();
        for name in ["c", "a", "b"] {
            store
                .put("coll", name, Vec::new(), PutOptions::new())
                .await
                .unwrap();
        }
        let names: Vec<String> = store
            .list("coll", None)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn find_by_tags_filters_on_exact_match() {
        let store = InMemoryObjectStore::new();
        store
            .put(
                "coll",
                "1",
                Vec::new(),
                PutOptions::new().with_tags(tags(&[("city", "NYC")])),
            )
            .await
            .unwrap();
        store
            .put(
                "coll",
                "2",
                Vec::new(),
                PutOptions::new().with_tags(tags(&[("city", "LA")])),
            )
            .await
            .unwrap();
        let mut filter = TagFilter::new();
        filter.push(TagAtom::Compare {
            field: "city".to_string(),
            op: TagOp::Eq,
            value: "NYC".to_string(),
        });
        let hits = store.find_by_tags("coll", &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "1");
    }

    #[tokio::test]
    async fn drop_container_removes_all_objects() {
        let store = InMemoryObjectStore::new();
        store
            .put("coll", "1", Vec::new(), PutOptions::new())
            .await
            .unwrap();
        store.drop_container("coll").await.unwrap();
        assert!(store.list("coll", None).await.unwrap().is_empty());
    }
}
