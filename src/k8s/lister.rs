//! Uniform read API over the indexer.
//!
//! The [`Lister`] trait is the seam between the graph pipeline and the
//! cluster: the production implementation reads the indexer's watch
//! caches, and tests substitute an in-memory fixture. Both scopes of the
//! façade are expressed through the `namespace` argument: `None` reads
//! cluster-wide, `Some(ns)` reads one namespace.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::api::DynamicObject;
use kube::ResourceExt;

use crate::errors::{LookupError, LookupResult};

use super::coords::KindRef;
use super::indexer::ResourceIndexer;

/// A label predicate over `labels: string→string` mappings. The empty
/// selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    /// The selector that matches all objects.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every selector pair is present in `labels`.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl FromIterator<(String, String)> for LabelSelector {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Read access to indexed objects by kind coordinate. Returned objects are
/// detached copies; callers may mutate them freely.
pub trait Lister: Send + Sync {
    /// List objects of a kind, cluster-wide (`namespace = None`) or within
    /// one namespace, filtered by a label selector.
    fn list(
        &self,
        kind: &KindRef,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> LookupResult<Vec<DynamicObject>>;

    /// Retrieve a single object by name.
    fn get(&self, kind: &KindRef, namespace: Option<&str>, name: &str)
        -> LookupResult<DynamicObject>;
}

/// The production lister, backed by the indexer's watch caches.
#[derive(Clone)]
pub struct IndexLister {
    indexer: Arc<ResourceIndexer>,
}

impl IndexLister {
    pub fn new(indexer: Arc<ResourceIndexer>) -> Self {
        Self { indexer }
    }
}

impl Lister for IndexLister {
    fn list(
        &self,
        kind: &KindRef,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> LookupResult<Vec<DynamicObject>> {
        let cache = self.indexer.cache_for(kind)?;
        if !cache.is_synced() {
            return Err(LookupError::CacheNotSynced {
                kind: kind.to_string(),
            });
        }

        let objects = match namespace {
            Some(ns) => cache.list_namespaced(ns),
            None => cache.list_all(),
        };

        if selector.is_empty() {
            return Ok(objects);
        }
        Ok(objects
            .into_iter()
            .filter(|obj| selector.matches(obj.labels()))
            .collect())
    }

    fn get(
        &self,
        kind: &KindRef,
        namespace: Option<&str>,
        name: &str,
    ) -> LookupResult<DynamicObject> {
        let cache = self.indexer.cache_for(kind)?;
        if !cache.is_synced() {
            return Err(LookupError::CacheNotSynced {
                kind: kind.to_string(),
            });
        }

        cache.get(namespace.unwrap_or_default(), name).ok_or_else(|| {
            LookupError::not_found(
                kind.to_string(),
                name,
                namespace.map(|ns| ns.to_string()),
            )
        })
    }
}
