//! Discovery-driven resource indexer.
//!
//! At bootstrap the indexer queries server-preferred resources once, admits
//! every namespaced resource that supports `list` and `watch` and is not
//! banned, opens one watched cache per admitted resource, and maintains the
//! kind↔resource mapping. Initialization blocks until every cache has
//! completed its initial list; a cache that never syncs is fatal.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::StreamExt;
use kube::api::{Api, DynamicObject};
use kube::{Client, ResourceExt};
use kube_runtime::watcher;
use kube_runtime::watcher::Event;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::errors::{IndexError, IndexResult, LookupError, LookupResult};

use super::client::{is_watchable, ClusterClient, DiscoveredResource};
use super::coords::{KindRef, ResourceRef, CUSTOM_RESOURCE_DEFINITION_RESOURCE};
use super::lister::{IndexLister, Lister};

/// Watch requests are re-established on this interval, refreshing the
/// cache contents from a full re-list.
const WATCH_TIMEOUT_SECS: u32 = 180;

/// Backoff applied after a watch stream error before polling again.
const WATCH_ERROR_BACKOFF: Duration = Duration::from_secs(5);

type CacheKey = (String, String);
type CacheMap = BTreeMap<CacheKey, DynamicObject>;

/// One watched cache: the objects of a single resource coordinate, keyed
/// by `(namespace, name)` so namespaced reads are range scans.
pub(crate) struct WatchCache {
    objects: Arc<RwLock<CacheMap>>,
    synced: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl WatchCache {
    fn spawn(client: Client, record: &DiscoveredResource) -> Self {
        let api: Api<DynamicObject> = Api::all_with(client, &record.api_resource());
        let objects: Arc<RwLock<CacheMap>> = Arc::new(RwLock::new(BTreeMap::new()));
        let synced = Arc::new(AtomicBool::new(false));

        let resource = record.resource_ref().to_string();
        let cache = Arc::clone(&objects);
        let synced_flag = Arc::clone(&synced);

        let handle = tokio::spawn(async move {
            let config = watcher::Config::default()
                .timeout(WATCH_TIMEOUT_SECS)
                .any_semantic();
            let mut stream = watcher(api, config).boxed();

            // Initial list events are staged and swapped in atomically on
            // InitDone so readers never observe a half-filled relist.
            let mut staging: CacheMap = BTreeMap::new();

            while let Some(event) = stream.next().await {
                match event {
                    Ok(Event::Init) => staging.clear(),
                    Ok(Event::InitApply(obj)) => {
                        staging.insert(cache_key(&obj), obj);
                    }
                    Ok(Event::InitDone) => {
                        let mut map = cache.write().unwrap_or_else(PoisonError::into_inner);
                        *map = std::mem::take(&mut staging);
                        drop(map);
                        synced_flag.store(true, Ordering::Release);
                        debug!(%resource, "cache synced");
                    }
                    Ok(Event::Apply(obj)) => {
                        let mut map = cache.write().unwrap_or_else(PoisonError::into_inner);
                        map.insert(cache_key(&obj), obj);
                    }
                    Ok(Event::Delete(obj)) => {
                        let mut map = cache.write().unwrap_or_else(PoisonError::into_inner);
                        map.remove(&cache_key(&obj));
                    }
                    Err(err) => {
                        warn!(%resource, "watch error: {err}");
                        tokio::time::sleep(WATCH_ERROR_BACKOFF).await;
                    }
                }
            }
        });

        Self {
            objects,
            synced,
            handle,
        }
    }

    pub(crate) fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    async fn wait_synced(&self) {
        while !self.is_synced() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Objects in one namespace, in name order.
    pub(crate) fn list_namespaced(&self, namespace: &str) -> Vec<DynamicObject> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        map.range((namespace.to_string(), String::new())..)
            .take_while(|((ns, _), _)| ns == namespace)
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// All objects across namespaces, in `(namespace, name)` order.
    pub(crate) fn list_all(&self) -> Vec<DynamicObject> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        map.values().cloned().collect()
    }

    pub(crate) fn get(&self, namespace: &str, name: &str) -> Option<DynamicObject> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&(namespace.to_string(), name.to_string())).cloned()
    }

    #[cfg(test)]
    pub(crate) fn fixture(objects: Vec<DynamicObject>) -> Self {
        let map = objects.into_iter().map(|o| (cache_key(&o), o)).collect();
        Self {
            objects: Arc::new(RwLock::new(map)),
            synced: Arc::new(AtomicBool::new(true)),
            handle: tokio::spawn(async {}),
        }
    }
}

fn cache_key(object: &DynamicObject) -> CacheKey {
    (object.namespace().unwrap_or_default(), object.name_any())
}

/// Manager for the per-resource watch caches and the kind↔resource
/// mapping. Created once at process start and shared read-only.
pub struct ResourceIndexer {
    mapping: HashMap<KindRef, ResourceRef>,
    caches: HashMap<ResourceRef, WatchCache>,
}

impl ResourceIndexer {
    /// Discover, admit, and start watching every eligible resource, then
    /// block until all caches report synced.
    pub async fn bootstrap(
        client: &ClusterClient,
        config: &GraphConfig,
    ) -> IndexResult<Arc<Self>> {
        let discovered = client.server_preferred_resources(config).await?;

        let mut mapping = HashMap::new();
        let mut caches = HashMap::new();

        for record in &discovered {
            if !admits(record, &config.banned_resources) {
                continue;
            }

            let resource = record.resource_ref();
            if !caches.contains_key(&resource) {
                caches.insert(resource.clone(), WatchCache::spawn(client.kube(), record));
            }
            mapping.insert(record.kind_ref(), resource);
        }

        info!(resources = caches.len(), "resource indexer starting");

        let indexer = Arc::new(Self { mapping, caches });
        indexer.wait_for_sync(config.cache_sync_timeout).await?;
        info!("resource indexer synced");

        Ok(indexer)
    }

    /// The resource coordinate registered for a kind coordinate.
    pub fn resource(&self, kind: &KindRef) -> LookupResult<ResourceRef> {
        self.mapping
            .get(kind)
            .cloned()
            .ok_or_else(|| LookupError::kind_not_registered(kind.to_string()))
    }

    /// The read façade over this indexer.
    pub fn lister(self: &Arc<Self>) -> Arc<dyn Lister> {
        Arc::new(IndexLister::new(Arc::clone(self)))
    }

    pub(crate) fn cache_for(&self, kind: &KindRef) -> LookupResult<&WatchCache> {
        let resource = self.resource(kind)?;
        self.caches
            .get(&resource)
            .ok_or_else(|| LookupError::kind_not_registered(kind.to_string()))
    }

    async fn wait_for_sync(&self, timeout: Duration) -> IndexResult<()> {
        let deadline = Instant::now() + timeout;
        for (resource, cache) in &self.caches {
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::timeout(remaining, cache.wait_synced())
                .await
                .map_err(|_| IndexError::CacheSyncTimeout {
                    resource: resource.to_string(),
                    timeout,
                })?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn fixture(entries: Vec<(KindRef, ResourceRef, WatchCache)>) -> Arc<Self> {
        let mut mapping = HashMap::new();
        let mut caches = HashMap::new();
        for (kind, resource, cache) in entries {
            mapping.insert(kind, resource.clone());
            caches.insert(resource, cache);
        }
        Arc::new(Self { mapping, caches })
    }
}

impl Drop for ResourceIndexer {
    fn drop(&mut self) {
        for cache in self.caches.values() {
            cache.handle.abort();
        }
    }
}

/// Admission rule for discovered resources: namespaced, watchable, and not
/// banned. The cluster-scoped CRD resource is the one exception, admitted
/// so the classifier can consult it at runtime.
fn admits(record: &DiscoveredResource, banned: &[ResourceRef]) -> bool {
    if !is_watchable(record) {
        return false;
    }

    let resource = record.resource_ref();
    if banned.contains(&resource) {
        return false;
    }

    record.namespaced || resource == *CUSTOM_RESOURCE_DEFINITION_RESOURCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        group: &str,
        version: &str,
        kind: &str,
        plural: &str,
        namespaced: bool,
        verbs: &[&str],
    ) -> DiscoveredResource {
        DiscoveredResource {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            namespaced,
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn admits_namespaced_watchable_resources() {
        let pods = record("", "v1", "Pod", "pods", true, &["list", "watch", "get"]);
        assert!(admits(&pods, &[]));
    }

    #[test]
    fn rejects_resources_missing_verbs() {
        let events = record("", "v1", "Event", "events", true, &["list", "get"]);
        assert!(!admits(&events, &[]));
    }

    #[test]
    fn rejects_cluster_scoped_resources() {
        let nodes = record("", "v1", "Node", "nodes", false, &["list", "watch"]);
        assert!(!admits(&nodes, &[]));
    }

    #[test]
    fn admits_crds_despite_cluster_scope() {
        let crds = record(
            "apiextensions.k8s.io",
            "v1",
            "CustomResourceDefinition",
            "customresourcedefinitions",
            false,
            &["list", "watch"],
        );
        assert!(admits(&crds, &[]));
    }

    #[test]
    fn rejects_banned_resources() {
        let ingresses = record(
            "extensions",
            "v1beta1",
            "Ingress",
            "ingresses",
            true,
            &["list", "watch"],
        );
        let banned = vec![ResourceRef::new("extensions", "v1beta1", "ingresses")];
        assert!(!admits(&ingresses, &banned));
    }

    #[tokio::test]
    async fn fixture_indexer_maps_kinds_to_resources() {
        let kind = KindRef::core("v1", "Pod");
        let resource = ResourceRef::new("", "v1", "pods");
        let indexer = ResourceIndexer::fixture(vec![(
            kind.clone(),
            resource.clone(),
            WatchCache::fixture(vec![]),
        )]);

        assert_eq!(indexer.resource(&kind).unwrap(), resource);

        let missing = KindRef::new("apps", "v1", "Deployment");
        let err = indexer.resource(&missing).unwrap_err();
        assert!(matches!(err, LookupError::KindNotRegistered { .. }));
    }
}
