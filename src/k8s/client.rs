//! Cluster access layer: client construction and API discovery.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kube::api::ApiResource;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::{verbs, Discovery, Scope};
use kube::{Client, Config};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::errors::{ConfigError, IndexError, IndexResult};

use super::coords::{KindRef, ResourceRef};

const DISCOVERY_CACHE_FILE: &str = "preferred-resources.json";

/// One server-preferred resource as reported by discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
}

impl DiscoveredResource {
    pub fn kind_ref(&self) -> KindRef {
        KindRef::new(&self.group, &self.version, &self.kind)
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(&self.group, &self.version, &self.plural)
    }

    /// Rebuild the dynamic-API descriptor for this resource.
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.kind_ref().api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }

    pub fn supports(&self, verb: &str) -> bool {
        self.verbs.iter().any(|v| v == verb)
    }
}

/// Snapshot persisted under the discovery cache directory.
#[derive(Debug, Serialize, Deserialize)]
struct DiscoverySnapshot {
    fetched_at: DateTime<Utc>,
    resources: Vec<DiscoveredResource>,
}

/// A client for communicating with a Kubernetes cluster.
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
}

impl ClusterClient {
    /// Connect using an explicit kubeconfig path, or infer configuration
    /// from the environment (in-cluster or default kubeconfig) when absent.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig =
                    Kubeconfig::read_from(path).map_err(|e| ConfigError::ClusterConfig {
                        message: format!("read kubeconfig {}: {}", path.display(), e),
                    })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| ConfigError::ClusterConfig {
                        message: e.to_string(),
                    })?
            }
            None => Config::infer()
                .await
                .map_err(|e| ConfigError::ClusterConfig {
                    message: e.to_string(),
                })?,
        };

        let client = Client::try_from(config).map_err(|e| ConfigError::ClusterConfig {
            message: e.to_string(),
        })?;

        Ok(Self { client })
    }

    /// Wrap an already-constructed kube client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn kube(&self) -> Client {
        self.client.clone()
    }

    /// Enumerate server-preferred resources, using the on-disk snapshot
    /// when it is younger than the configured TTL. Discovery failure is
    /// fatal; cache read/write failures degrade to a live query.
    pub async fn server_preferred_resources(
        &self,
        config: &GraphConfig,
    ) -> IndexResult<Vec<DiscoveredResource>> {
        if let Some(dir) = &config.discovery_cache_dir {
            match load_discovery_snapshot(dir, config.discovery_ttl) {
                Ok(Some(resources)) => {
                    debug!(count = resources.len(), "using cached discovery snapshot");
                    return Ok(resources);
                }
                Ok(None) => {}
                Err(err) => warn!("discovery cache unreadable, querying server: {err}"),
            }
        }

        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| IndexError::discovery_failed(e.to_string()))?;

        let mut resources = Vec::new();
        for group in discovery.groups() {
            for (api_resource, caps) in group.recommended_resources() {
                resources.push(DiscoveredResource {
                    group: api_resource.group.clone(),
                    version: api_resource.version.clone(),
                    kind: api_resource.kind.clone(),
                    plural: api_resource.plural.clone(),
                    namespaced: caps.scope == Scope::Namespaced,
                    verbs: caps.operations.clone(),
                });
            }
        }
        info!(count = resources.len(), "discovered server-preferred resources");

        if let Some(dir) = &config.discovery_cache_dir {
            if let Err(err) = store_discovery_snapshot(dir, &resources) {
                warn!("failed to persist discovery snapshot: {err}");
            }
        }

        Ok(resources)
    }
}

/// True when the resource advertises both verbs the indexer needs.
pub fn is_watchable(resource: &DiscoveredResource) -> bool {
    resource.supports(verbs::LIST) && resource.supports(verbs::WATCH)
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(DISCOVERY_CACHE_FILE)
}

fn load_discovery_snapshot(
    dir: &Path,
    ttl: std::time::Duration,
) -> Result<Option<Vec<DiscoveredResource>>, ConfigError> {
    let path = snapshot_path(dir);
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read(&path).map_err(|e| ConfigError::CacheRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let snapshot: DiscoverySnapshot =
        serde_json::from_slice(&raw).map_err(|e| ConfigError::CacheRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let age = Utc::now().signed_duration_since(snapshot.fetched_at);
    match age.to_std() {
        Ok(age) if age < ttl => Ok(Some(snapshot.resources)),
        _ => Ok(None),
    }
}

fn store_discovery_snapshot(
    dir: &Path,
    resources: &[DiscoveredResource],
) -> Result<(), ConfigError> {
    fs::create_dir_all(dir).map_err(|e| ConfigError::CacheWrite {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let snapshot = DiscoverySnapshot {
        fetched_at: Utc::now(),
        resources: resources.to_vec(),
    };
    let raw = serde_json::to_vec_pretty(&snapshot).map_err(|e| ConfigError::CacheWrite {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let path = snapshot_path(dir);
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ConfigError::CacheWrite {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(tmp.path(), raw).map_err(|e| ConfigError::CacheWrite {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    tmp.persist(&path).map_err(|e| ConfigError::CacheWrite {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(())
}
