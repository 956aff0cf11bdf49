//! Configuration bundle consumed by the cluster client and indexer.

use std::path::PathBuf;
use std::time::Duration;

use crate::graph::health::HealthEvaluatorFactory;
use crate::k8s::coords::ResourceRef;

/// Options for the graph generator. All fields have working defaults; a
/// zero-value bundle talks to the cluster directly and indexes every
/// eligible resource except the deprecated extensions ingress.
#[derive(Clone)]
pub struct GraphConfig {
    /// On-disk location for cached discovery responses. When set, a fresh
    /// snapshot skips the server round-trip.
    pub discovery_cache_dir: Option<PathBuf>,
    /// On-disk location for cached HTTP list bodies during discovery.
    pub http_cache_dir: Option<PathBuf>,
    /// Maximum age for cached discovery data.
    pub discovery_ttl: Duration,
    /// Resource coordinates excluded from indexing.
    pub banned_resources: Vec<ResourceRef>,
    /// How long to wait for every watch cache to report synced before
    /// initialization fails.
    pub cache_sync_timeout: Duration,
    /// Client-side request rate for the cluster client.
    pub client_qps: u32,
    /// Client-side request burst for the cluster client.
    pub client_burst: u32,
    /// Replaces the default health evaluator for graph builds.
    pub health_factory: Option<HealthEvaluatorFactory>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            discovery_cache_dir: None,
            http_cache_dir: None,
            discovery_ttl: Duration::from_secs(180),
            banned_resources: default_banned_resources(),
            cache_sync_timeout: Duration::from_secs(120),
            client_qps: 200,
            client_burst: 400,
            health_factory: None,
        }
    }
}

/// Resources that will never be indexed. The extensions ingress is the
/// deprecated duplicate of the networking.k8s.io form.
pub fn default_banned_resources() -> Vec<ResourceRef> {
    vec![ResourceRef::new("extensions", "v1beta1", "ingresses")]
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("discovery_cache_dir", &self.discovery_cache_dir)
            .field("http_cache_dir", &self.http_cache_dir)
            .field("discovery_ttl", &self.discovery_ttl)
            .field("banned_resources", &self.banned_resources)
            .field("cache_sync_timeout", &self.cache_sync_timeout)
            .field("client_qps", &self.client_qps)
            .field("client_burst", &self.client_burst)
            .field(
                "health_factory",
                &self.health_factory.as_ref().map(|_| "<factory>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GraphConfig::default();
        assert_eq!(config.discovery_ttl, Duration::from_secs(180));
        assert_eq!(config.client_qps, 200);
        assert_eq!(config.client_burst, 400);
        assert!(config.health_factory.is_none());
        assert_eq!(
            config.banned_resources,
            vec![ResourceRef::new("extensions", "v1beta1", "ingresses")]
        );
    }
}
