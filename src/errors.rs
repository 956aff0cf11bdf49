//! Error types for the graph-construction pipeline.
//!
//! Failures are grouped by domain: initialization (`IndexError`), cache
//! lookups (`LookupError`), graph builds (`GraphError`), and configuration
//! (`ConfigError`). `AppError` is the umbrella type used at the binary
//! boundary.

use std::time::Duration;

use thiserror::Error;

/// Top-level application error encompassing all failure domains.
#[derive(Error, Debug)]
pub enum AppError {
    /// Indexer initialization errors
    #[error("indexer error: {0}")]
    Index(#[from] IndexError),

    /// Graph build errors
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while bootstrapping the resource indexer. All of these are
/// fatal at process start.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Failed to create the Kubernetes client
    #[error("failed to create Kubernetes client: {source}")]
    ClientCreationFailed {
        #[from]
        source: kube::Error,
    },

    /// API discovery could not enumerate server resources
    #[error("API discovery failed: {message}")]
    DiscoveryFailed { message: String },

    /// A watch cache never reported synced
    #[error("cache for {resource} did not sync within {timeout:?}")]
    CacheSyncTimeout { resource: String, timeout: Duration },
}

/// Errors raised by the lister façade when reading from the in-memory
/// caches.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The kind coordinate was never registered by discovery
    #[error("kind {kind} is not registered with the indexer")]
    KindNotRegistered { kind: String },

    /// Object absent from the cache
    #[error("{kind} {name:?} not found in namespace {namespace:?}")]
    NotFound {
        kind: String,
        name: String,
        namespace: Option<String>,
    },

    /// The backing cache has not completed its initial list
    #[error("cache for {kind} has not synced")]
    CacheNotSynced { kind: String },
}

/// Errors raised during a graph build.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Listing the seed pods failed
    #[error("list pods in namespace {namespace}: {source}")]
    SeedListFailed {
        namespace: String,
        source: LookupError,
    },

    /// A cache lookup failed mid-traversal
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// An owner reference could not be resolved
    #[error("resolve owner {owner} of {object}: {source}")]
    OwnerResolutionFailed {
        owner: String,
        object: String,
        source: LookupError,
    },

    /// The object's group kind fits no classification rule and no CRD
    #[error("unknown group kind {group_kind}")]
    UnknownKind { group_kind: String },

    /// A resource visitor failed; wraps the visitor name and cause
    #[error("resource visitor {visitor}: {source}")]
    VisitorFailed {
        visitor: String,
        #[source]
        source: Box<GraphError>,
    },

    /// The build's cancellation token fired
    #[error("graph build cancelled")]
    Cancelled,
}

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Cluster configuration could not be loaded or parsed
    #[error("failed to load cluster configuration: {message}")]
    ClusterConfig { message: String },

    /// Discovery cache file could not be read
    #[error("failed to read discovery cache {path}: {message}")]
    CacheRead { path: String, message: String },

    /// Discovery cache file could not be written
    #[error("failed to write discovery cache {path}: {message}")]
    CacheWrite { path: String, message: String },
}

// Convenience type aliases for commonly used result types
pub type AppResult<T> = Result<T, AppError>;
pub type IndexResult<T> = Result<T, IndexError>;
pub type LookupResult<T> = Result<T, LookupError>;
pub type GraphResult<T> = Result<T, GraphError>;

impl LookupError {
    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: Option<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
            namespace,
        }
    }

    pub fn kind_not_registered(kind: impl Into<String>) -> Self {
        Self::KindNotRegistered { kind: kind.into() }
    }

    /// True when the lookup failed because the object is absent, as opposed
    /// to the kind being unknown or the cache being cold.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl GraphError {
    pub fn visitor(visitor: impl Into<String>, source: GraphError) -> Self {
        Self::VisitorFailed {
            visitor: visitor.into(),
            source: Box::new(source),
        }
    }

    pub fn owner_resolution(
        owner: impl Into<String>,
        object: impl Into<String>,
        source: LookupError,
    ) -> Self {
        Self::OwnerResolutionFailed {
            owner: owner.into(),
            object: object.into(),
            source,
        }
    }
}

impl IndexError {
    pub fn discovery_failed(message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable() {
        let err = LookupError::not_found("Pod", "web-0", Some("default".to_string()));
        assert!(err.is_not_found());

        let err = LookupError::kind_not_registered("v1/Gizmo");
        assert!(!err.is_not_found());

        let err = LookupError::CacheNotSynced {
            kind: "v1/Pod".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn visitor_error_wraps_name_and_cause() {
        let cause = GraphError::UnknownKind {
            group_kind: "Widget.x.io".to_string(),
        };
        let err = GraphError::visitor("Service", cause);
        let message = err.to_string();
        assert!(message.contains("resource visitor Service"));
        assert!(message.contains("Widget.x.io"));
    }
}
