pub mod config;
pub mod errors;
pub mod graph;
pub mod k8s;
pub mod server;

pub use config::GraphConfig;
pub use errors::{AppError, ConfigError, GraphError, IndexError, LookupError};
pub use graph::{GraphBuilder, GraphNode, HealthStatusType, NodeType, Walker};
pub use k8s::{ClusterClient, KindRef, LabelSelector, Lister, ResourceIndexer, ResourceRef};
