pub mod client;
pub mod coords;
pub mod indexer;
pub mod lister;
pub mod object;

pub use client::{ClusterClient, DiscoveredResource};
pub use coords::{GroupKind, KindRef, ResourceRef};
pub use indexer::ResourceIndexer;
pub use lister::{IndexLister, LabelSelector, Lister};
