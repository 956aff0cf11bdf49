//! The build entry point.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::{GraphError, GraphResult};
use crate::k8s::coords::POD;
use crate::k8s::lister::{LabelSelector, Lister};

use super::health::{default_health_factory, HealthEvaluatorFactory};
use super::node::GraphNode;
use super::visitors::default_visitors;
use super::walker::Walker;

/// Builds workload graphs for a namespace. The builder itself is cheap and
/// reusable; every build constructs a fresh walker, so builds never share
/// traversal state.
pub struct GraphBuilder {
    lister: Arc<dyn Lister>,
    health_factory: HealthEvaluatorFactory,
}

impl GraphBuilder {
    pub fn new(lister: Arc<dyn Lister>) -> Self {
        Self {
            lister,
            health_factory: default_health_factory(),
        }
    }

    /// Replace the health evaluator used by subsequent builds.
    pub fn with_health_factory(mut self, factory: HealthEvaluatorFactory) -> Self {
        self.health_factory = factory;
        self
    }

    /// Build the graph for one namespace, seeded with every pod in it.
    /// A fired cancellation token aborts the build; partial snapshots are
    /// never returned.
    pub fn build(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
    ) -> GraphResult<Vec<GraphNode>> {
        let seeds = self
            .lister
            .list(&POD, Some(namespace), &LabelSelector::everything())
            .map_err(|source| GraphError::SeedListFailed {
                namespace: namespace.to_string(),
                source,
            })?;

        let visitors = default_visitors(self.lister.clone());
        let health = (self.health_factory)(self.lister.clone());
        let mut walker = Walker::new(self.lister.clone(), visitors, health, cancel.clone());

        walker.visit(false, &seeds)?;

        Ok(walker.into_nodes())
    }
}
