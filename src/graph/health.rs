//! Health-status synthesis.

use std::sync::Arc;

use kube::api::DynamicObject;

use crate::errors::GraphResult;
use crate::k8s::lister::Lister;

use super::node::HealthStatusType;

/// Produces a health verdict for an object. Implementations may inspect
/// `status` sub-trees or consult the lister; callers never care which.
pub trait HealthEvaluator: Send + Sync {
    fn health_status(&self, object: &DynamicObject) -> GraphResult<HealthStatusType>;
}

/// Builds a health evaluator against a lister. Injected through the
/// configuration surface so deployments can swap in richer evaluators
/// without touching the walker.
pub type HealthEvaluatorFactory = Arc<dyn Fn(Arc<dyn Lister>) -> Arc<dyn HealthEvaluator> + Send + Sync>;

/// The default evaluator: every object is healthy.
pub struct ClusterHealthEvaluator {
    #[allow(dead_code)]
    lister: Arc<dyn Lister>,
}

impl ClusterHealthEvaluator {
    pub fn new(lister: Arc<dyn Lister>) -> Self {
        Self { lister }
    }
}

impl HealthEvaluator for ClusterHealthEvaluator {
    fn health_status(&self, _object: &DynamicObject) -> GraphResult<HealthStatusType> {
        Ok(HealthStatusType::Healthy)
    }
}

/// The factory for the default evaluator.
pub fn default_health_factory() -> HealthEvaluatorFactory {
    Arc::new(|lister| Arc::new(ClusterHealthEvaluator::new(lister)))
}
