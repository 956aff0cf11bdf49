//! Per-kind graph expanders.
//!
//! A visitor discovers objects adjacent to the one being visited and
//! appends edges to its node, re-entering the walker for anything newly
//! discovered. New kinds are supported by registering new visitors; the
//! walker itself stays closed to modification.

mod pod;
mod service;
mod service_account;
mod workload;

use std::sync::Arc;

use kube::api::DynamicObject;

use crate::errors::GraphResult;
use crate::k8s::coords::KindRef;
use crate::k8s::lister::Lister;

use super::node::GraphNode;
use super::walker::Walker;

pub use pod::PodVisitor;
pub use service::ServiceVisitor;
pub use service_account::ServiceAccountVisitor;
pub use workload::WorkloadVisitor;

/// A resource-specific visitor. `visit` may mutate the node's edges and
/// re-enter the walker; the walker's memoization guarantees termination.
pub trait ResourceVisitor: Send + Sync {
    /// The visitor's name, used to wrap its errors.
    fn name(&self) -> &'static str;

    /// Whether this visitor handles the given kind coordinate.
    fn matches(&self, kind: &KindRef) -> bool;

    /// Expand the object, returning the (possibly modified) node.
    fn visit(
        &self,
        object: &DynamicObject,
        node: GraphNode,
        walker: &mut Walker,
    ) -> GraphResult<GraphNode>;
}

/// The built-in visitor set, in registration (dispatch) order.
pub fn default_visitors(lister: Arc<dyn Lister>) -> Vec<Arc<dyn ResourceVisitor>> {
    vec![
        Arc::new(PodVisitor::new(lister.clone())),
        Arc::new(WorkloadVisitor::new(lister.clone())),
        Arc::new(ServiceAccountVisitor::new(lister.clone())),
        Arc::new(ServiceVisitor::new(lister)),
    ]
}
