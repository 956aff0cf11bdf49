//! ReplicaSet-family expansion: attach the service account used by the
//! controller's pods.

use std::sync::Arc;

use kube::api::DynamicObject;
use kube::ResourceExt;
use once_cell::sync::Lazy;

use crate::errors::GraphResult;
use crate::graph::node::GraphNode;
use crate::graph::walker::Walker;
use crate::k8s::coords::{GroupKind, KindRef, POD, SERVICE_ACCOUNT};
use crate::k8s::lister::{LabelSelector, Lister};
use crate::k8s::object::{nested_str, nested_string_map};

use super::ResourceVisitor;

static REPLICA_SET_FAMILY: Lazy<Vec<GroupKind>> = Lazy::new(|| {
    vec![
        GroupKind::new("apps", "ReplicaSet"),
        GroupKind::new("", "ReplicationController"),
    ]
});

/// Visits ReplicaSet-like controllers. When the controller's selector
/// matches running pods, the first pod's service account becomes a target.
pub struct WorkloadVisitor {
    lister: Arc<dyn Lister>,
}

impl WorkloadVisitor {
    pub fn new(lister: Arc<dyn Lister>) -> Self {
        Self { lister }
    }
}

impl ResourceVisitor for WorkloadVisitor {
    fn name(&self) -> &'static str {
        "Workload"
    }

    fn matches(&self, kind: &KindRef) -> bool {
        REPLICA_SET_FAMILY.contains(&kind.group_kind())
    }

    fn visit(
        &self,
        object: &DynamicObject,
        mut node: GraphNode,
        walker: &mut Walker,
    ) -> GraphResult<GraphNode> {
        let Some(namespace) = object.namespace() else {
            return Ok(node);
        };

        // ReplicaSets carry spec.selector.matchLabels; replication
        // controllers carry a bare spec.selector map.
        let selector = nested_string_map(object, &["spec", "selector", "matchLabels"])
            .or_else(|| nested_string_map(object, &["spec", "selector"]));
        let Some(selector) = selector else {
            return Ok(node);
        };

        let pods = self.lister.list(
            &POD,
            Some(&namespace),
            &LabelSelector::from_map(selector),
        )?;
        let Some(pod) = pods.first() else {
            return Ok(node);
        };

        let Some(account_name) = nested_str(pod, &["spec", "serviceAccount"]) else {
            return Ok(node);
        };
        if account_name.is_empty() {
            return Ok(node);
        }

        let account = self
            .lister
            .get(&SERVICE_ACCOUNT, Some(&namespace), account_name)?;
        let Some(account_uid) = account.uid() else {
            return Ok(node);
        };

        node.add_target(&account_uid);
        walker.visit(false, &[account])?;

        Ok(node)
    }
}
