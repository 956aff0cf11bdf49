//! Resource-kind classification.
//!
//! An object's group kind is checked against fixed built-in tables first;
//! anything else must be declared by a CustomResourceDefinition. The CRD
//! lookup goes back to the indexer on every call because CRDs appear at
//! runtime.

use kube::api::DynamicObject;
use once_cell::sync::Lazy;

use crate::errors::{GraphError, GraphResult};
use crate::k8s::coords::{kind_ref_of, GroupKind, CUSTOM_RESOURCE_DEFINITION};
use crate::k8s::lister::{LabelSelector, Lister};
use crate::k8s::object::nested_str;

use super::node::NodeType;

static WORKLOAD_GROUP_KINDS: Lazy<Vec<GroupKind>> = Lazy::new(|| {
    vec![
        GroupKind::new("apps", "DaemonSet"),
        GroupKind::new("batch", "CronJob"),
        GroupKind::new("apps", "Deployment"),
        GroupKind::new("batch", "Job"),
        GroupKind::new("", "Pod"),
        GroupKind::new("apps", "ReplicaSet"),
        GroupKind::new("", "ReplicationController"),
        GroupKind::new("apps", "StatefulSet"),
    ]
});

static NETWORKING_GROUP_KINDS: Lazy<Vec<GroupKind>> = Lazy::new(|| {
    vec![
        GroupKind::new("networking.k8s.io", "Ingress"),
        GroupKind::new("", "Service"),
    ]
});

static CONFIGURATION_GROUP_KINDS: Lazy<Vec<GroupKind>> = Lazy::new(|| {
    vec![
        GroupKind::new("", "ConfigMap"),
        GroupKind::new("", "Secret"),
        GroupKind::new("", "ServiceAccount"),
    ]
});

/// The subset of workload kinds that confer hierarchical `parent` edges.
static POD_OWNING_GROUP_KINDS: Lazy<Vec<GroupKind>> = Lazy::new(|| {
    vec![
        GroupKind::new("apps", "Deployment"),
        GroupKind::new("apps", "DaemonSet"),
        GroupKind::new("apps", "StatefulSet"),
    ]
});

/// True when the object is a workload controller that groups pods.
pub fn owns_pods(object: &DynamicObject) -> bool {
    match kind_ref_of(object) {
        Some(kind) => POD_OWNING_GROUP_KINDS.contains(&kind.group_kind()),
        None => false,
    }
}

/// Map an object to its node type. Fails with `UnknownKind` when the group
/// kind fits no built-in table and no installed CRD declares it.
pub fn detect_node_type(lister: &dyn Lister, object: &DynamicObject) -> GraphResult<NodeType> {
    let group_kind = kind_ref_of(object)
        .map(|k| k.group_kind())
        .ok_or_else(|| GraphError::UnknownKind {
            group_kind: "<untyped>".to_string(),
        })?;

    if WORKLOAD_GROUP_KINDS.contains(&group_kind) {
        return Ok(NodeType::Workload);
    }
    if NETWORKING_GROUP_KINDS.contains(&group_kind) {
        return Ok(NodeType::Networking);
    }
    if CONFIGURATION_GROUP_KINDS.contains(&group_kind) {
        return Ok(NodeType::Configuration);
    }

    let crds = lister.list(
        &CUSTOM_RESOURCE_DEFINITION,
        None,
        &LabelSelector::everything(),
    )?;
    for crd in &crds {
        let Some(group) = nested_str(crd, &["spec", "group"]) else {
            continue;
        };
        let Some(kind) = nested_str(crd, &["spec", "names", "kind"]) else {
            continue;
        };
        if GroupKind::new(group, kind) == group_kind {
            return Ok(NodeType::CustomResource);
        }
    }

    Err(GraphError::UnknownKind {
        group_kind: group_kind.to_string(),
    })
}
