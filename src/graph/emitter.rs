//! Snapshot accumulation with pod coalescing.

use std::collections::{BTreeMap, HashSet};

use kube::api::DynamicObject;
use kube::ResourceExt;
use sha2::{Digest, Sha256};

use crate::k8s::coords::{kind_ref_of, POD};

use super::node::GraphNode;

/// Accumulates emitted nodes in emission order. Pods are coalesced: when
/// an earlier pod with an identical label set has been emitted in the
/// current snapshot, later ones are suppressed and the first-seen pod
/// stands as the representative of the label-equivalence class.
pub struct NodeEmitter {
    nodes: Vec<GraphNode>,
    seen_pod_labels: HashSet<String>,
}

impl NodeEmitter {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            seen_pod_labels: HashSet::new(),
        }
    }

    /// Emit a node for an object.
    pub fn emit(&mut self, object: &DynamicObject, node: GraphNode) {
        if is_pod(object) {
            let fingerprint = label_fingerprint(object.labels());
            if !self.seen_pod_labels.insert(fingerprint) {
                return;
            }
        }

        self.nodes.push(node);
    }

    /// The accumulated snapshot, in emission order.
    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }
}

impl Default for NodeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_pod(object: &DynamicObject) -> bool {
    kind_ref_of(object).map_or(false, |kind| kind == *POD)
}

/// SHA-256 fingerprint of a label mapping. The map is encoded as JSON with
/// sorted keys, so equal label sets hash identically regardless of
/// insertion order.
pub fn label_fingerprint(labels: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(labels).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::{ObjectMeta, TypeMeta};
    use serde_json::json;

    use crate::graph::node::{HealthStatusType, NodeType};

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn object(kind: &str, name: &str, pairs: &[(&str, &str)]) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta {
                api_version: "v1".to_string(),
                kind: kind.to_string(),
            }),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                uid: Some(format!("uid-{name}")),
                labels: Some(labels(pairs)),
                ..Default::default()
            },
            data: json!({}),
        }
    }

    fn node(id: &str) -> GraphNode {
        GraphNode::new(id, id, NodeType::Workload, HealthStatusType::Healthy)
    }

    #[test]
    fn fingerprint_is_order_insensitive_and_distinct() {
        let a = label_fingerprint(&labels(&[("app", "web"), ("tier", "front")]));
        let b = label_fingerprint(&labels(&[("tier", "front"), ("app", "web")]));
        let c = label_fingerprint(&labels(&[("app", "api")]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pods_with_equal_labels_coalesce_to_first_seen() {
        let mut emitter = NodeEmitter::new();
        emitter.emit(&object("Pod", "web-0", &[("app", "web")]), node("uid-web-0"));
        emitter.emit(&object("Pod", "web-1", &[("app", "web")]), node("uid-web-1"));
        emitter.emit(&object("Pod", "web-2", &[("app", "web")]), node("uid-web-2"));

        let nodes = emitter.into_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "uid-web-0");
    }

    #[test]
    fn pods_with_distinct_labels_all_emit() {
        let mut emitter = NodeEmitter::new();
        emitter.emit(&object("Pod", "web-0", &[("app", "web")]), node("uid-web-0"));
        emitter.emit(&object("Pod", "api-0", &[("app", "api")]), node("uid-api-0"));
        assert_eq!(emitter.into_nodes().len(), 2);
    }

    #[test]
    fn non_pod_kinds_are_never_coalesced() {
        let mut emitter = NodeEmitter::new();
        emitter.emit(&object("Service", "a", &[("app", "web")]), node("uid-a"));
        emitter.emit(&object("Service", "b", &[("app", "web")]), node("uid-b"));
        assert_eq!(emitter.into_nodes().len(), 2);
    }
}
