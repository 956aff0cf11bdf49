//! The emitted graph record and its enumerations.

use serde::{Deserialize, Serialize};

/// Classification of an emitted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Workload,
    Networking,
    Configuration,
    CustomResource,
}

/// Health verdict for an emitted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatusType {
    Healthy,
    Degraded,
    Failure,
}

/// One node of the workload graph. Empty optional keys are omitted from
/// the wire encoding; consumers must ignore unknown keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Stable object UID.
    pub id: String,

    /// Object name.
    pub label: String,

    pub node_type: NodeType,

    pub health_status: HealthStatusType,

    /// UID of the hierarchical container this node belongs to, when one of
    /// its (transitive) owners is a pod-owning workload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<String>,

    /// UIDs of peer nodes this node points at.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub targets: Vec<String>,

    /// Set when this node represents a hierarchy container.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_group: Option<bool>,

    /// Reserved for quiescent workloads.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_idle: Option<bool>,
}

impl GraphNode {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: NodeType,
        health_status: HealthStatusType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            health_status,
            parent: None,
            targets: Vec::new(),
            is_group: None,
            is_idle: None,
        }
    }

    /// Append a peer edge, skipping duplicates and self-edges.
    pub fn add_target(&mut self, uid: &str) {
        if uid == self.id {
            return;
        }
        if self.targets.iter().any(|t| t == uid) {
            return;
        }
        self.targets.push(uid.to_string());
    }

    /// Enforce the snapshot edge invariants on this node: no self edge,
    /// and the parent never doubles as a target.
    pub fn normalize(&mut self) {
        let id = self.id.clone();
        let parent = self.parent.clone();
        self.targets
            .retain(|t| *t != id && Some(t) != parent.as_ref());
        if self.parent.as_deref() == Some(self.id.as_str()) {
            self.parent = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_omits_empty_keys() {
        let node = GraphNode::new("u1", "web", NodeType::Workload, HealthStatusType::Healthy);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "u1",
                "label": "web",
                "nodeType": "workload",
                "healthStatus": "healthy",
            })
        );
    }

    #[test]
    fn wire_shape_includes_populated_keys() {
        let mut node = GraphNode::new(
            "u1",
            "web-svc",
            NodeType::Networking,
            HealthStatusType::Degraded,
        );
        node.parent = Some("u2".to_string());
        node.add_target("u3");
        node.is_group = Some(true);

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "u1",
                "label": "web-svc",
                "nodeType": "networking",
                "healthStatus": "degraded",
                "parent": "u2",
                "targets": ["u3"],
                "isGroup": true,
            })
        );
    }

    #[test]
    fn custom_resource_uses_kebab_case() {
        let value = serde_json::to_value(NodeType::CustomResource).unwrap();
        assert_eq!(value, json!("custom-resource"));
    }

    #[test]
    fn add_target_dedups_and_skips_self() {
        let mut node = GraphNode::new("u1", "x", NodeType::Workload, HealthStatusType::Healthy);
        node.add_target("u2");
        node.add_target("u2");
        node.add_target("u1");
        assert_eq!(node.targets, vec!["u2"]);
    }

    #[test]
    fn normalize_keeps_parent_and_targets_disjoint() {
        let mut node = GraphNode::new("u1", "x", NodeType::Workload, HealthStatusType::Healthy);
        node.parent = Some("u2".to_string());
        node.targets = vec!["u2".to_string(), "u3".to_string(), "u1".to_string()];
        node.normalize();
        assert_eq!(node.targets, vec!["u3"]);
        assert_eq!(node.parent.as_deref(), Some("u2"));
    }

    #[test]
    fn unknown_keys_are_ignored_on_decode() {
        let raw = json!({
            "id": "u1",
            "label": "web",
            "nodeType": "workload",
            "healthStatus": "healthy",
            "futureField": {"x": 1},
        });
        let node: GraphNode = serde_json::from_value(raw).unwrap();
        assert_eq!(node.id, "u1");
        assert!(node.targets.is_empty());
    }
}
