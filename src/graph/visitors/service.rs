//! Service expansion: point the service at the controllers behind the
//! pods it selects.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::api::DynamicObject;
use kube::ResourceExt;

use crate::errors::{GraphError, GraphResult};
use crate::graph::node::GraphNode;
use crate::graph::walker::Walker;
use crate::k8s::coords::{KindRef, POD, SERVICE};
use crate::k8s::lister::{LabelSelector, Lister};
use crate::k8s::object::{describe, nested_string_map};

use super::ResourceVisitor;

/// Visits services. The service's edges go to the unique owners of its
/// selected pods, not to the pods themselves: pod nodes are subject to
/// coalescing and would lose fidelity.
pub struct ServiceVisitor {
    lister: Arc<dyn Lister>,
}

impl ServiceVisitor {
    pub fn new(lister: Arc<dyn Lister>) -> Self {
        Self { lister }
    }
}

impl ResourceVisitor for ServiceVisitor {
    fn name(&self) -> &'static str {
        "Service"
    }

    fn matches(&self, kind: &KindRef) -> bool {
        *kind == *SERVICE
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

        let selector = nested_string_map(object, &["spec", "selector"])
            .map(LabelSelector::from_map)
            .unwrap_or_else(LabelSelector::everything);

        let pods = self.lister.list(&POD, Some(&namespace), &selector)?;

        // De-duplicated by UID; iteration order over this map is not part
        // of the contract.
        let mut owners_by_uid: BTreeMap<String, DynamicObject> = BTreeMap::new();
        for pod in &pods {
            for reference in pod.owner_references() {
                let owner_kind =
                    KindRef::from_api_version(&reference.api_version, reference.kind.clone());
                let owner = match self.lister.get(&owner_kind, Some(&namespace), &reference.name) {
                    Ok(owner) => owner,
                    Err(err) if err.is_not_found() => continue,
                    Err(err) => {
                        return Err(GraphError::owner_resolution(
                            format!("{} {:?}", owner_kind, reference.name),
                            describe(pod),
                            err,
                        ))
                    }
                };
                if let Some(uid) = owner.uid() {
                    owners_by_uid.insert(uid, owner);
                }
            }
        }

        let mut owners = Vec::with_capacity(owners_by_uid.len());
        for (uid, owner) in owners_by_uid {
            node.add_target(&uid);
            owners.push(owner);
        }

        walker.visit(false, &owners)?;

        Ok(node)
    }
}
