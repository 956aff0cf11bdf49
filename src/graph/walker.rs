//! The graph walker.
//!
//! Drives the traversal for one build: de-duplicates by object UID, emits
//! exactly one node per visited object, attaches owner-derived edges,
//! delegates kind-specific expansion to the registered visitors, and
//! funnels nodes into the emitter. The `visited` set is the sole cycle
//! guard; a malformed owner graph cannot diverge.

use std::collections::HashSet;
use std::sync::Arc;

use kube::api::DynamicObject;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;

use crate::errors::{GraphError, GraphResult};
use crate::k8s::coords::{kind_ref_of, KindRef, POD, SERVICE_ACCOUNT};
use crate::k8s::lister::{LabelSelector, Lister};
use crate::k8s::object::{describe, nested_str};

use super::classify::{detect_node_type, owns_pods};
use super::emitter::NodeEmitter;
use super::health::HealthEvaluator;
use super::node::GraphNode;
use super::visitors::ResourceVisitor;

/// Per-build traversal state. One walker serves exactly one build; the
/// memoization set and emitter are discarded with it.
pub struct Walker {
    lister: Arc<dyn Lister>,
    visitors: Vec<Arc<dyn ResourceVisitor>>,
    health: Arc<dyn HealthEvaluator>,
    cancel: CancellationToken,
    emitter: NodeEmitter,
    visited: HashSet<String>,
}

impl Walker {
    pub fn new(
        lister: Arc<dyn Lister>,
        visitors: Vec<Arc<dyn ResourceVisitor>>,
        health: Arc<dyn HealthEvaluator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            lister,
            visitors,
            health,
            cancel,
            emitter: NodeEmitter::new(),
            visited: HashSet::new(),
        }
    }

    /// Visit a set of objects in input order. Recursive visits are
    /// depth-first and complete before the next sibling. `is_group` marks
    /// the constructed nodes as hierarchy containers.
    pub fn visit(&mut self, is_group: bool, objects: &[DynamicObject]) -> GraphResult<()> {
        for object in objects {
            if self.cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }

            let Some(uid) = object.uid() else {
                continue;
            };
            if !self.visited.insert(uid.clone()) {
                continue;
            }

            let Some(kind) = kind_ref_of(object) else {
                return Err(GraphError::UnknownKind {
                    group_kind: "<untyped>".to_string(),
                });
            };

            let node_type = detect_node_type(self.lister.as_ref(), object)?;
            let health_status = self.health.health_status(object)?;

            let mut node = GraphNode::new(uid, object.name_any(), node_type, health_status);
            if is_group {
                node.is_group = Some(true);
            }

            node = self.visit_owners(object, node)?;
            node = self.check_owned_pods(object, node)?;

            let visitors = self.visitors.clone();
            for visitor in &visitors {
                if visitor.matches(&kind) {
                    node = visitor
                        .visit(object, node, self)
                        .map_err(|err| GraphError::visitor(visitor.name(), err))?;
                }
            }

            node.normalize();
            self.emitter.emit(object, node);
        }

        Ok(())
    }

    /// The accumulated snapshot.
    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.emitter.into_nodes()
    }

    /// Walk the object's owner references. A pod-owning workload owner
    /// becomes the node's `parent`; any other owner becomes a target, and
    /// its own controller chain is climbed so the nearest pod-owning
    /// ancestor still wins `parent`. Owners absent from the cache are
    /// skipped: stale references are common during rollouts.
    fn visit_owners(&mut self, object: &DynamicObject, mut node: GraphNode) -> GraphResult<GraphNode> {
        let namespace = object.namespace();

        for reference in object.owner_references().to_vec() {
            let owner_kind = KindRef::from_api_version(&reference.api_version, reference.kind.clone());

            let owner = match self
                .lister
                .get(&owner_kind, namespace.as_deref(), &reference.name)
            {
                Ok(owner) => owner,
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    return Err(GraphError::owner_resolution(
                        format!("{} {:?}", owner_kind, reference.name),
                        describe(object),
                        err,
                    ))
                }
            };
            let Some(owner_uid) = owner.uid() else {
                continue;
            };

            if owns_pods(&owner) {
                node.parent = Some(owner_uid);
                self.visit(true, &[owner])?;
            } else {
                node.add_target(&owner_uid);
                if let Some(ancestor) = self.find_group_ancestor(&owner)? {
                    node.parent = Some(ancestor);
                }
                self.visit(false, &[owner])?;
            }
        }

        Ok(node)
    }

    /// Climb the controller chain of `object` looking for the nearest
    /// pod-owning workload. Unresolvable links end the climb.
    fn find_group_ancestor(&self, object: &DynamicObject) -> GraphResult<Option<String>> {
        let namespace = object.namespace();
        let mut seen: HashSet<String> = object.uid().into_iter().collect();
        let mut current = object.clone();

        loop {
            let Some(reference) = current
                .owner_references()
                .iter()
                .find(|r| r.controller == Some(true))
                .cloned()
            else {
                return Ok(None);
            };

            let owner_kind = KindRef::from_api_version(&reference.api_version, reference.kind.clone());
            let owner = match self
                .lister
                .get(&owner_kind, namespace.as_deref(), &reference.name)
            {
                Ok(owner) => owner,
                Err(err) if err.is_not_found() => return Ok(None),
                Err(err) => {
                    return Err(GraphError::owner_resolution(
                        format!("{} {:?}", owner_kind, reference.name),
                        describe(&current),
                        err,
                    ))
                }
            };

            let Some(owner_uid) = owner.uid() else {
                return Ok(None);
            };
            if owns_pods(&owner) {
                return Ok(Some(owner_uid));
            }
            if !seen.insert(owner_uid) {
                return Ok(None);
            }
            current = owner;
        }
    }

    /// The owned-pods short-circuit: when pods in the namespace are
    /// (transitively) controlled by this object, attach the service
    /// account of the first such pod and recurse on it. Pods without a
    /// service account field contribute nothing.
    fn check_owned_pods(
        &mut self,
        object: &DynamicObject,
        mut node: GraphNode,
    ) -> GraphResult<GraphNode> {
        let Some(namespace) = object.namespace() else {
            return Ok(node);
        };
        let Some(object_uid) = object.uid() else {
            return Ok(node);
        };

        let pods = self
            .lister
            .list(&POD, Some(&namespace), &LabelSelector::everything())?;

        let mut representative = None;
        for pod in pods {
            if self.is_transitively_controlled(&pod, &object_uid, &namespace)? {
                representative = Some(pod);
                break;
            }
        }
        let Some(representative) = representative else {
            return Ok(node);
        };

        let Some(account_name) = nested_str(&representative, &["spec", "serviceAccount"]) else {
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
        self.visit(false, &[account])?;

        Ok(node)
    }

    /// Transitive-controller predicate: the pod is the object itself, or
    /// its controller chain reaches the object's UID.
    fn is_transitively_controlled(
        &self,
        pod: &DynamicObject,
        target_uid: &str,
        namespace: &str,
    ) -> GraphResult<bool> {
        if pod.uid().as_deref() == Some(target_uid) {
            return Ok(true);
        }

        let mut seen: HashSet<String> = pod.uid().into_iter().collect();
        let mut current = pod.clone();

        loop {
            let Some(reference) = current
                .owner_references()
                .iter()
                .find(|r| r.controller == Some(true))
                .cloned()
            else {
                return Ok(false);
            };

            if reference.uid == target_uid {
                return Ok(true);
            }

            let owner_kind = KindRef::from_api_version(&reference.api_version, reference.kind.clone());
            let owner = match self.lister.get(&owner_kind, Some(namespace), &reference.name) {
                Ok(owner) => owner,
                Err(err) if err.is_not_found() => return Ok(false),
                Err(err) => return Err(err.into()),
            };

            let Some(owner_uid) = owner.uid() else {
                return Ok(false);
            };
            if owner_uid == target_uid {
                return Ok(true);
            }
            if !seen.insert(owner_uid) {
                return Ok(false);
            }
            current = owner;
        }
    }
}
