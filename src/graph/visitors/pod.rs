//! Pod expansion: discover the services selecting this pod.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use kube::api::DynamicObject;
use kube::ResourceExt;

use crate::errors::GraphResult;
use crate::graph::emitter::label_fingerprint;
use crate::graph::node::GraphNode;
use crate::graph::walker::Walker;
use crate::k8s::coords::{KindRef, POD, SERVICE};
use crate::k8s::lister::{LabelSelector, Lister};
use crate::k8s::object::nested_string_map;

use super::ResourceVisitor;

/// Visits pods. Pods sharing a label set also share their service edges,
/// so the per-build fingerprint cache skips the service scan for every pod
/// after the first of its label-equivalence class; the emitter remains the
/// authority on which pod node survives.
pub struct PodVisitor {
    lister: Arc<dyn Lister>,
    seen: Mutex<HashSet<String>>,
}

impl PodVisitor {
    pub fn new(lister: Arc<dyn Lister>) -> Self {
        Self {
            lister,
            seen: Mutex::new(HashSet::new()),
        }
    }
}

impl ResourceVisitor for PodVisitor {
    fn name(&self) -> &'static str {
        "Pod"
    }

    fn matches(&self, kind: &KindRef) -> bool {
        *kind == *POD
    }

    fn visit(
        &self,
        object: &DynamicObject,
        node: GraphNode,
        walker: &mut Walker,
    ) -> GraphResult<GraphNode> {
        let fingerprint = label_fingerprint(object.labels());
        {
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            if !seen.insert(fingerprint) {
                // a similar pod has already been expanded
                return Ok(node);
            }
        }

        let Some(namespace) = object.namespace() else {
            return Ok(node);
        };

        let services = self
            .lister
            .list(&SERVICE, Some(&namespace), &LabelSelector::everything())?;

        let pod_labels = object.labels();
        for service in services {
            let Some(selector) = nested_string_map(&service, &["spec", "selector"]) else {
                continue;
            };
            if !LabelSelector::from_map(selector).matches(pod_labels) {
                continue;
            }

            walker.visit(false, &[service])?;
        }

        Ok(node)
    }
}
