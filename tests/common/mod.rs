//! Shared fixtures for the pipeline tests: an in-memory lister and
//! builders for the cluster objects the traversal understands.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DynamicObject, ObjectMeta, TypeMeta};
use kube::ResourceExt;
use serde_json::{json, Value};

use kubegraph::errors::{LookupError, LookupResult};
use kubegraph::k8s::coords::{kind_ref_of, KindRef, CUSTOM_RESOURCE_DEFINITION};
use kubegraph::k8s::lister::{LabelSelector, Lister};
use kubegraph::GraphNode;

/// An in-memory lister over a fixed object set. List results preserve
/// insertion order; gets miss with `NotFound`.
pub struct FixtureLister {
    objects: Vec<DynamicObject>,
    crd_list_calls: AtomicUsize,
}

impl FixtureLister {
    pub fn new(objects: Vec<DynamicObject>) -> Self {
        Self {
            objects,
            crd_list_calls: AtomicUsize::new(0),
        }
    }

    /// How many times the CRD set was listed; every classifier fall-through
    /// consults it exactly once.
    pub fn crd_list_calls(&self) -> usize {
        self.crd_list_calls.load(Ordering::SeqCst)
    }
}

impl Lister for FixtureLister {
    fn list(
        &self,
        kind: &KindRef,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> LookupResult<Vec<DynamicObject>> {
        if *kind == *CUSTOM_RESOURCE_DEFINITION {
            self.crd_list_calls.fetch_add(1, Ordering::SeqCst);
        }

        Ok(self
            .objects
            .iter()
            .filter(|obj| kind_ref_of(obj).as_ref() == Some(kind))
            .filter(|obj| match namespace {
                Some(ns) => obj.namespace().as_deref() == Some(ns),
                None => true,
            })
            .filter(|obj| selector.matches(obj.labels()))
            .cloned()
            .collect())
    }

    fn get(
        &self,
        kind: &KindRef,
        namespace: Option<&str>,
        name: &str,
    ) -> LookupResult<DynamicObject> {
        self.objects
            .iter()
            .find(|obj| {
                kind_ref_of(obj).as_ref() == Some(kind)
                    && obj.name_any() == name
                    && match namespace {
                        Some(ns) => obj.namespace().as_deref() == Some(ns),
                        None => true,
                    }
            })
            .cloned()
            .ok_or_else(|| {
                LookupError::not_found(kind.to_string(), name, namespace.map(str::to_string))
            })
    }
}

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn object(
    api_version: &str,
    kind: &str,
    namespace: &str,
    name: &str,
    uid: &str,
    label_pairs: &[(&str, &str)],
    data: Value,
) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        }),
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(uid.to_string()),
            labels: Some(labels(label_pairs)),
            ..Default::default()
        },
        data,
    }
}

/// An owner reference pointing at `owner`, optionally as its controller.
pub fn owner_ref(owner: &DynamicObject, controller: bool) -> OwnerReference {
    let types = owner.types.clone().expect("fixture owner has type metadata");
    OwnerReference {
        api_version: types.api_version,
        kind: types.kind,
        name: owner.name_any(),
        uid: owner.uid().expect("fixture owner has a uid"),
        controller: controller.then_some(true),
        ..Default::default()
    }
}

pub fn owned_by(mut object: DynamicObject, refs: Vec<OwnerReference>) -> DynamicObject {
    object.metadata.owner_references = Some(refs);
    object
}

pub fn pod(namespace: &str, name: &str, uid: &str, label_pairs: &[(&str, &str)]) -> DynamicObject {
    object("v1", "Pod", namespace, name, uid, label_pairs, json!({"spec": {}}))
}

pub fn pod_with_service_account(
    namespace: &str,
    name: &str,
    uid: &str,
    label_pairs: &[(&str, &str)],
    account: &str,
) -> DynamicObject {
    object(
        "v1",
        "Pod",
        namespace,
        name,
        uid,
        label_pairs,
        json!({"spec": {"serviceAccount": account}}),
    )
}

pub fn deployment(namespace: &str, name: &str, uid: &str) -> DynamicObject {
    object("apps/v1", "Deployment", namespace, name, uid, &[], json!({"spec": {}}))
}

pub fn replica_set(
    namespace: &str,
    name: &str,
    uid: &str,
    match_labels: &[(&str, &str)],
) -> DynamicObject {
    let selector: BTreeMap<String, String> = labels(match_labels);
    object(
        "apps/v1",
        "ReplicaSet",
        namespace,
        name,
        uid,
        &[],
        json!({"spec": {"selector": {"matchLabels": selector}}}),
    )
}

pub fn service(
    namespace: &str,
    name: &str,
    uid: &str,
    selector_pairs: &[(&str, &str)],
) -> DynamicObject {
    let selector: BTreeMap<String, String> = labels(selector_pairs);
    object(
        "v1",
        "Service",
        namespace,
        name,
        uid,
        &[],
        json!({"spec": {"selector": selector}}),
    )
}

pub fn service_account(
    namespace: &str,
    name: &str,
    uid: &str,
    secret_names: &[&str],
) -> DynamicObject {
    let secrets: Vec<Value> = secret_names.iter().map(|n| json!({"name": n})).collect();
    object(
        "v1",
        "ServiceAccount",
        namespace,
        name,
        uid,
        &[],
        json!({"secrets": secrets}),
    )
}

pub fn secret(namespace: &str, name: &str, uid: &str) -> DynamicObject {
    object("v1", "Secret", namespace, name, uid, &[], json!({"type": "Opaque"}))
}

pub fn crd(name: &str, uid: &str, group: &str, kind: &str) -> DynamicObject {
    object(
        "apiextensions.k8s.io/v1",
        "CustomResourceDefinition",
        "",
        name,
        uid,
        &[],
        json!({"spec": {"group": group, "names": {"kind": kind}}}),
    )
}

pub fn widget(namespace: &str, name: &str, uid: &str) -> DynamicObject {
    object("x.io/v1", "Widget", namespace, name, uid, &[], json!({"spec": {}}))
}

/// Assert the whole-snapshot invariants: unique ids, edge closure, no
/// self-edges, and parent/target disjointness.
pub fn assert_snapshot_invariants(nodes: &[GraphNode]) {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), nodes.len(), "duplicate node ids in snapshot");

    for node in nodes {
        if let Some(parent) = &node.parent {
            assert_ne!(parent, &node.id, "node {} is its own parent", node.id);
            assert!(
                ids.contains(parent.as_str()),
                "parent {} of {} is not emitted",
                parent,
                node.id
            );
            assert!(
                !node.targets.contains(parent),
                "parent {} of {} doubles as a target",
                parent,
                node.id
            );
        }
        for target in &node.targets {
            assert_ne!(target, &node.id, "node {} targets itself", node.id);
            assert!(
                ids.contains(target.as_str()),
                "target {} of {} is not emitted",
                target,
                node.id
            );
        }
    }
}

pub fn node_by_id<'a>(nodes: &'a [GraphNode], id: &str) -> &'a GraphNode {
    nodes
        .iter()
        .find(|n| n.id == id)
        .unwrap_or_else(|| panic!("node {id} not in snapshot"))
}
