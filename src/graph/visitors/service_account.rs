//! ServiceAccount expansion: attach the secrets the account references.

use std::sync::Arc;

use kube::api::DynamicObject;
use kube::ResourceExt;

use crate::errors::GraphResult;
use crate::graph::node::GraphNode;
use crate::graph::walker::Walker;
use crate::k8s::coords::{KindRef, SECRET, SERVICE_ACCOUNT};
use crate::k8s::lister::Lister;

use super::ResourceVisitor;

/// Visits service accounts, following `secrets[*].name`.
pub struct ServiceAccountVisitor {
    lister: Arc<dyn Lister>,
}

impl ServiceAccountVisitor {
    pub fn new(lister: Arc<dyn Lister>) -> Self {
        Self { lister }
    }
}

impl ResourceVisitor for ServiceAccountVisitor {
    fn name(&self) -> &'static str {
        "ServiceAccount"
    }

    fn matches(&self, kind: &KindRef) -> bool {
        *kind == *SERVICE_ACCOUNT
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
        let Some(secrets) = object.data.get("secrets").and_then(|s| s.as_array()) else {
            return Ok(node);
        };

        for entry in secrets {
            let Some(name) = entry.get("name").and_then(|n| n.as_str()) else {
                continue;
            };

            let secret = self.lister.get(&SECRET, Some(&namespace), name)?;
            let Some(secret_uid) = secret.uid() else {
                continue;
            };

            walker.visit(false, &[secret])?;
            node.add_target(&secret_uid);
        }

        Ok(node)
    }
}
