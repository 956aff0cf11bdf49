//! Kind and resource coordinates.
//!
//! A [`KindRef`] identifies a resource type by `(group, version, kind)`; a
//! [`ResourceRef`] identifies its REST-plural form by
//! `(group, version, resource)`. Both are value types, hashable by their
//! string canonicalization, and the indexer owns the mapping between them.

use std::fmt;

use kube::api::DynamicObject;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A `(group, version, kind)` coordinate. The core group is the empty
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindRef {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl KindRef {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// A coordinate in the core (empty) group.
    pub fn core(version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new("", version, kind)
    }

    /// Parse an `apiVersion` string (`"apps/v1"` or `"v1"`) plus a kind
    /// into a coordinate. This is the form carried by owner references and
    /// object type metadata.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// The `apiVersion` wire form of this coordinate.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The version-less group/kind pair used by the classifier.
    pub fn group_kind(&self) -> GroupKind {
        GroupKind {
            group: self.group.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl fmt::Display for KindRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// A `(group, version, resource)` coordinate identifying the REST-plural
/// form of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl ResourceRef {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// A version-less group/kind pair. Displays in the `Kind.group` form used
/// by error messages and CRD comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// The kind coordinate carried by an object's type metadata, if any.
pub fn kind_ref_of(object: &DynamicObject) -> Option<KindRef> {
    object
        .types
        .as_ref()
        .map(|t| KindRef::from_api_version(&t.api_version, t.kind.clone()))
}

// Built-in coordinates used by the traversal.
pub static POD: Lazy<KindRef> = Lazy::new(|| KindRef::core("v1", "Pod"));
pub static SERVICE: Lazy<KindRef> = Lazy::new(|| KindRef::core("v1", "Service"));
pub static SECRET: Lazy<KindRef> = Lazy::new(|| KindRef::core("v1", "Secret"));
pub static SERVICE_ACCOUNT: Lazy<KindRef> = Lazy::new(|| KindRef::core("v1", "ServiceAccount"));
pub static CUSTOM_RESOURCE_DEFINITION: Lazy<KindRef> =
    Lazy::new(|| KindRef::new("apiextensions.k8s.io", "v1", "CustomResourceDefinition"));

/// The CRD resource coordinate. Cluster-scoped, but admitted by the indexer
/// regardless because the classifier consults it at runtime.
pub static CUSTOM_RESOURCE_DEFINITION_RESOURCE: Lazy<ResourceRef> =
    Lazy::new(|| ResourceRef::new("apiextensions.k8s.io", "v1", "customresourcedefinitions"));

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("v1", "Pod", "", "v1")]
    #[case("apps/v1", "Deployment", "apps", "v1")]
    #[case("apiextensions.k8s.io/v1", "CustomResourceDefinition", "apiextensions.k8s.io", "v1")]
    fn parses_api_version(
        #[case] api_version: &str,
        #[case] kind: &str,
        #[case] group: &str,
        #[case] version: &str,
    ) {
        let kref = KindRef::from_api_version(api_version, kind);
        assert_eq!(kref.group, group);
        assert_eq!(kref.version, version);
        assert_eq!(kref.kind, kind);
        assert_eq!(kref.api_version(), api_version);
    }

    #[test]
    fn canonical_strings() {
        assert_eq!(POD.to_string(), "v1/Pod");
        assert_eq!(
            KindRef::new("apps", "v1", "ReplicaSet").to_string(),
            "apps/v1/ReplicaSet"
        );
        assert_eq!(
            ResourceRef::new("extensions", "v1beta1", "ingresses").to_string(),
            "extensions/v1beta1/ingresses"
        );
    }

    #[test]
    fn group_kind_display() {
        assert_eq!(POD.group_kind().to_string(), "Pod");
        assert_eq!(
            KindRef::new("x.io", "v1", "Widget").group_kind().to_string(),
            "Widget.x.io"
        );
    }

    #[test]
    fn group_kind_ignores_version() {
        let a = KindRef::new("apps", "v1", "Deployment").group_kind();
        let b = KindRef::new("apps", "v1beta2", "Deployment").group_kind();
        assert_eq!(a, b);
    }
}
