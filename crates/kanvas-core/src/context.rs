//! Validation context
//!
//! Everything the rule engine needs from outside the graph: the target
//! Kubernetes version, the schema catalog for that version (known kinds and a
//! deprecation table) and the set of rules the user has silenced.

use once_cell::sync::Lazy;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Kubernetes minor version (`1.29`), ordered
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KubeVersion(Version);

impl KubeVersion {
    pub fn new(major: u64, minor: u64) -> Self {
        Self(Version::new(major, minor, 0))
    }

    /// Parse leniently: `1.29`, `v1.29`, `1.29.3`, `v1.29.3-gke.100`
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_start_matches('v');
        let core = trimmed
            .split(|c: char| c == '-' || c == '+')
            .next()
            .unwrap_or_default();
        let mut parts = core.split('.');

        let parse_part = |part: Option<&str>, name: &str| -> Result<u64> {
            part.ok_or_else(|| CoreError::InvalidVersion {
                input: input.to_string(),
                message: format!("missing {} component", name),
            })?
            .parse::<u64>()
            .map_err(|e| CoreError::InvalidVersion {
                input: input.to_string(),
                message: format!("invalid {} component: {}", name, e),
            })
        };

        let major = parse_part(parts.next(), "major")?;
        let minor = parse_part(parts.next(), "minor")?;
        Ok(Self::new(major, minor))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }
}

impl Default for KubeVersion {
    fn default() -> Self {
        // A recent stable release, used when no project version is configured
        Self::new(1, 29)
    }
}

impl fmt::Display for KubeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.major, self.0.minor)
    }
}

impl FromStr for KubeVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for KubeVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KubeVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // An unquoted `1.30` reaches us as the float 1.3; refuse rather than guess
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        let text = match raw {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => {
                return Err(serde::de::Error::custom(format!(
                    "version {} must be a quoted string (e.g. \"1.30\"), unquoted numbers lose trailing zeros",
                    n
                )));
            }
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a version string, got {:?}",
                    other
                )));
            }
        };
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Group/version/kind triple. The core group is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` (`apps/v1`, `v1`) and pair it with a kind
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// Render as an `apiVersion` string
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

/// One entry of the deprecation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deprecation {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,

    /// Version in which the API was marked deprecated
    pub deprecated_in: KubeVersion,

    /// Version in which the API stopped being served
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_in: Option<KubeVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// How a deprecation applies at a given version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeprecationStatus {
    Deprecated,
    Removed,
}

impl Deprecation {
    fn entry(
        group: &str,
        version: &str,
        kind: &str,
        deprecated_in: (u64, u64),
        removed_in: (u64, u64),
        replacement: (&str, &str),
    ) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            deprecated_in: KubeVersion::new(deprecated_in.0, deprecated_in.1),
            removed_in: Some(KubeVersion::new(removed_in.0, removed_in.1)),
            replacement_group: Some(replacement.0.to_string()),
            replacement_version: Some(replacement.1.to_string()),
            note: None,
        }
    }

    pub fn matches(&self, gvk: &GroupVersionKind) -> bool {
        self.group == gvk.group && self.version == gvk.version && self.kind == gvk.kind
    }

    /// Status at `version`, or `None` if the API is still fine there
    pub fn status_at(&self, version: &KubeVersion) -> Option<DeprecationStatus> {
        if self.removed_in.as_ref().is_some_and(|removed| version >= removed) {
            Some(DeprecationStatus::Removed)
        } else if version >= &self.deprecated_in {
            Some(DeprecationStatus::Deprecated)
        } else {
            None
        }
    }

    /// Replacement apiVersion, if the table names one
    pub fn replacement_api_version(&self) -> Option<String> {
        let version = self.replacement_version.as_ref()?;
        Some(match self.replacement_group.as_deref() {
            Some(group) if !group.is_empty() => format!("{}/{}", group, version),
            _ => version.clone(),
        })
    }
}

/// Well-known upstream API removals, used when the catalog has no table
pub static BUILTIN_DEPRECATIONS: Lazy<Vec<Deprecation>> = Lazy::new(|| {
    vec![
        Deprecation::entry("extensions", "v1beta1", "Deployment", (1, 9), (1, 16), ("apps", "v1")),
        Deprecation::entry("extensions", "v1beta1", "DaemonSet", (1, 9), (1, 16), ("apps", "v1")),
        Deprecation::entry("extensions", "v1beta1", "ReplicaSet", (1, 9), (1, 16), ("apps", "v1")),
        Deprecation::entry("apps", "v1beta1", "Deployment", (1, 9), (1, 16), ("apps", "v1")),
        Deprecation::entry("apps", "v1beta2", "Deployment", (1, 9), (1, 16), ("apps", "v1")),
        Deprecation::entry("apps", "v1beta1", "StatefulSet", (1, 9), (1, 16), ("apps", "v1")),
        Deprecation::entry("apps", "v1beta2", "StatefulSet", (1, 9), (1, 16), ("apps", "v1")),
        Deprecation::entry("extensions", "v1beta1", "Ingress", (1, 14), (1, 22), ("networking.k8s.io", "v1")),
        Deprecation::entry("networking.k8s.io", "v1beta1", "Ingress", (1, 19), (1, 22), ("networking.k8s.io", "v1")),
        Deprecation::entry("rbac.authorization.k8s.io", "v1beta1", "Role", (1, 17), (1, 22), ("rbac.authorization.k8s.io", "v1")),
        Deprecation::entry("rbac.authorization.k8s.io", "v1beta1", "ClusterRole", (1, 17), (1, 22), ("rbac.authorization.k8s.io", "v1")),
        Deprecation::entry("batch", "v1beta1", "CronJob", (1, 21), (1, 25), ("batch", "v1")),
        Deprecation::entry("policy", "v1beta1", "PodDisruptionBudget", (1, 21), (1, 25), ("policy", "v1")),
        Deprecation::entry("autoscaling", "v2beta1", "HorizontalPodAutoscaler", (1, 22), (1, 25), ("autoscaling", "v2")),
        Deprecation::entry("autoscaling", "v2beta2", "HorizontalPodAutoscaler", (1, 23), (1, 26), ("autoscaling", "v2")),
        Deprecation::entry("flowcontrol.apiserver.k8s.io", "v1beta2", "FlowSchema", (1, 26), (1, 29), ("flowcontrol.apiserver.k8s.io", "v1")),
        Deprecation {
            note: Some("PodSecurityPolicy was removed; use Pod Security Admission".to_string()),
            replacement_group: None,
            replacement_version: None,
            ..Deprecation::entry("policy", "v1beta1", "PodSecurityPolicy", (1, 21), (1, 25), ("", ""))
        },
    ]
});

/// What the schema provider knows about one target version
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCatalog {
    /// Version this catalog describes, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<KubeVersion>,

    /// Kinds served by that version
    #[serde(default)]
    pub kinds: Vec<GroupVersionKind>,

    #[serde(default)]
    pub deprecations: Vec<Deprecation>,
}

impl SchemaCatalog {
    /// Load a catalog from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn knows(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds.contains(gvk)
    }

    /// Known triples that share the kind (e.g. other versions of `Ingress`)
    pub fn versions_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a GroupVersionKind> {
        self.kinds.iter().filter(move |k| k.kind == kind)
    }
}

/// Everything a validation pass reads besides the graph
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Target Kubernetes version of the project
    pub project_version: KubeVersion,

    /// Schema catalog for the target version, if the host has one loaded
    pub catalog: Option<SchemaCatalog>,

    /// Rules silenced by the user, by rule id
    pub ignored_rules: BTreeSet<String>,
}

impl ValidationContext {
    pub fn new(project_version: KubeVersion) -> Self {
        Self {
            project_version,
            ..Default::default()
        }
    }

    pub fn with_catalog(mut self, catalog: SchemaCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn ignore_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.ignored_rules.insert(rule_id.into());
        self
    }

    pub fn is_ignored(&self, rule_id: &str) -> bool {
        self.ignored_rules.contains(rule_id)
    }

    /// The deprecation table in effect: the catalog's, or the built-in one
    pub fn deprecations(&self) -> &[Deprecation] {
        match &self.catalog {
            Some(catalog) if !catalog.deprecations.is_empty() => catalog.deprecations.as_slice(),
            _ => BUILTIN_DEPRECATIONS.as_slice(),
        }
    }

    /// Deprecation entry matching a triple
    pub fn deprecation_for(&self, gvk: &GroupVersionKind) -> Option<&Deprecation> {
        self.deprecations().iter().find(|d| d.matches(gvk))
    }
}
