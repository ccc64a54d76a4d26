//! Project configuration
//!
//! Stored next to the graph snapshot as `kanvas.yaml`:
//!
//! ```yaml
//! apiVersion: kanvas.io/v1
//! projectVersion: "1.29"
//! schema: schemas/v1.29.yaml
//! ignoredRules:
//!   - default-namespace
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::context::{KubeVersion, SchemaCatalog, ValidationContext};
use crate::error::{CoreError, Result};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "kanvas.yaml";

/// Project configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Target Kubernetes version
    #[serde(default)]
    pub project_version: KubeVersion,

    /// Schema catalog file, relative to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,

    /// Rules silenced for this project
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_rules: Vec<String>,
}

fn default_api_version() -> String {
    "kanvas.io/v1".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            project_version: KubeVersion::default(),
            schema: None,
            ignored_rules: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Load `kanvas.yaml` from a directory, or defaults when it is absent
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// A relative `schema` path is rebased onto the config file's directory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;

        if config.api_version != default_api_version() {
            return Err(CoreError::InvalidConfig {
                message: format!(
                    "unsupported apiVersion '{}' in {} (expected {})",
                    config.api_version,
                    path.display(),
                    default_api_version()
                ),
            });
        }

        if let (Some(schema), Some(parent)) = (&config.schema, path.parent()) {
            if schema.is_relative() {
                config.schema = Some(parent.join(schema));
            }
        }
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build the validation context this configuration describes,
    /// loading the schema catalog if one is configured
    pub fn validation_context(&self) -> Result<ValidationContext> {
        let mut ctx = ValidationContext::new(self.project_version.clone());
        if let Some(schema) = &self.schema {
            ctx = ctx.with_catalog(SchemaCatalog::from_file(schema)?);
        }
        for rule in &self.ignored_rules {
            ctx = ctx.ignore_rule(rule.clone());
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::discover(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = ProjectConfig {
            project_version: KubeVersion::new(1, 30),
            ignored_rules: vec!["default-namespace".to_string()],
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = ProjectConfig::discover(dir.path()).unwrap();
        assert_eq!(loaded.project_version, KubeVersion::new(1, 30));
        assert_eq!(loaded.ignored_rules, vec!["default-namespace"]);
    }

    #[test]
    fn test_schema_path_is_relative_to_config() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("schemas")).unwrap();
        std::fs::write(
            dir.path().join("schemas/catalog.yaml"),
            "kinds:\n  - { group: apps, version: v1, kind: Deployment }\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "projectVersion: \"1.28\"\nschema: schemas/catalog.yaml\nignoredRules: [hardcoded-replicas]\n",
        )
        .unwrap();

        let config = ProjectConfig::discover(dir.path()).unwrap();
        assert_eq!(config.schema, Some(dir.path().join("schemas/catalog.yaml")));

        let ctx = config.validation_context().unwrap();
        assert_eq!(ctx.project_version, KubeVersion::new(1, 28));
        assert_eq!(ctx.catalog.unwrap().kinds.len(), 1);
        assert!(ctx.ignored_rules.contains("hardcoded-replicas"));
    }

    #[test]
    fn test_rejects_unquoted_project_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "projectVersion: 1.30\n").unwrap();
        let err = ProjectConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("must be a quoted string"), "{}", err);
    }

    #[test]
    fn test_rejects_unknown_api_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "apiVersion: kanvas.io/v9\n").unwrap();
        let err = ProjectConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported apiVersion"));
    }
}
