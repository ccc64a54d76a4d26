//! Built-in attachment handlers

use kanvas_core::values::deep_merge;
use kanvas_core::{Attachment, PluginNode};
use serde_json::{json, Map, Value as JsonValue};

use super::registry::{AttachmentHandler, Scope};
use super::site::{upsert_entry, InjectionSite};

/// `secret`: `envFrom[].secretRef` on the container
#[derive(Debug, Default, Clone, Copy)]
pub struct SecretRef;

impl AttachmentHandler for SecretRef {
    fn kind(&self) -> &'static str {
        "secret"
    }

    fn scope(&self) -> Scope {
        Scope::Container
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let Some(name) = config_name(attachment.plugin, &["secretName", "name"]) else {
            skip(attachment, "secretName");
            return;
        };
        upsert_entry(site.target_mut(), "envFrom", json!({"secretRef": {"name": name}}));
    }
}

/// `configMap`: `envFrom[].configMapRef`, or a volume plus a mount when
/// `mountType` is `volume`
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigMapRef;

impl AttachmentHandler for ConfigMapRef {
    fn kind(&self) -> &'static str {
        "configMap"
    }

    fn scope(&self) -> Scope {
        Scope::Container
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let plugin = attachment.plugin;
        let Some(name) = config_name(plugin, &["name", "configMapName"]) else {
            skip(attachment, "name");
            return;
        };

        if plugin.config_str("mountType") != Some("volume") {
            upsert_entry(site.target_mut(), "envFrom", json!({"configMapRef": {"name": name}}));
            return;
        }

        let volume = format!("{}-volume", name);
        let mount_path = plugin
            .config_str("mountPath")
            .map(str::to_string)
            .unwrap_or_else(|| format!("/etc/config/{}", name));
        upsert_entry(
            site.pod_spec_mut(),
            "volumes",
            json!({"name": volume, "configMap": {"name": name}}),
        );
        upsert_entry(
            site.target_mut(),
            "volumeMounts",
            json!({"name": volume, "mountPath": mount_path, "readOnly": true}),
        );
    }
}

/// `database` and `messageQueue`: connection settings as `env[]` entries
#[derive(Debug, Clone, Copy)]
pub struct Connection {
    kind: &'static str,
    default_prefix: &'static str,
    default_engine: &'static str,
    with_database_name: bool,
}

impl Connection {
    pub fn database() -> Self {
        Self {
            kind: "database",
            default_prefix: "DB",
            default_engine: "postgres",
            with_database_name: true,
        }
    }

    pub fn message_queue() -> Self {
        Self {
            kind: "messageQueue",
            default_prefix: "MQ",
            default_engine: "rabbitmq",
            with_database_name: false,
        }
    }
}

fn default_port(engine: &str) -> Option<u64> {
    let port = match engine.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => 5432,
        "mysql" | "mariadb" => 3306,
        "mongodb" | "mongo" => 27017,
        "redis" => 6379,
        "rabbitmq" | "amqp" => 5672,
        "kafka" => 9092,
        "nats" => 4222,
        _ => return None,
    };
    Some(port)
}

impl AttachmentHandler for Connection {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn scope(&self) -> Scope {
        Scope::Container
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let plugin = attachment.plugin;
        let prefix = plugin.config_str("envPrefix").unwrap_or(self.default_prefix);
        let engine = plugin.config_str("engine").unwrap_or(self.default_engine);
        let var = |suffix: &str| format!("{}_{}", prefix, suffix);

        let mut entries = vec![json!({
            "name": var("HOST"),
            "value": plugin.config_str("host").unwrap_or("localhost"),
        })];
        if let Some(port) = plugin.config_u64("port").or_else(|| default_port(engine)) {
            entries.push(json!({"name": var("PORT"), "value": port.to_string()}));
        }
        if self.with_database_name {
            if let Some(db) = plugin.config_str("databaseName") {
                entries.push(json!({"name": var("NAME"), "value": db}));
            }
        }
        if let Some(user) = plugin.config_str("username") {
            entries.push(json!({"name": var("USER"), "value": user}));
        }
        if let Some(secret) = plugin.config_str("secretName") {
            let key = plugin.config_str("passwordKey").unwrap_or("password");
            entries.push(json!({
                "name": var("PASSWORD"),
                "valueFrom": {"secretKeyRef": {"name": secret, "key": key}},
            }));
        }

        let container = site.target_mut();
        for entry in entries {
            upsert_entry(container, "env", entry);
        }
    }
}

/// `storage`: a pod volume and a container mount. Targets are cleared of
/// earlier volumes first so the live edges alone decide what is mounted.
#[derive(Debug, Default, Clone, Copy)]
pub struct Storage;

impl AttachmentHandler for Storage {
    fn kind(&self) -> &'static str {
        "storage"
    }

    fn scope(&self) -> Scope {
        Scope::Container
    }

    fn resets_volumes(&self) -> bool {
        true
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let plugin = attachment.plugin;
        let volume = config_name(plugin, &["volumeName", "name"])
            .unwrap_or_else(|| format!("data-{}", attachment.plugin_id));

        let source = if plugin.config_str("storageType") == Some("emptyDir") {
            json!({"name": volume, "emptyDir": {}})
        } else {
            let claim = config_name(plugin, &["claimName", "name"]).unwrap_or_else(|| volume.clone());
            json!({"name": volume, "persistentVolumeClaim": {"claimName": claim}})
        };

        let mut mount = Map::new();
        mount.insert("name".into(), JsonValue::String(volume.clone()));
        mount.insert(
            "mountPath".into(),
            JsonValue::String(plugin.config_str("mountPath").unwrap_or("/data").to_string()),
        );
        if plugin.config_bool("readOnly") == Some(true) {
            mount.insert("readOnly".into(), JsonValue::Bool(true));
        }

        upsert_entry(site.pod_spec_mut(), "volumes", source);
        upsert_entry(site.target_mut(), "volumeMounts", JsonValue::Object(mount));
    }
}

/// `registry`: `imagePullSecrets[]` on the pod
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryCredential;

impl AttachmentHandler for RegistryCredential {
    fn kind(&self) -> &'static str {
        "registry"
    }

    fn scope(&self) -> Scope {
        Scope::Pod
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let Some(name) = config_name(attachment.plugin, &["secretName", "name"]) else {
            skip(attachment, "secretName");
            return;
        };
        upsert_entry(site.target_mut(), "imagePullSecrets", json!({"name": name}));
    }
}

const LOG_VOLUME: &str = "app-logs";

/// `logging`: a log shipper sidecar sharing an `emptyDir` with the app
/// container
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSidecar;

impl AttachmentHandler for LoggingSidecar {
    fn kind(&self) -> &'static str {
        "logging"
    }

    fn scope(&self) -> Scope {
        Scope::Pod
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let plugin = attachment.plugin;
        let image = plugin.config_str("image").unwrap_or("fluent/fluent-bit:2.2");
        let log_path = plugin.config_str("logPath").unwrap_or("/var/log/app");
        let name = plugin.config_str("name").unwrap_or("log-shipper");

        // Resolve the app container before the sidecar joins the list
        let app = site.app_container_path();
        upsert_entry(
            site.at_mut(&app),
            "volumeMounts",
            json!({"name": LOG_VOLUME, "mountPath": log_path}),
        );

        let pod = site.target_mut();
        upsert_entry(pod, "volumes", json!({"name": LOG_VOLUME, "emptyDir": {}}));
        upsert_entry(
            pod,
            "containers",
            json!({
                "name": name,
                "image": image,
                "volumeMounts": [{"name": LOG_VOLUME, "mountPath": log_path, "readOnly": true}],
            }),
        );
    }
}

/// `serviceAccount`: `serviceAccountName` on the pod
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceAccount;

impl AttachmentHandler for ServiceAccount {
    fn kind(&self) -> &'static str {
        "serviceAccount"
    }

    fn scope(&self) -> Scope {
        Scope::Pod
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let Some(name) = config_name(attachment.plugin, &["name", "serviceAccountName"]) else {
            skip(attachment, "name");
            return;
        };
        if let Some(pod) = site.target_mut().as_object_mut() {
            pod.insert("serviceAccountName".into(), JsonValue::String(name));
        }
    }
}

/// `monitoring`: Prometheus scrape annotations
#[derive(Debug, Default, Clone, Copy)]
pub struct Monitoring;

impl AttachmentHandler for Monitoring {
    fn kind(&self) -> &'static str {
        "monitoring"
    }

    fn scope(&self) -> Scope {
        Scope::Metadata
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let plugin = attachment.plugin;
        let mut annotations = Map::new();
        let scrape = plugin.config_bool("scrape").unwrap_or(true);
        annotations.insert("prometheus.io/scrape".into(), JsonValue::String(scrape.to_string()));
        if let Some(port) = plugin.config_u64("port") {
            annotations.insert("prometheus.io/port".into(), JsonValue::String(port.to_string()));
        }
        annotations.insert(
            "prometheus.io/path".into(),
            JsonValue::String(plugin.config_str("path").unwrap_or("/metrics").to_string()),
        );

        deep_merge(
            site.target_mut(),
            &json!({"annotations": JsonValue::Object(annotations)}),
        );
    }
}

/// `ingress`: a separate `networking.k8s.io/v1` Ingress routing to the target
#[derive(Debug, Default, Clone, Copy)]
pub struct Ingress;

impl AttachmentHandler for Ingress {
    fn kind(&self) -> &'static str {
        "ingress"
    }

    fn scope(&self) -> Scope {
        Scope::Document
    }

    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>) {
        let plugin = attachment.plugin;
        let target = site.target_name().unwrap_or(site.target_id()).to_string();
        let name = plugin
            .config_str("name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-ingress", target));
        let service = plugin.config_str("serviceName").unwrap_or(&target).to_string();
        let port = plugin.config_u64("servicePort").unwrap_or(80);

        let mut metadata = Map::new();
        metadata.insert("name".into(), JsonValue::String(name));
        if let Some(namespace) = site.target_namespace() {
            metadata.insert("namespace".into(), JsonValue::String(namespace.to_string()));
        }

        let mut rule = Map::new();
        if let Some(host) = plugin.config_str("host") {
            rule.insert("host".into(), JsonValue::String(host.to_string()));
        }
        rule.insert(
            "http".into(),
            json!({"paths": [{
                "path": plugin.config_str("path").unwrap_or("/"),
                "pathType": plugin.config_str("pathType").unwrap_or("Prefix"),
                "backend": {"service": {"name": service, "port": {"number": port}}},
            }]}),
        );

        let mut spec = Map::new();
        if let Some(class) = plugin.config_str("ingressClassName") {
            spec.insert("ingressClassName".into(), JsonValue::String(class.to_string()));
        }
        if let Some(secret) = plugin.config_str("tlsSecret") {
            let mut tls = Map::new();
            if let Some(host) = plugin.config_str("host") {
                tls.insert("hosts".into(), json!([host]));
            }
            tls.insert("secretName".into(), JsonValue::String(secret.to_string()));
            spec.insert("tls".into(), JsonValue::Array(vec![JsonValue::Object(tls)]));
        }
        spec.insert("rules".into(), JsonValue::Array(vec![JsonValue::Object(rule)]));

        site.emit(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": metadata,
            "spec": spec,
        }));
    }
}

/// First non-empty string among `keys`
fn config_name(plugin: &PluginNode, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| plugin.config_str(key))
        .map(str::to_string)
}

fn skip(attachment: &Attachment<'_>, missing: &str) {
    tracing::debug!(
        plugin = attachment.plugin_id,
        kind = %attachment.plugin.plugin_kind,
        missing,
        "plugin config incomplete, nothing injected"
    );
}
