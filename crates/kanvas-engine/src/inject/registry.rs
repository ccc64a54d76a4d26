//! Attachment handler registry

use kanvas_core::Attachment;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::plugins;
use super::site::InjectionSite;

/// Where in the target document a plugin kind merges its fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// One container entry (the slot's named container, else the injection root)
    Container,
    /// The pod spec
    Pod,
    /// The document's `metadata`
    Metadata,
    /// A new document appended to the output
    Document,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Container => "container",
            Scope::Pod => "pod",
            Scope::Metadata => "metadata",
            Scope::Document => "document",
        };
        write!(f, "{}", name)
    }
}

/// Behaviour of one plugin kind
///
/// Handlers are stateless. Adding an attachment kind means registering one
/// implementation in an [`AttachmentRegistry`].
pub trait AttachmentHandler: Send + Sync {
    /// Plugin kind tag this handler serves (`PluginNode::plugin_kind`)
    fn kind(&self) -> &'static str;

    /// Where the fragment lands. The injector builds every site with this
    /// scope, and [`InjectionSite::target_mut`] resolves to it.
    fn scope(&self) -> Scope;

    /// Whether targets of this kind get their `volumes`/`volumeMounts`
    /// cleared before any injection runs
    fn resets_volumes(&self) -> bool {
        false
    }

    /// Merge this attachment's fragment into the site
    fn inject(&self, site: &mut InjectionSite<'_>, attachment: &Attachment<'_>);
}

/// Plugin kind → handler
pub struct AttachmentRegistry {
    handlers: BTreeMap<&'static str, Box<dyn AttachmentHandler>>,
}

impl AttachmentRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Registry with every built-in plugin kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(plugins::SecretRef);
        registry.register(plugins::ConfigMapRef);
        registry.register(plugins::Connection::database());
        registry.register(plugins::Connection::message_queue());
        registry.register(plugins::Storage);
        registry.register(plugins::RegistryCredential);
        registry.register(plugins::LoggingSidecar);
        registry.register(plugins::ServiceAccount);
        registry.register(plugins::Monitoring);
        registry.register(plugins::Ingress);
        registry
    }

    /// Register a handler, replacing any handler for the same kind
    pub fn register<H: AttachmentHandler + 'static>(&mut self, handler: H) -> Option<Box<dyn AttachmentHandler>> {
        self.handlers.insert(handler.kind(), Box::new(handler))
    }

    pub fn get(&self, kind: &str) -> Option<&dyn AttachmentHandler> {
        self.handlers.get(kind).map(Box::as_ref)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}

impl Default for AttachmentRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for AttachmentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl AttachmentHandler for Noop {
        fn kind(&self) -> &'static str {
            "secret"
        }

        fn scope(&self) -> Scope {
            Scope::Document
        }

        fn inject(&self, _site: &mut InjectionSite<'_>, _attachment: &Attachment<'_>) {}
    }

    #[test]
    fn test_default_kinds() {
        let registry = AttachmentRegistry::with_defaults();
        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(
            kinds,
            vec![
                "configMap",
                "database",
                "ingress",
                "logging",
                "messageQueue",
                "monitoring",
                "registry",
                "secret",
                "serviceAccount",
                "storage"
            ]
        );
    }

    #[test]
    fn test_scopes() {
        let registry = AttachmentRegistry::with_defaults();
        let scope = |kind: &str| registry.get(kind).unwrap().scope();
        assert_eq!(scope("secret"), Scope::Container);
        assert_eq!(scope("storage"), Scope::Container);
        assert_eq!(scope("registry"), Scope::Pod);
        assert_eq!(scope("logging"), Scope::Pod);
        assert_eq!(scope("monitoring"), Scope::Metadata);
        assert_eq!(scope("ingress"), Scope::Document);
        assert!(registry.get("storage").unwrap().resets_volumes());
        assert!(!registry.get("secret").unwrap().resets_volumes());
    }

    #[test]
    fn test_register_replaces_existing_kind() {
        let mut registry = AttachmentRegistry::with_defaults();
        let previous = registry.register(Noop);
        assert_eq!(previous.unwrap().scope(), Scope::Container);
        assert_eq!(registry.get("secret").unwrap().scope(), Scope::Document);
        assert!(registry.get("unknown").is_none());
    }
}
