//! Runtime loading of federated remote modules.
//!
//! A page lists its remote extensions in a [`PagePayload`](modfed_schema::PagePayload).
//! [`RemoteLoader`] fetches each remote's entry script, initializes the shared
//! module scope once, resolves the exposed module from the remote's container
//! and instantiates it. Loads run concurrently and fail independently; the
//! [`PluginRegistry`] then registers the successful ones in payload order.
//!
//! Containers register themselves into an injected [`ScopeRegistry`] rather
//! than a global namespace, so several loaders can coexist in one process.

pub mod loader;
pub mod registry;
pub mod script;
pub mod share;
pub mod state;

pub use loader::{remote_url, LoadOutcome, LoadedModule, PluginRegistry, RemoteLoader};
pub use registry::{value_factory, Container, Module, ModuleFactory, ScopeRegistry, StaticContainer};
pub use script::{HttpScriptLoader, ScriptHost, ScriptLoader, StaticScriptLoader};
pub use share::{SharedProvider, ShareScope, DEFAULT_SHARE_SCOPE};
pub use state::{validate_transition, LoadState, LoadTracker};

use modfed_schema::ScopeName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to load script {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("script {url} failed to evaluate: {reason}")]
    Script { url: String, reason: String },
    #[error("no remote container registered under scope '{0}'")]
    ScopeNotFound(ScopeName),
    #[error("scope '{scope}' does not expose module '{module}'")]
    ModuleNotFound { scope: ScopeName, module: String },
    #[error("failed to initialize scope '{scope}': {reason}")]
    ScopeInit { scope: ScopeName, reason: String },
    #[error("invalid load transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl LoaderError {
    /// Failures of the remote's script itself, as opposed to scope resolution.
    pub fn is_network(&self) -> bool {
        matches!(self, LoaderError::Network { .. } | LoaderError::Script { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_scope() {
        let err = LoaderError::ModuleNotFound {
            scope: ScopeName::new("md_package"),
            module: "./extension".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "scope 'md_package' does not expose module './extension'"
        );
        assert!(!err.is_network());
    }

    #[test]
    fn network_errors_are_classified() {
        let err = LoaderError::Network {
            url: "http://localhost/x.js".to_owned(),
            reason: "connection refused".to_owned(),
        };
        assert!(err.is_network());
        assert!(err.to_string().contains("connection refused"));
    }
}
