use modfed_schema::{ModuleName, SharedModuleTable};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::OnceCell;
use tracing::debug;

/// Name of the share scope every remote joins.
pub const DEFAULT_SHARE_SCOPE: &str = "default";

/// One copy of a shared module offered to the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedProvider {
    pub version: Option<String>,
    pub from: String,
}

/// A named pool of shared modules that the host and every remote contribute to.
///
/// The host's sharing policy is installed once by [`ShareScope::init_sharing`];
/// every remote calls it before initializing its container, so concurrent
/// first use must not initialize twice.
#[derive(Debug)]
pub struct ShareScope {
    name: String,
    host: String,
    policy: OnceCell<SharedModuleTable>,
    initializations: AtomicUsize,
    providers: RwLock<BTreeMap<ModuleName, Vec<SharedProvider>>>,
}

impl ShareScope {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            policy: OnceCell::new(),
            initializations: AtomicUsize::new(0),
            providers: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install the host's shared modules. Only the first call has any effect;
    /// later and concurrent calls wait for it and return the same policy.
    pub async fn init_sharing(&self, host_table: &SharedModuleTable) -> &SharedModuleTable {
        self.policy
            .get_or_init(|| async {
                self.initializations.fetch_add(1, Ordering::SeqCst);
                for (module, entry) in host_table {
                    self.provide(module.clone(), entry.required_version.clone(), &self.host);
                }
                debug!(
                    "share scope '{}' initialized with {} host modules",
                    self.name,
                    host_table.len()
                );
                host_table.clone()
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.policy.initialized()
    }

    /// Number of effective initializations; never more than one.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> Option<&SharedModuleTable> {
        self.policy.get()
    }

    /// Offer a copy of `module`. The first provider of a given version is kept;
    /// returns `false` when that version was already provided.
    pub fn provide(
        &self,
        module: impl Into<ModuleName>,
        version: Option<String>,
        from: &str,
    ) -> bool {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let offered = providers.entry(module.into()).or_default();
        if offered.iter().any(|p| p.version == version) {
            return false;
        }
        offered.push(SharedProvider {
            version,
            from: from.to_owned(),
        });
        true
    }

    /// Providers of `module` in the order they joined the scope.
    pub fn providers(&self, module: &str) -> Vec<SharedProvider> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module)
            .cloned()
            .unwrap_or_default()
    }

    /// The copy a consumer of `module` receives: singletons always get the
    /// first provider, which is the host whenever the host shares the module.
    pub fn resolve(&self, module: &str) -> Option<SharedProvider> {
        self.providers(module).into_iter().next()
    }
}

impl Default for ShareScope {
    fn default() -> Self {
        Self::new(DEFAULT_SHARE_SCOPE, "host")
    }
}
