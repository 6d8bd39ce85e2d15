use crate::registry::{Module, ModuleFactory, ScopeRegistry};
use crate::script::ScriptLoader;
use crate::share::ShareScope;
use crate::state::{LoadState, LoadTracker};
use crate::LoaderError;
use futures::future::join_all;
use modfed_schema::{PagePayload, PluginData, ScopeName, SharedModuleTable};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// A remote module that reached [`LoadState::Instantiated`].
#[derive(Clone)]
pub struct LoadedModule {
    pub scope: ScopeName,
    pub module: String,
    pub url: String,
    pub instance: Module,
}

impl LoadedModule {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref()
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("scope", &self.scope)
            .field("module", &self.module)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Result of loading one payload entry.
#[derive(Debug)]
pub struct LoadOutcome {
    pub plugin: PluginData,
    pub result: Result<LoadedModule, LoaderError>,
}

/// Absolute URL of a payload entry's remote entry script.
pub fn remote_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Loads remote modules into the running application.
pub struct RemoteLoader<S: ScriptLoader> {
    scripts: S,
    registry: Arc<ScopeRegistry>,
    share_scope: Arc<ShareScope>,
    host_shared: SharedModuleTable,
}

impl<S: ScriptLoader> RemoteLoader<S> {
    pub fn new(
        scripts: S,
        registry: Arc<ScopeRegistry>,
        share_scope: Arc<ShareScope>,
        host_shared: SharedModuleTable,
    ) -> Self {
        Self {
            scripts,
            registry,
            share_scope,
            host_shared,
        }
    }

    pub fn scripts(&self) -> &S {
        &self.scripts
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn share_scope(&self) -> &ShareScope {
        &self.share_scope
    }

    /// Load the script at `url`, join the shared scope and instantiate
    /// `module` from the container registered under `scope`.
    pub async fn load_component(
        &self,
        url: &str,
        scope: &str,
        module: &str,
    ) -> Result<LoadedModule, LoaderError> {
        let mut tracker = LoadTracker::new(scope, module);

        tracker.advance(LoadState::ScriptLoading)?;
        if let Err(e) = self.scripts.load_script(url, &self.registry).await {
            tracker.fail(&e)?;
            return Err(e);
        }
        tracker.advance(LoadState::ScriptLoaded)?;

        // Scope and module lookups fail here, while the scope is still being
        // joined, so a load never fails after ScopeInitialized.
        tracker.advance(LoadState::ScopeSharing)?;
        let factory = match self.join_scope(scope, module).await {
            Ok(factory) => factory,
            Err(e) => {
                tracker.fail(&e)?;
                return Err(e);
            }
        };
        tracker.advance(LoadState::ScopeInitialized)?;

        tracker.advance(LoadState::FactoryResolved)?;
        let instance = factory();
        tracker.advance(LoadState::Instantiated)?;

        Ok(LoadedModule {
            scope: ScopeName::new(scope),
            module: module.to_owned(),
            url: url.to_owned(),
            instance,
        })
    }

    async fn join_scope(&self, scope: &str, module: &str) -> Result<ModuleFactory, LoaderError> {
        self.share_scope.init_sharing(&self.host_shared).await;
        let container = self.registry.lookup(scope)?;
        container.init(&self.share_scope).await?;
        container
            .get(module)
            .await
            .ok_or_else(|| LoaderError::ModuleNotFound {
                scope: ScopeName::new(scope),
                module: module.to_owned(),
            })
    }

    /// Load every entry of `payload` concurrently. Outcomes come back in
    /// payload order; one failed load does not affect the others.
    pub async fn load_all(&self, base_url: &str, payload: &PagePayload) -> Vec<LoadOutcome> {
        let loads = payload.plugins().iter().map(|plugin| async move {
            let url = remote_url(base_url, &plugin.path);
            let result = self
                .load_component(&url, &plugin.name, &plugin.module)
                .await;
            LoadOutcome {
                plugin: plugin.clone(),
                result,
            }
        });
        let outcomes = join_all(loads).await;

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            "loaded {} of {} remote extensions",
            outcomes.len() - failed,
            outcomes.len()
        );
        outcomes
    }
}

/// Plugins of the running application, in activation order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<LoadedModule>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the successful loads in the order the outcomes are given and
    /// return the failures.
    pub fn register_all(&mut self, outcomes: Vec<LoadOutcome>) -> Vec<(PluginData, LoaderError)> {
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(module) => self.plugins.push(module),
                Err(e) => {
                    warn!("skipping extension '{}': {e}", outcome.plugin.name);
                    failures.push((outcome.plugin, e));
                }
            }
        }
        failures
    }

    pub fn plugins(&self) -> &[LoadedModule] {
        &self.plugins
    }

    pub fn scopes(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.scope.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
