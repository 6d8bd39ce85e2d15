use crate::share::ShareScope;
use crate::LoaderError;
use async_trait::async_trait;
use modfed_schema::{ModuleName, ScopeName};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// A live module instance.
pub type Module = Arc<dyn Any + Send + Sync>;

/// Produces the module exposed under one path of a container.
pub type ModuleFactory = Arc<dyn Fn() -> Module + Send + Sync>;

/// Factory that hands out clones of `value`.
pub fn value_factory<T: Any + Send + Sync + Clone>(value: T) -> ModuleFactory {
    Arc::new(move || Arc::new(value.clone()) as Module)
}

/// The entry point of a loaded remote.
#[async_trait]
pub trait Container: Send + Sync {
    /// Join `scope`, offering this remote's shared modules. Called once per
    /// load, so it runs again for every remote that reuses the container.
    async fn init(&self, scope: &ShareScope) -> Result<(), LoaderError>;

    async fn get(&self, module: &str) -> Option<ModuleFactory>;
}

/// Map-backed container.
pub struct StaticContainer {
    scope: ScopeName,
    modules: BTreeMap<String, ModuleFactory>,
    shared: Vec<(ModuleName, Option<String>)>,
    init_failure: Option<String>,
    init_calls: AtomicUsize,
}

impl StaticContainer {
    pub fn new(scope: impl Into<ScopeName>) -> Self {
        Self {
            scope: scope.into(),
            modules: BTreeMap::new(),
            shared: Vec::new(),
            init_failure: None,
            init_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_module(mut self, path: impl Into<String>, factory: ModuleFactory) -> Self {
        self.modules.insert(path.into(), factory);
        self
    }

    /// Offer `module` at `version` to every share scope this container joins.
    #[must_use]
    pub fn with_shared(mut self, module: impl Into<ModuleName>, version: Option<&str>) -> Self {
        self.shared.push((module.into(), version.map(str::to_owned)));
        self
    }

    /// Make every `init` call fail with `reason`.
    #[must_use]
    pub fn with_init_failure(mut self, reason: impl Into<String>) -> Self {
        self.init_failure = Some(reason.into());
        self
    }

    pub fn scope(&self) -> &ScopeName {
        &self.scope
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Container for StaticContainer {
    async fn init(&self, scope: &ShareScope) -> Result<(), LoaderError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref reason) = self.init_failure {
            return Err(LoaderError::ScopeInit {
                scope: self.scope.clone(),
                reason: reason.clone(),
            });
        }
        for (module, version) in &self.shared {
            scope.provide(module.clone(), version.clone(), &self.scope);
        }
        Ok(())
    }

    async fn get(&self, module: &str) -> Option<ModuleFactory> {
        self.modules.get(module).cloned()
    }
}

/// Loaded remote containers, keyed by scope name.
///
/// Scripts register their container here as a side effect of evaluation; the
/// loader looks it up once the script has loaded.
#[derive(Default)]
pub struct ScopeRegistry {
    containers: RwLock<HashMap<ScopeName, Arc<dyn Container>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `container` under `scope`, returning the container it replaced.
    pub fn register(
        &self,
        scope: impl Into<ScopeName>,
        container: Arc<dyn Container>,
    ) -> Option<Arc<dyn Container>> {
        let scope = scope.into();
        debug!("registering container for scope '{scope}'");
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope, container)
    }

    pub fn lookup(&self, scope: &str) -> Result<Arc<dyn Container>, LoaderError> {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
            .ok_or_else(|| LoaderError::ScopeNotFound(ScopeName::new(scope)))
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(scope)
    }

    /// Registered scope names, sorted.
    pub fn scopes(&self) -> Vec<ScopeName> {
        let mut scopes: Vec<ScopeName> = self
            .containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        scopes.sort();
        scopes
    }

    pub fn len(&self) -> usize {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
