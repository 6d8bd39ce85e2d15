use crate::LoaderError;
use std::fmt;
use tracing::{debug, warn};

/// Progress of one remote module load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    Unstarted,
    ScriptLoading,
    ScriptLoaded,
    ScopeSharing,
    ScopeInitialized,
    FactoryResolved,
    Instantiated,
    Failed,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Instantiated | LoadState::Failed)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Unstarted => write!(f, "unstarted"),
            LoadState::ScriptLoading => write!(f, "script-loading"),
            LoadState::ScriptLoaded => write!(f, "script-loaded"),
            LoadState::ScopeSharing => write!(f, "scope-sharing"),
            LoadState::ScopeInitialized => write!(f, "scope-initialized"),
            LoadState::FactoryResolved => write!(f, "factory-resolved"),
            LoadState::Instantiated => write!(f, "instantiated"),
            LoadState::Failed => write!(f, "failed"),
        }
    }
}

pub fn validate_transition(from: LoadState, to: LoadState) -> Result<(), LoaderError> {
    let valid = matches!(
        (from, to),
        (LoadState::Unstarted, LoadState::ScriptLoading)
            | (LoadState::ScriptLoading, LoadState::ScriptLoaded)
            | (LoadState::ScriptLoaded, LoadState::ScopeSharing)
            | (LoadState::ScopeSharing, LoadState::ScopeInitialized)
            | (LoadState::ScopeInitialized, LoadState::FactoryResolved)
            | (LoadState::FactoryResolved, LoadState::Instantiated)
            | (
                LoadState::ScriptLoading | LoadState::ScopeSharing,
                LoadState::Failed
            )
    );

    if valid {
        Ok(())
    } else {
        Err(LoaderError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Walks one load through the state machine, logging every step.
#[derive(Debug, Clone)]
pub struct LoadTracker {
    label: String,
    state: LoadState,
}

impl LoadTracker {
    pub fn new(scope: &str, module: &str) -> Self {
        Self {
            label: format!("{scope}:{module}"),
            state: LoadState::Unstarted,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn advance(&mut self, to: LoadState) -> Result<(), LoaderError> {
        validate_transition(self.state, to)?;
        debug!("{}: {} -> {to}", self.label, self.state);
        self.state = to;
        Ok(())
    }

    pub fn fail(&mut self, cause: &LoaderError) -> Result<(), LoaderError> {
        validate_transition(self.state, LoadState::Failed)?;
        warn!("{}: failed during {}: {cause}", self.label, self.state);
        self.state = LoadState::Failed;
        Ok(())
    }
}
