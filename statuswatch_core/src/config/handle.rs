//! Shared, atomically replaceable configuration snapshot.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::targets::Configuration;
use crate::auth::Authorizer;
use crate::error::Result;

/// A target model together with the authorizer derived from it.
///
/// Both are built together at load time so a reload swaps them as one unit.
#[derive(Debug)]
pub struct LoadedConfiguration {
    pub targets: Configuration,
    pub authorizer: Authorizer,
}

impl LoadedConfiguration {
    pub fn new(targets: Configuration) -> Self {
        let authorizer = Authorizer::from_settings(&targets.authorization);
        Self { targets, authorizer }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(Configuration::from_file(path)?))
    }
}

/// Readers clone the current `Arc` and keep using it for as long as they
/// need; a replacement never mutates a published snapshot.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<LoadedConfiguration>>>,
}

impl ConfigHandle {
    pub fn new(loaded: LoadedConfiguration) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(loaded))),
        }
    }

    pub fn current(&self) -> Arc<LoadedConfiguration> {
        Arc::clone(&self.current.read())
    }

    /// Installs a new snapshot and hands back the one it replaced.
    pub fn replace(&self, loaded: LoadedConfiguration) -> Arc<LoadedConfiguration> {
        std::mem::replace(&mut *self.current.write(), Arc::new(loaded))
    }
}
