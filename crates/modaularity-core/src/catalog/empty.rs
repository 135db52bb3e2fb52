use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::module::Module;

use super::ModuleCatalog;

/// A catalog without modules. Always initialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

#[async_trait]
impl ModuleCatalog for EmptyCatalog {
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn modules(&self) -> Vec<Arc<Module>> {
        Vec::new()
    }

    fn get(&self, _name: &str, _version: &semver::Version) -> Option<Arc<Module>> {
        None
    }
}
