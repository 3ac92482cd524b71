//! Page-lifetime holder that constructs the registry at most once.

use crate::registry::{RegistryOptions, ScriptRegistry};
use crate::types::{RawScript, RegistryResult};

/// Owns the page's one registry. The first `init` wins; later calls hand
/// back the existing instance and ignore their arguments.
#[derive(Debug, Default)]
pub struct RegistrySlot {
    registry: Option<ScriptRegistry>,
}

impl RegistrySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(
        &mut self,
        scripts: impl IntoIterator<Item = RawScript>,
        options: RegistryOptions,
    ) -> RegistryResult<&mut ScriptRegistry> {
        match self.registry {
            Some(ref mut registry) => {
                tracing::debug!(target: "descript", "registry already initialized, ignoring configuration");
                Ok(registry)
            }
            None => Ok(self.registry.insert(ScriptRegistry::new(scripts, options)?)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.is_some()
    }

    pub fn get(&self) -> Option<&ScriptRegistry> {
        self.registry.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut ScriptRegistry> {
        self.registry.as_mut()
    }
}
