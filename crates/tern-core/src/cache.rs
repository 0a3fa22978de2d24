//! Cache of resolved imported modules.
//!
//! The build orchestrator compiles modules in dependency order and parks
//! each compiled module's IR here so that importers can link against it.
//! Builtin modules with purely native implementations have no IR and are
//! simply absent; their lifecycle symbols are still linkable because their
//! unit names derive deterministically from the module identity.

use rustc_hash::FxHashMap;

use crate::{Module, ModuleId};

/// Read-only lookup of previously compiled module IR, keyed by identity.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: FxHashMap<ModuleId, Module>,
}

impl ModuleCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a compiled module's IR.
    pub fn insert(&mut self, module: Module) {
        self.modules.insert(module.id.clone(), module);
    }

    /// Look up a module by identity.
    pub fn get(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// Whether the cache holds IR for the given module.
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
