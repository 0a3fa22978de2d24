//! Registry of manually-supplied native implementations.
//!
//! Functions declared `external` have no lowered body; the runtime
//! dispatches them to a native implementation registered here ahead of
//! code generation. The backend only needs the binding's stable identity
//! and descriptor; the callable itself is a runtime concern.

use rustc_hash::FxHashMap;

use crate::{NameHash, QualifiedName};

/// A registered native implementation for one external function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBinding {
    /// Stable dispatch identifier, deterministic across processes.
    pub id: NameHash,
    /// Call descriptor the native side was registered with.
    pub descriptor: String,
}

impl NativeBinding {
    /// Create a binding for the given qualified name and descriptor.
    pub fn new(name: &QualifiedName, descriptor: impl Into<String>) -> Self {
        Self {
            id: NameHash::of_native(&name.to_string()),
            descriptor: descriptor.into(),
        }
    }
}

/// Lookup of native bindings, keyed by qualified function name.
#[derive(Debug, Default)]
pub struct NativeRegistry {
    bindings: FxHashMap<QualifiedName, NativeBinding>,
}

impl NativeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native implementation for an external function.
    pub fn register(&mut self, name: QualifiedName, descriptor: impl Into<String>) {
        let binding = NativeBinding::new(&name, descriptor);
        self.bindings.insert(name, binding);
    }

    /// Look up the binding for an external function, if registered.
    pub fn lookup(&self, name: &QualifiedName) -> Option<&NativeBinding> {
        self.bindings.get(name)
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
