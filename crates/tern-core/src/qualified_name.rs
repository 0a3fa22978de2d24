//! Module-qualified symbol names.
//!
//! Every function and global variable is addressed by a [`QualifiedName`]:
//! the identity of its defining module plus its local name. The linker
//! keys its lookup tables on these.

use std::fmt;

use crate::ModuleId;

/// A module-qualified symbol name.
///
/// Type-attached functions use a dotted local name (`"Counter.incr"`), so
/// they never collide with module-level functions of the same simple name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// The defining module.
    pub module: ModuleId,
    /// The local symbol name within the module.
    pub local: String,
}

impl QualifiedName {
    /// Create a qualified name.
    pub fn new(module: ModuleId, local: impl Into<String>) -> Self {
        Self {
            module,
            local: local.into(),
        }
    }

    /// Qualified name of a method attached to a type.
    pub fn attached(module: ModuleId, type_name: &str, method: &str) -> Self {
        Self {
            module,
            local: format!("{type_name}.{method}"),
        }
    }

    /// The simple (unqualified) name.
    pub fn simple_name(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.local)
    }
}
