//! Code unit model.
//!
//! A code unit is one emittable binary blob: a named, class-like container
//! of functions. Unit names derive deterministically from the module
//! identity plus a source file name, a synthetic bucket index, or an
//! owning type name.

use tern_core::{Function, ModuleId};

/// File suffix of an encoded binary unit in the artifact.
pub const UNIT_FILE_SUFFIX: &str = ".tbu";

/// Basename of a module's entry/init unit.
pub const INIT_UNIT_BASENAME: &str = "$init";

/// Basename prefix of synthetic buckets for positionless functions.
pub const BUCKET_BASENAME: &str = "$gen";

/// Basename prefix of units holding a type's attached functions.
pub const TYPE_UNIT_BASENAME: &str = "$value";

/// What role a unit plays in the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// The module's entry/init unit. Its first three functions are always
    /// init, start, stop, in that order.
    Init,
    /// One unit per source file, holding that file's functions.
    SourceFile,
    /// A capacity-bounded synthetic bucket for positionless functions.
    Bucket,
    /// A unit holding the functions attached to one class-like type.
    TypeValue,
}

/// An emittable code unit.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    /// Deterministic unit name.
    pub name: String,
    /// Role of this unit.
    pub kind: UnitKind,
    /// Member functions, in emission order.
    pub functions: Vec<Function>,
    /// Static initializer run once at unit load, if any.
    pub static_init: Option<Function>,
}

impl CodeUnit {
    /// Create an empty unit.
    pub fn new(name: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            kind,
            functions: Vec::new(),
            static_init: None,
        }
    }

    /// Create a module's init unit with its three fixed-order members.
    ///
    /// The list is constructed in final order up front; nothing is ever
    /// inserted before these three.
    pub fn init_unit(name: impl Into<String>, init: Function, start: Function, stop: Function) -> Self {
        Self {
            name: name.into(),
            kind: UnitKind::Init,
            functions: vec![init, start, stop],
            static_init: None,
        }
    }

    /// Append a member function.
    pub fn push(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Number of member functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the unit has no member functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// The unit-name prefix of a module: `org/name/version/`.
pub fn module_prefix(id: &ModuleId) -> String {
    format!("{}/{}/{}/", id.org, id.name, id.version)
}

/// Name of a module's entry/init unit.
pub fn init_unit_name(id: &ModuleId) -> String {
    format!("{}{}", module_prefix(id), INIT_UNIT_BASENAME)
}

/// Name of the nth synthetic bucket unit.
pub fn bucket_unit_name(id: &ModuleId, bucket: usize) -> String {
    format!("{}{}{}", module_prefix(id), BUCKET_BASENAME, bucket)
}

/// Name of the unit holding a type's attached functions.
pub fn type_unit_name(id: &ModuleId, type_name: &str) -> String {
    format!("{}{}${}", module_prefix(id), TYPE_UNIT_BASENAME, type_name)
}

/// Name of the unit holding one source file's functions.
pub fn source_unit_name(id: &ModuleId, file: &str) -> String {
    format!("{}{}", module_prefix(id), clean_source_name(file))
}

/// Strip directory components and the source extension from a file name.
///
/// `pkg/orders.tern` and `orders.tern` both map to `orders`, so the unit
/// name never depends on where the build ran from.
pub fn clean_source_name(file: &str) -> String {
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
    base.strip_suffix(".tern").unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_core::{INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME};

    fn module_id() -> ModuleId {
        ModuleId::new("orgX", "mod", "1.0.0")
    }

    #[test]
    fn unit_names() {
        let id = module_id();
        assert_eq!(init_unit_name(&id), "orgX/mod/1.0.0/$init");
        assert_eq!(bucket_unit_name(&id, 2), "orgX/mod/1.0.0/$gen2");
        assert_eq!(type_unit_name(&id, "Counter"), "orgX/mod/1.0.0/$value$Counter");
        assert_eq!(source_unit_name(&id, "pkg/orders.tern"), "orgX/mod/1.0.0/orders");
    }

    #[test]
    fn clean_source_names() {
        assert_eq!(clean_source_name("orders.tern"), "orders");
        assert_eq!(clean_source_name("a/b/c/orders.tern"), "orders");
        assert_eq!(clean_source_name("weird"), "weird");
    }

    #[test]
    fn init_unit_fixed_order() {
        let unit = CodeUnit::init_unit(
            "u",
            Function::new(INIT_FUNC_NAME),
            Function::new(START_FUNC_NAME),
            Function::new(STOP_FUNC_NAME),
        );
        let names: Vec<_> = unit.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME]);
    }
}
