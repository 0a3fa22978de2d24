//! Constant pool for encoded code units.
//!
//! Every code unit carries its own pool: the values its bytecode
//! references by index: literals, resolved function references, global
//! references, unit names, and module descriptors.

use rustc_hash::FxHashMap;
use tern_core::ModuleId;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Raw string literal bytes.
    Str(String),
    /// A bare name (unit names for slot calls).
    Name(String),
    /// A link-resolved function reference.
    FuncRef {
        /// Name of the unit that defines the function.
        unit: String,
        /// Simple function name within the unit.
        name: String,
        /// Call descriptor.
        descriptor: String,
    },
    /// A link-resolved module-level variable reference.
    GlobalRef {
        /// Name of the unit that owns the variable.
        unit: String,
        /// Variable name.
        name: String,
    },
    /// A module descriptor singleton.
    Module(ModuleId),
}

/// Key for constant deduplication (hashable version of Constant).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int(i64),
    Float(u64), // Bit pattern for hashing
    Str(String),
    Name(String),
    FuncRef(String, String, String),
    GlobalRef(String, String),
    Module(ModuleId),
}

/// Unit-level constant pool with deduplication.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// The actual constants.
    constants: Vec<Constant>,
    /// Deduplication index: maps constant to its index.
    index: FxHashMap<ConstantKey, u32>,
}

impl ConstantPool {
    /// Create a new empty constant pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get existing constant, returns index.
    ///
    /// Deduplicates identical constants.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = Self::to_key(&constant);

        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    /// Add an integer constant.
    pub fn add_int(&mut self, value: i64) -> u32 {
        self.add(Constant::Int(value))
    }

    /// Add a float constant.
    pub fn add_float(&mut self, value: f64) -> u32 {
        self.add(Constant::Float(value))
    }

    /// Add a string constant.
    pub fn add_str(&mut self, value: impl Into<String>) -> u32 {
        self.add(Constant::Str(value.into()))
    }

    /// Add a bare name constant.
    pub fn add_name(&mut self, name: impl Into<String>) -> u32 {
        self.add(Constant::Name(name.into()))
    }

    /// Add a resolved function reference.
    pub fn add_func_ref(
        &mut self,
        unit: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> u32 {
        self.add(Constant::FuncRef {
            unit: unit.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        })
    }

    /// Add a resolved global reference.
    pub fn add_global_ref(&mut self, unit: impl Into<String>, name: impl Into<String>) -> u32 {
        self.add(Constant::GlobalRef {
            unit: unit.into(),
            name: name.into(),
        })
    }

    /// Add a module descriptor.
    pub fn add_module(&mut self, id: ModuleId) -> u32 {
        self.add(Constant::Module(id))
    }

    /// Get constant by index.
    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    /// Get all constants (for serialization).
    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// Number of constants.
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Convert a Constant to its hashable key representation.
    fn to_key(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Int(v) => ConstantKey::Int(*v),
            Constant::Float(v) => ConstantKey::Float(v.to_bits()),
            Constant::Str(s) => ConstantKey::Str(s.clone()),
            Constant::Name(s) => ConstantKey::Name(s.clone()),
            Constant::FuncRef {
                unit,
                name,
                descriptor,
            } => ConstantKey::FuncRef(unit.clone(), name.clone(), descriptor.clone()),
            Constant::GlobalRef { unit, name } => {
                ConstantKey::GlobalRef(unit.clone(), name.clone())
            }
            Constant::Module(id) => ConstantKey::Module(id.clone()),
        }
    }
}
