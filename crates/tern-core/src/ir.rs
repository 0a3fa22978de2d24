//! Module-level intermediate representation consumed by the backend.
//!
//! The IR is produced by the lowering stage and is read-only here: the
//! backend never mutates a [`Module`]; everything it synthesizes lives in
//! structures it owns itself.
//!
//! Contract: a module's function list always starts with its three
//! lifecycle functions, in order: [`INIT_FUNC_NAME`], [`START_FUNC_NAME`],
//! [`STOP_FUNC_NAME`]. The lowering stage guarantees this even for modules
//! with no user-declared functions.

use bitflags::bitflags;

use crate::{ModuleId, QualifiedName, SourcePos, TypeDesc};

/// Name of the per-module init lifecycle function (slot 0 of the init unit).
pub const INIT_FUNC_NAME: &str = ".<init>";
/// Name of the per-module start lifecycle function (slot 1 of the init unit).
pub const START_FUNC_NAME: &str = ".<start>";
/// Name of the per-module stop lifecycle function (slot 2 of the init unit).
pub const STOP_FUNC_NAME: &str = ".<stop>";

bitflags! {
    /// Flags on an IR function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u32 {
        /// Visible outside its module.
        const PUBLIC = 1 << 0;
        /// Declared `external`: no body, bound to a native implementation.
        const EXTERNAL = 1 << 1;
    }
}

/// A module ready for code generation.
#[derive(Debug, Clone)]
pub struct Module {
    /// Module identity.
    pub id: ModuleId,
    /// Functions, init/start/stop first.
    pub functions: Vec<Function>,
    /// Module-level variables.
    pub globals: Vec<GlobalVar>,
    /// Record and object type definitions.
    pub type_defs: Vec<TypeDef>,
    /// Module-level constants.
    pub constants: Vec<ConstDecl>,
    /// Resolved import edges (may contain duplicates; deduplicated by the
    /// backend before lifecycle sequencing).
    pub imports: Vec<ModuleId>,
    /// Whether this module declares an observable entry listener.
    pub listener_available: bool,
}

impl Module {
    /// Create an empty module shell for the given identity.
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            functions: Vec::new(),
            globals: Vec::new(),
            type_defs: Vec::new(),
            constants: Vec::new(),
            imports: Vec::new(),
            listener_available: false,
        }
    }
}

/// A lowered function.
#[derive(Debug, Clone)]
pub struct Function {
    /// Local name within the module.
    pub name: String,
    /// Parameter types.
    pub params: Vec<TypeDesc>,
    /// Return type.
    pub ret: TypeDesc,
    /// Receiver type for type-attached functions.
    pub receiver: Option<TypeDesc>,
    /// Function flags.
    pub flags: FunctionFlags,
    /// Lowered body. Empty for external functions.
    pub body: Vec<Instr>,
    /// Source position, or `None` for compiler-synthesized functions.
    pub pos: Option<SourcePos>,
}

impl Function {
    /// Create a function with an empty nil-returning signature.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret: TypeDesc::Nil,
            receiver: None,
            flags: FunctionFlags::empty(),
            body: Vec::new(),
            pos: None,
        }
    }

    /// Set the source position.
    pub fn at(mut self, pos: SourcePos) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: Vec<Instr>) -> Self {
        self.body = body;
        self
    }

    /// Whether this function is bound to a native implementation.
    pub fn is_external(&self) -> bool {
        self.flags.contains(FunctionFlags::EXTERNAL)
    }
}

/// A module-level variable.
#[derive(Debug, Clone)]
pub struct GlobalVar {
    /// Local name within the module.
    pub name: String,
    /// Variable type.
    pub ty: TypeDesc,
    /// Declaration position, or `None` if synthesized.
    pub pos: Option<SourcePos>,
}

/// A record or object type definition.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Local type name.
    pub name: String,
    /// Field layout.
    pub fields: Vec<Field>,
    /// Functions attached to this type.
    pub attached: Vec<Function>,
    /// Whether this is a class-like type (attached functions are emitted
    /// into the type's own code unit).
    pub is_class: bool,
    /// Declaration position.
    pub pos: Option<SourcePos>,
}

/// A field of a type definition.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: TypeDesc,
}

/// A module-level constant.
#[derive(Debug, Clone)]
pub struct ConstDecl {
    /// Local name within the module.
    pub name: String,
    /// Constant type.
    pub ty: TypeDesc,
    /// Resolved value.
    pub value: ConstValue,
    /// Declaration position.
    pub pos: Option<SourcePos>,
}

/// A resolved constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// Nil.
    Nil,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
}

/// A lowered instruction.
///
/// This is the exhaustive set of instruction kinds the encoder handles;
/// adding a variant without a matching encoder arm is a compile error.
/// Jump targets are indices into the containing body's instruction list.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Push nil.
    ConstNil,
    /// Push a boolean.
    ConstBool(bool),
    /// Push an integer.
    ConstInt(i64),
    /// Push a float.
    ConstFloat(f64),
    /// Push a string.
    ConstStr(String),
    /// Load a local variable slot.
    LoadLocal(u16),
    /// Store to a local variable slot.
    StoreLocal(u16),
    /// Load a module-level variable.
    LoadGlobal(QualifiedName),
    /// Store to a module-level variable.
    StoreGlobal(QualifiedName),
    /// Pop the top of stack.
    Pop,
    /// Duplicate the top of stack.
    Dup,
    /// Add the two topmost values.
    Add,
    /// Subtract the two topmost values.
    Sub,
    /// Multiply the two topmost values.
    Mul,
    /// Divide the two topmost values.
    Div,
    /// Compare the two topmost values for equality.
    Eq,
    /// Less-than comparison.
    Lt,
    /// Logical negation of the top of stack.
    Not,
    /// Unconditional jump to an instruction index.
    Jump(usize),
    /// Pop a boolean; jump to an instruction index when it is false.
    JumpIfFalse(usize),
    /// Call a function by qualified name.
    Call {
        /// Callee.
        target: QualifiedName,
        /// Argument count.
        argc: u8,
    },
    /// Deferred invocation: schedule a call on the target runtime.
    ///
    /// Every `AsyncCall` site gets a synthesized dispatch function bound
    /// to the captured argument shape.
    AsyncCall {
        /// Callee.
        target: QualifiedName,
        /// Captured argument count.
        argc: u8,
    },
    /// Call a lifecycle function of a module's init unit by fixed slot
    /// (0 = init, 1 = start, 2 = stop).
    CallSlot {
        /// Module whose init unit is addressed.
        module: ModuleId,
        /// Member slot.
        slot: u8,
    },
    /// Enter the critical section keyed by a module's lock registry.
    AcquireLock(QualifiedName),
    /// Leave the critical section keyed by a module's lock registry.
    ReleaseLock(QualifiedName),
    /// Push a freshly created per-module lock registry.
    NewLockRegistry,
    /// Push the descriptor singleton of a module.
    ModuleDesc(ModuleId),
    /// Begin accepting external triggers on registered listeners.
    StartListen,
    /// Return with no value.
    Return,
    /// Return the top of stack.
    ReturnValue,
}
