//! Bytecode operation codes.
//!
//! The instruction set of the target stack machine. Each opcode is a
//! single byte, with big-endian operands following inline. Constant-pool
//! operands are u16 indices into the containing unit's pool.

/// Bytecode operation codes.
///
/// The VM is a stack-based machine. Most operations pop operands from the
/// stack and push results back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push a constant from the pool.
    /// Operand: u16 constant index
    Constant = 0,
    /// Push nil.
    PushNil,
    /// Push boolean true.
    PushTrue,
    /// Push boolean false.
    PushFalse,
    /// Push integer 0.
    PushZero,
    /// Push integer 1.
    PushOne,

    // =========================================================================
    // Stack Operations
    // =========================================================================
    /// Pop top of stack.
    Pop,
    /// Duplicate top of stack.
    Dup,

    // =========================================================================
    // Local Variables
    // =========================================================================
    /// Load local variable.
    /// Operand: u16 slot index
    GetLocal,
    /// Store to local variable.
    /// Operand: u16 slot index
    SetLocal,

    // =========================================================================
    // Module-Level Variables
    // =========================================================================
    /// Load module-level variable.
    /// Operand: u16 constant index (GlobalRef)
    GetGlobal,
    /// Store to module-level variable.
    /// Operand: u16 constant index (GlobalRef)
    SetGlobal,

    // =========================================================================
    // Arithmetic / Comparison
    // =========================================================================
    /// Add the two topmost values.
    Add,
    /// Subtract the two topmost values.
    Sub,
    /// Multiply the two topmost values.
    Mul,
    /// Divide the two topmost values.
    Div,
    /// Equality comparison.
    Eq,
    /// Less-than comparison.
    Lt,
    /// Logical negation.
    Not,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional jump.
    /// Operand: u16 absolute code offset
    Jump,
    /// Pop a boolean; jump when false.
    /// Operand: u16 absolute code offset
    JumpIfFalse,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Call a function resolved at link time.
    /// Operands: u16 constant index (FuncRef), u8 argument count
    Call,
    /// Call a registered native implementation.
    /// Operands: u16 constant index (Int binding id), u8 argument count
    CallNative,
    /// Call a lifecycle function of an init unit by fixed member slot
    /// (0 = init, 1 = start, 2 = stop).
    /// Operands: u16 constant index (Name of the init unit), u8 slot
    CallSlot,
    /// Schedule a synthesized dispatch function on the runtime scheduler.
    /// Operands: u16 constant index (FuncRef), u8 argument count
    Schedule,

    // =========================================================================
    // Module Lifecycle
    // =========================================================================
    /// Enter the critical section keyed by a module lock registry.
    /// Operand: u16 constant index (GlobalRef of the registry)
    AcquireLock,
    /// Leave the critical section keyed by a module lock registry.
    /// Operand: u16 constant index (GlobalRef of the registry)
    ReleaseLock,
    /// Push a freshly created per-module lock registry.
    NewLockRegistry,
    /// Push the descriptor singleton of a module.
    /// Operand: u16 constant index (Module)
    ModuleDesc,
    /// Begin accepting external triggers on registered listeners.
    StartListen,

    // =========================================================================
    // Returns
    // =========================================================================
    /// Return with no value.
    Return,
    /// Return the top of stack.
    ReturnValue,
}

impl OpCode {
    /// Convert from u8, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        if value <= OpCode::ReturnValue as u8 {
            // SAFETY: OpCode is repr(u8) and we've verified the value is in range
            #[allow(unsafe_code)]
            Some(unsafe { std::mem::transmute::<u8, OpCode>(value) })
        } else {
            None
        }
    }

    /// Get the size of operands for this opcode in bytes.
    ///
    /// This does NOT include the opcode byte itself.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::PushNil
            | OpCode::PushTrue
            | OpCode::PushFalse
            | OpCode::PushZero
            | OpCode::PushOne
            | OpCode::Pop
            | OpCode::Dup
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Eq
            | OpCode::Lt
            | OpCode::Not
            | OpCode::NewLockRegistry
            | OpCode::StartListen
            | OpCode::Return
            | OpCode::ReturnValue => 0,

            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::AcquireLock
            | OpCode::ReleaseLock
            | OpCode::ModuleDesc => 2,

            OpCode::Call | OpCode::CallNative | OpCode::CallSlot | OpCode::Schedule => 3,
        }
    }

    /// Human-readable opcode name for assertions and disassembly.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "Constant",
            OpCode::PushNil => "PushNil",
            OpCode::PushTrue => "PushTrue",
            OpCode::PushFalse => "PushFalse",
            OpCode::PushZero => "PushZero",
            OpCode::PushOne => "PushOne",
            OpCode::Pop => "Pop",
            OpCode::Dup => "Dup",
            OpCode::GetLocal => "GetLocal",
            OpCode::SetLocal => "SetLocal",
            OpCode::GetGlobal => "GetGlobal",
            OpCode::SetGlobal => "SetGlobal",
            OpCode::Add => "Add",
            OpCode::Sub => "Sub",
            OpCode::Mul => "Mul",
            OpCode::Div => "Div",
            OpCode::Eq => "Eq",
            OpCode::Lt => "Lt",
            OpCode::Not => "Not",
            OpCode::Jump => "Jump",
            OpCode::JumpIfFalse => "JumpIfFalse",
            OpCode::Call => "Call",
            OpCode::CallNative => "CallNative",
            OpCode::CallSlot => "CallSlot",
            OpCode::Schedule => "Schedule",
            OpCode::AcquireLock => "AcquireLock",
            OpCode::ReleaseLock => "ReleaseLock",
            OpCode::NewLockRegistry => "NewLockRegistry",
            OpCode::ModuleDesc => "ModuleDesc",
            OpCode::StartListen => "StartListen",
            OpCode::Return => "Return",
            OpCode::ReturnValue => "ReturnValue",
        }
    }
}
