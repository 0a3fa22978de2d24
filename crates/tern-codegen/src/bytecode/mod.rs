//! Bytecode types for the target stack machine.
//!
//! - [`OpCode`]: the instruction set, one byte per opcode
//! - [`CodeChunk`]: encoded code for a single function
//! - [`ConstantPool`]: per-unit deduplicated constants

mod chunk;
mod constant;
mod opcode;

pub use chunk::CodeChunk;
pub use constant::{Constant, ConstantPool};
pub use opcode::OpCode;

/// Hard ceiling on a single method's encoded code size.
///
/// Code offsets are u16, so a body that encodes past this limit cannot be
/// addressed; the violation is caught at encode time, not pre-checked.
pub const MAX_METHOD_CODE_SIZE: usize = u16::MAX as usize;

/// Hard ceiling on a unit's total encoded size.
pub const MAX_UNIT_BYTES: usize = 1 << 20;

/// Hard ceiling on a unit's constant pool entry count (u16 indices).
pub const MAX_UNIT_CONSTANTS: usize = u16::MAX as usize;
