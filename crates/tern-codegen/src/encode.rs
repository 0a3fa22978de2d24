//! Binary encoding of code units.
//!
//! Lowered instruction lists become stack-machine bytecode in two passes:
//! the first computes every instruction's byte offset (encoded sizes are
//! known up front), the second emits with jump targets already resolved
//! to absolute offsets. The encoded functions are then framed into the
//! unit binary format together with the unit's constant pool.
//!
//! Unresolved call targets are per-site diagnostics with a nil-push
//! placeholder; the two size-ceiling violations are recoverable errors the
//! driver turns into per-unit diagnostics. Anything else is an internal
//! inconsistency and escalates as fatal.

use tern_core::{Diagnostics, DiagnosticCode, EncodeError, Function, Instr, QualifiedName};

use crate::bytecode::{
    CodeChunk, Constant, ConstantPool, OpCode, MAX_METHOD_CODE_SIZE, MAX_UNIT_BYTES,
    MAX_UNIT_CONSTANTS,
};
use crate::lambda::LambdaTable;
use crate::link::{FunctionWrapper, LinkContext};
use crate::unit::{CodeUnit, UnitKind};

/// Magic bytes opening every encoded unit.
pub const UNIT_MAGIC: &[u8; 8] = b"TERNUNIT";

/// Version of the unit binary format.
pub const UNIT_FORMAT_VERSION: u16 = 1;

/// Encodes sealed code units against the link tables of one emission call.
#[derive(Debug)]
pub struct UnitEncoder<'a> {
    ctx: &'a LinkContext,
    lambdas: &'a LambdaTable,
}

impl<'a> UnitEncoder<'a> {
    /// Create an encoder over the given link and dispatch tables.
    pub fn new(ctx: &'a LinkContext, lambdas: &'a LambdaTable) -> Self {
        Self { ctx, lambdas }
    }

    /// Encode one unit to its binary form.
    ///
    /// Returns `MethodTooLarge` / `UnitTooLarge` when a format ceiling is
    /// violated; the caller decides how to recover. Unresolved symbols are
    /// appended to `diagnostics` and encoding continues.
    pub fn encode_unit(
        &self,
        unit: &CodeUnit,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut pool = ConstantPool::new();

        // The static initializer is framed as its own header section so
        // the member list keeps the fixed init/start/stop slot positions.
        let static_init = match &unit.static_init {
            Some(func) => Some(self.encode_entry(func, &mut pool, diagnostics)?),
            None => None,
        };
        let mut encoded: Vec<(String, String, u32, CodeChunk)> = Vec::new();
        for func in &unit.functions {
            encoded.push(self.encode_entry(func, &mut pool, diagnostics)?);
        }

        if pool.len() > MAX_UNIT_CONSTANTS {
            return Err(EncodeError::UnitTooLarge {
                unit: unit.name.clone(),
                size: pool.len(),
            });
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(UNIT_MAGIC);
        put_u16(&mut buf, UNIT_FORMAT_VERSION);
        put_str(&mut buf, &unit.name)?;
        buf.push(unit_kind_byte(unit.kind));

        put_u16(&mut buf, pool.len() as u16);
        for constant in pool.constants() {
            put_constant(&mut buf, constant)?;
        }

        match &static_init {
            Some(entry) => {
                buf.push(1);
                put_function(&mut buf, entry)?;
            }
            None => buf.push(0),
        }

        put_u16(
            &mut buf,
            u16::try_from(encoded.len()).map_err(|_| EncodeError::UnitTooLarge {
                unit: unit.name.clone(),
                size: encoded.len(),
            })?,
        );
        for entry in &encoded {
            put_function(&mut buf, entry)?;
        }

        if buf.len() > MAX_UNIT_BYTES {
            return Err(EncodeError::UnitTooLarge {
                unit: unit.name.clone(),
                size: buf.len(),
            });
        }
        Ok(buf)
    }

    fn encode_entry(
        &self,
        func: &Function,
        pool: &mut ConstantPool,
        diagnostics: &mut Diagnostics,
    ) -> Result<(String, String, u32, CodeChunk), EncodeError> {
        let chunk = self.encode_function(func, pool, diagnostics)?;
        let descriptor =
            tern_core::method_descriptor(&func.params, &func.ret, func.receiver.as_ref());
        Ok((func.name.clone(), descriptor, func.flags.bits(), chunk))
    }

    /// Encode one function body.
    pub fn encode_function(
        &self,
        func: &Function,
        pool: &mut ConstantPool,
        diagnostics: &mut Diagnostics,
    ) -> Result<CodeChunk, EncodeError> {
        // Pass one: byte offset of every instruction, plus the end offset
        // so jumps may target one past the last instruction.
        let mut offsets = Vec::with_capacity(func.body.len() + 1);
        let mut offset = 0usize;
        for instr in &func.body {
            offsets.push(offset);
            offset += self.instr_size(instr)?;
        }
        offsets.push(offset);

        let line = func.pos.as_ref().map(|p| p.span.line).unwrap_or(0);
        let mut chunk = CodeChunk::new();
        for instr in &func.body {
            self.emit(instr, func, &offsets, pool, &mut chunk, diagnostics, line)?;
        }

        if chunk.len() > MAX_METHOD_CODE_SIZE {
            return Err(EncodeError::MethodTooLarge {
                function: func.name.clone(),
                size: chunk.len(),
            });
        }
        Ok(chunk)
    }

    fn resolve_call(&self, target: &QualifiedName) -> Option<&FunctionWrapper> {
        self.ctx.lookup_function(target)
    }

    fn dispatch_for(&self, target: &QualifiedName, argc: u8) -> Result<&FunctionWrapper, EncodeError> {
        let lambda = self.lambdas.lookup(target, argc).ok_or_else(|| {
            EncodeError::Internal(format!("no dispatch function synthesized for '{target}'"))
        })?;
        self.ctx.lookup_function(lambda).ok_or_else(|| {
            EncodeError::Internal(format!("dispatch function '{lambda}' is not linked"))
        })
    }

    /// Encoded byte size of one instruction.
    ///
    /// Must agree exactly with [`Self::emit`]; jump resolution depends on it.
    fn instr_size(&self, instr: &Instr) -> Result<usize, EncodeError> {
        Ok(match instr {
            Instr::ConstNil
            | Instr::ConstBool(_)
            | Instr::Pop
            | Instr::Dup
            | Instr::Add
            | Instr::Sub
            | Instr::Mul
            | Instr::Div
            | Instr::Eq
            | Instr::Lt
            | Instr::Not
            | Instr::NewLockRegistry
            | Instr::StartListen
            | Instr::Return
            | Instr::ReturnValue => 1,
            Instr::ConstInt(0 | 1) => 1,
            Instr::ConstInt(_)
            | Instr::ConstFloat(_)
            | Instr::ConstStr(_)
            | Instr::LoadLocal(_)
            | Instr::StoreLocal(_)
            | Instr::LoadGlobal(_)
            | Instr::StoreGlobal(_)
            | Instr::Jump(_)
            | Instr::JumpIfFalse(_)
            | Instr::AcquireLock(_)
            | Instr::ReleaseLock(_)
            | Instr::ModuleDesc(_) => 3,
            // An unresolved callee encodes as a one-byte nil placeholder.
            Instr::Call { target, .. } => match self.resolve_call(target) {
                Some(_) => 4,
                None => 1,
            },
            Instr::AsyncCall { target, argc } => {
                self.dispatch_for(target, *argc)?;
                4
            }
            Instr::CallSlot { .. } => 4,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        instr: &Instr,
        func: &Function,
        offsets: &[usize],
        pool: &mut ConstantPool,
        chunk: &mut CodeChunk,
        diagnostics: &mut Diagnostics,
        line: u32,
    ) -> Result<(), EncodeError> {
        match instr {
            Instr::ConstNil => chunk.write_op(OpCode::PushNil, line),
            Instr::ConstBool(true) => chunk.write_op(OpCode::PushTrue, line),
            Instr::ConstBool(false) => chunk.write_op(OpCode::PushFalse, line),
            Instr::ConstInt(0) => chunk.write_op(OpCode::PushZero, line),
            Instr::ConstInt(1) => chunk.write_op(OpCode::PushOne, line),
            Instr::ConstInt(v) => {
                let idx = pool.add_int(*v);
                self.write_indexed(chunk, OpCode::Constant, idx, line)?;
            }
            Instr::ConstFloat(v) => {
                let idx = pool.add_float(*v);
                self.write_indexed(chunk, OpCode::Constant, idx, line)?;
            }
            Instr::ConstStr(v) => {
                let idx = pool.add_str(v.clone());
                self.write_indexed(chunk, OpCode::Constant, idx, line)?;
            }
            Instr::LoadLocal(slot) => {
                chunk.write_op(OpCode::GetLocal, line);
                chunk.write_u16(*slot, line);
            }
            Instr::StoreLocal(slot) => {
                chunk.write_op(OpCode::SetLocal, line);
                chunk.write_u16(*slot, line);
            }
            Instr::LoadGlobal(name) => {
                let idx = self.global_ref(name, pool);
                self.write_indexed(chunk, OpCode::GetGlobal, idx, line)?;
            }
            Instr::StoreGlobal(name) => {
                let idx = self.global_ref(name, pool);
                self.write_indexed(chunk, OpCode::SetGlobal, idx, line)?;
            }
            Instr::Pop => chunk.write_op(OpCode::Pop, line),
            Instr::Dup => chunk.write_op(OpCode::Dup, line),
            Instr::Add => chunk.write_op(OpCode::Add, line),
            Instr::Sub => chunk.write_op(OpCode::Sub, line),
            Instr::Mul => chunk.write_op(OpCode::Mul, line),
            Instr::Div => chunk.write_op(OpCode::Div, line),
            Instr::Eq => chunk.write_op(OpCode::Eq, line),
            Instr::Lt => chunk.write_op(OpCode::Lt, line),
            Instr::Not => chunk.write_op(OpCode::Not, line),
            Instr::Jump(target) => {
                let dest = self.jump_dest(func, offsets, *target)?;
                chunk.write_op(OpCode::Jump, line);
                chunk.write_u16(dest, line);
            }
            Instr::JumpIfFalse(target) => {
                let dest = self.jump_dest(func, offsets, *target)?;
                chunk.write_op(OpCode::JumpIfFalse, line);
                chunk.write_u16(dest, line);
            }
            Instr::Call { target, argc } => match self.resolve_call(target) {
                Some(wrapper) => match wrapper.native {
                    Some(hash) => {
                        let idx = pool.add_int(hash.value() as i64);
                        self.write_indexed(chunk, OpCode::CallNative, idx, line)?;
                        chunk.write_byte(*argc, line);
                    }
                    None => {
                        let idx = pool.add_func_ref(
                            wrapper.unit.clone(),
                            target.local.clone(),
                            wrapper.descriptor.clone(),
                        );
                        self.write_indexed(chunk, OpCode::Call, idx, line)?;
                        chunk.write_byte(*argc, line);
                    }
                },
                None => {
                    diagnostics.error(
                        func.pos.clone(),
                        DiagnosticCode::UnresolvedSymbol,
                        format!("undefined function '{target}'"),
                    );
                    chunk.write_op(OpCode::PushNil, line);
                }
            },
            Instr::AsyncCall { target, argc } => {
                let wrapper = self.dispatch_for(target, *argc)?.clone();
                let lambda = self.lambdas.lookup(target, *argc).ok_or_else(|| {
                    EncodeError::Internal(format!("no dispatch function synthesized for '{target}'"))
                })?;
                let idx =
                    pool.add_func_ref(wrapper.unit, lambda.local.clone(), wrapper.descriptor);
                self.write_indexed(chunk, OpCode::Schedule, idx, line)?;
                chunk.write_byte(*argc, line);
            }
            Instr::CallSlot { module, slot } => {
                let idx = pool.add_name(self.ctx.init_unit(module));
                self.write_indexed(chunk, OpCode::CallSlot, idx, line)?;
                chunk.write_byte(*slot, line);
            }
            Instr::AcquireLock(name) => {
                let idx = self.global_ref(name, pool);
                self.write_indexed(chunk, OpCode::AcquireLock, idx, line)?;
            }
            Instr::ReleaseLock(name) => {
                let idx = self.global_ref(name, pool);
                self.write_indexed(chunk, OpCode::ReleaseLock, idx, line)?;
            }
            Instr::NewLockRegistry => chunk.write_op(OpCode::NewLockRegistry, line),
            Instr::ModuleDesc(id) => {
                let idx = pool.add_module(id.clone());
                self.write_indexed(chunk, OpCode::ModuleDesc, idx, line)?;
            }
            Instr::StartListen => chunk.write_op(OpCode::StartListen, line),
            Instr::Return => chunk.write_op(OpCode::Return, line),
            Instr::ReturnValue => chunk.write_op(OpCode::ReturnValue, line),
        }
        Ok(())
    }

    fn global_ref(&self, name: &QualifiedName, pool: &mut ConstantPool) -> u32 {
        let unit = self.ctx.lookup_global(name);
        pool.add_global_ref(unit, name.local.clone())
    }

    fn jump_dest(&self, func: &Function, offsets: &[usize], target: usize) -> Result<u16, EncodeError> {
        let dest = *offsets.get(target).ok_or_else(|| {
            EncodeError::Internal(format!(
                "jump target {target} out of range in '{}'",
                func.name
            ))
        })?;
        // Out-of-range destinations trip the method ceiling afterwards;
        // the truncated value is never observed.
        Ok(dest as u16)
    }

    fn write_indexed(
        &self,
        chunk: &mut CodeChunk,
        op: OpCode,
        idx: u32,
        line: u32,
    ) -> Result<(), EncodeError> {
        let idx = u16::try_from(idx)
            .map_err(|_| EncodeError::Internal(format!("constant index {idx} exceeds u16")))?;
        chunk.write_op(op, line);
        chunk.write_u16(idx, line);
        Ok(())
    }
}

fn unit_kind_byte(kind: UnitKind) -> u8 {
    match kind {
        UnitKind::Init => 0,
        UnitKind::SourceFile => 1,
        UnitKind::Bucket => 2,
        UnitKind::TypeValue => 3,
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_function(
    buf: &mut Vec<u8>,
    (name, descriptor, flags, chunk): &(String, String, u32, CodeChunk),
) -> Result<(), EncodeError> {
    put_str(buf, name)?;
    put_str(buf, descriptor)?;
    put_u32(buf, *flags);
    put_u32(buf, chunk.len() as u32);
    buf.extend_from_slice(chunk.code());
    Ok(())
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<(), EncodeError> {
    let len = u16::try_from(s.len())
        .map_err(|_| EncodeError::Internal(format!("string of {} bytes in unit header", s.len())))?;
    put_u16(buf, len);
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn put_constant(buf: &mut Vec<u8>, constant: &Constant) -> Result<(), EncodeError> {
    match constant {
        Constant::Int(v) => {
            buf.push(0);
            put_u64(buf, *v as u64);
        }
        Constant::Float(v) => {
            buf.push(1);
            put_u64(buf, v.to_bits());
        }
        Constant::Str(s) => {
            buf.push(2);
            put_str(buf, s)?;
        }
        Constant::Name(s) => {
            buf.push(3);
            put_str(buf, s)?;
        }
        Constant::FuncRef {
            unit,
            name,
            descriptor,
        } => {
            buf.push(4);
            put_str(buf, unit)?;
            put_str(buf, name)?;
            put_str(buf, descriptor)?;
        }
        Constant::GlobalRef { unit, name } => {
            buf.push(5);
            put_str(buf, unit)?;
            put_str(buf, name)?;
        }
        Constant::Module(id) => {
            buf.push(6);
            put_str(buf, &id.org)?;
            put_str(buf, &id.name)?;
            put_str(buf, &id.version)?;
        }
    }
    Ok(())
}

/// A decoded unit binary, for inspection in tests and tooling.
#[derive(Debug)]
pub struct UnitImage {
    /// Unit name from the header.
    pub name: String,
    /// Format version.
    pub version: u16,
    /// Unit kind tag.
    pub kind: u8,
    /// Decoded constant pool, in index order.
    pub constants: Vec<Constant>,
    /// Static initializer from the header section, when present.
    pub static_init: Option<FunctionImage>,
    /// Decoded member functions, in emission order.
    pub functions: Vec<FunctionImage>,
}

/// One decoded function entry of a unit image.
#[derive(Debug)]
pub struct FunctionImage {
    /// Simple function name.
    pub name: String,
    /// Call descriptor.
    pub descriptor: String,
    /// Raw function flag bits.
    pub flags: u32,
    /// Encoded bytecode.
    pub code: Vec<u8>,
}

impl FunctionImage {
    /// The function's code as an inspectable chunk.
    pub fn chunk(&self) -> CodeChunk {
        CodeChunk::from_bytes(self.code.clone())
    }
}

impl UnitImage {
    /// Decode a unit binary.
    pub fn parse(bytes: &[u8]) -> Result<Self, EncodeError> {
        let mut r = Reader::new(bytes);
        if r.take(8)? != UNIT_MAGIC {
            return Err(EncodeError::Internal("bad unit magic".into()));
        }
        let version = r.u16()?;
        let name = r.str()?;
        let kind = r.u8()?;

        let pool_len = r.u16()?;
        let mut constants = Vec::with_capacity(pool_len as usize);
        for _ in 0..pool_len {
            constants.push(r.constant()?);
        }

        let static_init = match r.u8()? {
            0 => None,
            _ => Some(r.function()?),
        };

        let func_len = r.u16()?;
        let mut functions = Vec::with_capacity(func_len as usize);
        for _ in 0..func_len {
            functions.push(r.function()?);
        }

        Ok(Self {
            name,
            version,
            kind,
            constants,
            static_init,
            functions,
        })
    }

    /// Find a function entry by simple name.
    pub fn function(&self, name: &str) -> Option<&FunctionImage> {
        self.functions.iter().find(|f| f.name == name)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EncodeError> {
        let end = self
            .off
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| EncodeError::Internal("truncated unit image".into()))?;
        let slice = &self.buf[self.off..end];
        self.off = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, EncodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, EncodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, EncodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, EncodeError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_be_bytes(arr))
    }

    fn str(&mut self) -> Result<String, EncodeError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| EncodeError::Internal("invalid utf-8 in unit image".into()))
    }

    fn function(&mut self) -> Result<FunctionImage, EncodeError> {
        let name = self.str()?;
        let descriptor = self.str()?;
        let flags = self.u32()?;
        let code_len = self.u32()? as usize;
        let code = self.take(code_len)?.to_vec();
        Ok(FunctionImage {
            name,
            descriptor,
            flags,
            code,
        })
    }

    fn constant(&mut self) -> Result<Constant, EncodeError> {
        Ok(match self.u8()? {
            0 => Constant::Int(self.u64()? as i64),
            1 => Constant::Float(f64::from_bits(self.u64()?)),
            2 => Constant::Str(self.str()?),
            3 => Constant::Name(self.str()?),
            4 => Constant::FuncRef {
                unit: self.str()?,
                name: self.str()?,
                descriptor: self.str()?,
            },
            5 => Constant::GlobalRef {
                unit: self.str()?,
                name: self.str()?,
            },
            6 => Constant::Module(tern_core::ModuleId::new(
                self.str()?,
                self.str()?,
                self.str()?,
            )),
            tag => return Err(EncodeError::Internal(format!("unknown constant tag {tag}"))),
        })
    }
}
