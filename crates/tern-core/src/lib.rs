//! # Tern Core
//!
//! Shared model types for the Tern compiler backend: module identities,
//! qualified names, source spans, resolved type descriptors, the lowered
//! module IR, the diagnostic log, and the native-binding registry.
//!
//! Everything here is input or infrastructure for `tern-codegen`; nothing
//! in this crate performs code generation itself.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod diagnostics;
pub mod error;
pub mod hash;
pub mod ir;
pub mod module_id;
pub mod native;
pub mod qualified_name;
pub mod span;
pub mod types;

pub use cache::ModuleCache;
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticKind, Diagnostics};
pub use error::{CodegenError, EncodeError};
pub use hash::NameHash;
pub use ir::{
    ConstDecl, ConstValue, Field, Function, FunctionFlags, GlobalVar, Instr, Module, TypeDef,
    INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME,
};
pub use module_id::{ModuleId, ANON_ORG, TERN_ORG};
pub use native::{NativeBinding, NativeRegistry};
pub use qualified_name::QualifiedName;
pub use span::{SourcePos, Span};
pub use types::{method_descriptor, TypeDesc, TypeTag};
