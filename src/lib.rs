//! # Tern
//!
//! The Tern compiler backend, as one facade crate.
//!
//! Lowered module IR goes in, binary code units come out:
//!
//! ```
//! use tern::{CodeGenerator, Diagnostics, Function, Module, ModuleCache, ModuleId, NativeRegistry};
//! use tern::{INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME};
//!
//! let mut module = Module::new(ModuleId::new("orgX", "app", "1.0.0"));
//! module.functions = vec![
//!     Function::new(INIT_FUNC_NAME),
//!     Function::new(START_FUNC_NAME),
//!     Function::new(STOP_FUNC_NAME),
//! ];
//!
//! let mut diagnostics = Diagnostics::new();
//! let artifact = CodeGenerator::default()
//!     .generate(&module, &ModuleCache::new(), &NativeRegistry::new(), &mut diagnostics)
//!     .unwrap();
//!
//! assert_eq!(artifact.entry_unit, "orgX/app/1.0.0/$init");
//! assert!(!diagnostics.has_errors());
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub use tern_core::{
    CodegenError, ConstDecl, ConstValue, Diagnostic, DiagnosticCode, DiagnosticKind, Diagnostics,
    EncodeError, Field, Function, FunctionFlags, GlobalVar, Instr, Module, ModuleCache,
    ModuleId, NameHash, NativeBinding, NativeRegistry, QualifiedName, SourcePos, Span, TypeDef,
    TypeDesc, TypeTag, INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME,
};

pub use tern_codegen::{
    runtime_entry_points, ArtifactEntry, CodeGenerator, CodegenOptions, CompiledArtifact,
    UnitImage, MODULE_INIT_WRAPPER, MODULE_START_WRAPPER, MODULE_STOP_WRAPPER, UNIT_FILE_SUFFIX,
};
