//! # Tern Codegen
//!
//! The Tern compiler backend: lowers a module's IR into the binary code
//! units (`.tbu` files) the stack VM loads and runs.
//!
//! One [`CodeGenerator::generate`] call produces the complete artifact for
//! one module:
//!
//! 1. **Link**: build the symbol tables mapping every reachable function
//!    and module-level variable to its owning code unit, across the
//!    module's transitive imports.
//! 2. **Lifecycle synthesis**: generate the static initializer and the
//!    `$moduleInit` / `$moduleStart` / `$moduleStop` wrappers that sequence
//!    module graphs exactly once, diamond imports included.
//! 3. **Dispatch synthesis**: synthesize a dispatch function for every
//!    deferred call site before the synthetic buckets seal.
//! 4. **Encode**: emit each sealed unit to the binary format, recovering
//!    per unit from the known size-ceiling violations.
//!
//! Recoverable problems accumulate in a caller-owned
//! [`Diagnostics`](tern_core::Diagnostics) log; only internal
//! inconsistencies abort a call.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod artifact;
pub mod bytecode;
pub mod encode;
pub mod generator;
pub mod lambda;
pub mod lifecycle;
pub mod link;
pub mod split;
pub mod unit;

pub use artifact::{ArtifactEntry, CompiledArtifact};
pub use encode::{FunctionImage, UnitEncoder, UnitImage, UNIT_FORMAT_VERSION, UNIT_MAGIC};
pub use generator::{runtime_entry_points, CodeGenerator, CodegenOptions};
pub use lambda::{LambdaGen, LambdaTable};
pub use lifecycle::{
    LifecycleFns, LifecycleGen, MODULE_INIT_WRAPPER, MODULE_START_WRAPPER, MODULE_STOP_WRAPPER,
};
pub use link::{builtin_imports, dedup_imports, effective_imports, FunctionWrapper, LinkContext};
pub use split::UnitSplitter;
pub use unit::{CodeUnit, UnitKind, UNIT_FILE_SUFFIX};
