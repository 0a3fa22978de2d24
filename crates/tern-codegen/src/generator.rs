//! The emission driver.
//!
//! One [`CodeGenerator::generate`] call takes a lowered module plus its
//! resolved import cache and produces the module's complete artifact:
//! link → lifecycle synthesis → dispatch synthesis → unit sealing →
//! per-unit encoding. All link state lives and dies inside the call.

use tern_core::{
    CodegenError, Diagnostics, DiagnosticCode, EncodeError, Module, ModuleCache, NativeRegistry,
    QualifiedName, SourcePos, TypeDesc,
};

use crate::artifact::{ArtifactEntry, CompiledArtifact};
use crate::encode::UnitEncoder;
use crate::lambda::LambdaGen;
use crate::lifecycle::{
    LifecycleGen, MODULE_INIT_WRAPPER, MODULE_START_WRAPPER, MODULE_STOP_WRAPPER,
};
use crate::link::LinkContext;
use crate::split::UnitSplitter;
use crate::unit::{type_unit_name, CodeUnit, UnitKind};

/// Tunables of one code generator.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Register the management stop callback during module start.
    pub remote_mgmt_enabled: bool,
    /// Member ceiling of synthetic bucket units.
    pub max_bucket_members: usize,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            remote_mgmt_enabled: false,
            max_bucket_members: 100,
        }
    }
}

/// Lowers modules into binary code-unit artifacts.
#[derive(Debug, Default)]
pub struct CodeGenerator {
    options: CodegenOptions,
}

impl CodeGenerator {
    /// Create a generator with the given options.
    pub fn new(options: CodegenOptions) -> Self {
        Self { options }
    }

    /// Generate the complete artifact for one module.
    ///
    /// Recoverable problems (unresolved symbols, missing native bindings,
    /// size-ceiling violations) are appended to `diagnostics`; the
    /// artifact is still produced, with empty placeholder entries for
    /// units that failed to encode. Internal inconsistencies abort the
    /// call with a fatal [`CodegenError`].
    pub fn generate(
        &self,
        module: &Module,
        cache: &ModuleCache,
        natives: &NativeRegistry,
        diagnostics: &mut Diagnostics,
    ) -> Result<CompiledArtifact, CodegenError> {
        let mut splitter =
            UnitSplitter::new(module.id.clone(), self.options.max_bucket_members, true);
        let mut ctx = LinkContext::link(module, cache, natives, &mut splitter, diagnostics);

        let imports = ctx.imports_of(&module.id).to_vec();
        let listener = ctx.listener_available(&module.id);
        let lifecycle = LifecycleGen::new(
            module,
            &imports,
            listener,
            self.options.remote_mgmt_enabled,
        )
        .generate();

        // Dispatch synthesis sees every body that can carry a deferred
        // call site, and must run before buckets seal.
        let mut lambdas = LambdaGen::new(module.id.clone());
        for func in &module.functions {
            lambdas.scan(func, &mut splitter, &mut ctx);
        }
        for type_def in &module.type_defs {
            for method in &type_def.attached {
                lambdas.scan(method, &mut splitter, &mut ctx);
            }
        }
        for func in [&lifecycle.init, &lifecycle.start, &lifecycle.stop] {
            lambdas.scan(func, &mut splitter, &mut ctx);
        }
        let lambda_table = lambdas.finish();

        splitter.set_static_init(lifecycle.static_init);
        for func in [&lifecycle.init, &lifecycle.start, &lifecycle.stop] {
            splitter.pin_to_init(func);
        }

        let entry_unit = splitter.init_unit_name().to_string();
        let mut units = splitter.finish();
        units.extend(type_units(module));

        let encoder = UnitEncoder::new(&ctx, &lambda_table);
        let mut entries = Vec::with_capacity(units.len());
        for unit in &units {
            match encoder.encode_unit(unit, diagnostics) {
                Ok(bytes) => entries.push(ArtifactEntry::new(&unit.name, bytes)),
                Err(err @ EncodeError::MethodTooLarge { .. })
                | Err(err @ EncodeError::UnitTooLarge { .. }) => {
                    let (code, pos) = attribute_failure(&err, unit);
                    diagnostics.error(pos, code, err.to_string());
                    entries.push(ArtifactEntry::new(&unit.name, Vec::new()));
                }
                Err(err) => return Err(CodegenError::Encode(err)),
            }
        }

        Ok(CompiledArtifact {
            entry_unit,
            entries,
        })
    }
}

/// Sequencing wrappers the runtime invokes on the entry module, in call
/// order: init, start, stop.
pub fn runtime_entry_points(module: &Module) -> [QualifiedName; 3] {
    [
        QualifiedName::new(module.id.clone(), MODULE_INIT_WRAPPER),
        QualifiedName::new(module.id.clone(), MODULE_START_WRAPPER),
        QualifiedName::new(module.id.clone(), MODULE_STOP_WRAPPER),
    ]
}

fn type_units(module: &Module) -> Vec<CodeUnit> {
    let mut units = Vec::new();
    for type_def in &module.type_defs {
        if !type_def.is_class || type_def.attached.is_empty() {
            continue;
        }
        let mut unit = CodeUnit::new(
            type_unit_name(&module.id, &type_def.name),
            UnitKind::TypeValue,
        );
        for method in &type_def.attached {
            let mut method = method.clone();
            if method.receiver.is_none() {
                method.receiver = Some(TypeDesc::Named(type_def.name.clone()));
            }
            unit.push(method);
        }
        units.push(unit);
    }
    units
}

fn attribute_failure(err: &EncodeError, unit: &CodeUnit) -> (DiagnosticCode, Option<SourcePos>) {
    match err {
        EncodeError::MethodTooLarge { function, .. } => {
            let pos = unit
                .functions
                .iter()
                .find(|f| &f.name == function)
                .and_then(|f| f.pos.clone());
            (DiagnosticCode::MethodTooLarge, pos)
        }
        _ => (DiagnosticCode::UnitTooLarge, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_core::{Function, Instr, ModuleId, INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME};

    use crate::encode::UnitImage;

    fn minimal_module(id: ModuleId) -> Module {
        let mut module = Module::new(id);
        module.functions = vec![
            Function::new(INIT_FUNC_NAME),
            Function::new(START_FUNC_NAME),
            Function::new(STOP_FUNC_NAME),
        ];
        module
    }

    #[test]
    fn minimal_module_produces_init_unit() {
        let module = minimal_module(ModuleId::new("orgX", "mod", "1.0.0"));
        let mut diagnostics = Diagnostics::new();
        let artifact = CodeGenerator::default()
            .generate(
                &module,
                &ModuleCache::new(),
                &NativeRegistry::new(),
                &mut diagnostics,
            )
            .unwrap();

        assert!(!diagnostics.has_errors());
        assert_eq!(artifact.entry_unit, "orgX/mod/1.0.0/$init");

        let entry_points = runtime_entry_points(&module);
        assert_eq!(entry_points[0].local, MODULE_INIT_WRAPPER);
        assert_eq!(entry_points[1].local, MODULE_START_WRAPPER);

        let init = artifact.entry(&artifact.entry_unit).unwrap();
        let image = UnitImage::parse(&init.bytes).unwrap();

        // The three fixed slots lead the member list; the static
        // initializer rides in its own header section.
        let cinit = image.static_init.as_ref().unwrap();
        assert_eq!(cinit.name, crate::lifecycle::STATIC_INIT_NAME);
        let names: Vec<_> = image.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(&names[0..3], &[INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME]);
        assert!(names.contains(&MODULE_START_WRAPPER));
        assert!(names.contains(&MODULE_STOP_WRAPPER));
    }

    #[test]
    fn class_types_get_their_own_units() {
        let mut module = minimal_module(ModuleId::new("orgX", "mod", "1.0.0"));
        let mut incr = Function::new("incr");
        incr.body = vec![Instr::Return];
        module.type_defs.push(tern_core::TypeDef {
            name: "Counter".into(),
            fields: Vec::new(),
            attached: vec![incr],
            is_class: true,
            pos: None,
        });

        let mut diagnostics = Diagnostics::new();
        let artifact = CodeGenerator::default()
            .generate(
                &module,
                &ModuleCache::new(),
                &NativeRegistry::new(),
                &mut diagnostics,
            )
            .unwrap();

        let unit = artifact.entry("orgX/mod/1.0.0/$value$Counter").unwrap();
        let image = UnitImage::parse(&unit.bytes).unwrap();
        let method = image.function("incr").unwrap();
        // Attached methods carry their receiver in the descriptor.
        assert_eq!(method.descriptor, "(LCounter;)N");
    }

    #[test]
    fn oversized_function_yields_placeholder_and_diagnostic() {
        let mut module = minimal_module(ModuleId::new("orgX", "mod", "1.0.0"));
        let mut body = vec![Instr::ConstInt(9); 22_000];
        body.push(Instr::Return);
        module.functions.push(
            Function::new("huge")
                .at(SourcePos::new("big.tern", tern_core::Span::new(10, 1, 0)))
                .with_body(body),
        );
        module.functions.push(
            Function::new("fine")
                .at(SourcePos::new("ok.tern", tern_core::Span::new(1, 1, 0)))
                .with_body(vec![Instr::Return]),
        );

        let mut diagnostics = Diagnostics::new();
        let artifact = CodeGenerator::default()
            .generate(
                &module,
                &ModuleCache::new(),
                &NativeRegistry::new(),
                &mut diagnostics,
            )
            .unwrap();

        assert_eq!(diagnostics.error_count(), 1);
        let diag = diagnostics.errors().next().unwrap();
        assert_eq!(diag.code, DiagnosticCode::MethodTooLarge);
        assert_eq!(diag.pos.as_ref().unwrap().file, "big.tern");

        // The failing unit is a placeholder; the healthy one is intact.
        assert!(artifact.entry("orgX/mod/1.0.0/big").unwrap().is_placeholder());
        assert!(!artifact.entry("orgX/mod/1.0.0/ok").unwrap().is_placeholder());
        assert!(!artifact.entry(&artifact.entry_unit).unwrap().is_placeholder());
    }

    #[test]
    fn remote_mgmt_synthesizes_stop_dispatch() {
        let module = minimal_module(ModuleId::new("orgX", "mod", "1.0.0"));
        let mut diagnostics = Diagnostics::new();
        let generator = CodeGenerator::new(CodegenOptions {
            remote_mgmt_enabled: true,
            ..CodegenOptions::default()
        });
        let artifact = generator
            .generate(
                &module,
                &ModuleCache::new(),
                &NativeRegistry::new(),
                &mut diagnostics,
            )
            .unwrap();

        assert!(!diagnostics.has_errors());
        // The stop-callback dispatch function lands in the first bucket.
        let bucket = artifact.entry("orgX/mod/1.0.0/$gen0").unwrap();
        let image = UnitImage::parse(&bucket.bytes).unwrap();
        assert!(image.functions[0].name.starts_with("$lambda"));
    }

    #[test]
    fn generate_is_stateless_across_calls() {
        let module = minimal_module(ModuleId::new("orgX", "mod", "1.0.0"));
        let generator = CodeGenerator::default();

        let mut d1 = Diagnostics::new();
        let a1 = generator
            .generate(&module, &ModuleCache::new(), &NativeRegistry::new(), &mut d1)
            .unwrap();
        let mut d2 = Diagnostics::new();
        let a2 = generator
            .generate(&module, &ModuleCache::new(), &NativeRegistry::new(), &mut d2)
            .unwrap();

        assert_eq!(a1.len(), a2.len());
        let b1 = a1.entry(&a1.entry_unit).unwrap();
        let b2 = a2.entry(&a2.entry_unit).unwrap();
        assert_eq!(b1.bytes, b2.bytes);
    }
}
