//! Symbol linking.
//!
//! Before any bytecode is emitted, every function and module-level
//! variable reachable from the entry module is mapped to the code unit
//! that defines it. Call sites and global accesses are encoded against
//! these tables; a miss at encode time is an unresolved-symbol
//! diagnostic, not a crash.
//!
//! Tables live in a [`LinkContext`] value owned by one emission call.
//! Nothing is cached across calls, so stale mappings from a previous
//! module cannot leak into the next.

use rustc_hash::{FxHashMap, FxHashSet};
use tern_core::{
    method_descriptor, Diagnostics, DiagnosticCode, Function, Module, ModuleCache, ModuleId,
    NameHash, NativeRegistry, QualifiedName, TypeDesc,
};

use crate::lifecycle::{
    lifecycle_globals, MODULE_INIT_WRAPPER, MODULE_START_WRAPPER, MODULE_STOP_WRAPPER,
};
use crate::split::UnitSplitter;
use crate::unit::{init_unit_name, source_unit_name, type_unit_name};

/// Link record for one resolvable function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionWrapper {
    /// Name of the code unit that defines the function.
    pub unit: String,
    /// Call descriptor derived from the function's signature.
    pub descriptor: String,
    /// Native dispatch identity, for external functions only.
    pub native: Option<NameHash>,
}

/// Symbol tables for one emission call.
#[derive(Debug, Default)]
pub struct LinkContext {
    functions: FxHashMap<QualifiedName, FunctionWrapper>,
    globals: FxHashMap<QualifiedName, String>,
    init_units: FxHashMap<ModuleId, String>,
    listeners: FxHashMap<ModuleId, bool>,
    import_edges: FxHashMap<ModuleId, Vec<ModuleId>>,
}

impl LinkContext {
    /// Link the entry module and everything it transitively imports.
    ///
    /// The entry module's functions are assigned to units through
    /// `splitter`; imported modules only contribute names, since their
    /// units were already emitted when they were compiled. Modules absent
    /// from the cache (purely native builtins) still get their lifecycle
    /// symbols registered, so generated cross-module sequencing code
    /// always resolves.
    pub fn link(
        entry: &Module,
        cache: &ModuleCache,
        natives: &NativeRegistry,
        splitter: &mut UnitSplitter,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut ctx = Self::default();
        let mut visited = FxHashSet::default();
        visited.insert(entry.id.clone());

        ctx.link_module(entry, splitter, natives, diagnostics, true);

        let imports = effective_imports(entry);
        for import in &imports {
            ctx.link_import(import, cache, natives, splitter.max_bucket_members(), &mut visited);
        }
        ctx.import_edges.insert(entry.id.clone(), imports);
        ctx
    }

    /// Look up the wrapper for a function reference.
    pub fn lookup_function(&self, name: &QualifiedName) -> Option<&FunctionWrapper> {
        self.functions.get(name)
    }

    /// Unit owning a module-level variable.
    ///
    /// Variables never explicitly mapped (synthesized flags of uncached
    /// modules included) fall back to the owning module's init unit, which
    /// is where generated code places them.
    pub fn lookup_global(&self, name: &QualifiedName) -> String {
        match self.globals.get(name) {
            Some(unit) => unit.clone(),
            None => self.init_unit(&name.module),
        }
    }

    /// The entry/init unit name of a module.
    pub fn init_unit(&self, id: &ModuleId) -> String {
        match self.init_units.get(id) {
            Some(unit) => unit.clone(),
            None => init_unit_name(id),
        }
    }

    /// Whether a module (or any module it transitively imports) declares
    /// an entry listener.
    pub fn listener_available(&self, id: &ModuleId) -> bool {
        let mut visited = FxHashSet::default();
        self.listener_available_inner(id, &mut visited)
    }

    /// Deduplicated direct imports recorded for a linked module.
    pub fn imports_of(&self, id: &ModuleId) -> &[ModuleId] {
        self.import_edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register a wrapper for a backend-generated function.
    ///
    /// Used by the lifecycle and dispatch generators, whose functions do
    /// not exist in any module's IR.
    pub fn add_generated(&mut self, name: QualifiedName, unit: String, descriptor: String) {
        self.functions.insert(
            name,
            FunctionWrapper {
                unit,
                descriptor,
                native: None,
            },
        );
    }

    fn listener_available_inner(&self, id: &ModuleId, visited: &mut FxHashSet<ModuleId>) -> bool {
        if !visited.insert(id.clone()) {
            return false;
        }
        if self.listeners.get(id).copied().unwrap_or(false) {
            return true;
        }
        let deps: Vec<ModuleId> = self.imports_of(id).to_vec();
        deps.iter()
            .any(|dep| self.listener_available_inner(dep, visited))
    }

    fn link_import(
        &mut self,
        id: &ModuleId,
        cache: &ModuleCache,
        natives: &NativeRegistry,
        max_bucket_members: usize,
        visited: &mut FxHashSet<ModuleId>,
    ) {
        if !visited.insert(id.clone()) {
            return;
        }
        match cache.get(id) {
            Some(module) => {
                let mut splitter = UnitSplitter::new(id.clone(), max_bucket_members, false);
                self.link_module(module, &mut splitter, natives, &mut Diagnostics::new(), false);
                let imports = effective_imports(module);
                for dep in &imports {
                    self.link_import(dep, cache, natives, max_bucket_members, visited);
                }
                self.import_edges.insert(id.clone(), imports);
            }
            None => {
                // Purely native builtin: no IR, but its lifecycle symbols
                // are still addressable at deterministic names.
                self.register_lifecycle_symbols(id);
            }
        }
    }

    fn link_module(
        &mut self,
        module: &Module,
        splitter: &mut UnitSplitter,
        natives: &NativeRegistry,
        diagnostics: &mut Diagnostics,
        report_externals: bool,
    ) {
        let id = module.id.clone();
        let init_unit = splitter.init_unit_name().to_string();
        self.init_units.insert(id.clone(), init_unit.clone());
        self.listeners.insert(id.clone(), module.listener_available);
        self.register_lifecycle_symbols(&id);

        let mut functions = module.functions.iter();
        if let (Some(init), Some(start), Some(stop)) =
            (functions.next(), functions.next(), functions.next())
        {
            splitter.assign_lifecycle(init, start, stop);
            for func in [init, start, stop] {
                self.insert_function(&id, func, init_unit.clone());
            }
        }
        for func in functions {
            if func.is_external() {
                self.link_external(&id, func, natives, diagnostics, report_externals);
                continue;
            }
            let unit = splitter.assign(func);
            self.insert_function(&id, func, unit);
        }

        for type_def in &module.type_defs {
            let unit = type_unit_name(&id, &type_def.name);
            for method in &type_def.attached {
                let name = QualifiedName::attached(id.clone(), &type_def.name, &method.name);
                // The receiver is implied by the owning type when the
                // lowering stage left it off.
                let receiver = method
                    .receiver
                    .clone()
                    .unwrap_or_else(|| TypeDesc::Named(type_def.name.clone()));
                let descriptor = method_descriptor(&method.params, &method.ret, Some(&receiver));
                self.functions.insert(
                    name,
                    FunctionWrapper {
                        unit: unit.clone(),
                        descriptor,
                        native: None,
                    },
                );
            }
        }

        for global in &module.globals {
            let unit = match &global.pos {
                Some(pos) => source_unit_name(&id, &pos.file),
                None => init_unit.clone(),
            };
            self.globals
                .insert(QualifiedName::new(id.clone(), global.name.clone()), unit);
        }
        // Module constants materialize as init-unit globals, installed by
        // the generated static initializer.
        for constant in &module.constants {
            self.globals.insert(
                QualifiedName::new(id.clone(), constant.name.clone()),
                init_unit.clone(),
            );
        }
    }

    fn link_external(
        &mut self,
        id: &ModuleId,
        func: &Function,
        natives: &NativeRegistry,
        diagnostics: &mut Diagnostics,
        report: bool,
    ) {
        let name = QualifiedName::new(id.clone(), func.name.clone());
        match natives.lookup(&name) {
            Some(binding) => {
                self.functions.insert(
                    name,
                    FunctionWrapper {
                        unit: self.init_unit(id),
                        descriptor: method_descriptor(&func.params, &func.ret, func.receiver.as_ref()),
                        native: Some(binding.id),
                    },
                );
            }
            None => {
                // An importer re-linking an already-compiled module must
                // not duplicate the diagnostic that module's own build
                // produced.
                if report {
                    diagnostics.error(
                        func.pos.clone(),
                        DiagnosticCode::InvalidExternalBinding,
                        format!("no native implementation registered for external function '{name}'"),
                    );
                }
            }
        }
    }

    fn insert_function(&mut self, id: &ModuleId, func: &Function, unit: String) {
        let name = QualifiedName::new(id.clone(), func.name.clone());
        let descriptor = method_descriptor(&func.params, &func.ret, func.receiver.as_ref());
        self.functions.insert(
            name,
            FunctionWrapper {
                unit,
                descriptor,
                native: None,
            },
        );
    }

    fn register_lifecycle_symbols(&mut self, id: &ModuleId) {
        let init_unit = self.init_unit(id);
        let descriptor = method_descriptor(&[], &TypeDesc::Nil, None);
        for wrapper in [MODULE_INIT_WRAPPER, MODULE_START_WRAPPER, MODULE_STOP_WRAPPER] {
            self.functions.insert(
                QualifiedName::new(id.clone(), wrapper.to_string()),
                FunctionWrapper {
                    unit: init_unit.clone(),
                    descriptor: descriptor.clone(),
                    native: None,
                },
            );
        }
        for global in lifecycle_globals() {
            self.globals.insert(
                QualifiedName::new(id.clone(), global.to_string()),
                init_unit.clone(),
            );
        }
    }
}

/// The implicit builtin imports of a module.
///
/// Every module depends on `tern/lang.annotations`. The builtin `lang.*`
/// modules stop there; everything else also pulls in the core value,
/// error, and future modules the generated lifecycle code relies on.
pub fn builtin_imports(id: &ModuleId) -> Vec<ModuleId> {
    let mut imports = vec![ModuleId::lang("annotations")];
    if !id.is_lang_module() {
        imports.push(ModuleId::lang("value"));
        imports.push(ModuleId::lang("error"));
        imports.push(ModuleId::lang("future"));
    }
    imports
}

/// Deduplicate import edges, preserving first-occurrence order.
pub fn dedup_imports(imports: &[ModuleId]) -> Vec<ModuleId> {
    let mut seen = FxHashSet::default();
    imports
        .iter()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}

/// The full deduplicated direct-import list of a module: builtins first,
/// then declared imports, with self-edges dropped.
pub fn effective_imports(module: &Module) -> Vec<ModuleId> {
    let mut all = builtin_imports(&module.id);
    all.extend(module.imports.iter().cloned());
    dedup_imports(&all)
        .into_iter()
        .filter(|id| *id != module.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_core::{FunctionFlags, SourcePos, Span, INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME};

    fn module_with_functions(id: ModuleId, extra: Vec<Function>) -> Module {
        let mut module = Module::new(id);
        module.functions = vec![
            Function::new(INIT_FUNC_NAME),
            Function::new(START_FUNC_NAME),
            Function::new(STOP_FUNC_NAME),
        ];
        module.functions.extend(extra);
        module
    }

    fn link_entry(entry: &Module, cache: &ModuleCache, natives: &NativeRegistry) -> (LinkContext, Diagnostics) {
        let mut splitter = UnitSplitter::new(entry.id.clone(), 100, true);
        let mut diagnostics = Diagnostics::new();
        let ctx = LinkContext::link(entry, cache, natives, &mut splitter, &mut diagnostics);
        (ctx, diagnostics)
    }

    #[test]
    fn links_entry_functions() {
        let id = ModuleId::new("orgX", "mod", "1.0.0");
        let f = Function::new("frob").at(SourcePos::new("orders.tern", Span::new(3, 1, 0)));
        let entry = module_with_functions(id.clone(), vec![f]);

        let (ctx, diagnostics) = link_entry(&entry, &ModuleCache::new(), &NativeRegistry::new());
        assert!(!diagnostics.has_errors());

        let wrapper = ctx
            .lookup_function(&QualifiedName::new(id.clone(), "frob"))
            .unwrap();
        assert_eq!(wrapper.unit, "orgX/mod/1.0.0/orders");
        assert_eq!(wrapper.descriptor, "()N");

        let init = ctx
            .lookup_function(&QualifiedName::new(id, INIT_FUNC_NAME))
            .unwrap();
        assert_eq!(init.unit, "orgX/mod/1.0.0/$init");
    }

    #[test]
    fn links_transitive_imports() {
        let a = ModuleId::new("orgX", "a", "1.0.0");
        let b = ModuleId::new("orgX", "b", "1.0.0");
        let c = ModuleId::new("orgX", "c", "1.0.0");

        let mut mod_b = module_with_functions(b.clone(), vec![Function::new("fromB")]);
        mod_b.imports.push(c.clone());
        let mod_c = module_with_functions(c.clone(), vec![Function::new("fromC")]);

        let mut cache = ModuleCache::new();
        cache.insert(mod_b);
        cache.insert(mod_c);

        let mut entry = module_with_functions(a, vec![]);
        entry.imports.push(b.clone());

        let (ctx, _) = link_entry(&entry, &cache, &NativeRegistry::new());

        // b reachable directly, c only through b.
        assert!(ctx.lookup_function(&QualifiedName::new(b, "fromB")).is_some());
        assert!(ctx.lookup_function(&QualifiedName::new(c, "fromC")).is_some());
    }

    #[test]
    fn uncached_import_still_links_lifecycle_symbols() {
        let id = ModuleId::new("orgX", "mod", "1.0.0");
        let entry = module_with_functions(id, vec![]);
        let (ctx, _) = link_entry(&entry, &ModuleCache::new(), &NativeRegistry::new());

        // lang.value is never in the cache, but its start wrapper must
        // resolve for generated sequencing code.
        let lang_value = ModuleId::lang("value");
        let wrapper = ctx
            .lookup_function(&QualifiedName::new(lang_value.clone(), MODULE_START_WRAPPER))
            .unwrap();
        assert_eq!(wrapper.unit, init_unit_name(&lang_value));
    }

    #[test]
    fn external_without_binding_is_diagnosed_and_unlinked() {
        let id = ModuleId::new("orgX", "mod", "1.0.0");
        let mut ext = Function::new("now");
        ext.flags |= FunctionFlags::EXTERNAL;
        let entry = module_with_functions(id.clone(), vec![ext]);

        let (ctx, diagnostics) = link_entry(&entry, &ModuleCache::new(), &NativeRegistry::new());

        assert_eq!(diagnostics.error_count(), 1);
        let diag = diagnostics.errors().next().unwrap();
        assert_eq!(diag.code, DiagnosticCode::InvalidExternalBinding);
        assert!(ctx.lookup_function(&QualifiedName::new(id, "now")).is_none());
    }

    #[test]
    fn external_with_binding_links_native_identity() {
        let id = ModuleId::new("orgX", "mod", "1.0.0");
        let mut ext = Function::new("now");
        ext.flags |= FunctionFlags::EXTERNAL;
        ext.ret = TypeDesc::Int;
        let entry = module_with_functions(id.clone(), vec![ext]);

        let name = QualifiedName::new(id, "now");
        let mut natives = NativeRegistry::new();
        natives.register(name.clone(), "()I");

        let (ctx, diagnostics) = link_entry(&entry, &ModuleCache::new(), &natives);
        assert!(!diagnostics.has_errors());

        let wrapper = ctx.lookup_function(&name).unwrap();
        assert_eq!(wrapper.native, Some(NameHash::of_native(&name.to_string())));
        assert_eq!(wrapper.descriptor, "()I");
    }

    #[test]
    fn attached_methods_link_into_type_unit() {
        let id = ModuleId::new("orgX", "mod", "1.0.0");
        let mut entry = module_with_functions(id.clone(), vec![]);
        let mut incr = Function::new("incr");
        incr.receiver = Some(TypeDesc::Named("Counter".into()));
        entry.type_defs.push(tern_core::TypeDef {
            name: "Counter".into(),
            fields: Vec::new(),
            attached: vec![incr],
            is_class: true,
            pos: None,
        });

        let (ctx, _) = link_entry(&entry, &ModuleCache::new(), &NativeRegistry::new());
        let wrapper = ctx
            .lookup_function(&QualifiedName::attached(id, "Counter", "incr"))
            .unwrap();
        assert_eq!(wrapper.unit, "orgX/mod/1.0.0/$value$Counter");
        assert_eq!(wrapper.descriptor, "(LCounter;)N");
    }

    #[test]
    fn global_lookup_falls_back_to_init_unit() {
        let id = ModuleId::new("orgX", "mod", "1.0.0");
        let entry = module_with_functions(id.clone(), vec![]);
        let (ctx, _) = link_entry(&entry, &ModuleCache::new(), &NativeRegistry::new());

        let unmapped = QualifiedName::new(id, "$moduleStarted");
        assert_eq!(ctx.lookup_global(&unmapped), "orgX/mod/1.0.0/$init");
    }

    #[test]
    fn builtin_import_cascade() {
        let lang = ModuleId::lang("value");
        assert_eq!(builtin_imports(&lang), vec![ModuleId::lang("annotations")]);

        let user = ModuleId::new("orgX", "mod", "1.0.0");
        let imports = builtin_imports(&user);
        assert_eq!(imports.len(), 4);
        assert_eq!(imports[0], ModuleId::lang("annotations"));
    }

    #[test]
    fn import_dedup_preserves_first_occurrence() {
        let a = ModuleId::new("orgX", "a", "1.0.0");
        let b = ModuleId::new("orgX", "b", "1.0.0");
        let deduped = dedup_imports(&[a.clone(), b.clone(), a.clone()]);
        assert_eq!(deduped, vec![a, b]);
    }

    #[test]
    fn effective_imports_drop_self_edge() {
        let id = ModuleId::new("orgX", "mod", "1.0.0");
        let mut module = Module::new(id.clone());
        module.imports.push(id.clone());
        assert!(!effective_imports(&module).contains(&id));
    }

    #[test]
    fn listener_availability_is_transitive() {
        let a = ModuleId::new("orgX", "a", "1.0.0");
        let b = ModuleId::new("orgX", "b", "1.0.0");

        let mut dep = module_with_functions(b.clone(), vec![]);
        dep.listener_available = true;
        let mut cache = ModuleCache::new();
        cache.insert(dep);

        let mut entry = module_with_functions(a.clone(), vec![]);
        entry.imports.push(b);

        let (ctx, _) = link_entry(&entry, &cache, &NativeRegistry::new());
        assert!(ctx.listener_available(&a));
    }
}
