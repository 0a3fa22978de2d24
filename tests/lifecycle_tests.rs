//! Module sequencing tests: the generated init/start/stop wrappers across
//! import graphs, decoded from the emitted init units.

use tern::{
    CodeGenerator, CodegenOptions, Diagnostics, Function, Module, ModuleCache, ModuleId,
    NativeRegistry, UnitImage, INIT_FUNC_NAME, MODULE_START_WRAPPER, MODULE_STOP_WRAPPER,
    START_FUNC_NAME, STOP_FUNC_NAME,
};
use tern_codegen::bytecode::{Constant, OpCode};

fn module_shell(id: ModuleId) -> Module {
    let mut module = Module::new(id);
    module.functions = vec![
        Function::new(INIT_FUNC_NAME),
        Function::new(START_FUNC_NAME),
        Function::new(STOP_FUNC_NAME),
    ];
    module
}

fn init_image(module: &Module, cache: &ModuleCache) -> UnitImage {
    let mut diagnostics = Diagnostics::new();
    let artifact = CodeGenerator::default()
        .generate(module, cache, &NativeRegistry::new(), &mut diagnostics)
        .unwrap();
    assert!(!diagnostics.has_errors(), "{diagnostics}");
    UnitImage::parse(&artifact.entry(&artifact.entry_unit).unwrap().bytes).unwrap()
}

/// Call targets referenced by one decoded function, in pool order.
fn called_units(image: &UnitImage, wrapper: &str) -> Vec<(String, String)> {
    let func = image.function(wrapper).unwrap();
    let chunk = func.chunk();
    let mut calls = Vec::new();
    let mut offset = 0;
    while offset < chunk.len() {
        let op = chunk.read_op(offset).unwrap();
        if op == OpCode::Call {
            let idx = chunk.read_u16(offset + 1).unwrap();
            if let Some(Constant::FuncRef { unit, name, .. }) = image.constants.get(idx as usize) {
                calls.push((unit.clone(), name.clone()));
            }
        }
        offset += 1 + op.operand_size();
    }
    calls
}

/// The start wrapper checks and flips its attempted flag inside the lock
/// registry's critical section before touching any import.
#[test]
fn start_wrapper_is_guarded() {
    let module = module_shell(ModuleId::new("orgX", "app", "1.0.0"));
    let image = init_image(&module, &ModuleCache::new());

    let start = image.function(MODULE_START_WRAPPER).unwrap().chunk();
    start.assert_contains_opcodes(&[
        OpCode::AcquireLock,
        OpCode::GetGlobal,
        OpCode::JumpIfFalse,
        OpCode::ReleaseLock,
        OpCode::Return,
        OpCode::SetGlobal,
        OpCode::ReleaseLock,
    ]);
}

/// In a diamond (app -> left, right; both -> shared) each module's start
/// wrapper delegates to its direct imports exactly once; the shared
/// module's own guard makes the second arrival a no-op.
#[test]
fn diamond_start_delegates_once_per_edge() {
    let shared = ModuleId::new("orgX", "shared", "1.0.0");
    let left = ModuleId::new("orgX", "left", "1.0.0");
    let right = ModuleId::new("orgX", "right", "1.0.0");
    let app = ModuleId::new("orgX", "app", "1.0.0");

    let mut cache = ModuleCache::new();
    cache.insert(module_shell(shared.clone()));
    for id in [&left, &right] {
        let mut side = module_shell(id.clone());
        side.imports.push(shared.clone());
        cache.insert(side);
    }

    let mut entry = module_shell(app);
    entry.imports.push(left.clone());
    entry.imports.push(right.clone());
    let image = init_image(&entry, &cache);

    let starts: Vec<_> = called_units(&image, MODULE_START_WRAPPER)
        .into_iter()
        .filter(|(_, name)| name == MODULE_START_WRAPPER)
        .collect();

    // One delegation per direct import, none directly to the shared module.
    let left_unit = "orgX/left/1.0.0/$init".to_string();
    let right_unit = "orgX/right/1.0.0/$init".to_string();
    assert_eq!(
        starts
            .iter()
            .filter(|(unit, _)| *unit == left_unit || *unit == right_unit)
            .count(),
        2
    );
    assert!(!starts.iter().any(|(unit, _)| unit.contains("/shared/")));

    // The sides each delegate to shared exactly once in their own units.
    let mut side_mod = module_shell(left);
    side_mod.imports.push(shared);
    let side_image = init_image(&side_mod, &cache);
    let side_starts = called_units(&side_image, MODULE_START_WRAPPER);
    assert_eq!(
        side_starts
            .iter()
            .filter(|(unit, name)| unit.contains("/shared/") && name == MODULE_START_WRAPPER)
            .count(),
        1
    );
}

/// Stop delegates to direct imports in reverse declaration order, gated on
/// the dependent count reaching zero.
#[test]
fn stop_wrapper_reverses_import_order() {
    let first = ModuleId::new("orgX", "first", "1.0.0");
    let second = ModuleId::new("orgX", "second", "1.0.0");
    let mut cache = ModuleCache::new();
    cache.insert(module_shell(first.clone()));
    cache.insert(module_shell(second.clone()));

    let mut entry = module_shell(ModuleId::new("orgX", "app", "1.0.0"));
    entry.imports.push(first);
    entry.imports.push(second);
    let image = init_image(&entry, &cache);

    let stops: Vec<_> = called_units(&image, MODULE_STOP_WRAPPER)
        .into_iter()
        .filter(|(_, name)| name == MODULE_STOP_WRAPPER)
        .map(|(unit, _)| unit)
        .collect();
    let user_stops: Vec<_> = stops
        .iter()
        .filter(|unit| unit.contains("/first/") || unit.contains("/second/"))
        .collect();
    assert_eq!(user_stops.len(), 2);
    assert!(user_stops[0].contains("/second/"));
    assert!(user_stops[1].contains("/first/"));

    // The countdown gate precedes each delegated stop; the decrement
    // itself runs inside the dependency's critical section.
    let stop = image.function(MODULE_STOP_WRAPPER).unwrap().chunk();
    stop.assert_contains_opcodes(&[
        OpCode::AcquireLock,
        OpCode::GetGlobal,
        OpCode::PushOne,
        OpCode::Sub,
        OpCode::Dup,
        OpCode::SetGlobal,
        OpCode::ReleaseLock,
        OpCode::PushZero,
        OpCode::Eq,
        OpCode::JumpIfFalse,
        OpCode::Call,
    ]);
}

/// A second `$moduleStop` invocation is a no-op: the wrapper clears the
/// started flag inside its critical section before running the module's
/// own stop logic.
#[test]
fn stop_wrapper_is_idempotent() {
    let module = module_shell(ModuleId::new("orgX", "app", "1.0.0"));
    let image = init_image(&module, &ModuleCache::new());

    let stop = image.function(MODULE_STOP_WRAPPER).unwrap().chunk();
    stop.assert_contains_opcodes(&[
        OpCode::AcquireLock,
        OpCode::GetGlobal,
        OpCode::JumpIfFalse,
        OpCode::PushFalse,
        OpCode::SetGlobal,
        OpCode::CallSlot,
        OpCode::Pop,
        OpCode::ReleaseLock,
    ]);
}

/// StartListen is emitted only when the module or something it imports
/// exposes a listener.
#[test]
fn listener_flag_is_transitive() {
    let dep = ModuleId::new("orgX", "svc", "1.0.0");
    let mut listener_dep = module_shell(dep.clone());
    listener_dep.listener_available = true;
    let mut cache = ModuleCache::new();
    cache.insert(listener_dep);

    let mut with = module_shell(ModuleId::new("orgX", "app", "1.0.0"));
    with.imports.push(dep);
    let image = init_image(&with, &cache);
    let ops = image.function(MODULE_START_WRAPPER).unwrap().chunk().opcodes();
    assert!(ops.contains(&OpCode::StartListen));

    let without = module_shell(ModuleId::new("orgX", "quiet", "1.0.0"));
    let image = init_image(&without, &ModuleCache::new());
    let ops = image.function(MODULE_START_WRAPPER).unwrap().chunk().opcodes();
    assert!(!ops.contains(&OpCode::StartListen));
}

/// The static initializer installs the lock registry, the module
/// descriptor singleton, and every module constant.
#[test]
fn static_init_installs_module_state() {
    let id = ModuleId::new("orgX", "app", "1.0.0");
    let mut module = module_shell(id.clone());
    module.constants.push(tern::ConstDecl {
        name: "GREETING".into(),
        ty: tern::TypeDesc::Str,
        value: tern::ConstValue::Str("hello".into()),
        pos: None,
    });
    let image = init_image(&module, &ModuleCache::new());

    let cinit = image.static_init.as_ref().unwrap().chunk();
    cinit.assert_contains_opcodes(&[
        OpCode::NewLockRegistry,
        OpCode::SetGlobal,
        OpCode::ModuleDesc,
        OpCode::SetGlobal,
    ]);
    assert!(image.constants.contains(&Constant::Module(id)));
    assert!(image.constants.contains(&Constant::Str("hello".into())));
    assert!(image
        .constants
        .iter()
        .any(|c| matches!(c, Constant::GlobalRef { name, .. } if name == "GREETING")));
}

/// Remote management registers the stop wrapper as a scheduled callback
/// during start; without the flag no scheduling happens.
#[test]
fn remote_mgmt_schedules_stop_callback() {
    let module = module_shell(ModuleId::new("orgX", "app", "1.0.0"));

    let mut diagnostics = Diagnostics::new();
    let artifact = CodeGenerator::new(CodegenOptions {
        remote_mgmt_enabled: true,
        ..CodegenOptions::default()
    })
    .generate(
        &module,
        &ModuleCache::new(),
        &NativeRegistry::new(),
        &mut diagnostics,
    )
    .unwrap();
    assert!(!diagnostics.has_errors(), "{diagnostics}");

    let image = UnitImage::parse(&artifact.entry(&artifact.entry_unit).unwrap().bytes).unwrap();
    let ops = image.function(MODULE_START_WRAPPER).unwrap().chunk().opcodes();
    assert!(ops.contains(&OpCode::Schedule));

    let plain = init_image(&module, &ModuleCache::new());
    let ops = plain.function(MODULE_START_WRAPPER).unwrap().chunk().opcodes();
    assert!(!ops.contains(&OpCode::Schedule));
}
