//! Module lifecycle synthesis.
//!
//! Every module gets four generated functions in its init unit: a static
//! initializer that installs module state at unit load, and the
//! `$moduleInit` / `$moduleStart` / `$moduleStop` wrappers the runtime and
//! importing modules call. The wrappers guard themselves with flags held
//! in the init unit, so diamond-shaped import graphs run each module's
//! lifecycle exactly once.
//!
//! Generated functions are positionless IR owned by the backend; the
//! input module is never touched.

use tern_core::{ConstValue, Function, Instr, Module, ModuleId, QualifiedName};

/// Generated wrapper running a module's init phase.
pub const MODULE_INIT_WRAPPER: &str = "$moduleInit";
/// Generated wrapper running a module's start phase.
pub const MODULE_START_WRAPPER: &str = "$moduleStart";
/// Generated wrapper running a module's stop phase.
pub const MODULE_STOP_WRAPPER: &str = "$moduleStop";
/// Static initializer slot of the init unit.
pub const STATIC_INIT_NAME: &str = ".<cinit>";

/// Flag set once the module's init wrapper has run.
pub const INITIALIZED_FLAG: &str = "$moduleInitialized";
/// Flag set once the module's start phase completed.
pub const STARTED_FLAG: &str = "$moduleStarted";
/// Flag set when a start was attempted, successful or not.
pub const START_ATTEMPTED_FLAG: &str = "$moduleStartAttempted";
/// Flag set by an importer before it delegates start to this module.
pub const PARENT_START_ATTEMPTED_FLAG: &str = "$parentModuleStartAttempted";
/// Count of importers that started this module and have not stopped it.
pub const DEPENDENT_COUNT: &str = "$dependentCount";
/// The module's lock registry, keying its lifecycle critical sections.
pub const LOCK_STORE_VAR: &str = "$LOCK_STORE";
/// The module's descriptor singleton.
pub const CURRENT_MODULE_VAR: &str = "$currentModule";

/// Names of the init-unit globals every module's static initializer
/// installs. The linker pre-registers these for all reachable modules.
pub fn lifecycle_globals() -> [&'static str; 7] {
    [
        INITIALIZED_FLAG,
        STARTED_FLAG,
        START_ATTEMPTED_FLAG,
        PARENT_START_ATTEMPTED_FLAG,
        DEPENDENT_COUNT,
        LOCK_STORE_VAR,
        CURRENT_MODULE_VAR,
    ]
}

/// The four generated lifecycle functions of one module.
#[derive(Debug)]
pub struct LifecycleFns {
    /// Static initializer, run once at init-unit load.
    pub static_init: Function,
    /// `$moduleInit` wrapper.
    pub init: Function,
    /// `$moduleStart` wrapper.
    pub start: Function,
    /// `$moduleStop` wrapper.
    pub stop: Function,
}

/// Generates the lifecycle functions for one module.
#[derive(Debug)]
pub struct LifecycleGen<'a> {
    module: &'a Module,
    imports: &'a [ModuleId],
    listener_available: bool,
    remote_mgmt_enabled: bool,
}

impl<'a> LifecycleGen<'a> {
    /// Create a generator for the given module and its deduplicated
    /// direct imports.
    ///
    /// `listener_available` covers the module and its transitive imports.
    pub fn new(
        module: &'a Module,
        imports: &'a [ModuleId],
        listener_available: bool,
        remote_mgmt_enabled: bool,
    ) -> Self {
        Self {
            module,
            imports,
            listener_available,
            remote_mgmt_enabled,
        }
    }

    /// Generate all four lifecycle functions.
    pub fn generate(&self) -> LifecycleFns {
        LifecycleFns {
            static_init: self.gen_static_init(),
            init: self.gen_init(),
            start: self.gen_start(),
            stop: self.gen_stop(),
        }
    }

    fn own(&self, name: &str) -> QualifiedName {
        QualifiedName::new(self.module.id.clone(), name.to_string())
    }

    fn of(dep: &ModuleId, name: &str) -> QualifiedName {
        QualifiedName::new(dep.clone(), name.to_string())
    }

    /// Guard prologue shared by the three wrappers: inside the lock
    /// registry's critical section, return early when `flag` is already
    /// set, otherwise set it and proceed. Occupies instruction slots 0..8.
    fn guard_prologue(&self, body: &mut Vec<Instr>, flag: &str) {
        let lock = self.own(LOCK_STORE_VAR);
        body.push(Instr::AcquireLock(lock.clone()));
        body.push(Instr::LoadGlobal(self.own(flag)));
        body.push(Instr::JumpIfFalse(5));
        body.push(Instr::ReleaseLock(lock.clone()));
        body.push(Instr::Return);
        body.push(Instr::ConstBool(true));
        body.push(Instr::StoreGlobal(self.own(flag)));
        body.push(Instr::ReleaseLock(lock));
    }

    fn gen_static_init(&self) -> Function {
        let mut body = Vec::new();
        body.push(Instr::NewLockRegistry);
        body.push(Instr::StoreGlobal(self.own(LOCK_STORE_VAR)));
        for flag in [
            INITIALIZED_FLAG,
            STARTED_FLAG,
            START_ATTEMPTED_FLAG,
            PARENT_START_ATTEMPTED_FLAG,
        ] {
            body.push(Instr::ConstBool(false));
            body.push(Instr::StoreGlobal(self.own(flag)));
        }
        body.push(Instr::ConstInt(0));
        body.push(Instr::StoreGlobal(self.own(DEPENDENT_COUNT)));
        body.push(Instr::ModuleDesc(self.module.id.clone()));
        body.push(Instr::StoreGlobal(self.own(CURRENT_MODULE_VAR)));

        // Module constants materialize as init-unit globals.
        for decl in &self.module.constants {
            body.push(match &decl.value {
                ConstValue::Nil => Instr::ConstNil,
                ConstValue::Bool(v) => Instr::ConstBool(*v),
                ConstValue::Int(v) => Instr::ConstInt(*v),
                ConstValue::Float(v) => Instr::ConstFloat(*v),
                ConstValue::Str(v) => Instr::ConstStr(v.clone()),
            });
            body.push(Instr::StoreGlobal(self.own(&decl.name)));
        }
        body.push(Instr::Return);
        Function::new(STATIC_INIT_NAME).with_body(body)
    }

    fn gen_init(&self) -> Function {
        let mut body = Vec::new();
        self.guard_prologue(&mut body, INITIALIZED_FLAG);
        for dep in self.imports {
            body.push(Instr::Call {
                target: Self::of(dep, MODULE_INIT_WRAPPER),
                argc: 0,
            });
            body.push(Instr::Pop);
        }
        body.push(Instr::CallSlot {
            module: self.module.id.clone(),
            slot: 0,
        });
        body.push(Instr::Pop);
        body.push(Instr::Return);
        Function::new(MODULE_INIT_WRAPPER).with_body(body)
    }

    fn gen_start(&self) -> Function {
        let mut body = Vec::new();
        self.guard_prologue(&mut body, START_ATTEMPTED_FLAG);
        for dep in self.imports {
            body.push(Instr::Call {
                target: Self::of(dep, MODULE_START_WRAPPER),
                argc: 0,
            });
            body.push(Instr::Pop);
            // The dependent count is what makes teardown reverse-topological;
            // concurrent importers update it under the dependency's own lock.
            let lock = Self::of(dep, LOCK_STORE_VAR);
            let count = Self::of(dep, DEPENDENT_COUNT);
            body.push(Instr::AcquireLock(lock.clone()));
            body.push(Instr::LoadGlobal(count.clone()));
            body.push(Instr::ConstInt(1));
            body.push(Instr::Add);
            body.push(Instr::StoreGlobal(count));
            body.push(Instr::ReleaseLock(lock));
        }
        body.push(Instr::CallSlot {
            module: self.module.id.clone(),
            slot: 1,
        });
        body.push(Instr::Pop);
        body.push(Instr::ConstBool(true));
        body.push(Instr::StoreGlobal(self.own(STARTED_FLAG)));
        if self.remote_mgmt_enabled {
            // Management endpoint stops the module out-of-band; schedule
            // the stop wrapper as the registered callback.
            body.push(Instr::AsyncCall {
                target: self.own(MODULE_STOP_WRAPPER),
                argc: 0,
            });
            body.push(Instr::Pop);
        }
        if self.listener_available {
            body.push(Instr::StartListen);
        }
        body.push(Instr::Return);
        Function::new(MODULE_START_WRAPPER).with_body(body)
    }

    fn gen_stop(&self) -> Function {
        let mut body = Vec::new();
        let lock = self.own(LOCK_STORE_VAR);
        // Clearing the started flag inside the critical section makes
        // re-entry a no-op. Occupies instruction slots 0..8.
        body.push(Instr::AcquireLock(lock.clone()));
        body.push(Instr::LoadGlobal(self.own(STARTED_FLAG)));
        body.push(Instr::JumpIfFalse(7));
        body.push(Instr::ConstBool(false));
        body.push(Instr::StoreGlobal(self.own(STARTED_FLAG)));
        body.push(Instr::CallSlot {
            module: self.module.id.clone(),
            slot: 2,
        });
        body.push(Instr::Pop);
        body.push(Instr::ReleaseLock(lock));

        // Immediate imports in reverse order; a dependency stops only when
        // its last remaining dependent lets go. The decrement runs under
        // the dependency's own lock, so exactly one dependent observes
        // zero and the delegated stop never runs twice.
        for dep in self.imports.iter().rev() {
            let lock = Self::of(dep, LOCK_STORE_VAR);
            let count = Self::of(dep, DEPENDENT_COUNT);
            body.push(Instr::AcquireLock(lock.clone()));
            body.push(Instr::LoadGlobal(count.clone()));
            body.push(Instr::ConstInt(1));
            body.push(Instr::Sub);
            body.push(Instr::Dup);
            body.push(Instr::StoreGlobal(count));
            body.push(Instr::ReleaseLock(lock));
            body.push(Instr::ConstInt(0));
            body.push(Instr::Eq);
            let skip = body.len() + 3;
            body.push(Instr::JumpIfFalse(skip));
            body.push(Instr::Call {
                target: Self::of(dep, MODULE_STOP_WRAPPER),
                argc: 0,
            });
            body.push(Instr::Pop);
        }
        body.push(Instr::Return);
        Function::new(MODULE_STOP_WRAPPER).with_body(body)
    }
}
