//! Dispatch function synthesis for deferred invocations.
//!
//! Every `AsyncCall` site schedules its callee on the target runtime
//! through a synthesized dispatch function that rehydrates the captured
//! arguments and performs the actual call. Sites sharing a callee and
//! argument shape share one dispatch function.
//!
//! Synthesis must run before the splitter seals its buckets: dispatch
//! functions are positionless and land in the synthetic bucket units.

use rustc_hash::FxHashMap;
use tern_core::{method_descriptor, Function, Instr, ModuleId, QualifiedName, TypeDesc};

use crate::link::LinkContext;
use crate::split::UnitSplitter;

/// Name prefix of synthesized dispatch functions.
pub const LAMBDA_PREFIX: &str = "$lambda";

/// Dispatch functions synthesized for one module's deferred call sites.
#[derive(Debug, Default)]
pub struct LambdaTable {
    map: FxHashMap<(QualifiedName, u8), QualifiedName>,
}

impl LambdaTable {
    /// The dispatch function serving a deferred call site, if one was
    /// synthesized for this callee and argument shape.
    pub fn lookup(&self, target: &QualifiedName, argc: u8) -> Option<&QualifiedName> {
        self.map.get(&(target.clone(), argc))
    }

    /// Number of distinct dispatch functions.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no dispatch functions were synthesized.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Scans function bodies and synthesizes dispatch functions.
#[derive(Debug)]
pub struct LambdaGen {
    module: ModuleId,
    counter: usize,
    table: LambdaTable,
}

impl LambdaGen {
    /// Create a generator for the given module.
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            counter: 0,
            table: LambdaTable::default(),
        }
    }

    /// Scan one function body, synthesizing a dispatch function for each
    /// deferred call site not already covered.
    ///
    /// New dispatch functions are assigned to a unit immediately and
    /// registered in the link tables, so later call sites resolve them
    /// like any other function.
    pub fn scan(&mut self, func: &Function, splitter: &mut UnitSplitter, ctx: &mut LinkContext) {
        for instr in &func.body {
            if let Instr::AsyncCall { target, argc } = instr {
                self.synthesize(target, *argc, splitter, ctx);
            }
        }
    }

    /// The completed site table. The synthesized functions themselves
    /// already live in their assigned units.
    pub fn finish(self) -> LambdaTable {
        self.table
    }

    fn synthesize(
        &mut self,
        target: &QualifiedName,
        argc: u8,
        splitter: &mut UnitSplitter,
        ctx: &mut LinkContext,
    ) {
        let key = (target.clone(), argc);
        if self.table.map.contains_key(&key) {
            return;
        }

        let name = format!("{LAMBDA_PREFIX}${}${}", self.counter, target.local);
        self.counter += 1;

        // Captured argument types are erased at the dispatch boundary.
        let params = vec![TypeDesc::Any; argc as usize];
        let mut body: Vec<Instr> = (0..argc as u16).map(Instr::LoadLocal).collect();
        body.push(Instr::Call {
            target: target.clone(),
            argc,
        });
        body.push(Instr::ReturnValue);

        let mut func = Function::new(name.clone()).with_body(body);
        func.params = params;
        func.ret = TypeDesc::Any;

        let unit = splitter.assign(&func);
        let qname = QualifiedName::new(self.module.clone(), name);
        ctx.add_generated(
            qname.clone(),
            unit,
            method_descriptor(&func.params, &func.ret, None),
        );
        self.table.map.insert(key, qname);
    }
}
