//! Unit assignment for module functions.
//!
//! Decides which code unit every function lands in: the three lifecycle
//! functions go to the entry/init unit, positioned functions group by
//! source file, and positionless functions fill synthetic buckets that
//! seal at a configured member ceiling and are never revisited.
//!
//! Per-method body size is deliberately not checked here; encoded size is
//! only known during encoding, where violations are caught per unit.

use rustc_hash::FxHashMap;
use tern_core::{Function, ModuleId};

use crate::unit::{bucket_unit_name, init_unit_name, source_unit_name, CodeUnit, UnitKind};

/// Assigns functions to code units for one module.
///
/// For the entry module the splitter materializes the units; for imported
/// modules it only computes names (the imported module's units were
/// already emitted when that module was compiled).
#[derive(Debug)]
pub struct UnitSplitter {
    module: ModuleId,
    init_unit: String,
    max_bucket_members: usize,
    bucket_num: usize,
    bucket_members: usize,
    units: Vec<CodeUnit>,
    index: FxHashMap<String, usize>,
    track_units: bool,
}

impl UnitSplitter {
    /// Create a splitter for the given module.
    ///
    /// `track_units` is true for the entry module only.
    pub fn new(module: ModuleId, max_bucket_members: usize, track_units: bool) -> Self {
        let init_unit = init_unit_name(&module);
        Self {
            module,
            init_unit,
            max_bucket_members,
            bucket_num: 0,
            bucket_members: 0,
            units: Vec::new(),
            index: FxHashMap::default(),
            track_units,
        }
    }

    /// Name of the module's entry/init unit.
    pub fn init_unit_name(&self) -> &str {
        &self.init_unit
    }

    /// The configured bucket member ceiling.
    pub fn max_bucket_members(&self) -> usize {
        self.max_bucket_members
    }

    /// Create the init unit with its three fixed-order members.
    ///
    /// Must run before any other assignment so the positional contract
    /// holds no matter what else the module declares.
    pub fn assign_lifecycle(&mut self, init: &Function, start: &Function, stop: &Function) -> String {
        if self.track_units {
            let unit = CodeUnit::init_unit(
                self.init_unit.clone(),
                init.clone(),
                start.clone(),
                stop.clone(),
            );
            self.index.insert(self.init_unit.clone(), self.units.len());
            self.units.push(unit);
        }
        self.init_unit.clone()
    }

    /// Assign a function to its unit, returning the unit name.
    pub fn assign(&mut self, function: &Function) -> String {
        let (name, kind) = match &function.pos {
            Some(pos) => (source_unit_name(&self.module, &pos.file), UnitKind::SourceFile),
            None => {
                let name = bucket_unit_name(&self.module, self.bucket_num);
                // Strictly-greater-than on purpose: the observable bucket
                // contents depend on this exact rollover boundary.
                if self.bucket_members > self.max_bucket_members {
                    self.bucket_members = 0;
                    self.bucket_num += 1;
                } else {
                    self.bucket_members += 1;
                }
                (name, UnitKind::Bucket)
            }
        };
        if self.track_units {
            self.add_to_unit(&name, kind, function.clone());
        }
        name
    }

    /// Force a generated lifecycle wrapper into the init unit, after the
    /// three fixed slots.
    pub fn pin_to_init(&mut self, function: &Function) -> String {
        if self.track_units {
            if let Some(&idx) = self.index.get(&self.init_unit) {
                self.units[idx].push(function.clone());
            }
        }
        self.init_unit.clone()
    }

    /// Attach the static initializer to the init unit.
    pub fn set_static_init(&mut self, function: Function) {
        if let Some(&idx) = self.index.get(&self.init_unit) {
            self.units[idx].static_init = Some(function);
        }
    }

    /// Finish assignment and hand the units over, init unit first.
    ///
    /// Bucket members are ordered by deterministic name hash so emission
    /// order does not depend on declaration order.
    pub fn finish(mut self) -> Vec<CodeUnit> {
        for unit in &mut self.units {
            if unit.kind == UnitKind::Bucket {
                unit.functions
                    .sort_by_key(|f| tern_core::NameHash::of_function(&f.name));
            }
        }
        self.units
    }

    fn add_to_unit(&mut self, name: &str, kind: UnitKind, function: Function) {
        match self.index.get(name) {
            Some(&idx) => self.units[idx].push(function),
            None => {
                let mut unit = CodeUnit::new(name, kind);
                unit.push(function);
                self.index.insert(name.to_string(), self.units.len());
                self.units.push(unit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_core::{SourcePos, Span, INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME};

    fn module_id() -> ModuleId {
        ModuleId::new("orgX", "mod", "1.0.0")
    }

    fn positioned(name: &str, file: &str) -> Function {
        Function::new(name).at(SourcePos::new(file, Span::new(1, 1, 0)))
    }

    fn lifecycle() -> (Function, Function, Function) {
        (
            positioned(INIT_FUNC_NAME, "main.tern"),
            positioned(START_FUNC_NAME, "main.tern"),
            positioned(STOP_FUNC_NAME, "main.tern"),
        )
    }

    #[test]
    fn init_unit_first_three_fixed() {
        let mut splitter = UnitSplitter::new(module_id(), 100, true);
        let (init, start, stop) = lifecycle();
        splitter.assign_lifecycle(&init, &start, &stop);
        splitter.assign(&positioned("f", "main.tern"));

        let units = splitter.finish();
        let init_unit = &units[0];
        assert_eq!(init_unit.kind, UnitKind::Init);
        let names: Vec<_> = init_unit.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![INIT_FUNC_NAME, START_FUNC_NAME, STOP_FUNC_NAME]);
    }

    #[test]
    fn groups_by_source_file() {
        let mut splitter = UnitSplitter::new(module_id(), 100, true);
        let (init, start, stop) = lifecycle();
        splitter.assign_lifecycle(&init, &start, &stop);

        let a1 = splitter.assign(&positioned("f", "orders.tern"));
        let b = splitter.assign(&positioned("g", "billing.tern"));
        let a2 = splitter.assign(&positioned("h", "orders.tern"));

        assert_eq!(a1, a2);
        assert_ne!(a1, b);

        let units = splitter.finish();
        let orders = units.iter().find(|u| u.name == a1).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders.kind, UnitKind::SourceFile);
    }

    #[test]
    fn bucket_rollover_boundary() {
        // Ceiling 2 with the strictly-greater-than check admits four
        // members into the first bucket before rolling over.
        let mut splitter = UnitSplitter::new(module_id(), 2, true);
        let (init, start, stop) = lifecycle();
        splitter.assign_lifecycle(&init, &start, &stop);

        let mut names = Vec::new();
        for i in 0..6 {
            names.push(splitter.assign(&Function::new(format!("$lambda{i}"))));
        }

        assert_eq!(names[0], "orgX/mod/1.0.0/$gen0");
        assert_eq!(names[3], "orgX/mod/1.0.0/$gen0");
        assert_eq!(names[4], "orgX/mod/1.0.0/$gen1");
        assert_eq!(names[5], "orgX/mod/1.0.0/$gen1");
    }

    #[test]
    fn sealed_buckets_never_reopen() {
        let mut splitter = UnitSplitter::new(module_id(), 0, true);
        let (init, start, stop) = lifecycle();
        splitter.assign_lifecycle(&init, &start, &stop);

        let mut assigned = Vec::new();
        for i in 0..8 {
            assigned.push(splitter.assign(&Function::new(format!("$g{i}"))));
        }

        // Once the name moves to a later bucket it never moves back.
        let mut max_seen = 0usize;
        for name in &assigned {
            let n: usize = name.rsplit("$gen").next().unwrap().parse().unwrap();
            assert!(n >= max_seen);
            max_seen = n.max(max_seen);
        }
    }

    #[test]
    fn pinned_wrappers_follow_fixed_slots() {
        let mut splitter = UnitSplitter::new(module_id(), 100, true);
        let (init, start, stop) = lifecycle();
        splitter.assign_lifecycle(&init, &start, &stop);
        splitter.pin_to_init(&Function::new("$moduleStart"));

        let units = splitter.finish();
        assert_eq!(units[0].functions[3].name, "$moduleStart");
    }

    #[test]
    fn untracked_splitter_computes_names_only() {
        let mut splitter = UnitSplitter::new(module_id(), 100, false);
        let (init, start, stop) = lifecycle();
        splitter.assign_lifecycle(&init, &start, &stop);
        let name = splitter.assign(&positioned("f", "orders.tern"));
        assert_eq!(name, "orgX/mod/1.0.0/orders");
        assert!(splitter.finish().is_empty());
    }
}
