use mypyc_types::RType;

use crate::{ClassIr, FuncIr, LiteralValue};

/// A module-level global variable declaration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalVar {
    /// The global's name.
    pub name: String,
    /// The global's declared type.
    pub ty: RType,
}

/// A module-level `Final` constant with a compile-time-known value,
/// inlined at every read site by the builder (§4.4) and still recorded
/// here so the emitter can define it once for diagnostics/introspection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FinalConst {
    /// The constant's name.
    pub name: String,
    /// The constant's value.
    pub value: LiteralValue,
}

/// One compiled module: its functions, classes, and module-level
/// globals/constants (§3). Owns every [`FuncIr`] and [`ClassIr`] it
/// contains.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleIr {
    name: String,
    funcs: Vec<FuncIr>,
    classes: Vec<ClassIr>,
    final_consts: Vec<FinalConst>,
    globals: Vec<GlobalVar>,
}

impl ModuleIr {
    /// Construct an empty module, ready for the builder to populate.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            funcs: Vec::new(),
            classes: Vec::new(),
            final_consts: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// The module's fully-qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a compiled function.
    pub fn push_func(&mut self, func: FuncIr) {
        self.funcs.push(func);
    }

    /// The module's functions, in declaration order.
    pub fn funcs(&self) -> &[FuncIr] {
        &self.funcs
    }

    /// Mutable access to the module's functions, used by the three
    /// transform passes (each runs over every `FuncIr` in every module).
    pub fn funcs_mut(&mut self) -> &mut Vec<FuncIr> {
        &mut self.funcs
    }

    /// Add a compiled class.
    pub fn push_class(&mut self, class: ClassIr) {
        self.classes.push(class);
    }

    /// The module's classes, in declaration order (base classes and
    /// traits before the classes that depend on them, per §4.4's
    /// dependency-ordered vtable layout).
    pub fn classes(&self) -> &[ClassIr] {
        &self.classes
    }

    /// Add a `Final` constant.
    pub fn push_final_const(&mut self, constant: FinalConst) {
        self.final_consts.push(constant);
    }

    /// The module's `Final` constants.
    pub fn final_consts(&self) -> &[FinalConst] {
        &self.final_consts
    }

    /// Add a module-level global.
    pub fn push_global(&mut self, global: GlobalVar) {
        self.globals.push(global);
    }

    /// The module's globals.
    pub fn globals(&self) -> &[GlobalVar] {
        &self.globals
    }
}
