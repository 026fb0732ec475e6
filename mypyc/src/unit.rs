use mypyc_ir::Diagnostic;

/// One compiled module's output: its name and the complete C source
/// `mypyc-emit` produced for it (§4.8, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModule {
    /// The module's fully-qualified name.
    pub name: String,
    /// The module's generated C translation unit.
    pub c_source: String,
}

/// The result of compiling a set of modules together (§4.9, §6): the C
/// source for every module that made it all the way to emission, plus
/// every diagnostic recorded along the way (including non-fatal ones —
/// a successful `CompiledUnit` can still carry warnings, or per-function
/// errors for definitions that were skipped while their siblings
/// compiled).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledUnit {
    /// One entry per module that reached emission, in build order.
    pub modules: Vec<CompiledModule>,
    /// Every diagnostic recorded while compiling the unit.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledUnit {
    /// Whether any recorded diagnostic is an `Error` or `Bug`.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.severity, mypyc_ir::Severity::Error | mypyc_ir::Severity::Bug))
    }
}
