/// Errors that abort a whole [`crate::compile_unit`] call rather than
/// being recorded against one definition (§7.1's "fatal-for-unit" half
/// of the taxonomy). Converted to a single-element `Diagnostic` vector
/// at the `compile_unit` boundary, matching its `Result<CompiledUnit,
/// Vec<Diagnostic>>` signature.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Two modules passed to the same unit share a name.
    #[error("duplicate module name in compilation unit: {name}")]
    DuplicateModule {
        /// The repeated module name.
        name: String,
    },

    /// The unit's modules reference each other's classes in a cycle,
    /// which the declaration pass's base-before-derived ordering cannot
    /// resolve.
    #[error("import cycle among modules: {0:?}")]
    ImportCycle(Vec<String>),

    /// A stage reported a name collision or an internal invariant
    /// failure — both fatal to the whole unit per §7.
    #[error("{0}")]
    Build(#[from] mypyc_irgen::BuildError),

    /// The primitive registry rejected an ambiguous or malformed entry.
    #[error("{0}")]
    Registry(#[from] mypyc_registry::RegistryError),
}
