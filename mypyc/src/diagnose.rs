use mypyc_ir::{Diagnostic, SourceSpan, Severity};
use mypyc_irgen::BuildError;
use mypyc_passes::PassError;

/// Converts a [`BuildError`] into a [`Diagnostic`], per the taxonomy its
/// own doc comment already commits to (§7, §7.1): `NameCollision` and
/// `Internal` are unit-fatal and never reach here (the caller aborts
/// `compile_unit` for those before converting); the rest name the
/// definition they're scoped to.
pub fn from_build_error(err: &BuildError) -> Diagnostic {
    match err {
        BuildError::UnsupportedConstruct { what, span } => Diagnostic::new(
            Severity::Error,
            "unsupported-construct",
            format!("unsupported construct: {what}"),
            span.clone(),
        ),
        BuildError::TypeContractViolation { detail, span } => Diagnostic::new(
            Severity::Error,
            "type-contract-violation",
            detail.clone(),
            span.clone(),
        ),
        BuildError::LayoutConflict { class, detail } => Diagnostic::new(
            Severity::Error,
            "layout-conflict",
            format!("class {class}: {detail}"),
            SourceSpan::synthetic(),
        ),
        BuildError::NameCollision { name } => Diagnostic::new(
            Severity::Error,
            "name-collision",
            format!("{name} is declared more than once"),
            SourceSpan::synthetic(),
        ),
        BuildError::Internal { detail } => Diagnostic::new(
            Severity::Bug,
            "internal-invariant-failure",
            detail.clone(),
            SourceSpan::synthetic(),
        ),
    }
}

/// Converts a [`PassError`] into a [`Diagnostic`]. Every `PassError`
/// variant is, by its own doc comment, a bug in an earlier stage rather
/// than a defect in the input program — always `Severity::Bug`.
pub fn from_pass_error(err: &PassError) -> Diagnostic {
    let detail = match err {
        PassError::MissingTerminator { func, block } => {
            format!("function {func}: block {block} has no terminator")
        }
        PassError::InconsistentOwnership { func, register } => {
            format!("function {func}: register {register} has inconsistent ownership at a merge")
        }
    };
    Diagnostic::new(
        Severity::Bug,
        "internal-invariant-failure",
        detail,
        SourceSpan::synthetic(),
    )
}

/// Converts an [`mypyc_emit::EmitError`] into a [`Diagnostic`]. Like
/// `PassError`, every variant indicates an earlier stage left the IR in
/// a shape the emitter can't render — always `Severity::Bug`.
pub fn from_emit_error(err: &mypyc_emit::EmitError) -> Diagnostic {
    let detail = match err {
        mypyc_emit::EmitError::UnsupportedOp { func, op } => {
            format!("function {func}: {op}")
        }
        mypyc_emit::EmitError::MissingTerminator { func, block } => {
            format!("function {func}: block {block} has no terminator at emission time")
        }
    };
    Diagnostic::new(
        Severity::Bug,
        "internal-invariant-failure",
        detail,
        SourceSpan::synthetic(),
    )
}
