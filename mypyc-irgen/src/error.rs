use mypyc_ir::SourceSpan;

/// Errors raised while building the IR from a typed AST (§7, §7.1).
///
/// The façade crate decides fatality per variant: `NameCollision` and
/// `Internal` abort the whole compilation unit; the others are caught
/// at the enclosing function/class boundary, converted to a
/// `Diagnostic`, and recorded while sibling definitions keep compiling.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BuildError {
    /// A syntactic feature the builder does not lower.
    #[error("unsupported construct at {span:?}: {what}")]
    UnsupportedConstruct {
        /// What construct was encountered.
        what: String,
        /// Where it was encountered.
        span: SourceSpan,
    },

    /// The typed AST's type for an expression is incompatible with the
    /// primitive registry's requirements at a lowering site.
    #[error("type contract violation at {span:?}: {detail}")]
    TypeContractViolation {
        /// What went wrong.
        detail: String,
        /// Where it happened.
        span: SourceSpan,
    },

    /// Trait attribute layouts clash, or an override changes a vtable
    /// slot's signature incompatibly.
    #[error("layout conflict in class {class}: {detail}")]
    LayoutConflict {
        /// The class whose layout is inconsistent.
        class: String,
        /// What's wrong with it.
        detail: String,
    },

    /// Two entities share a fully-qualified name within the unit.
    #[error("name collision: {name} is declared more than once")]
    NameCollision {
        /// The colliding name.
        name: String,
    },

    /// A builder post-condition did not hold; indicates a bug in the
    /// builder itself rather than in the input program.
    #[error("internal invariant failure: {detail}")]
    Internal {
        /// What invariant failed.
        detail: String,
    },
}
