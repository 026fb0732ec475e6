/// Errors raised while lowering a compiled unit to C text (§4.8).
///
/// Every variant here indicates an upstream pass left the IR in a shape
/// the emitter doesn't know how to render; none of these should be
/// reachable once the three transform passes have run to completion, so
/// reaching one is itself an internal invariant failure (§7).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EmitError {
    /// An [`mypyc_ir::OpKind`] variant this emitter doesn't have a
    /// template for yet.
    #[error("function {func}: no emission template for op {op}")]
    UnsupportedOp {
        /// The function containing the op.
        func: String,
        /// A short description of the unsupported op.
        op: String,
    },
    /// A block reached emission without a terminator (should have been
    /// caught by the exception pass finalizing every block).
    #[error("function {func}: block {block} has no terminator at emission time")]
    MissingTerminator {
        /// The function containing the malformed block.
        func: String,
        /// The block missing its terminator.
        block: String,
    },
}
