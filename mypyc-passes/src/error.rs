/// Errors a pass can raise when one of its own post-conditions fails to
/// hold (§7's "Internal invariant failure" category — always a bug in
/// the builder or an earlier pass, never in the input program).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PassError {
    /// A block has no terminator after the pass that was supposed to
    /// finalize it.
    #[error("function {func}: block {block} has no terminator")]
    MissingTerminator {
        /// The function containing the malformed block.
        func: String,
        /// The block missing its terminator.
        block: String,
    },

    /// The refcount pass found a register live on one predecessor of a
    /// merge with an ownership attribute inconsistent with another.
    #[error("function {func}: register {register} has inconsistent ownership at a CFG merge")]
    InconsistentOwnership {
        /// The function containing the inconsistency.
        func: String,
        /// The register in question.
        register: String,
    },
}
