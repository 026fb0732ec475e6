use thiserror::Error;

use crate::{BlockId, RegisterId};

/// Violations of the IR's own construction invariants (§4.2).
///
/// These are "internal invariant failure" diagnostics (§7): a bug in the
/// builder or a pass, never something a well-typed input program can
/// trigger on its own.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrError {
    /// A `BasicBlock` was finalized with no terminator, or a terminator
    /// was added mid-block.
    #[error("block {block} must end with exactly one terminator")]
    MissingTerminator {
        /// The offending block.
        block: BlockId,
    },

    /// An operand referenced a register not defined anywhere in the
    /// function (neither as an argument nor on any path from entry).
    #[error("register {register} is not defined in this function")]
    UndefinedRegister {
        /// The dangling reference.
        register: RegisterId,
    },

    /// `IncRef`/`DecRef` was applied to a register whose type requires no
    /// reference counting (an unboxed-only type).
    #[error("register {register} has an unboxed type and cannot be refcounted")]
    RefcountOnUnboxed {
        /// The offending register.
        register: RegisterId,
    },

    /// A block was referenced (as a branch/goto target) that does not
    /// exist in the function's block arena.
    #[error("block {block} does not exist")]
    UnknownBlock {
        /// The dangling reference.
        block: BlockId,
    },

    /// The function has no block reachable from the entry block labeled
    /// as such; every `FuncIr` must have exactly one entry.
    #[error("function has no entry block")]
    NoEntryBlock,
}
