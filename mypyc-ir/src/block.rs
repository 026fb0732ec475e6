use std::fmt;

use crate::{Op, RegisterId};

/// An index identifying a [`BasicBlock`] within the [`FuncIr`](crate::FuncIr)
/// that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockId(u32);

impl BlockId {
    /// Construct from a raw arena index.
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// The raw arena index.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A `BasicBlock`'s single terminating instruction (§3).
///
/// Exactly one of these ends every block; no terminator may appear
/// mid-block, and a block with no terminator is not yet finalized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    /// Unconditional jump.
    Goto(BlockId),
    /// Conditional branch. When `negate` is set, the condition's sense is
    /// inverted before choosing a target (lets the builder reuse a
    /// register computed for the opposite test, e.g. lowering `if not
    /// cond`).
    Branch {
        /// The boolean condition.
        cond: RegisterId,
        /// Target when the (possibly negated) condition is true.
        then_target: BlockId,
        /// Target when the (possibly negated) condition is false.
        else_target: BlockId,
        /// Whether to invert `cond`'s sense.
        negate: bool,
    },
    /// Returns from the function, optionally with a value (`RVoid`
    /// functions return with `None`).
    Return(Option<RegisterId>),
    /// Marks a block as provably never reached (e.g. the fallthrough of
    /// an exhaustive `if/elif/else`); the emitter may emit a C
    /// `__builtin_unreachable()` here.
    Unreachable,
    /// Propagates a pending exception to the function's epilogue,
    /// returning the function's own error sentinel. Introduced by the
    /// exception pass (§4.6) for ops outside any handler.
    RaiseAndReturn {
        /// The register holding the error indicator to thread through
        /// (used by the emitter to decide which sentinel/flag to set).
        error: Option<RegisterId>,
    },
}

impl Terminator {
    /// The blocks this terminator can transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto(b) => vec![*b],
            Terminator::Branch {
                then_target,
                else_target,
                ..
            } => vec![*then_target, *else_target],
            Terminator::Return(_) | Terminator::Unreachable | Terminator::RaiseAndReturn { .. } => {
                vec![]
            }
        }
    }
}

/// An ordered sequence of [`Op`]s ending in exactly one [`Terminator`]
/// (§3). Blocks form a CFG with a single entry block per function.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlock {
    id: BlockId,
    ops: Vec<Op>,
    terminator: Option<Terminator>,
}

impl BasicBlock {
    /// Create an empty, unterminated block. Passes finalize it with
    /// [`BasicBlock::set_terminator`] before the function is considered
    /// well-formed.
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            ops: Vec::new(),
            terminator: None,
        }
    }

    /// This block's identity within its function.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Append an op to the end of this block's instruction sequence.
    /// Panics in debug builds if the block is already terminated — a
    /// caller must split the block first (the exception and refcount
    /// passes do this explicitly).
    pub fn push_op(&mut self, op: Op) {
        debug_assert!(
            self.terminator.is_none(),
            "cannot append an op after a block's terminator"
        );
        self.ops.push(op);
    }

    /// The block's non-terminating instructions, in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Mutable access to the block's non-terminating instructions, used
    /// by passes that rewrite ops in place (e.g. inserting `IncRef`
    /// before a specific op).
    pub fn ops_mut(&mut self) -> &mut Vec<Op> {
        &mut self.ops
    }

    /// This block's terminator, if it has been set.
    pub fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }

    /// Set (or replace) this block's terminator.
    pub fn set_terminator(&mut self, terminator: Terminator) {
        self.terminator = Some(terminator);
    }

    /// The blocks this block can transfer control to; empty until a
    /// terminator is set.
    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_default()
    }
}
