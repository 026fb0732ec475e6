use mypyc_types::RType;

use crate::shape::OpShape;

/// Errors raised while building a [`crate::Registry`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two entries were registered for the same shape with the same
    /// operand types, or with operand types that are equally specific
    /// against some arguments (neither is a strict narrowing of the
    /// other). The registry refuses to guess; one of the two entries
    /// must be removed or narrowed.
    #[error("ambiguous lowering rules for {shape:?} with operand types {arg_types:?}")]
    Ambiguous {
        /// The shape both entries were keyed on.
        shape: OpShape,
        /// The operand types the duplicate entries share.
        arg_types: Vec<RType>,
    },

    /// An entry's `arg_types` was empty where the shape requires at
    /// least one operand (every shape except zero-arg `Call`).
    #[error("{shape:?} requires at least one operand type, got none")]
    MissingOperands {
        /// The shape the empty entry was registered under.
        shape: OpShape,
    },
}
