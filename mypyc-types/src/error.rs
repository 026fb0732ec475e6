use thiserror::Error;

/// Errors raised while constructing or reasoning about [`crate::RType`]s.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RTypeError {
    /// An [`crate::RTuple`] or [`crate::RStruct`] was built with zero fields
    /// where at least one is required.
    #[error("{what} must have at least one field")]
    EmptyAggregate {
        /// The kind of aggregate that was rejected ("tuple" or "struct").
        what: &'static str,
    },

    /// An `RUnion` was built with fewer than two alternatives; a union of
    /// one type is not a union.
    #[error("union type must have at least two alternatives, got {count}")]
    DegenerateUnion {
        /// The number of alternatives that were supplied.
        count: usize,
    },
}
