use std::fmt;

use mypyc_types::RType;

/// An index identifying a [`Register`] within the [`FuncIr`](crate::FuncIr)
/// that owns it. Not meaningful across functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterId(u32);

impl RegisterId {
    /// Construct from a raw arena index.
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// The raw arena index.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A value slot scoped to one function (§3).
///
/// A `Register`'s declared [`RType`] never changes across its lifetime;
/// it may still be the target of more than one `Assign` op along
/// different control-flow paths (the IR is SSA-*adjacent*, not strictly
/// single-assignment — see `DESIGN.md`'s note on this open question).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    id: RegisterId,
    ty: RType,
    /// Stable diagnostic name, e.g. `"x"` for a source local or `"r3"`
    /// for a compiler-synthesized temporary.
    name: String,
    /// True for a function's declared arguments; arguments start the
    /// function borrowed rather than owned (§4.7).
    is_argument: bool,
}

impl Register {
    /// Construct a new register. Called only by the IR builder and the
    /// transform passes (which may allocate fresh temporaries).
    pub fn new(id: RegisterId, ty: RType, name: impl Into<String>, is_argument: bool) -> Self {
        Self {
            id,
            ty,
            name: name.into(),
            is_argument,
        }
    }

    /// This register's identity within its function.
    pub fn id(&self) -> RegisterId {
        self.id
    }

    /// This register's declared type.
    pub fn ty(&self) -> &RType {
        &self.ty
    }

    /// This register's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this register is one of the function's declared arguments.
    pub fn is_argument(&self) -> bool {
        self.is_argument
    }
}
