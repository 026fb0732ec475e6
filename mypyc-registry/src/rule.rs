use mypyc_ir::{BoolOpKind, ComparisonOpKind, FloatOpKind, IntOpKind};
use mypyc_types::RType;

/// A call to a named C runtime helper, with the argument coercions to
/// apply before the call (§4.3). `arg_coercions[i]` is the `RType` the
/// i-th operand must be coerced to (boxed/unboxed/widened) before it is
/// passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CHelperRule {
    /// The C function's symbol name, e.g. `"CPyTagged_Add"`.
    pub c_function: String,
    /// Per-argument coercions applied before the call.
    pub arg_coercions: Vec<RType>,
    /// The rule's result type.
    pub result: RType,
    /// Whether the helper can raise (and so must be wired through the
    /// exception pass).
    pub can_raise: bool,
}

/// The lowering a matched registry entry produces (§4.3): either a
/// direct primitive IR op, or a call into a named C helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoweringRule {
    /// Lower straight to `OpKind::IntOp`.
    IntOp(IntOpKind),
    /// Lower straight to `OpKind::ComparisonOp`.
    ComparisonOp(ComparisonOpKind),
    /// Lower straight to `OpKind::FloatOp`.
    FloatOp(FloatOpKind),
    /// Lower straight to `OpKind::BoolOp`.
    BoolOp(BoolOpKind),
    /// Lower to a call to a named C runtime helper.
    CHelper(CHelperRule),
}
