use mypyc_types::RType;
use strum::Display;

use crate::{FuncRef, RegisterId, SourceSpan};

/// Whether an [`Op`] can raise a Python exception, and how eagerly a
/// reader must assume it does (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CanRaise {
    /// This op can never raise; the exception pass does not touch it.
    Never,
    /// This op raises only in exceptional circumstances (e.g. allocation
    /// failure on a path that's usually infallible); still must be
    /// checked wherever `can_raise` is not `Never`.
    May,
    /// This op routinely raises for ordinary inputs (e.g. `GetAttr` on a
    /// missing attribute) and must always be checked.
    Must,
}

/// How an [`Op`] communicates failure to its checker (§3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// This op cannot fail; there is nothing to check.
    None,
    /// Failure is signalled by the result register holding the result
    /// type's error sentinel.
    Sentinel,
    /// Failure is signalled by a paired boolean flag register, set
    /// alongside (or instead of) the result, for result types whose
    /// sentinel overlaps a legal value.
    PairedFlag {
        /// The register holding the error flag.
        flag: RegisterId,
    },
    /// Failure is always checked by convention regardless of the result
    /// representation (used by a handful of container/runtime-helper
    /// ops whose C implementation always sets the Python error indicator
    /// on failure rather than returning a sentinel).
    AlwaysChecked,
}

/// Integer arithmetic/bitwise operator kinds for [`OpKind::IntOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntOpKind {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// unary `-`
    Neg,
    /// unary `~`
    Invert,
}

/// Comparison operator kinds for [`OpKind::ComparisonOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOpKind {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Float arithmetic operator kinds for [`OpKind::FloatOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FloatOpKind {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

/// Boolean operator kinds for [`OpKind::BoolOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoolOpKind {
    /// short-circuiting `and` is lowered to control flow; this is the
    /// strict (non-short-circuit) bitwise form used once both operands
    /// are already evaluated.
    And,
    /// strict `or`.
    Or,
    /// `not`.
    Not,
}

/// The dialect's built-in exception kinds a [`OpKind::RaiseStandardError`]
/// can construct without a user-defined exception class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StandardErrorKind {
    /// `AttributeError`
    AttributeError,
    /// `TypeError`
    TypeError,
    /// `ValueError`
    ValueError,
    /// `IndexError`
    IndexError,
    /// `KeyError`
    KeyError,
    /// `ZeroDivisionError`
    ZeroDivisionError,
    /// `UnboundLocalError`, raised by the uninit pass's inserted checks.
    UnboundLocalError,
    /// `StopIteration`, raised by the `for` loop's iterator protocol.
    StopIteration,
    /// `RuntimeError`, the catch-all for internal invariant failures
    /// surfaced to generated code rather than aborting the process.
    RuntimeError,
}

/// A literal constant loadable in one op.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LiteralValue {
    /// A tagged integer literal.
    Int(i64),
    /// A boolean literal.
    Bool(bool),
    /// A float literal.
    Float(f64),
    /// A string literal.
    Str(String),
    /// A bytes literal.
    Bytes(Vec<u8>),
    /// The `None` literal.
    None,
}

/// Keyword arguments accompanying a late-bound [`OpKind::PyCall`].
pub type KwArgs = Vec<(String, RegisterId)>;

/// The positional and keyword arguments of a call-shaped op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallArgs {
    /// Positional arguments, in order.
    pub positional: Vec<RegisterId>,
}

impl CallArgs {
    /// Build a positional-only argument list.
    pub fn positional(args: Vec<RegisterId>) -> Self {
        Self { positional: args }
    }
}

/// The closed set of IR operations (§3, selected). Every non-terminating
/// instruction in a [`BasicBlock`](crate::BasicBlock) is one of these,
/// wrapped in an [`Op`] that records its destination register (if any)
/// and its exception-raising behavior.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpKind {
    // -- moves / constants --
    /// Copies `src` into `dest`'s register. `dest` is recorded on the
    /// owning [`Op`], not here.
    Assign {
        /// The register being copied.
        src: RegisterId,
    },
    /// Materializes a literal constant.
    LoadLiteral {
        /// The literal's value.
        value: LiteralValue,
    },
    /// Loads the address of a module-level or class-level static slot
    /// (a final constant, a type object, or a vtable).
    LoadAddress {
        /// The symbol name of the static being addressed.
        target: String,
    },

    // -- arithmetic / logical --
    /// Tagged-integer arithmetic/bitwise op.
    IntOp {
        /// Which operator.
        kind: IntOpKind,
        /// Left operand.
        lhs: RegisterId,
        /// Right operand; ignored for unary kinds (`Neg`/`Invert`), which
        /// reuse `lhs` as their sole operand.
        rhs: RegisterId,
    },
    /// A comparison, producing an unboxed `bool`.
    ComparisonOp {
        /// Which comparison.
        kind: ComparisonOpKind,
        /// Left operand.
        lhs: RegisterId,
        /// Right operand.
        rhs: RegisterId,
    },
    /// Float arithmetic op.
    FloatOp {
        /// Which operator.
        kind: FloatOpKind,
        /// Left operand.
        lhs: RegisterId,
        /// Right operand.
        rhs: RegisterId,
    },
    /// Float comparison, producing an unboxed `bool`.
    FloatComparisonOp {
        /// Which comparison.
        kind: ComparisonOpKind,
        /// Left operand.
        lhs: RegisterId,
        /// Right operand.
        rhs: RegisterId,
    },
    /// Float unary negation.
    FloatNeg {
        /// The operand.
        src: RegisterId,
    },
    /// Strict (already-evaluated) boolean op.
    BoolOp {
        /// Which operator.
        kind: BoolOpKind,
        /// Left operand.
        lhs: RegisterId,
        /// Right operand; ignored for `Not`.
        rhs: RegisterId,
    },

    // -- memory --
    /// Reads an attribute off an object. May raise `AttributeError`.
    GetAttr {
        /// The object being read.
        obj: RegisterId,
        /// The attribute name.
        name: String,
    },
    /// Writes an attribute on an object. May raise `AttributeError` (a
    /// read-only property) or `TypeError` (a type-checked attribute).
    SetAttr {
        /// The object being written.
        obj: RegisterId,
        /// The attribute name.
        name: String,
        /// The value being stored.
        value: RegisterId,
    },
    /// Computes a raw pointer offset into `base` (used for struct field
    /// and container-element addressing).
    GetElementPtr {
        /// The base pointer.
        base: RegisterId,
        /// The offset, in elements of the pointee's size.
        index: RegisterId,
    },
    /// Raw, untyped load from a computed address.
    LoadMem {
        /// The address to load from.
        addr: RegisterId,
    },
    /// Raw, untyped store to a computed address.
    StoreMem {
        /// The address to store to.
        addr: RegisterId,
        /// The value to store.
        value: RegisterId,
    },

    // -- boxing --
    /// Boxes an unboxed value onto the heap.
    Box {
        /// The unboxed operand.
        src: RegisterId,
    },
    /// Unboxes a heap value into its unboxed representation. May fail if
    /// the runtime value doesn't fit `target_type` (e.g. an `int` too
    /// large to downcast to `i64`).
    Unbox {
        /// The boxed operand.
        src: RegisterId,
        /// The unboxed type to produce.
        target_type: RType,
    },
    /// Checked reinterpretation from one boxed type to another (e.g. a
    /// downcast from `object` to a native class). May fail with
    /// `TypeError`.
    Cast {
        /// The operand being cast.
        src: RegisterId,
        /// The type being cast to.
        target_type: RType,
    },

    // -- calls --
    /// Native calling convention call to a function in this compilation
    /// unit.
    Call {
        /// The callee.
        func: FuncRef,
        /// The call arguments.
        args: CallArgs,
    },
    /// Virtual dispatch through an object's vtable.
    MethodCall {
        /// The receiver.
        obj: RegisterId,
        /// The method name (resolved to a vtable slot at emission time).
        method_name: String,
        /// The call arguments (excluding the implicit receiver).
        args: CallArgs,
    },
    /// Calls a C runtime helper by name.
    CallC {
        /// The helper's C symbol name.
        c_function: String,
        /// The call arguments.
        args: CallArgs,
    },
    /// Late-bound fallback: a full CPython `PyObject_Call`-shaped call,
    /// used when early binding could not resolve the callee.
    PyCall {
        /// The callee, resolved dynamically.
        obj: RegisterId,
        /// Positional arguments.
        args: Vec<RegisterId>,
        /// Keyword arguments.
        kwargs: KwArgs,
    },

    // -- lifetime --
    /// Increments `src`'s reference count.
    IncRef {
        /// The register being retained.
        src: RegisterId,
    },
    /// Decrements `src`'s reference count.
    DecRef {
        /// The register being released.
        src: RegisterId,
        /// Whether this is an "xdecref" (a no-op if `src` holds NULL,
        /// used when `src` might not have been assigned on this path).
        is_xdec: bool,
    },
    /// A no-op marker that keeps the listed registers alive (reference
    /// counted) up to this point, preventing the refcount pass from
    /// releasing them earlier than a borrow requires.
    KeepAlive {
        /// The registers to keep alive.
        vars: Vec<RegisterId>,
    },

    // -- exception machinery --
    /// Constructs and raises one of the dialect's built-in exceptions.
    RaiseStandardError {
        /// Which exception.
        kind: StandardErrorKind,
        /// An optional formatted message.
        message: Option<String>,
    },
    /// Produces `ty`'s error sentinel value, for epilogue blocks that
    /// return failure without having a "real" failing sub-expression
    /// (e.g. the uninit pass's synthesized raise path).
    ErrorValue {
        /// The type whose sentinel to produce.
        ty: RType,
    },

    // -- uninit pass support (§4.5) --
    /// Tests whether `local` is definitely assigned at this point in the
    /// function; produces an unboxed `bool`. Inserted only by the uninit
    /// pass.
    IsAssigned {
        /// The local being tested.
        local: RegisterId,
    },

    // -- containers (selected) --
    /// Builds a new list from its initial elements.
    ListNew {
        /// The initial elements, in order.
        items: Vec<RegisterId>,
    },
    /// Indexes into a list. May raise `IndexError`.
    ListGet {
        /// The list.
        list: RegisterId,
        /// The index.
        index: RegisterId,
    },
    /// Assigns into a list slot. May raise `IndexError`.
    ListSet {
        /// The list.
        list: RegisterId,
        /// The index.
        index: RegisterId,
        /// The value.
        value: RegisterId,
    },
    /// Builds a new dict from its initial key/value pairs.
    DictNew {
        /// The initial entries, in insertion order.
        items: Vec<(RegisterId, RegisterId)>,
    },
    /// Looks up a key in a dict. May raise `KeyError`.
    DictGet {
        /// The dict.
        dict: RegisterId,
        /// The key.
        key: RegisterId,
    },
    /// Assigns a key in a dict.
    DictSet {
        /// The dict.
        dict: RegisterId,
        /// The key.
        key: RegisterId,
        /// The value.
        value: RegisterId,
    },
    /// Builds a new value-typed tuple from its elements.
    TupleNew {
        /// The elements, in order.
        items: Vec<RegisterId>,
    },
}

/// A single IR instruction: an [`OpKind`] plus its destination register
/// (if it produces a value), exception-raising metadata, and source
/// location.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Op {
    dest: Option<RegisterId>,
    kind: OpKind,
    can_raise: CanRaise,
    error_kind: ErrorKind,
    location: SourceSpan,
}

impl Op {
    /// Construct an op. `can_raise`/`error_kind` are supplied by the
    /// builder (from the primitive registry's lowering rule for this
    /// shape) rather than inferred here, since the registry is the
    /// single source of truth for which ops can fail.
    pub fn new(
        dest: Option<RegisterId>,
        kind: OpKind,
        can_raise: CanRaise,
        error_kind: ErrorKind,
        location: SourceSpan,
    ) -> Self {
        Self {
            dest,
            kind,
            can_raise,
            error_kind,
            location,
        }
    }

    /// The register this op writes its result to, if any.
    pub fn dest(&self) -> Option<RegisterId> {
        self.dest
    }

    /// Mutable access to the destination, used by the refcount pass when
    /// it needs to insert a fresh temporary between an op and its uses.
    pub fn set_dest(&mut self, dest: Option<RegisterId>) {
        self.dest = dest;
    }

    /// The operation performed.
    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    /// Whether, and how eagerly, this op can raise.
    pub fn can_raise(&self) -> CanRaise {
        self.can_raise
    }

    /// How this op signals failure to its checker.
    pub fn error_kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    /// This op's source location, for diagnostics only.
    pub fn location(&self) -> &SourceSpan {
        &self.location
    }

    /// The registers this op reads, in an unspecified but stable order.
    /// Used by liveness analysis (§4.7) and by `IncRef`/`DecRef`
    /// placement.
    pub fn operands(&self) -> Vec<RegisterId> {
        use OpKind::*;
        match &self.kind {
            Assign { src } => vec![*src],
            LoadLiteral { .. } | LoadAddress { .. } => vec![],
            IntOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            ComparisonOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            FloatOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            FloatComparisonOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            FloatNeg { src } => vec![*src],
            BoolOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            GetAttr { obj, .. } => vec![*obj],
            SetAttr { obj, value, .. } => vec![*obj, *value],
            GetElementPtr { base, index } => vec![*base, *index],
            LoadMem { addr } => vec![*addr],
            StoreMem { addr, value } => vec![*addr, *value],
            Box { src } => vec![*src],
            Unbox { src, .. } => vec![*src],
            Cast { src, .. } => vec![*src],
            Call { args, .. } => args.positional.clone(),
            MethodCall { obj, args, .. } => {
                let mut v = vec![*obj];
                v.extend(args.positional.iter().copied());
                v
            }
            CallC { args, .. } => args.positional.clone(),
            PyCall { obj, args, kwargs } => {
                let mut v = vec![*obj];
                v.extend(args.iter().copied());
                v.extend(kwargs.iter().map(|(_, r)| *r));
                v
            }
            IncRef { src } => vec![*src],
            DecRef { src, .. } => vec![*src],
            KeepAlive { vars } => vars.clone(),
            RaiseStandardError { .. } => vec![],
            ErrorValue { .. } => vec![],
            IsAssigned { local } => vec![*local],
            ListNew { items } => items.clone(),
            ListGet { list, index } => vec![*list, *index],
            ListSet { list, index, value } => vec![*list, *index, *value],
            DictNew { items } => items.iter().flat_map(|(k, v)| [*k, *v]).collect(),
            DictGet { dict, key } => vec![*dict, *key],
            DictSet { dict, key, value } => vec![*dict, *key, *value],
            TupleNew { items } => items.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intop_operands_are_lhs_and_rhs() {
        let op = Op::new(
            Some(RegisterId::from_raw(2)),
            OpKind::IntOp {
                kind: IntOpKind::Add,
                lhs: RegisterId::from_raw(0),
                rhs: RegisterId::from_raw(1),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        );
        assert_eq!(
            op.operands(),
            vec![RegisterId::from_raw(0), RegisterId::from_raw(1)]
        );
    }

    #[test]
    fn load_literal_has_no_operands() {
        let op = Op::new(
            Some(RegisterId::from_raw(0)),
            OpKind::LoadLiteral {
                value: LiteralValue::Int(1),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        );
        assert!(op.operands().is_empty());
    }
}
