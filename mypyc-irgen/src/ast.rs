use mypyc_ir::SourceSpan;
use mypyc_registry::{BinarySymbol, CompareSymbol, UnarySymbol};
use mypyc_types::RType;

/// A typed expression node (§4.4.1). Every node carries its resolved
/// `RType` inline, since the front-end collaborator's "expression → type"
/// map (§6) is realised as a field here rather than a side table.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedExpr {
    /// A reference to a name resolved by the `SymbolTable`.
    Name {
        /// The name referenced.
        name: String,
        /// Its resolved type.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
    /// An integer literal.
    IntLiteral {
        /// The literal's value.
        value: i64,
        /// Source location.
        span: SourceSpan,
    },
    /// A boolean literal.
    BoolLiteral {
        /// The literal's value.
        value: bool,
        /// Source location.
        span: SourceSpan,
    },
    /// A float literal.
    FloatLiteral {
        /// The literal's value.
        value: f64,
        /// Source location.
        span: SourceSpan,
    },
    /// A string literal.
    StrLiteral {
        /// The literal's value.
        value: String,
        /// Source location.
        span: SourceSpan,
    },
    /// The `None` literal.
    NoneLiteral {
        /// Source location.
        span: SourceSpan,
    },
    /// A binary operator expression.
    BinaryOp {
        /// Which operator.
        op: BinarySymbol,
        /// Left operand.
        left: Box<TypedExpr>,
        /// Right operand.
        right: Box<TypedExpr>,
        /// The expression's resolved type.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
    /// A unary operator expression.
    UnaryOp {
        /// Which operator.
        op: UnarySymbol,
        /// The operand.
        operand: Box<TypedExpr>,
        /// The expression's resolved type.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
    /// A comparison expression.
    Compare {
        /// Which comparison.
        op: CompareSymbol,
        /// Left operand.
        left: Box<TypedExpr>,
        /// Right operand.
        right: Box<TypedExpr>,
        /// Source location.
        span: SourceSpan,
    },
    /// A short-circuiting `and`/`or` chain over two or more operands.
    BoolOp {
        /// `true` for `and`, `false` for `or`.
        is_and: bool,
        /// The chained operands, evaluated left to right.
        values: Vec<TypedExpr>,
        /// Source location.
        span: SourceSpan,
    },
    /// A function call.
    Call {
        /// The callee expression.
        func: Box<TypedExpr>,
        /// Positional arguments.
        args: Vec<TypedExpr>,
        /// Keyword arguments.
        kwargs: Vec<(String, TypedExpr)>,
        /// The call's resolved return type.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
    /// An attribute read.
    Attribute {
        /// The object being read.
        obj: Box<TypedExpr>,
        /// The attribute name.
        name: String,
        /// The attribute's resolved type.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
    /// A method call, bound to its receiver at the call site (rather
    /// than first materializing a bound-method object).
    MethodCall {
        /// The receiver.
        obj: Box<TypedExpr>,
        /// The method name.
        method: String,
        /// Positional arguments (excluding the implicit receiver).
        args: Vec<TypedExpr>,
        /// The call's resolved return type.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
    /// A ternary conditional expression (`body if test else orelse`).
    Conditional {
        /// The test.
        test: Box<TypedExpr>,
        /// The value when `test` is true.
        body: Box<TypedExpr>,
        /// The value when `test` is false.
        orelse: Box<TypedExpr>,
        /// The expression's joined type.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
    /// A list display (`[a, b, c]`).
    ListDisplay {
        /// The element expressions, in order.
        items: Vec<TypedExpr>,
        /// Source location.
        span: SourceSpan,
    },
    /// A dict display (`{k: v, ...}`).
    DictDisplay {
        /// The key/value pairs, in insertion order.
        items: Vec<(TypedExpr, TypedExpr)>,
        /// Source location.
        span: SourceSpan,
    },
    /// A set display (`{a, b, c}`), always compiled through the generic
    /// `object` runtime helper path — the dialect has no unboxed set
    /// representation (§4.1, Non-goals).
    SetDisplay {
        /// The element expressions, in order.
        items: Vec<TypedExpr>,
        /// Source location.
        span: SourceSpan,
    },
    /// A tuple display (`(a, b, c)`).
    TupleDisplay {
        /// The element expressions, in order.
        items: Vec<TypedExpr>,
        /// Source location.
        span: SourceSpan,
    },
    /// A `yield` expression, valid only inside a generator function body.
    Yield {
        /// The yielded value, if any.
        value: Option<Box<TypedExpr>>,
        /// The type the corresponding `send()` call resumes with.
        ty: RType,
        /// Source location.
        span: SourceSpan,
    },
}

impl TypedExpr {
    /// This expression's resolved type.
    pub fn ty(&self) -> RType {
        match self {
            TypedExpr::Name { ty, .. }
            | TypedExpr::BinaryOp { ty, .. }
            | TypedExpr::UnaryOp { ty, .. }
            | TypedExpr::Call { ty, .. }
            | TypedExpr::Attribute { ty, .. }
            | TypedExpr::MethodCall { ty, .. }
            | TypedExpr::Conditional { ty, .. }
            | TypedExpr::Yield { ty, .. } => ty.clone(),
            TypedExpr::IntLiteral { .. } => RType::int(),
            TypedExpr::BoolLiteral { .. } => RType::bool(),
            TypedExpr::FloatLiteral { .. } => RType::float(),
            TypedExpr::StrLiteral { .. } => RType::object(),
            TypedExpr::NoneLiteral { .. } => RType::none(),
            TypedExpr::Compare { .. } | TypedExpr::BoolOp { .. } => RType::bool(),
            TypedExpr::ListDisplay { .. }
            | TypedExpr::DictDisplay { .. }
            | TypedExpr::SetDisplay { .. } => RType::object(),
            TypedExpr::TupleDisplay { items, .. } => {
                let item_types: Vec<RType> = items.iter().map(TypedExpr::ty).collect();
                mypyc_types::RTuple::new(item_types)
                    .map(RType::RTuple)
                    .unwrap_or_else(|_| RType::object())
            }
        }
    }

    /// This expression's source location.
    pub fn span(&self) -> &SourceSpan {
        match self {
            TypedExpr::Name { span, .. }
            | TypedExpr::IntLiteral { span, .. }
            | TypedExpr::BoolLiteral { span, .. }
            | TypedExpr::FloatLiteral { span, .. }
            | TypedExpr::StrLiteral { span, .. }
            | TypedExpr::NoneLiteral { span, .. }
            | TypedExpr::BinaryOp { span, .. }
            | TypedExpr::UnaryOp { span, .. }
            | TypedExpr::Compare { span, .. }
            | TypedExpr::BoolOp { span, .. }
            | TypedExpr::Call { span, .. }
            | TypedExpr::Attribute { span, .. }
            | TypedExpr::MethodCall { span, .. }
            | TypedExpr::Conditional { span, .. }
            | TypedExpr::ListDisplay { span, .. }
            | TypedExpr::DictDisplay { span, .. }
            | TypedExpr::SetDisplay { span, .. }
            | TypedExpr::TupleDisplay { span, .. }
            | TypedExpr::Yield { span, .. } => span,
        }
    }
}

/// One `except` clause of a `TypedStmt::Try`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    /// The exception type name matched, or `None` for a bare `except:`.
    pub exc_type: Option<String>,
    /// The name the caught exception is bound to, if any.
    pub bind: Option<String>,
    /// The handler's body.
    pub body: Vec<TypedStmt>,
}

/// A typed statement node (§4.4.1).
#[derive(Debug, Clone, PartialEq)]
pub enum TypedStmt {
    /// A simple assignment to a local, global, or attribute.
    Assign {
        /// The name being assigned (resolved through the symbol table).
        target: String,
        /// The value.
        value: TypedExpr,
        /// Whether this is a module-level `Final` declaration (§4.4,
        /// "Final-attribute inlining"). Only meaningful at module scope;
        /// a local `Assign` leaves this `false`.
        is_final: bool,
        /// Source location.
        span: SourceSpan,
    },
    /// An augmented assignment (`target op= value`).
    AugAssign {
        /// The name being updated.
        target: String,
        /// Which operator.
        op: BinarySymbol,
        /// The right-hand operand.
        value: TypedExpr,
        /// Source location.
        span: SourceSpan,
    },
    /// An expression evaluated for its side effect, result discarded.
    ExprStmt(TypedExpr),
    /// `if test: body else: orelse`.
    If {
        /// The test.
        test: TypedExpr,
        /// The taken-when-true body.
        body: Vec<TypedStmt>,
        /// The taken-when-false body (empty for no `else`).
        orelse: Vec<TypedStmt>,
        /// Source location.
        span: SourceSpan,
    },
    /// `while test: body`.
    While {
        /// The loop test, re-evaluated each iteration.
        test: TypedExpr,
        /// The loop body.
        body: Vec<TypedStmt>,
        /// Source location.
        span: SourceSpan,
    },
    /// `for target in iter: body`.
    For {
        /// The loop variable's name.
        target: String,
        /// The iterable expression.
        iter: TypedExpr,
        /// The loop body.
        body: Vec<TypedStmt>,
        /// Source location.
        span: SourceSpan,
    },
    /// `try: body except ...: handlers else: orelse finally: finalbody`.
    Try {
        /// The guarded body.
        body: Vec<TypedStmt>,
        /// The handlers, tried in order.
        handlers: Vec<ExceptHandler>,
        /// The body run only if no exception was raised.
        orelse: Vec<TypedStmt>,
        /// The body always run on the way out.
        finalbody: Vec<TypedStmt>,
        /// Source location.
        span: SourceSpan,
    },
    /// `with context as target: body`.
    With {
        /// The context manager expression.
        context: TypedExpr,
        /// The name `__enter__`'s result is bound to, if any.
        target: Option<String>,
        /// The guarded body.
        body: Vec<TypedStmt>,
        /// Source location.
        span: SourceSpan,
    },
    /// `return value`.
    Return(Option<TypedExpr>, SourceSpan),
    /// `raise exc` (or bare `raise` to re-raise the active exception).
    Raise(Option<TypedExpr>, SourceSpan),
    /// `break`.
    Break(SourceSpan),
    /// `continue`.
    Continue(SourceSpan),
    /// `pass`.
    Pass(SourceSpan),
    /// A nested function definition.
    FunctionDef(TypedFunctionDef),
    /// A nested class definition.
    ClassDef(TypedClassDef),
}

/// One function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// The parameter's name.
    pub name: String,
    /// The parameter's declared type.
    pub ty: RType,
}

/// A function definition (§4.4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedFunctionDef {
    /// The function's name.
    pub name: String,
    /// Its parameters, in declaration order.
    pub params: Vec<Param>,
    /// Its declared return type.
    pub ret: RType,
    /// Its body.
    pub body: Vec<TypedStmt>,
    /// Whether the body contains a `yield`, forcing the generator
    /// state-machine lowering (§4.4).
    pub is_generator: bool,
}

/// A class definition (§4.4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedClassDef {
    /// The class's name.
    pub name: String,
    /// Base class names, in MRO order (first is the primary base).
    pub bases: Vec<String>,
    /// Instance attributes, in declaration order.
    pub attrs: Vec<(String, RType)>,
    /// Methods defined directly on this class.
    pub methods: Vec<TypedFunctionDef>,
}

/// A single module's top-level statement list (§4.4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedModule {
    /// The module's fully-qualified name.
    pub name: String,
    /// Top-level statements, in source order.
    pub body: Vec<TypedStmt>,
}
