/// Binary operator symbols the registry can key a [`OpShape::BinaryOp`]
/// entry on, mirroring the dialect's operator set (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinarySymbol {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (true division; always produces `float` for the `int`/`int`
    /// case, unlike `//`).
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
}

/// Unary operator symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnarySymbol {
    /// unary `-`
    Neg,
    /// unary `~`
    Invert,
    /// `not`
    Not,
}

/// Comparison operator symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareSymbol {
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

/// The AST-level shape an entry is keyed on (§4.3): a binary/unary/
/// comparison operator, or a call to a named built-in function or
/// method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpShape {
    /// A binary operator expression.
    BinaryOp(BinarySymbol),
    /// A unary operator expression.
    UnaryOp(UnarySymbol),
    /// A comparison expression.
    Compare(CompareSymbol),
    /// A call to a built-in function, keyed by its fully-qualified name
    /// (e.g. `"builtins.len"`).
    Call(String),
    /// A call to a built-in method, keyed by the receiver type's name
    /// and the method name (e.g. `("list", "append")`).
    MethodCall(String, String),
}
