/// A source location copied onto every [`Op`](crate::Op), used only for
/// diagnostics — it has no effect on code generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceSpan {
    /// The source file this span belongs to, relative to the compilation
    /// unit's root.
    pub file: String,
    /// 1-based line the span starts on.
    pub line: u32,
    /// 0-based column the span starts on.
    pub column: u32,
}

impl SourceSpan {
    /// A span with no useful location, for synthesized ops that don't
    /// correspond to any source construct (e.g. a pass-inserted `IncRef`).
    pub fn synthetic() -> Self {
        Self {
            file: String::new(),
            line: 0,
            column: 0,
        }
    }
}
