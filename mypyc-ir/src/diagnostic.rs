use std::fmt;

use crate::location::SourceSpan;

/// How fatal a [`Diagnostic`] is, independent of which stage raised it
/// (§3.1, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Fatal to the definition (function/class) or unit the diagnostic's
    /// `code` names — see each stage error's own fatality mapping.
    Error,
    /// Surfaced to the driver; does not stop compilation of anything.
    Warning,
    /// An internal invariant failure: a pass's own post-condition did
    /// not hold. Always fatal to the unit.
    Bug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Bug => "bug",
        };
        write!(f, "{s}")
    }
}

/// One structured compile-time message (§3.1). Stage crates never print;
/// they construct a `Diagnostic` and push it onto a [`DiagnosticSink`],
/// leaving it to a driver to decide how (or whether) to render it —
/// mirroring how the teacher keeps `PanicReason`/`InterpreterError` as
/// plain value types with no notion of printing baked in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// How fatal this diagnostic is.
    pub severity: Severity,
    /// A short, stable identifier for the diagnostic's kind (e.g.
    /// `"unsupported-construct"`), suitable for grouping or filtering.
    pub code: &'static str,
    /// The human-readable message.
    pub message: String,
    /// Where in the source the diagnostic applies.
    pub span: SourceSpan,
}

impl Diagnostic {
    /// Construct a diagnostic from its parts.
    pub fn new(
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// Accumulates diagnostics for one compilation unit (§3.1). Every stage
/// (declaration, body build, the three passes, emission) is handed a
/// `&mut DiagnosticSink`; only the façade reads it back once a unit
/// finishes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Whether any diagnostic has been recorded.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether any recorded diagnostic is fatal (`Error` or `Bug`).
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.severity, Severity::Error | Severity::Bug))
    }

    /// The recorded diagnostics, in the order they were pushed.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the sink, yielding its diagnostics.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_reports_errors_present() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        sink.push(Diagnostic::new(
            Severity::Warning,
            "non-native-class",
            "falling back to interpreted class",
            SourceSpan::synthetic(),
        ));
        assert!(!sink.has_errors());
        sink.push(Diagnostic::new(
            Severity::Error,
            "name-collision",
            "foo declared twice",
            SourceSpan::synthetic(),
        ));
        assert!(sink.has_errors());
        assert_eq!(sink.diagnostics().len(), 2);
    }
}
