// diag.rs — Diagnostics for the modelling language front-end
//
// Shared diagnostic types for the lexer, parser, and encoder. A diagnostic
// carries a byte-offset span; line/column are derived lazily from the source
// so the AST stays free of position bookkeeping.

use std::fmt;

use chumsky::span::SimpleSpan;

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any front-end phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagLevel,
    pub span: SimpleSpan,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(span: SimpleSpan, message: impl Into<String>) -> Self {
        Self {
            level: DiagLevel::Error,
            span,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a recovery hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Resolve the start of this diagnostic's span to a line/column pair.
    pub fn position(&self, source: &str) -> SourcePos {
        SourcePos::from_offset(source, self.span.start)
    }

    /// Render as `line:column: error: message` with an optional hint line.
    pub fn render(&self, source: &str) -> String {
        let pos = self.position(source);
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        let mut out = format!("{}:{}: {}: {}", pos.line, pos.column, level, self.message);
        if let Some(hint) = &self.hint {
            out.push_str("\n  hint: ");
            out.push_str(hint);
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

// ── Source position ──────────────────────────────────────────────────────

/// 1-based line/column resolved from a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut col = 1;
        for (i, ch) in source.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        SourcePos { line, column: col }
    }
}
