//! Errors reported while lexing, parsing or running a script.

use crate::ast::Span;
use thiserror::Error;

/// A script failure surfaced to the embedder.
///
/// Exceptions thrown by script code and caught by script code never reach this type; only uncaught
/// ones do.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("syntax error at {span}: {message}")]
    Syntax { message: String, span: Span },

    #[error("uncaught {message}")]
    Uncaught { message: String, span: Span },

    #[error("execution budget of {limit} steps exhausted")]
    BudgetExhausted { limit: u64, span: Span },
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        ScriptError::Syntax {
            message: message.into(),
            span,
        }
    }

    /// Source location the error points at.
    pub fn span(&self) -> Span {
        match self {
            ScriptError::Syntax { span, .. }
            | ScriptError::Uncaught { span, .. }
            | ScriptError::BudgetExhausted { span, .. } => *span,
        }
    }

    /// Render the error with a `line:col` prefix resolved against `source`.
    pub fn render(&self, source: &str) -> String {
        let (line, col) = self.span().line_col(source);
        format!("{line}:{col}: {self}")
    }
}
