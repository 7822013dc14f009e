#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseDiagnosticSeverity {
    Warning,
}

/// Non-fatal note produced while parsing (ignored top-level commands, unknown flags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub code: String,
    pub severity: ParseDiagnosticSeverity,
    pub message: String,
    pub span: Option<Span>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Syntax error: {message}")]
    #[diagnostic(code(soarta::parse::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Invalid number literal '{text}'")]
    #[diagnostic(code(soarta::parse::number))]
    InvalidNumber {
        text: String,
        #[label("not representable")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Duplicate production: {name}")]
    #[diagnostic(
        code(soarta::parse::duplicate),
        help("production names must be unique within one rule file")
    )]
    Duplicate {
        name: String,
        #[label("duplicate")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::Syntax {
            message: message.into(),
            span: to_source_span(span),
            src: miette::NamedSource::new(filename, source.to_string()),
        }
    }

    pub fn invalid_number(text: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::InvalidNumber {
            text: text.into(),
            span: to_source_span(span),
            src: miette::NamedSource::new(filename, source.to_string()),
        }
    }

    pub fn duplicate(name: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::Duplicate {
            name: name.into(),
            span: to_source_span(span),
            src: miette::NamedSource::new(filename, source.to_string()),
        }
    }
}

fn to_source_span(span: Span) -> miette::SourceSpan {
    (span.start, span.end.saturating_sub(span.start)).into()
}
