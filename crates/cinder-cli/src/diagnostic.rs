// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic rendering for the driver.
//!
//! Parse diagnostics reach stderr in the classic single-line form
//! `[Line L, Column C] Error at '<lexeme>': <message>` (or ` at end`).
//! Under `--verbose` each error additionally gets a miette-rendered
//! source snippet with an arrow at the offending span.

use cinder_core::parse::{Diagnostic as CoreDiagnostic, Severity};
use miette::{Diagnostic, SourceSpan};

/// A compilation diagnostic with rich formatting.
#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("{message}")]
#[diagnostic(code(cinder::parse))]
pub struct CompileDiagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Source code for context.
    #[source_code]
    pub src: miette::NamedSource<String>,
    /// Location of the error.
    #[label("{label}")]
    pub span: SourceSpan,
    /// Label for the error span.
    pub label: String,
}

impl CompileDiagnostic {
    /// Wraps a core diagnostic with the source it points into.
    #[must_use]
    pub fn from_core(diagnostic: &CoreDiagnostic, source_path: &str, source: &str) -> Self {
        let label = match diagnostic.severity {
            Severity::Error => "error here",
            Severity::Warning => "warning here",
        };
        Self {
            severity: diagnostic.severity,
            message: diagnostic.message.to_string(),
            src: miette::NamedSource::new(source_path, source.to_owned()),
            span: diagnostic.span.into(),
            label: label.to_owned(),
        }
    }
}

/// Prints parse diagnostics to stderr.
pub fn report_parse_diagnostics(
    diagnostics: &[CoreDiagnostic],
    source_path: &str,
    source: &str,
    verbose: bool,
) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
        if verbose {
            let rich = CompileDiagnostic::from_core(diagnostic, source_path, source);
            eprintln!("{:?}", miette::Report::new(rich));
        }
    }
}

/// Prints code generation errors to stderr.
pub fn report_codegen_errors(errors: &[cinder_core::codegen::CodeGenError]) {
    for error in errors {
        eprintln!("Code generation error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::parse::{Span, Token, TokenKind};

    #[test]
    fn wraps_core_diagnostic_with_span() {
        let token = Token::new(TokenKind::Semicolon, ";", 1, 14, Span::new(13, 14));
        let core = CoreDiagnostic::error_at(&token, "Expected expression");
        let diag = CompileDiagnostic::from_core(&core, "test.cin", "i32 f() { ret ; }");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "Expected expression");
        assert_eq!(diag.span.offset(), 13);
        assert_eq!(diag.span.len(), 1);
    }
}
