// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Parse diagnostics.
//!
//! The parser never aborts: it collects [`Diagnostic`]s and keeps going.
//! Each diagnostic carries the offending token's location and lexeme so the
//! driver can render the classic
//! `[Line L, Column C] Error at '<lexeme>': <message>` form, plus a byte
//! [`Span`] for miette source-context rendering.

use ecow::EcoString;

use super::{Span, Token, TokenKind};

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// An error that fails the compilation unit.
    Error,
    /// A warning that does not fail the unit.
    Warning,
}

/// A diagnostic message anchored at a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: Severity,
    /// The message text.
    pub message: EcoString,
    /// 1-based source line of the offending token.
    pub line: u32,
    /// 1-based source column of the offending token.
    pub column: u32,
    /// Lexeme of the offending token (empty at end of input).
    pub lexeme: EcoString,
    /// Whether the diagnostic points at end of input.
    pub at_end: bool,
    /// Byte span of the offending token.
    pub span: Span,
}

impl Diagnostic {
    /// Creates an error diagnostic anchored at `token`.
    #[must_use]
    pub fn error_at(token: &Token, message: impl Into<EcoString>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            line: token.line(),
            column: token.column(),
            lexeme: token.lexeme().into(),
            at_end: token.kind() == TokenKind::Eof,
            span: token.span(),
        }
    }

    /// Creates a warning diagnostic anchored at `token`.
    #[must_use]
    pub fn warning_at(token: &Token, message: impl Into<EcoString>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error_at(token, message)
        }
    }

    /// Returns `true` if this diagnostic is an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(f, "[Line {}, Column {}] {kind}", self.line, self.column)?;
        if self.at_end {
            write!(f, " at end")?;
        } else {
            write!(f, " at '{}'", self.lexeme)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, lexeme: &str, line: u32, column: u32) -> Token {
        let len = u32::try_from(lexeme.len()).unwrap();
        Token::new(kind, lexeme, line, column, Span::new(0, len))
    }

    #[test]
    fn display_points_at_lexeme() {
        let diag = Diagnostic::error_at(
            &token(TokenKind::Semicolon, ";", 3, 14),
            "Expected expression",
        );
        assert_eq!(
            diag.to_string(),
            "[Line 3, Column 14] Error at ';': Expected expression"
        );
    }

    #[test]
    fn display_at_end_of_input() {
        let diag = Diagnostic::error_at(&token(TokenKind::Eof, "", 7, 1), "Expected RIGHT_BRACE");
        assert_eq!(
            diag.to_string(),
            "[Line 7, Column 1] Error at end: Expected RIGHT_BRACE"
        );
    }

    #[test]
    fn severity_predicates() {
        let tok = token(TokenKind::Identifier, "x", 1, 1);
        assert!(Diagnostic::error_at(&tok, "m").is_error());
        assert!(!Diagnostic::warning_at(&tok, "m").is_error());
    }
}
