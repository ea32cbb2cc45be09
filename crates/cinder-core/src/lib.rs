// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Cinder compiler core.
//!
//! This crate contains the core compiler functionality:
//! - Lexical analysis (tokenization)
//! - Parsing (arena-allocated AST construction with error recovery)
//! - Structural validation and unparsing
//! - Code generation (textual assembly for x86_64, ARM64, RISC-V64)
//!
//! The compiler is a strict single pass pipeline: the lexer feeds the
//! parser, the parser produces the full AST, and the code generator walks
//! it once, emitting assembly text. Assembling and linking are the
//! driver's business (see the `cinder-cli` crate).

pub mod ast;
pub mod codegen;
pub mod intern;
pub mod parse;
pub mod unparse;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::ast::{Ast, Node, NodeId, NodeKind};
    pub use crate::codegen::{CodeGenerator, OptLevel, TargetArch};
    pub use crate::parse::{Diagnostic, ParseResult, Span, Token, TokenKind, lex, parse_source};
}
