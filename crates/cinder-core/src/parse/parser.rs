// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Recursive descent parser for Cinder source code.
//!
//! The parser consumes a buffered token stream and builds a uniform-node
//! AST in an arena (see [`crate::ast`]). It is designed around mandatory
//! error recovery:
//!
//! - **Always produces an AST**: possibly partial, never absent.
//! - **Panic mode**: the first error in a construct is reported; further
//!   errors are suppressed until synchronization reaches a
//!   statement/declaration boundary, then reporting resumes.
//! - **Forward progress**: synchronization always advances, so parsing
//!   terminates on every input.
//!
//! # Expression precedence
//!
//! Precedence climbing, lowest first: assignment (right-assoc), ternary
//! (right-assoc), `||`, `&&`, `|`, `^`, `&`, equality, relational, shift,
//! additive, multiplicative, prefix unary, postfix, primary.
//!
//! # Usage
//!
//! ```
//! use cinder_core::parse::parse_source;
//!
//! let result = parse_source("i32 main() { return 42; }");
//! assert_eq!(result.error_count(), 0);
//! ```

use ecow::EcoString;

use crate::ast::{Ast, NodeId, NodeKind};
use crate::parse::{Diagnostic, Token, TokenKind, lex};

/// Parses a token stream into an AST.
///
/// The token vector must be terminated by an EOF token, as produced by
/// [`lex`]. This is the main entry point; check
/// [`ParseResult::error_count`] before trusting the tree.
#[must_use]
pub fn parse(tokens: Vec<Token>) -> ParseResult {
    tracing::debug!(tokens = tokens.len(), "parsing token stream");
    let mut parser = Parser::new(tokens);
    let root = parser.parse_program();
    ParseResult {
        ast: parser.ast,
        root,
        diagnostics: parser.diagnostics,
    }
}

/// Lexes and parses a source string in one step.
#[must_use]
pub fn parse_source(source: &str) -> ParseResult {
    parse(lex(source))
}

/// The outcome of a parse: the arena, the program root, and diagnostics.
#[derive(Debug)]
pub struct ParseResult {
    /// The arena holding the parsed tree.
    pub ast: Ast,
    /// The `program` root node.
    pub root: NodeId,
    /// Collected diagnostics, in source order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Number of error diagnostics; non-zero fails the unit.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

/// The parser state.
struct Parser {
    /// Buffered token stream, EOF-terminated.
    tokens: Vec<Token>,
    /// Index of the current token.
    current: usize,
    /// The arena the tree is built in.
    ast: Ast,
    /// Accumulated diagnostics.
    diagnostics: Vec<Diagnostic>,
    /// Set on the first error of a construct; cleared by `synchronize`.
    panic_mode: bool,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            // Defensive: callers should use `lex`, which always terminates
            // the stream.
            tokens.push(Token::new(TokenKind::Eof, "", 1, 1, crate::parse::Span::default()));
        }
        Self {
            tokens,
            current: 0,
            ast: Ast::new(),
            diagnostics: Vec::new(),
            panic_mode: false,
        }
    }

    // ========================================================================
    // Token management
    // ========================================================================

    fn current_token(&self) -> &Token {
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| self.tokens.last().expect("token stream is never empty"))
    }

    fn current_kind(&self) -> TokenKind {
        self.current_token().kind()
    }

    /// One-slot token history; consulted by `synchronize`.
    fn previous_token(&self) -> Option<&Token> {
        self.current.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn is_at_end(&self) -> bool {
        self.current_kind() == TokenKind::Eof
    }

    /// Advances past the current token and returns it.
    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        if self.current_kind() == TokenKind::Invalid {
            self.error_at_current("Invalid token");
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Matches any of `kinds`, returning the consumed token on success.
    fn match_any(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        if kinds.contains(&self.current_kind()) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Expects `kind` at the current position, reporting an error otherwise.
    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            let message = format!(
                "Expected {}, got {}",
                kind.name(),
                self.current_kind().name()
            );
            self.error_at_current(message);
            false
        }
    }

    // ========================================================================
    // Error handling & recovery
    // ========================================================================

    /// Reports an error at the current token unless already panicking.
    fn error_at_current(&mut self, message: impl Into<EcoString>) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.diagnostics
            .push(Diagnostic::error_at(self.current_token(), message));
    }

    /// Advances to a statement/declaration boundary and clears panic mode.
    ///
    /// Scans forward until the previous token is a `;` or the current token
    /// can begin a statement/declaration. May return without consuming when
    /// the parser is already at a boundary; the parse loops carry a
    /// progress guard for that case.
    fn synchronize(&mut self) {
        self.panic_mode = false;

        while !self.is_at_end() {
            if self.previous_token().map(Token::kind) == Some(TokenKind::Semicolon) {
                return;
            }
            match self.current_kind() {
                TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Union
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ========================================================================
    // Node helpers
    // ========================================================================

    /// Allocates a node stamped with `token`'s source location.
    fn node_at(&mut self, kind: NodeKind, token: &Token) -> NodeId {
        let id = self.ast.node(kind);
        self.ast.set_location(id, token.line(), token.column());
        id
    }

    /// Allocates a valued node stamped with `token`'s source location.
    fn valued_node_at(&mut self, kind: NodeKind, value: &str, token: &Token) -> NodeId {
        let id = self.ast.node_with_value(kind, value);
        self.ast.set_location(id, token.line(), token.column());
        id
    }

    /// Allocates a literal node from a literal-bearing token.
    fn literal_from(&mut self, kind: NodeKind, token: &Token) -> NodeId {
        let id = match token.literal() {
            Some(literal) => self.ast.literal_node(kind, token.lexeme(), literal),
            None => self.ast.node_with_value(kind, token.lexeme()),
        };
        self.ast.set_location(id, token.line(), token.column());
        id
    }

    // ========================================================================
    // Program & declarations
    // ========================================================================

    /// Parses the whole unit into a `program` node.
    fn parse_program(&mut self) -> NodeId {
        let program = self.ast.node(NodeKind::Program);
        let mut last_position = usize::MAX;

        while !self.is_at_end() {
            if self.panic_mode {
                self.synchronize();
                continue;
            }
            // Progress guard: a boundary the grammar cannot consume would
            // otherwise loop forever.
            if self.current == last_position {
                self.advance();
                continue;
            }
            last_position = self.current;

            if let Some(decl) = self.parse_declaration() {
                self.ast.add_child(program, decl);
            }
        }

        program
    }

    fn parse_declaration(&mut self) -> Option<NodeId> {
        // Storage qualifiers are accepted and discarded; the generator has
        // no use for them yet.
        while matches!(
            self.current_kind(),
            TokenKind::Const | TokenKind::Static | TokenKind::Extern
        ) {
            self.advance();
        }

        if self.match_token(TokenKind::Module) {
            return self.parse_module_declaration();
        }
        if self.match_token(TokenKind::Import) {
            return self.parse_import_declaration();
        }
        if self.match_token(TokenKind::Export) {
            return self.parse_export_declaration();
        }
        if self.match_token(TokenKind::Struct) {
            return self.parse_aggregate_declaration(NodeKind::Struct);
        }
        if self.match_token(TokenKind::Enum) {
            return self.parse_enum_declaration();
        }
        if self.match_token(TokenKind::Union) {
            return self.parse_aggregate_declaration(NodeKind::Union);
        }

        if self.current_kind().is_type_leading() {
            return if self.looks_like_function() {
                self.parse_function_declaration()
            } else {
                self.parse_variable_declaration()
            };
        }

        self.parse_statement()
    }

    /// Restricted two-token speculation at a type-leading token: `type
    /// ident (` begins a function, anything else a variable. The
    /// speculative walk runs over the buffered token queue, so restoring
    /// the index makes it unobservable to the final parse.
    fn looks_like_function(&mut self) -> bool {
        let saved = self.current;
        let saved_diagnostics = self.diagnostics.len();
        let saved_panic = self.panic_mode;

        let mut is_function = false;
        if self.parse_type().is_some() && self.check(TokenKind::Identifier) {
            self.advance();
            is_function = self.check(TokenKind::LeftParen);
        }

        self.current = saved;
        self.diagnostics.truncate(saved_diagnostics);
        self.panic_mode = saved_panic;
        is_function
    }

    fn parse_module_declaration(&mut self) -> Option<NodeId> {
        if !self.check(TokenKind::Identifier) {
            self.error_at_current("Expected module name");
            return None;
        }
        let name = self.advance();
        let node = self.valued_node_at(NodeKind::Module, name.lexeme(), &name);
        self.consume(TokenKind::Semicolon);
        Some(node)
    }

    fn parse_import_declaration(&mut self) -> Option<NodeId> {
        if !self.check(TokenKind::Identifier) && !self.check(TokenKind::String) {
            self.error_at_current("Expected module name");
            return None;
        }
        let name = self.advance();
        let node = self.valued_node_at(NodeKind::Import, name.lexeme(), &name);
        self.consume(TokenKind::Semicolon);
        Some(node)
    }

    fn parse_export_declaration(&mut self) -> Option<NodeId> {
        let node = self.ast.node(NodeKind::Export);
        if let Some(inner) = self.parse_declaration() {
            self.ast.add_child(node, inner);
        }
        Some(node)
    }

    /// Parses a struct or union declaration; fields are variable
    /// declarations without initializers.
    fn parse_aggregate_declaration(&mut self, kind: NodeKind) -> Option<NodeId> {
        if !self.check(TokenKind::Identifier) {
            self.error_at_current(match kind {
                NodeKind::Union => "Expected union name",
                _ => "Expected struct name",
            });
            return None;
        }
        let name = self.advance();
        let node = self.valued_node_at(kind, name.lexeme(), &name);

        self.consume(TokenKind::LeftBrace);
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.panic_mode {
                break;
            }
            if let Some(field) = self.parse_variable_declaration() {
                if self.ast.child_count(field) > 1 {
                    self.error_at_current("Field initializers are not allowed");
                }
                self.ast.add_child(node, field);
            }
        }
        self.consume(TokenKind::RightBrace);
        Some(node)
    }

    fn parse_enum_declaration(&mut self) -> Option<NodeId> {
        if !self.check(TokenKind::Identifier) {
            self.error_at_current("Expected enum name");
            return None;
        }
        let name = self.advance();
        let node = self.valued_node_at(NodeKind::Enum, name.lexeme(), &name);

        self.consume(TokenKind::LeftBrace);
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if !self.check(TokenKind::Identifier) {
                self.error_at_current("Expected enum value name");
                break;
            }
            let value_name = self.advance();
            let value = self.valued_node_at(NodeKind::EnumValue, value_name.lexeme(), &value_name);

            if self.match_token(TokenKind::Assign) {
                if let Some(expr) = self.parse_expression() {
                    self.ast.add_child(value, expr);
                }
            }
            self.ast.add_child(node, value);

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace);
        Some(node)
    }

    fn parse_variable_declaration(&mut self) -> Option<NodeId> {
        let type_node = self.parse_type()?;

        if !self.check(TokenKind::Identifier) {
            self.error_at_current("Expected variable name");
            return None;
        }
        let name = self.advance();
        let decl = self.valued_node_at(NodeKind::VariableDeclaration, name.lexeme(), &name);
        self.ast.add_child(decl, type_node);

        if self.match_token(TokenKind::Assign) {
            if let Some(init) = self.parse_expression() {
                self.ast.add_child(decl, init);
            }
        }

        self.consume(TokenKind::Semicolon);
        Some(decl)
    }

    fn parse_function_declaration(&mut self) -> Option<NodeId> {
        let return_type = self.parse_type()?;

        if !self.check(TokenKind::Identifier) {
            self.error_at_current("Expected function name");
            return None;
        }
        let name = self.advance();
        let function = self.valued_node_at(NodeKind::Function, name.lexeme(), &name);
        self.ast.add_child(function, return_type);

        self.consume(TokenKind::LeftParen);
        let params = self.parse_parameter_list();
        self.ast.add_child(function, params);
        self.consume(TokenKind::RightParen);

        self.consume(TokenKind::LeftBrace);
        let body = self.parse_block();
        self.ast.add_child(function, body);

        Some(function)
    }

    fn parse_parameter_list(&mut self) -> NodeId {
        let list = self.ast.node(NodeKind::ParameterList);

        if self.check(TokenKind::RightParen) {
            return list;
        }

        loop {
            let Some(type_node) = self.parse_type() else {
                break;
            };

            let param = if self.check(TokenKind::Identifier) {
                let name = self.advance();
                self.valued_node_at(NodeKind::Parameter, name.lexeme(), &name)
            } else {
                self.ast.node(NodeKind::Parameter)
            };
            self.ast.add_child(param, type_node);
            self.ast.add_child(list, param);

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        list
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Parses a type specifier with any number of trailing `*` wrappers.
    fn parse_type(&mut self) -> Option<NodeId> {
        let token = self.current_token().clone();
        let mut type_node = match token.kind() {
            kind if kind.is_primitive_type() => {
                self.advance();
                self.valued_node_at(NodeKind::Type, token.lexeme(), &token)
            }
            TokenKind::Struct | TokenKind::Enum | TokenKind::Union => {
                self.advance();
                if self.check(TokenKind::Identifier) {
                    let tag = self.advance();
                    let name = format!("{} {}", token.lexeme(), tag.lexeme());
                    self.valued_node_at(NodeKind::Type, &name, &token)
                } else {
                    self.valued_node_at(NodeKind::Type, token.lexeme(), &token)
                }
            }
            TokenKind::Identifier => {
                self.advance();
                self.valued_node_at(NodeKind::Type, token.lexeme(), &token)
            }
            _ => {
                self.error_at_current("Expected type specifier");
                return None;
            }
        };

        while self.match_token(TokenKind::Star) {
            let pointer = self.node_at(NodeKind::PointerType, &token);
            self.ast.add_child(pointer, type_node);
            type_node = pointer;
        }

        Some(type_node)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> Option<NodeId> {
        if self.match_token(TokenKind::If) {
            return self.parse_if_statement();
        }
        if self.match_token(TokenKind::While) {
            return self.parse_while_statement();
        }
        if self.match_token(TokenKind::For) {
            return self.parse_for_statement();
        }
        if self.match_token(TokenKind::Do) {
            return self.parse_do_while_statement();
        }
        if self.match_token(TokenKind::Switch) {
            return self.parse_switch_statement();
        }
        if self.match_token(TokenKind::Return) {
            return self.parse_return_statement();
        }
        if self.match_token(TokenKind::Break) {
            let node = self.ast.node(NodeKind::BreakStatement);
            self.consume(TokenKind::Semicolon);
            return Some(node);
        }
        if self.match_token(TokenKind::Continue) {
            let node = self.ast.node(NodeKind::ContinueStatement);
            self.consume(TokenKind::Semicolon);
            return Some(node);
        }
        if self.match_token(TokenKind::LeftBrace) {
            return Some(self.parse_block());
        }
        if self.match_token(TokenKind::Semicolon) {
            // Empty statement: `;`
            return Some(self.ast.node(NodeKind::Empty));
        }
        if self.current_kind().is_type_leading() {
            // Local declaration: `i32 x = 5;`
            return self.parse_variable_declaration();
        }

        self.parse_expression_statement()
    }

    /// Parses statements up to the closing brace. The opening brace has
    /// already been consumed.
    fn parse_block(&mut self) -> NodeId {
        let block = self.ast.node(NodeKind::Block);
        let mut last_position = usize::MAX;

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.panic_mode {
                self.synchronize();
                continue;
            }
            if self.current == last_position {
                self.advance();
                continue;
            }
            last_position = self.current;

            // A function signature inside a block means the closing brace
            // is missing: stop here so the declaration is parsed at file
            // scope instead of being swallowed.
            if self.current_kind().is_type_leading() && self.looks_like_function() {
                break;
            }

            if let Some(stmt) = self.parse_statement() {
                self.ast.add_child(block, stmt);
            }
        }

        self.consume(TokenKind::RightBrace);
        block
    }

    fn parse_if_statement(&mut self) -> Option<NodeId> {
        let node = self.ast.node(NodeKind::IfStatement);

        self.consume(TokenKind::LeftParen);
        if let Some(condition) = self.parse_expression() {
            self.ast.add_child(node, condition);
        }
        self.consume(TokenKind::RightParen);

        if let Some(then_stmt) = self.parse_statement() {
            self.ast.add_child(node, then_stmt);
        }

        if self.match_token(TokenKind::Else) {
            if let Some(else_stmt) = self.parse_statement() {
                self.ast.add_child(node, else_stmt);
            }
        }

        Some(node)
    }

    fn parse_while_statement(&mut self) -> Option<NodeId> {
        let node = self.ast.node(NodeKind::WhileStatement);

        self.consume(TokenKind::LeftParen);
        if let Some(condition) = self.parse_expression() {
            self.ast.add_child(node, condition);
        }
        self.consume(TokenKind::RightParen);

        if let Some(body) = self.parse_statement() {
            self.ast.add_child(node, body);
        }

        Some(node)
    }

    /// Parses a `for` statement into the canonical 4-child shape: absent
    /// init/condition/update clauses become explicit `empty` nodes.
    fn parse_for_statement(&mut self) -> Option<NodeId> {
        let node = self.ast.node(NodeKind::ForStatement);
        self.consume(TokenKind::LeftParen);

        // Initializer
        let init = if self.match_token(TokenKind::Semicolon) {
            self.ast.node(NodeKind::Empty)
        } else if self.current_kind().is_type_leading() {
            self.parse_variable_declaration()
                .unwrap_or_else(|| self.ast.node(NodeKind::Empty))
        } else {
            self.parse_expression_statement()
                .unwrap_or_else(|| self.ast.node(NodeKind::Empty))
        };
        self.ast.add_child(node, init);

        // Condition
        let condition = if self.check(TokenKind::Semicolon) {
            self.ast.node(NodeKind::Empty)
        } else {
            self.parse_expression()
                .unwrap_or_else(|| self.ast.node(NodeKind::Empty))
        };
        self.ast.add_child(node, condition);
        self.consume(TokenKind::Semicolon);

        // Update
        let update = if self.check(TokenKind::RightParen) {
            self.ast.node(NodeKind::Empty)
        } else {
            self.parse_expression()
                .unwrap_or_else(|| self.ast.node(NodeKind::Empty))
        };
        self.ast.add_child(node, update);
        self.consume(TokenKind::RightParen);

        if let Some(body) = self.parse_statement() {
            self.ast.add_child(node, body);
        }

        Some(node)
    }

    fn parse_do_while_statement(&mut self) -> Option<NodeId> {
        let node = self.ast.node(NodeKind::DoWhileStatement);

        if let Some(body) = self.parse_statement() {
            self.ast.add_child(node, body);
        }

        self.consume(TokenKind::While);
        self.consume(TokenKind::LeftParen);
        if let Some(condition) = self.parse_expression() {
            self.ast.add_child(node, condition);
        }
        self.consume(TokenKind::RightParen);
        self.consume(TokenKind::Semicolon);

        Some(node)
    }

    fn parse_switch_statement(&mut self) -> Option<NodeId> {
        let node = self.ast.node(NodeKind::SwitchStatement);

        self.consume(TokenKind::LeftParen);
        if let Some(subject) = self.parse_expression() {
            self.ast.add_child(node, subject);
        }
        self.consume(TokenKind::RightParen);
        self.consume(TokenKind::LeftBrace);

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(TokenKind::Case) {
                let arm = self.ast.node(NodeKind::CaseStatement);
                if let Some(value) = self.parse_expression() {
                    self.ast.add_child(arm, value);
                }
                self.consume(TokenKind::Colon);
                self.parse_case_body(arm, true);
                self.ast.add_child(node, arm);
            } else if self.match_token(TokenKind::Default) {
                self.consume(TokenKind::Colon);
                let arm = self.ast.node(NodeKind::DefaultStatement);
                self.parse_case_body(arm, false);
                self.ast.add_child(node, arm);
            } else {
                self.error_at_current("Expected 'case' or 'default'");
                break;
            }
        }

        self.consume(TokenKind::RightBrace);
        Some(node)
    }

    /// Parses a case/default arm body. Cases do not implicitly break; an
    /// explicit `break` terminates the arm.
    fn parse_case_body(&mut self, arm: NodeId, stop_at_default: bool) {
        loop {
            if self.check(TokenKind::Case)
                || self.check(TokenKind::RightBrace)
                || self.is_at_end()
                || (stop_at_default && self.check(TokenKind::Default))
            {
                break;
            }
            let Some(stmt) = self.parse_statement() else {
                break;
            };
            let is_break = self.ast.kind(stmt) == NodeKind::BreakStatement;
            self.ast.add_child(arm, stmt);
            if is_break {
                break;
            }
        }
    }

    fn parse_return_statement(&mut self) -> Option<NodeId> {
        let node = self.ast.node(NodeKind::ReturnStatement);

        if !self.check(TokenKind::Semicolon) {
            if let Some(expr) = self.parse_expression() {
                self.ast.add_child(node, expr);
            }
        }

        self.consume(TokenKind::Semicolon);
        Some(node)
    }

    fn parse_expression_statement(&mut self) -> Option<NodeId> {
        let expr = self.parse_expression()?;
        self.consume(TokenKind::Semicolon);

        let stmt = self.ast.node(NodeKind::ExpressionStatement);
        self.ast.add_child(stmt, expr);
        Some(stmt)
    }

    // ========================================================================
    // Expressions (precedence climbing)
    // ========================================================================

    fn parse_expression(&mut self) -> Option<NodeId> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<NodeId> {
        let expr = self.parse_ternary()?;

        if let Some(op) = self.match_any(&[
            TokenKind::Assign,
            TokenKind::PlusAssign,
            TokenKind::MinusAssign,
            TokenKind::StarAssign,
            TokenKind::SlashAssign,
            TokenKind::PercentAssign,
        ]) {
            let right = self.parse_assignment()?;
            let assign = self.valued_node_at(NodeKind::Assignment, op.lexeme(), &op);
            self.ast.add_child(assign, expr);
            self.ast.add_child(assign, right);
            return Some(assign);
        }

        Some(expr)
    }

    fn parse_ternary(&mut self) -> Option<NodeId> {
        let expr = self.parse_logical_or()?;

        if self.match_token(TokenKind::Question) {
            let then_expr = self.parse_expression()?;
            self.consume(TokenKind::Colon);
            let else_expr = self.parse_ternary()?;

            let ternary = self.ast.node(NodeKind::Ternary);
            self.ast.add_child(ternary, expr);
            self.ast.add_child(ternary, then_expr);
            self.ast.add_child(ternary, else_expr);
            return Some(ternary);
        }

        Some(expr)
    }

    /// Shared shape of the left-associative binary levels.
    fn parse_binary_level(
        &mut self,
        operators: &[TokenKind],
        next: fn(&mut Self) -> Option<NodeId>,
    ) -> Option<NodeId> {
        let mut expr = next(self)?;

        while let Some(op) = self.match_any(operators) {
            let right = next(self)?;
            let binary = self.valued_node_at(NodeKind::BinaryOp, op.lexeme(), &op);
            self.ast.add_child(binary, expr);
            self.ast.add_child(binary, right);
            expr = binary;
        }

        Some(expr)
    }

    fn parse_logical_or(&mut self) -> Option<NodeId> {
        self.parse_binary_level(&[TokenKind::OrOr], Self::parse_logical_and)
    }

    fn parse_logical_and(&mut self) -> Option<NodeId> {
        self.parse_binary_level(&[TokenKind::AndAnd], Self::parse_bitwise_or)
    }

    fn parse_bitwise_or(&mut self) -> Option<NodeId> {
        self.parse_binary_level(&[TokenKind::Pipe], Self::parse_bitwise_xor)
    }

    fn parse_bitwise_xor(&mut self) -> Option<NodeId> {
        self.parse_binary_level(&[TokenKind::Caret], Self::parse_bitwise_and)
    }

    fn parse_bitwise_and(&mut self) -> Option<NodeId> {
        self.parse_binary_level(&[TokenKind::Ampersand], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Option<NodeId> {
        self.parse_binary_level(&[TokenKind::Equal, TokenKind::NotEqual], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> Option<NodeId> {
        self.parse_binary_level(
            &[
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
            ],
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Option<NodeId> {
        self.parse_binary_level(
            &[TokenKind::ShiftLeft, TokenKind::ShiftRight],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Option<NodeId> {
        self.parse_binary_level(
            &[TokenKind::Plus, TokenKind::Minus],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Option<NodeId> {
        self.parse_binary_level(
            &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Option<NodeId> {
        if let Some(op) = self.match_any(&[
            TokenKind::Bang,
            TokenKind::Tilde,
            TokenKind::Minus,
            TokenKind::Plus,
            TokenKind::Star,
            TokenKind::Ampersand,
            TokenKind::Increment,
            TokenKind::Decrement,
        ]) {
            let operand = self.parse_unary()?;
            let unary = self.valued_node_at(NodeKind::UnaryOp, op.lexeme(), &op);
            self.ast.add_child(unary, operand);
            return Some(unary);
        }

        if self.match_token(TokenKind::Sizeof) {
            self.consume(TokenKind::LeftParen);
            let operand = self.parse_expression()?;
            self.consume(TokenKind::RightParen);

            let node = self.ast.node(NodeKind::Sizeof);
            self.ast.add_child(node, operand);
            return Some(node);
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<NodeId> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(TokenKind::LeftBracket) {
                let index = self.parse_expression()?;
                self.consume(TokenKind::RightBracket);

                let access = self.ast.node(NodeKind::ArrayAccess);
                self.ast.add_child(access, expr);
                self.ast.add_child(access, index);
                expr = access;
            } else if self.match_token(TokenKind::LeftParen) {
                // A call takes its name from the preceding primary.
                let callee = self.ast.value(expr).unwrap_or_default().to_owned();
                let call = self.ast.node_with_value(NodeKind::FunctionCall, &callee);

                if !self.check(TokenKind::RightParen) {
                    loop {
                        if let Some(arg) = self.parse_expression() {
                            self.ast.add_child(call, arg);
                        }
                        if !self.match_token(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen);
                expr = call;
            } else if let Some(op) = self.match_any(&[TokenKind::Dot, TokenKind::Arrow]) {
                if !self.check(TokenKind::Identifier) {
                    self.error_at_current("Expected member name");
                    break;
                }
                let member_name = self.advance();
                let member = self.valued_node_at(
                    NodeKind::Identifier,
                    member_name.lexeme(),
                    &member_name,
                );

                let access = self.valued_node_at(NodeKind::MemberAccess, op.lexeme(), &op);
                self.ast.add_child(access, expr);
                self.ast.add_child(access, member);
                expr = access;
            } else if let Some(op) = self.match_any(&[TokenKind::Increment, TokenKind::Decrement]) {
                let postfix = self.valued_node_at(NodeKind::PostfixOp, op.lexeme(), &op);
                self.ast.add_child(postfix, expr);
                expr = postfix;
            } else {
                break;
            }
        }

        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<NodeId> {
        let token = self.current_token().clone();
        match token.kind() {
            TokenKind::True | TokenKind::False => {
                self.advance();
                Some(self.literal_from(NodeKind::BoolLiteral, &token))
            }
            TokenKind::Null => {
                self.advance();
                Some(self.valued_node_at(NodeKind::NullLiteral, "null", &token))
            }
            TokenKind::Number => {
                self.advance();
                Some(self.literal_from(NodeKind::NumberLiteral, &token))
            }
            TokenKind::Float => {
                self.advance();
                Some(self.literal_from(NodeKind::FloatLiteral, &token))
            }
            TokenKind::String => {
                self.advance();
                Some(self.literal_from(NodeKind::StringLiteral, &token))
            }
            TokenKind::Char => {
                self.advance();
                Some(self.literal_from(NodeKind::CharLiteral, &token))
            }
            TokenKind::Identifier => {
                self.advance();
                Some(self.valued_node_at(NodeKind::Identifier, token.lexeme(), &token))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression();
                self.consume(TokenKind::RightParen);
                expr
            }
            _ => {
                self.error_at_current("Expected expression");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::trees_equal;

    fn parse_ok(source: &str) -> ParseResult {
        let result = parse_source(source);
        assert_eq!(result.error_count(), 0, "diagnostics: {:?}", result.diagnostics);
        result
    }

    #[test]
    fn empty_input_parses_to_empty_program() {
        let result = parse_ok("");
        assert_eq!(result.ast.kind(result.root), NodeKind::Program);
        assert_eq!(result.ast.child_count(result.root), 0);
    }

    #[test]
    fn comment_only_file_parses_to_empty_program() {
        let result = parse_ok("// nothing here\n");
        assert_eq!(result.ast.child_count(result.root), 0);
    }

    #[test]
    fn simple_function_shape() {
        let result = parse_ok("i32 main() { return 42; }");
        let ast = &result.ast;
        let func = ast.child(result.root, 0).unwrap();
        assert_eq!(ast.kind(func), NodeKind::Function);
        assert_eq!(ast.value(func), Some("main"));

        let ty = ast.child(func, 0).unwrap();
        assert_eq!(ast.kind(ty), NodeKind::Type);
        assert_eq!(ast.value(ty), Some("i32"));

        assert_eq!(ast.kind(ast.child(func, 1).unwrap()), NodeKind::ParameterList);

        let body = ast.child(func, 2).unwrap();
        assert_eq!(ast.kind(body), NodeKind::Block);
        let ret = ast.child(body, 0).unwrap();
        assert_eq!(ast.kind(ret), NodeKind::ReturnStatement);
        let num = ast.child(ret, 0).unwrap();
        assert_eq!(ast.kind(num), NodeKind::NumberLiteral);
        assert_eq!(ast.value(num), Some("42"));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let result = parse_ok("i32 f() { return 1 + 2 * 3; }");
        let ast = &result.ast;
        let plus = ast.find_by_kind(result.root, NodeKind::BinaryOp).unwrap();
        assert_eq!(ast.value(plus), Some("+"));
        assert_eq!(ast.value(ast.child(plus, 0).unwrap()), Some("1"));
        let times = ast.child(plus, 1).unwrap();
        assert_eq!(ast.value(times), Some("*"));
        assert_eq!(ast.value(ast.child(times, 0).unwrap()), Some("2"));
        assert_eq!(ast.value(ast.child(times, 1).unwrap()), Some("3"));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let result = parse_ok("i32 f() { return 10 - 3 - 2; }");
        let ast = &result.ast;
        let outer = ast.find_by_kind(result.root, NodeKind::BinaryOp).unwrap();
        assert_eq!(ast.value(outer), Some("-"));
        let inner = ast.child(outer, 0).unwrap();
        assert_eq!(ast.kind(inner), NodeKind::BinaryOp);
        assert_eq!(ast.value(ast.child(inner, 0).unwrap()), Some("10"));
        assert_eq!(ast.value(ast.child(inner, 1).unwrap()), Some("3"));
        assert_eq!(ast.value(ast.child(outer, 1).unwrap()), Some("2"));
    }

    #[test]
    fn assignment_is_right_associative() {
        let result = parse_ok("i32 f() { a = b = 1; }");
        let ast = &result.ast;
        let outer = ast.find_by_kind(result.root, NodeKind::Assignment).unwrap();
        let rhs = ast.child(outer, 1).unwrap();
        assert_eq!(ast.kind(rhs), NodeKind::Assignment);
    }

    #[test]
    fn struct_with_member_access_through_pointer() {
        let result =
            parse_ok("struct P { i32 x; i32 y; } i32 f(struct P* p) { return p->x; }");
        let ast = &result.ast;

        let strukt = ast.child(result.root, 0).unwrap();
        assert_eq!(ast.kind(strukt), NodeKind::Struct);
        assert_eq!(ast.value(strukt), Some("P"));
        assert_eq!(ast.child_count(strukt), 2);
        assert_eq!(
            ast.kind(ast.child(strukt, 0).unwrap()),
            NodeKind::VariableDeclaration
        );

        let access = ast.find_by_kind(result.root, NodeKind::MemberAccess).unwrap();
        assert_eq!(ast.value(access), Some("->"));
        assert_eq!(ast.kind(ast.child(access, 0).unwrap()), NodeKind::Identifier);
        assert_eq!(ast.kind(ast.child(access, 1).unwrap()), NodeKind::Identifier);
    }

    #[test]
    fn pointer_types_nest_left_associatively() {
        let result = parse_ok("i32 f(i32** pp) { return 0; }");
        let ast = &result.ast;
        let outer = ast.find_by_kind(result.root, NodeKind::PointerType).unwrap();
        let inner = ast.child(outer, 0).unwrap();
        assert_eq!(ast.kind(inner), NodeKind::PointerType);
        assert_eq!(ast.value(ast.child(inner, 0).unwrap()), Some("i32"));
    }

    #[test]
    fn for_without_clauses_uses_empty_placeholders() {
        let result = parse_ok("i32 f() { for (;;) ; }");
        let ast = &result.ast;
        let for_node = ast.find_by_kind(result.root, NodeKind::ForStatement).unwrap();
        assert_eq!(ast.child_count(for_node), 4);
        for i in 0..3 {
            assert_eq!(ast.kind(ast.child(for_node, i).unwrap()), NodeKind::Empty);
        }
        assert_eq!(ast.kind(ast.child(for_node, 3).unwrap()), NodeKind::Empty);
        assert!(ast.is_valid(result.root));
    }

    #[test]
    fn full_for_loop_shape() {
        let result = parse_ok("i32 f() { for (i32 i = 0; i < 10; i++) { g(i); } }");
        let ast = &result.ast;
        let for_node = ast.find_by_kind(result.root, NodeKind::ForStatement).unwrap();
        assert_eq!(ast.child_count(for_node), 4);
        assert_eq!(
            ast.kind(ast.child(for_node, 0).unwrap()),
            NodeKind::VariableDeclaration
        );
        assert_eq!(ast.kind(ast.child(for_node, 1).unwrap()), NodeKind::BinaryOp);
        assert_eq!(ast.kind(ast.child(for_node, 2).unwrap()), NodeKind::PostfixOp);
        assert_eq!(ast.kind(ast.child(for_node, 3).unwrap()), NodeKind::Block);
    }

    #[test]
    fn switch_cases_and_default() {
        let result = parse_ok(
            "i32 f(i32 x) { switch (x) { case 1: return 10; case 2: break; default: return 0; } }",
        );
        let ast = &result.ast;
        let switch = ast.find_by_kind(result.root, NodeKind::SwitchStatement).unwrap();
        let kinds: Vec<_> = ast.children(switch).iter().map(|&c| ast.kind(c)).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Identifier,
                NodeKind::CaseStatement,
                NodeKind::CaseStatement,
                NodeKind::DefaultStatement,
            ]
        );
    }

    #[test]
    fn do_while_requires_trailing_semicolon() {
        let ok = parse_source("i32 f() { do { g(); } while (1); }");
        assert_eq!(ok.error_count(), 0);
        let missing = parse_source("i32 f() { do { g(); } while (1) }");
        assert!(missing.error_count() >= 1);
    }

    #[test]
    fn module_import_export_declarations() {
        let result = parse_ok("module math; import io; export i32 add(i32 a, i32 b) { return a + b; }");
        let ast = &result.ast;
        let kinds: Vec<_> = ast
            .children(result.root)
            .iter()
            .map(|&c| ast.kind(c))
            .collect();
        assert_eq!(kinds, vec![NodeKind::Module, NodeKind::Import, NodeKind::Export]);
        let export = ast.child(result.root, 2).unwrap();
        assert_eq!(ast.kind(ast.child(export, 0).unwrap()), NodeKind::Function);
    }

    #[test]
    fn enum_values_with_explicit_expressions() {
        let result = parse_ok("enum Color { Red, Green = 5, Blue }");
        let ast = &result.ast;
        let enum_node = ast.child(result.root, 0).unwrap();
        assert_eq!(ast.child_count(enum_node), 3);
        let green = ast.child(enum_node, 1).unwrap();
        assert_eq!(ast.value(green), Some("Green"));
        assert_eq!(ast.child_count(green), 1);
    }

    #[test]
    fn sizeof_requires_parenthesized_operand() {
        let result = parse_ok("i32 f() { return sizeof(x); }");
        assert!(result.ast.find_by_kind(result.root, NodeKind::Sizeof).is_some());
        let missing = parse_source("i32 f() { return sizeof x; }");
        assert!(missing.error_count() >= 1);
    }

    #[test]
    fn ternary_and_nested_calls() {
        let result = parse_ok("i32 f(i32 x) { return x ? g(x, 1) : h(); }");
        let ast = &result.ast;
        let ternary = ast.find_by_kind(result.root, NodeKind::Ternary).unwrap();
        assert_eq!(ast.child_count(ternary), 3);
        let call = ast.child(ternary, 1).unwrap();
        assert_eq!(ast.kind(call), NodeKind::FunctionCall);
        assert_eq!(ast.value(call), Some("g"));
        assert_eq!(ast.child_count(call), 2);
    }

    #[test]
    fn top_level_variable_vs_function_disambiguation() {
        let result = parse_ok("i32 counter = 0; i32 bump() { return counter; }");
        let ast = &result.ast;
        assert_eq!(
            ast.kind(ast.child(result.root, 0).unwrap()),
            NodeKind::VariableDeclaration
        );
        assert_eq!(ast.kind(ast.child(result.root, 1).unwrap()), NodeKind::Function);
    }

    #[test]
    fn recovery_keeps_later_declarations() {
        // Missing expression after `return`: error, then recovery picks up
        // the second function.
        let result = parse_source("i32 f() { return ; } i32 g() { return 0; }");
        assert_eq!(result.error_count(), 0, "bare return is legal");

        let broken = parse_source("i32 f() { return @ ; } i32 g() { return 0; }");
        assert!(broken.error_count() >= 1);
        let functions: Vec<_> = broken
            .ast
            .children(broken.root)
            .iter()
            .filter(|&&c| broken.ast.kind(c) == NodeKind::Function)
            .collect();
        assert_eq!(functions.len(), 2, "both functions survive recovery");
    }

    #[test]
    fn panic_mode_suppresses_cascading_errors() {
        // A single malformed expression should not produce one error per
        // following token.
        let result = parse_source("i32 f() { return + ; }");
        assert!(result.error_count() >= 1);
        assert!(result.error_count() <= 2, "diagnostics: {:?}", result.diagnostics);
    }

    #[test]
    fn parse_is_deterministic() {
        let source = "i32 f(i32 n) { i32 acc = 0; while (n) { acc += n; n--; } return acc; }";
        let a = parse_ok(source);
        let b = parse_ok(source);
        assert!(trees_equal(&a.ast, a.root, &b.ast, b.root));
    }

    #[test]
    fn validation_holds_for_successful_parses() {
        let sources = [
            "i32 main() { return 0; }",
            "struct V { i32 x; } i32 f(struct V* v) { return v->x + 1; }",
            "i32 f() { for (i32 i = 0; i < 3; i++) g(i); return 0; }",
            "u8 f(bool b) { return b ? 'y' : 'n'; }",
        ];
        for source in sources {
            let result = parse_ok(source);
            assert!(result.ast.is_valid(result.root), "source: {source}");
        }
    }

    #[test]
    fn error_diagnostics_carry_location_and_lexeme() {
        let result = parse_source("i32 f() { return 1 +; }");
        assert!(result.error_count() >= 1);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.lexeme, ";");
        assert!(diag.line >= 1);
        assert!(diag.to_string().contains("Error at ';'"));
    }
}
