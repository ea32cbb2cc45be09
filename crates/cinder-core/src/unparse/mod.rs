// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Unparsing: render an AST back to compilable source text.
//!
//! The output is not a formatter. It exists so tools can round-trip a
//! tree, and so tests can assert that parsing the unparsed form of a
//! successful parse yields a structurally equal AST. To make that
//! property unconditional, every composite expression is parenthesized;
//! parentheses group without creating nodes, so the shape survives.

use std::fmt::Write;

use crate::ast::{Ast, NodeId, NodeKind};

/// Renders the subtree at `root` to source text.
#[must_use]
pub fn unparse(ast: &Ast, root: NodeId) -> String {
    let mut printer = Printer { ast, out: String::new(), indent: 0 };
    printer.node(root);
    printer.out
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    indent: usize,
}

impl Printer<'_> {
    fn node(&mut self, id: NodeId) {
        match self.ast.kind(id) {
            NodeKind::Program => {
                for i in 0..self.ast.child_count(id) {
                    self.node(self.ast.children(id)[i]);
                }
            }
            NodeKind::Module => {
                let name = self.value(id);
                self.line(&format!("module {name};"));
            }
            NodeKind::Import => {
                let name = self.value(id);
                self.line(&format!("import {name};"));
            }
            NodeKind::Export => {
                self.pad();
                self.out.push_str("export ");
                if let Some(inner) = self.ast.child(id, 0) {
                    // The wrapped declaration prints its own indentation;
                    // strip it by printing inline.
                    let inner_text = unparse(self.ast, inner);
                    self.out.push_str(inner_text.trim_start());
                } else {
                    self.out.push('\n');
                }
            }
            NodeKind::Function => self.function(id),
            NodeKind::VariableDeclaration => {
                self.pad();
                self.variable_declaration_inline(id);
                self.out.push('\n');
            }
            NodeKind::Struct | NodeKind::Union => self.aggregate(id),
            NodeKind::Enum => self.enumeration(id),
            kind if kind.is_statement() || kind == NodeKind::Empty => self.statement(id),
            _ => {
                // Bare expression at an unexpected position.
                self.pad();
                let text = self.expr(id);
                self.out.push_str(&text);
                self.out.push('\n');
            }
        }
    }

    fn function(&mut self, id: NodeId) {
        let name = self.value(id);
        let ret = self
            .ast
            .child(id, 0)
            .map_or_else(String::new, |ty| self.type_text(ty));

        self.pad();
        let _ = write!(self.out, "{ret} {name}(");
        if let Some(params) = self.ast.child(id, 1) {
            if self.ast.kind(params) == NodeKind::ParameterList {
                let rendered: Vec<String> = self
                    .ast
                    .children(params)
                    .iter()
                    .map(|&param| {
                        let ty = self
                            .ast
                            .child(param, 0)
                            .map_or_else(String::new, |t| self.type_text(t));
                        match self.ast.value(param) {
                            Some(name) => format!("{ty} {name}"),
                            None => ty,
                        }
                    })
                    .collect();
                self.out.push_str(&rendered.join(", "));
            }
        }
        self.out.push_str(") ");
        if let Some(&body) = self.ast.children(id).last() {
            if self.ast.kind(body) == NodeKind::Block {
                self.block_inline(body);
            }
        }
        self.out.push('\n');
    }

    fn aggregate(&mut self, id: NodeId) {
        let keyword = if self.ast.kind(id) == NodeKind::Union { "union" } else { "struct" };
        let name = self.value(id);
        self.pad();
        let _ = writeln!(self.out, "{keyword} {name} {{");
        self.indent += 1;
        for i in 0..self.ast.child_count(id) {
            let field = self.ast.children(id)[i];
            self.pad();
            self.variable_declaration_inline(field);
            self.out.push('\n');
        }
        self.indent -= 1;
        self.line("}");
    }

    fn enumeration(&mut self, id: NodeId) {
        let name = self.value(id);
        self.pad();
        let _ = writeln!(self.out, "enum {name} {{");
        self.indent += 1;
        let count = self.ast.child_count(id);
        for i in 0..count {
            let value = self.ast.children(id)[i];
            self.pad();
            self.out.push_str(&self.value(value));
            if let Some(expr) = self.ast.child(value, 0) {
                let text = self.expr(expr);
                let _ = write!(self.out, " = {text}");
            }
            if i + 1 < count {
                self.out.push(',');
            }
            self.out.push('\n');
        }
        self.indent -= 1;
        self.line("}");
    }

    /// `type name [= init];` without indentation or newline.
    fn variable_declaration_inline(&mut self, id: NodeId) {
        let name = self.value(id);
        let ty = self
            .ast
            .child(id, 0)
            .map_or_else(String::new, |t| self.type_text(t));
        let _ = write!(self.out, "{ty} {name}");
        if let Some(init) = self.ast.child(id, 1) {
            let text = self.expr(init);
            let _ = write!(self.out, " = {text}");
        }
        self.out.push(';');
    }

    fn statement(&mut self, id: NodeId) {
        match self.ast.kind(id) {
            NodeKind::Block => {
                self.pad();
                self.block_inline(id);
                self.out.push('\n');
            }
            NodeKind::ExpressionStatement => {
                self.pad();
                let text = self
                    .ast
                    .child(id, 0)
                    .map_or_else(String::new, |expr| self.expr(expr));
                let _ = writeln!(self.out, "{text};");
            }
            NodeKind::ReturnStatement => {
                self.pad();
                match self.ast.child(id, 0) {
                    Some(expr) => {
                        let text = self.expr(expr);
                        let _ = writeln!(self.out, "return {text};");
                    }
                    None => {
                        let _ = writeln!(self.out, "return;");
                    }
                }
            }
            NodeKind::IfStatement => {
                self.pad();
                let condition = self
                    .ast
                    .child(id, 0)
                    .map_or_else(String::new, |c| self.expr(c));
                let _ = writeln!(self.out, "if ({condition})");
                self.nested_statement(self.ast.child(id, 1));
                if let Some(else_stmt) = self.ast.child(id, 2) {
                    self.line("else");
                    self.nested_statement(Some(else_stmt));
                }
            }
            NodeKind::WhileStatement => {
                self.pad();
                let condition = self
                    .ast
                    .child(id, 0)
                    .map_or_else(String::new, |c| self.expr(c));
                let _ = writeln!(self.out, "while ({condition})");
                self.nested_statement(self.ast.child(id, 1));
            }
            NodeKind::ForStatement => self.for_statement(id),
            NodeKind::DoWhileStatement => {
                self.line("do");
                self.nested_statement(self.ast.child(id, 0));
                self.pad();
                let condition = self
                    .ast
                    .child(id, 1)
                    .map_or_else(String::new, |c| self.expr(c));
                let _ = writeln!(self.out, "while ({condition});");
            }
            NodeKind::SwitchStatement => self.switch_statement(id),
            NodeKind::BreakStatement => self.line("break;"),
            NodeKind::ContinueStatement => self.line("continue;"),
            NodeKind::VariableDeclaration => {
                self.pad();
                self.variable_declaration_inline(id);
                self.out.push('\n');
            }
            NodeKind::Empty => self.line(";"),
            NodeKind::CaseStatement | NodeKind::DefaultStatement => self.switch_arm(id),
            _ => {}
        }
    }

    fn for_statement(&mut self, id: NodeId) {
        self.pad();
        self.out.push_str("for (");

        // The init clause carries its own semicolon (declaration or
        // expression-statement); an absent clause prints as a bare one.
        match self.ast.child(id, 0) {
            Some(init) if self.ast.kind(init) == NodeKind::VariableDeclaration => {
                self.variable_declaration_inline(init);
            }
            Some(init) if self.ast.kind(init) == NodeKind::ExpressionStatement => {
                let text = self
                    .ast
                    .child(init, 0)
                    .map_or_else(String::new, |e| self.expr(e));
                let _ = write!(self.out, "{text};");
            }
            _ => self.out.push(';'),
        }

        match self.ast.child(id, 1) {
            Some(cond) if self.ast.kind(cond) != NodeKind::Empty => {
                let text = self.expr(cond);
                let _ = write!(self.out, " {text};");
            }
            _ => self.out.push(';'),
        }

        match self.ast.child(id, 2) {
            Some(update) if self.ast.kind(update) != NodeKind::Empty => {
                let text = self.expr(update);
                let _ = write!(self.out, " {text}");
            }
            _ => {}
        }
        self.out.push_str(")\n");
        self.nested_statement(self.ast.child(id, 3));
    }

    fn switch_statement(&mut self, id: NodeId) {
        self.pad();
        let subject = self
            .ast
            .child(id, 0)
            .map_or_else(String::new, |s| self.expr(s));
        let _ = writeln!(self.out, "switch ({subject}) {{");
        self.indent += 1;
        for i in 1..self.ast.child_count(id) {
            self.switch_arm(self.ast.children(id)[i]);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn switch_arm(&mut self, id: NodeId) {
        let is_case = self.ast.kind(id) == NodeKind::CaseStatement;
        self.pad();
        if is_case {
            let value = self
                .ast
                .child(id, 0)
                .map_or_else(String::new, |v| self.expr(v));
            let _ = writeln!(self.out, "case {value}:");
        } else {
            let _ = writeln!(self.out, "default:");
        }
        self.indent += 1;
        let start = usize::from(is_case);
        for i in start..self.ast.child_count(id) {
            self.statement(self.ast.children(id)[i]);
        }
        self.indent -= 1;
    }

    fn nested_statement(&mut self, id: Option<NodeId>) {
        let Some(id) = id else {
            self.line(";");
            return;
        };
        if self.ast.kind(id) == NodeKind::Empty {
            self.line(";");
            return;
        }
        self.indent += 1;
        self.statement(id);
        self.indent -= 1;
    }

    fn block_inline(&mut self, id: NodeId) {
        self.out.push_str("{\n");
        self.indent += 1;
        for i in 0..self.ast.child_count(id) {
            self.statement(self.ast.children(id)[i]);
        }
        self.indent -= 1;
        self.pad();
        self.out.push('}');
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&self, id: NodeId) -> String {
        match self.ast.kind(id) {
            NodeKind::NumberLiteral | NodeKind::FloatLiteral | NodeKind::BoolLiteral => {
                self.value(id)
            }
            NodeKind::NullLiteral => "null".to_owned(),
            NodeKind::Identifier => self.value(id),
            NodeKind::StringLiteral => format!("\"{}\"", escape(&self.value(id), '"')),
            NodeKind::CharLiteral => format!("'{}'", escape(&self.value(id), '\'')),
            NodeKind::BinaryOp | NodeKind::Assignment => {
                let op = self.value(id);
                let lhs = self.child_expr(id, 0);
                let rhs = self.child_expr(id, 1);
                format!("({lhs} {op} {rhs})")
            }
            NodeKind::UnaryOp => {
                let op = self.value(id);
                let operand = self.child_expr(id, 0);
                format!("({op}{operand})")
            }
            NodeKind::PostfixOp => {
                let op = self.value(id);
                let operand = self.child_expr(id, 0);
                format!("({operand}{op})")
            }
            NodeKind::Ternary => {
                let cond = self.child_expr(id, 0);
                let then = self.child_expr(id, 1);
                let otherwise = self.child_expr(id, 2);
                format!("({cond} ? {then} : {otherwise})")
            }
            NodeKind::FunctionCall => {
                let args: Vec<String> = self
                    .ast
                    .children(id)
                    .iter()
                    .map(|&arg| self.expr(arg))
                    .collect();
                format!("{}({})", self.value(id), args.join(", "))
            }
            NodeKind::ArrayAccess => {
                let base = self.child_expr(id, 0);
                let index = self.child_expr(id, 1);
                format!("{base}[{index}]")
            }
            NodeKind::MemberAccess => {
                let object = self.child_expr(id, 0);
                let member = self
                    .ast
                    .child(id, 1)
                    .map_or_else(String::new, |m| self.value(m));
                format!("{object}{}{member}", self.value(id))
            }
            NodeKind::Sizeof => {
                let operand = self.child_expr(id, 0);
                format!("sizeof({operand})")
            }
            _ => String::new(),
        }
    }

    fn child_expr(&self, id: NodeId, index: usize) -> String {
        self.ast
            .child(id, index)
            .map_or_else(String::new, |child| self.expr(child))
    }

    fn type_text(&self, id: NodeId) -> String {
        match self.ast.kind(id) {
            NodeKind::PointerType => {
                let inner = self
                    .ast
                    .child(id, 0)
                    .map_or_else(String::new, |c| self.type_text(c));
                format!("{inner}*")
            }
            _ => self.value(id),
        }
    }

    fn value(&self, id: NodeId) -> String {
        self.ast.value(id).unwrap_or_default().to_owned()
    }

    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn line(&mut self, text: &str) {
        self.pad();
        self.out.push_str(text);
        self.out.push('\n');
    }
}

/// Escapes a decoded literal body back to source form.
fn escape(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::trees_equal;
    use crate::parse::parse_source;

    fn round_trip(source: &str) {
        let first = parse_source(source);
        assert_eq!(first.error_count(), 0, "parse failed: {:?}", first.diagnostics);

        let printed = unparse(&first.ast, first.root);
        let second = parse_source(&printed);
        assert_eq!(
            second.error_count(),
            0,
            "re-parse failed: {:?}\nprinted:\n{printed}",
            second.diagnostics
        );
        assert!(
            trees_equal(&first.ast, first.root, &second.ast, second.root),
            "round trip changed the tree:\n{printed}"
        );
    }

    #[test]
    fn round_trips_simple_function() {
        round_trip("i32 main() { return 42; }");
    }

    #[test]
    fn round_trips_expressions_with_precedence() {
        round_trip("i32 f() { return 1 + 2 * 3 - 4 / 2; }");
        round_trip("i32 f(i32 x) { return x ? x + 1 : -x; }");
        round_trip("i32 f(i32 x) { return x << 2 | x & 7 ^ 1; }");
    }

    #[test]
    fn round_trips_control_flow() {
        round_trip("i32 f(i32 n) { while (n > 0) { n--; } return n; }");
        round_trip("i32 f() { for (i32 i = 0; i < 10; i++) g(i); return 0; }");
        round_trip("i32 f() { for (;;) ; }");
        round_trip("i32 f(i32 n) { do { n--; } while (n); return 0; }");
        round_trip("i32 f(i32 x) { if (x) return 1; else return 0; }");
    }

    #[test]
    fn round_trips_switch() {
        round_trip(
            "i32 f(i32 x) { switch (x) { case 1: return 10; case 2: break; default: return 0; } return 9; }",
        );
    }

    #[test]
    fn round_trips_aggregates_and_modules() {
        round_trip("struct P { i32 x; i32 y; } i32 f(struct P* p) { return p->x; }");
        round_trip("union V { i32 i; f64 d; }");
        round_trip("enum Color { Red, Green = 5, Blue }");
        round_trip("module math; import io; export i32 one() { return 1; }");
    }

    #[test]
    fn round_trips_literals_with_escapes() {
        round_trip(r#"i32 f() { printf("line\n"); return '\t'; }"#);
        round_trip("i32 f() { return 3.25; }");
        round_trip("bool f() { return true; }");
    }

    #[test]
    fn round_trips_pointers_and_sizeof() {
        round_trip("i32 f(i32** pp) { return **pp + sizeof(pp); }");
        round_trip("i32 f(i32* p) { *p = 7; return p[1]; }");
    }
}
