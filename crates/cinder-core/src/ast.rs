// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Abstract Syntax Tree definitions for Cinder.
//!
//! The AST is a uniform tree: every node is the same record
//! `{kind, value, children, meta}`, discriminated by [`NodeKind`]. Child
//! positions are significant per kind (child 0 of an `if` is the
//! condition, and so on; see the parser for each shape).
//!
//! # Arena allocation
//!
//! Nodes live in an [`Ast`] arena and are addressed by [`NodeId`] handles,
//! never by reference. The arena only grows; handles stay valid until the
//! whole tree is dropped or [`Ast::reset`] is called. Node values are
//! interned into the arena's [`StringPool`], so identical names share
//! storage. There is no per-node free.
//!
//! # Invariants
//!
//! - A node's `kind` never changes after creation.
//! - `value` strings are immutable once set.
//! - Children are never shared: each node has at most one parent.
//! - The arena `used()` counter is non-decreasing until an explicit reset.
//!
//! [`validate`](Ast::validate) checks the per-kind child-count invariants;
//! a violation indicates a parser bug and is reported, not fatal.

use crate::intern::{StrId, StringPool};
use crate::parse::Literal;

/// The kind of an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // === Program structure ===
    /// Root node; children are top-level declarations.
    Program,
    /// `module name;`
    Module,
    /// `import name;` (name only; no resolution)
    Import,
    /// `export <declaration>`; child 0 is the wrapped declaration.
    Export,

    // === Declarations ===
    /// Function: child 0 return type, child 1 parameter list, last child body.
    Function,
    /// Variable declaration: child 0 type, optional child 1 initializer.
    VariableDeclaration,
    /// Struct declaration; children are field variable declarations.
    Struct,
    /// Enum declaration; children are enum values.
    Enum,
    /// Union declaration; children are field variable declarations.
    Union,
    /// Function parameter: child 0 is the type.
    Parameter,
    /// Parameter list; children are parameters.
    ParameterList,

    // === Types ===
    /// A named type (`i32`, `struct P`, user identifier).
    Type,
    /// Pointer type; child 0 is the pointee type.
    PointerType,
    /// Array type; child 0 element type, optional child 1 length.
    ArrayType,

    // === Statements ===
    /// Braced block; children are statements.
    Block,
    /// Expression statement; child 0 is the expression.
    ExpressionStatement,
    /// `return [expr];`
    ReturnStatement,
    /// `if`: children are condition, then, optional else.
    IfStatement,
    /// `while`: children are condition, body.
    WhileStatement,
    /// `for`: children are init, condition, update, body (absent clauses
    /// are explicit [`NodeKind::Empty`] nodes).
    ForStatement,
    /// `do { } while (expr);`: children are body, condition.
    DoWhileStatement,
    /// `switch`: child 0 subject, remaining children case/default arms.
    SwitchStatement,
    /// `case expr:`: child 0 value, remaining children the arm body.
    CaseStatement,
    /// `default:`: children are the arm body.
    DefaultStatement,
    /// `break;`
    BreakStatement,
    /// `continue;`
    ContinueStatement,

    // === Expressions ===
    /// Assignment; value is the operator spelling, children lhs and rhs.
    Assignment,
    /// Binary operator; value is the operator spelling, children lhs, rhs.
    BinaryOp,
    /// Prefix unary operator; value is the spelling, child 0 the operand.
    UnaryOp,
    /// Postfix `++`/`--`; value is the spelling, child 0 the operand.
    PostfixOp,
    /// `cond ? a : b`; children are condition, then, else.
    Ternary,
    /// Call; value is the callee name, children are the arguments.
    FunctionCall,
    /// `a[i]`; children are array expression and index.
    ArrayAccess,
    /// `a.b` / `a->b`; value is `.` or `->`, children object and member.
    MemberAccess,
    /// `sizeof(expr)`; child 0 is the operand.
    Sizeof,

    // === Literals ===
    /// Integer literal; value is the source text.
    NumberLiteral,
    /// Float literal; value is the source text.
    FloatLiteral,
    /// String literal; value is the decoded body.
    StringLiteral,
    /// Character literal; value is the decoded character.
    CharLiteral,
    /// `true` / `false`.
    BoolLiteral,
    /// `null`.
    NullLiteral,

    // === Identifiers and values ===
    /// A name reference.
    Identifier,
    /// An enum member; optional child 0 is the explicit value expression.
    EnumValue,

    // === Casts and conversions ===
    /// Explicit cast; child 0 target type, child 1 operand.
    Cast,
    /// Implicit conversion inserted by later stages.
    TypeConversion,

    /// Placeholder for an absent optional clause (e.g. `for (;;)`).
    Empty,
}

impl NodeKind {
    /// Stable lower-case name used by AST dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Module => "module",
            Self::Import => "import",
            Self::Export => "export",
            Self::Function => "function",
            Self::VariableDeclaration => "variable-declaration",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Union => "union",
            Self::Parameter => "parameter",
            Self::ParameterList => "parameter-list",
            Self::Type => "type",
            Self::PointerType => "pointer-type",
            Self::ArrayType => "array-type",
            Self::Block => "block",
            Self::ExpressionStatement => "expression-statement",
            Self::ReturnStatement => "return",
            Self::IfStatement => "if",
            Self::WhileStatement => "while",
            Self::ForStatement => "for",
            Self::DoWhileStatement => "do-while",
            Self::SwitchStatement => "switch",
            Self::CaseStatement => "case",
            Self::DefaultStatement => "default",
            Self::BreakStatement => "break",
            Self::ContinueStatement => "continue",
            Self::Assignment => "assignment",
            Self::BinaryOp => "binary-op",
            Self::UnaryOp => "unary-op",
            Self::PostfixOp => "postfix-op",
            Self::Ternary => "ternary",
            Self::FunctionCall => "call",
            Self::ArrayAccess => "array-access",
            Self::MemberAccess => "member-access",
            Self::Sizeof => "sizeof",
            Self::NumberLiteral => "number",
            Self::FloatLiteral => "float",
            Self::StringLiteral => "string",
            Self::CharLiteral => "char",
            Self::BoolLiteral => "bool",
            Self::NullLiteral => "null",
            Self::Identifier => "identifier",
            Self::EnumValue => "enum-value",
            Self::Cast => "cast",
            Self::TypeConversion => "type-conversion",
            Self::Empty => "empty",
        }
    }

    /// Returns `true` for literal nodes.
    #[must_use]
    pub const fn is_literal(self) -> bool {
        matches!(
            self,
            Self::NumberLiteral
                | Self::FloatLiteral
                | Self::StringLiteral
                | Self::CharLiteral
                | Self::BoolLiteral
                | Self::NullLiteral
        )
    }

    /// Returns `true` for statement nodes.
    #[must_use]
    pub const fn is_statement(self) -> bool {
        matches!(
            self,
            Self::Block
                | Self::ExpressionStatement
                | Self::ReturnStatement
                | Self::IfStatement
                | Self::WhileStatement
                | Self::ForStatement
                | Self::DoWhileStatement
                | Self::SwitchStatement
                | Self::CaseStatement
                | Self::DefaultStatement
                | Self::BreakStatement
                | Self::ContinueStatement
        )
    }

    /// Returns `true` for expression nodes (literals included).
    #[must_use]
    pub const fn is_expression(self) -> bool {
        self.is_literal()
            || matches!(
                self,
                Self::Assignment
                    | Self::BinaryOp
                    | Self::UnaryOp
                    | Self::PostfixOp
                    | Self::Ternary
                    | Self::FunctionCall
                    | Self::ArrayAccess
                    | Self::MemberAccess
                    | Self::Sizeof
                    | Self::Identifier
                    | Self::Cast
                    | Self::TypeConversion
            )
    }

    /// Returns `true` for declaration nodes.
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(
            self,
            Self::Function
                | Self::VariableDeclaration
                | Self::Struct
                | Self::Enum
                | Self::Union
                | Self::Parameter
                | Self::Module
                | Self::Import
                | Self::Export
        )
    }
}

/// A stable handle to a node in an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source location and pre-decoded literal metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeMeta {
    /// 1-based source line (0 when synthesized).
    pub line: u32,
    /// 1-based source column (0 when synthesized).
    pub column: u32,
    /// Pre-decoded literal value for literal nodes.
    pub literal: Option<Literal>,
}

/// A single AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Discriminant; fixed at creation.
    pub kind: NodeKind,
    /// Interned value string (operator spelling, name, or literal text).
    pub value: Option<StrId>,
    /// Ordered children; positions are significant per kind.
    pub children: Vec<NodeId>,
    /// Location and literal metadata.
    pub meta: NodeMeta,
}

/// A structural invariant violation found by [`Ast::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The offending node.
    pub node: NodeId,
    /// What went wrong.
    pub message: String,
}

/// The AST arena: owns every node and the string pool backing node values.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    strings: StringPool,
}

impl Ast {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a node with no value and no children.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "trees over u32::MAX nodes are not supported"
    )]
    pub fn node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            value: None,
            children: Vec::new(),
            meta: NodeMeta::default(),
        });
        id
    }

    /// Allocates a node with an interned value string.
    pub fn node_with_value(&mut self, kind: NodeKind, value: &str) -> NodeId {
        let value = self.strings.intern(value);
        let id = self.node(kind);
        self.nodes[id.index()].value = Some(value);
        id
    }

    /// Allocates a literal node carrying a pre-decoded value.
    pub fn literal_node(&mut self, kind: NodeKind, value: &str, literal: Literal) -> NodeId {
        let id = self.node_with_value(kind, value);
        self.nodes[id.index()].meta.literal = Some(literal);
        id
    }

    /// Records the source location of a node.
    pub fn set_location(&mut self, id: NodeId, line: u32, column: u32) {
        let meta = &mut self.nodes[id.index()].meta;
        meta.line = line;
        meta.column = column;
    }

    /// Appends `child` to `parent`'s children.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].children.push(child);
    }

    /// Inserts `child` at `index`, shifting later children right.
    ///
    /// # Panics
    ///
    /// Panics if `index > child_count(parent)`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.nodes[parent.index()].children.insert(index, child);
    }

    /// Removes and returns the child at `index`, preserving order.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let children = &mut self.nodes[parent.index()].children;
        if index < children.len() {
            Some(children.remove(index))
        } else {
            None
        }
    }

    /// Returns the node behind a handle.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Returns the kind of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    /// Returns a node's value string, if it has one.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].value.map(|s| self.strings.resolve(s))
    }

    /// Returns the child at `index`, if present.
    #[must_use]
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.index()].children.get(index).copied()
    }

    /// Returns all children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Returns the number of children of a node.
    #[must_use]
    pub fn child_count(&self, id: NodeId) -> usize {
        self.nodes[id.index()].children.len()
    }

    /// Deep-clones the subtree rooted at `id` into this arena.
    pub fn copy_node(&mut self, id: NodeId) -> NodeId {
        let source = self.nodes[id.index()].clone();
        let copy = self.node(source.kind);
        self.nodes[copy.index()].value = source.value;
        self.nodes[copy.index()].meta = source.meta;
        for child in source.children {
            let child_copy = self.copy_node(child);
            self.add_child(copy, child_copy);
        }
        copy
    }

    /// Number of nodes allocated; non-decreasing until [`Ast::reset`].
    #[must_use]
    pub fn used(&self) -> usize {
        self.nodes.len()
    }

    /// Gives interning access to the string pool.
    pub fn intern(&mut self, text: &str) -> StrId {
        self.strings.intern(text)
    }

    /// Resolves an interned string handle.
    #[must_use]
    pub fn resolve(&self, id: StrId) -> &str {
        self.strings.resolve(id)
    }

    /// Discards every node and interned string.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.strings.reset();
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Visits the subtree at `root` depth-first, pre-order, left-to-right.
    pub fn visit<F: FnMut(NodeId, &Node)>(&self, root: NodeId, f: &mut F) {
        f(root, self.get(root));
        for i in 0..self.child_count(root) {
            let child = self.children(root)[i];
            self.visit(child, &mut *f);
        }
    }

    /// Pre-order visit threading a caller-supplied context value.
    pub fn visit_with_context<C, F: FnMut(&mut C, NodeId, &Node)>(
        &self,
        root: NodeId,
        context: &mut C,
        f: &mut F,
    ) {
        f(context, root, self.get(root));
        for i in 0..self.child_count(root) {
            let child = self.children(root)[i];
            self.visit_with_context(child, &mut *context, &mut *f);
        }
    }

    /// Finds the first node of `kind` in pre-order, `root` included.
    #[must_use]
    pub fn find_by_kind(&self, root: NodeId, kind: NodeKind) -> Option<NodeId> {
        if self.kind(root) == kind {
            return Some(root);
        }
        self.children(root)
            .iter()
            .find_map(|&child| self.find_by_kind(child, kind))
    }

    /// Finds the first node whose value equals `value` in pre-order.
    #[must_use]
    pub fn find_by_value(&self, root: NodeId, value: &str) -> Option<NodeId> {
        if self.value(root) == Some(value) {
            return Some(root);
        }
        self.children(root)
            .iter()
            .find_map(|&child| self.find_by_value(child, value))
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks per-kind child-count invariants over the subtree at `root`.
    ///
    /// Violations indicate a parser bug; they are collected and reported
    /// rather than treated as fatal.
    #[must_use]
    pub fn validate(&self, root: NodeId) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.visit(root, &mut |id, node| {
            let count = node.children.len();
            let problem = match node.kind {
                NodeKind::Function if count < 2 => {
                    Some(format!("function has {count} children, expected at least 2"))
                }
                NodeKind::BinaryOp | NodeKind::Assignment | NodeKind::MemberAccess
                | NodeKind::ArrayAccess
                    if count != 2 =>
                {
                    Some(format!(
                        "{} has {count} children, expected exactly 2",
                        node.kind.name()
                    ))
                }
                NodeKind::UnaryOp | NodeKind::PostfixOp | NodeKind::Sizeof if count != 1 => {
                    Some(format!(
                        "{} has {count} children, expected exactly 1",
                        node.kind.name()
                    ))
                }
                NodeKind::IfStatement if !(2..=3).contains(&count) => {
                    Some(format!("if has {count} children, expected 2 or 3"))
                }
                NodeKind::WhileStatement | NodeKind::DoWhileStatement if count != 2 => {
                    Some(format!(
                        "{} has {count} children, expected exactly 2",
                        node.kind.name()
                    ))
                }
                NodeKind::ForStatement if !(3..=4).contains(&count) => {
                    Some(format!("for has {count} children, expected 3 or 4"))
                }
                NodeKind::Ternary if count != 3 => {
                    Some(format!("ternary has {count} children, expected exactly 3"))
                }
                NodeKind::PointerType if count != 1 => {
                    Some(format!("pointer-type has {count} children, expected exactly 1"))
                }
                _ => None,
            };
            if let Some(message) = problem {
                issues.push(ValidationIssue { node: id, message });
            }
        });
        issues
    }

    /// Returns `true` when the subtree passes [`Ast::validate`].
    #[must_use]
    pub fn is_valid(&self, root: NodeId) -> bool {
        self.validate(root).is_empty()
    }

    // ========================================================================
    // Dumps
    // ========================================================================

    /// Renders the subtree at `root` as an indented tree, one node per
    /// line, for `--print-ast`.
    #[must_use]
    pub fn dump(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(root, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        use std::fmt::Write;
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(self.kind(id).name());
        if let Some(value) = self.value(id) {
            let _ = write!(out, " \"{value}\"");
        }
        out.push('\n');
        for i in 0..self.child_count(id) {
            self.dump_into(self.children(id)[i], depth + 1, out);
        }
    }
}

/// Structural equality of two subtrees, ignoring source locations.
///
/// Used by round-trip tests: parse, unparse, re-parse, compare.
#[must_use]
pub fn trees_equal(a: &Ast, a_root: NodeId, b: &Ast, b_root: NodeId) -> bool {
    let an = a.get(a_root);
    let bn = b.get(b_root);
    if an.kind != bn.kind
        || a.value(a_root) != b.value(b_root)
        || an.children.len() != bn.children.len()
    {
        return false;
    }
    an.children
        .iter()
        .zip(&bn.children)
        .all(|(&ac, &bc)| trees_equal(a, ac, b, bc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(ast: &mut Ast, kind: NodeKind, value: &str) -> NodeId {
        ast.node_with_value(kind, value)
    }

    #[test]
    fn arena_allocates_and_resolves_values() {
        let mut ast = Ast::new();
        let id = ast.node_with_value(NodeKind::Identifier, "count");
        assert_eq!(ast.kind(id), NodeKind::Identifier);
        assert_eq!(ast.value(id), Some("count"));
        let block = ast.node(NodeKind::Block);
        assert_eq!(ast.value(block), None);
    }

    #[test]
    fn children_preserve_order() {
        let mut ast = Ast::new();
        let parent = ast.node(NodeKind::Block);
        let a = leaf(&mut ast, NodeKind::Identifier, "a");
        let b = leaf(&mut ast, NodeKind::Identifier, "b");
        let c = leaf(&mut ast, NodeKind::Identifier, "c");
        ast.add_child(parent, a);
        ast.add_child(parent, c);
        ast.insert_child(parent, 1, b);
        assert_eq!(ast.children(parent), &[a, b, c]);

        assert_eq!(ast.remove_child(parent, 1), Some(b));
        assert_eq!(ast.children(parent), &[a, c]);
        assert_eq!(ast.remove_child(parent, 9), None);
    }

    #[test]
    fn copy_node_deep_clones() {
        let mut ast = Ast::new();
        let op = ast.node_with_value(NodeKind::BinaryOp, "+");
        let lhs = ast.literal_node(NodeKind::NumberLiteral, "1", Literal::Int(1));
        let rhs = ast.literal_node(NodeKind::NumberLiteral, "2", Literal::Int(2));
        ast.add_child(op, lhs);
        ast.add_child(op, rhs);

        let copy = ast.copy_node(op);
        assert_ne!(copy, op);
        assert!(trees_equal(&ast, op, &ast, copy));
        assert_eq!(ast.get(ast.child(copy, 0).unwrap()).meta.literal, Some(Literal::Int(1)));
    }

    #[test]
    fn visit_is_preorder_left_to_right() {
        let mut ast = Ast::new();
        let root = ast.node(NodeKind::Program);
        let f = ast.node_with_value(NodeKind::Function, "f");
        let g = ast.node_with_value(NodeKind::Function, "g");
        let ty = ast.node_with_value(NodeKind::Type, "i32");
        ast.add_child(root, f);
        ast.add_child(root, g);
        ast.add_child(f, ty);

        let mut seen = Vec::new();
        ast.visit(root, &mut |_, node| seen.push(node.kind));
        assert_eq!(
            seen,
            vec![NodeKind::Program, NodeKind::Function, NodeKind::Type, NodeKind::Function]
        );
    }

    #[test]
    fn find_by_kind_and_value() {
        let mut ast = Ast::new();
        let root = ast.node(NodeKind::Program);
        let func = ast.node_with_value(NodeKind::Function, "main");
        ast.add_child(root, func);
        assert_eq!(ast.find_by_kind(root, NodeKind::Function), Some(func));
        assert_eq!(ast.find_by_value(root, "main"), Some(func));
        assert_eq!(ast.find_by_kind(root, NodeKind::WhileStatement), None);
        assert_eq!(ast.find_by_value(root, "other"), None);
    }

    #[test]
    fn validate_flags_malformed_nodes() {
        let mut ast = Ast::new();
        let op = ast.node_with_value(NodeKind::BinaryOp, "+");
        let only = ast.literal_node(NodeKind::NumberLiteral, "1", Literal::Int(1));
        ast.add_child(op, only);
        let issues = ast.validate(op);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("expected exactly 2"));
        assert!(!ast.is_valid(op));
    }

    #[test]
    fn validate_accepts_well_formed_if() {
        let mut ast = Ast::new();
        let node = ast.node(NodeKind::IfStatement);
        let cond = leaf(&mut ast, NodeKind::Identifier, "x");
        let then = ast.node(NodeKind::Block);
        ast.add_child(node, cond);
        ast.add_child(node, then);
        assert!(ast.is_valid(node));
    }

    #[test]
    fn used_counter_is_monotonic() {
        let mut ast = Ast::new();
        let mut last = ast.used();
        for _ in 0..10 {
            ast.node(NodeKind::Block);
            assert!(ast.used() > last);
            last = ast.used();
        }
        ast.reset();
        assert_eq!(ast.used(), 0);
    }

    #[test]
    fn dump_renders_indented_tree() {
        let mut ast = Ast::new();
        let root = ast.node(NodeKind::Program);
        let func = ast.node_with_value(NodeKind::Function, "main");
        let ty = ast.node_with_value(NodeKind::Type, "i32");
        ast.add_child(root, func);
        ast.add_child(func, ty);
        assert_eq!(ast.dump(root), "program\n  function \"main\"\n    type \"i32\"\n");
    }
}
