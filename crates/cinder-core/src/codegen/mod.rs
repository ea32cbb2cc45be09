// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Code generation: lower the AST to textual assembly.
//!
//! The generator walks the tree in a single forward pass and emits
//! stack-machine code over two registers: every expression leaves its
//! result in the accumulator; binary operators evaluate the left operand,
//! push it, evaluate the right operand into the scratch register, pop the
//! left back, and combine. The only optimization is the [`peephole`]
//! hook.
//!
//! The walker itself is target-independent; the per-architecture
//! instruction vocabulary lives behind [`TargetIsa`], with x86_64, ARM64,
//! and RISC-V64 implementations. Output is assembled from three sections
//! (data, text, reserved bss) plus a `_start` stub that calls `main` and
//! feeds its return value to the exit syscall.
//!
//! Errors (unsupported constructs, unresolvable names) are collected, up
//! to a cap of 16; a non-zero count fails the unit.

mod arm64;
pub mod peephole;
mod riscv64;
mod symbols;
mod x86_64;

use std::collections::HashMap;
use std::fmt::Write as _;

pub use symbols::{
    AggregateLayout, FieldLayout, FunctionInfo, LayoutRegistry, SymbolTable, VariableInfo,
    is_floating_type, is_signed_type, type_size,
};

use crate::ast::{Ast, NodeId, NodeKind};
use crate::parse::Literal;

/// Maximum number of stored code generation errors.
const MAX_ERRORS: usize = 16;

/// A code generation failure, reported against the unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CodeGenError {
    message: String,
}

impl CodeGenError {
    /// The error text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Target architecture selected by `--target`.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetArch {
    /// x86_64, AT&T syntax (the default).
    #[default]
    X86_64,
    /// AArch64.
    Arm64,
    /// RV64.
    RiscV64,
}

impl TargetArch {
    /// Parses a `--target` argument.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "x86_64" => Some(Self::X86_64),
            "arm64" => Some(Self::Arm64),
            "riscv64" => Some(Self::RiscV64),
            _ => None,
        }
    }

    /// Canonical spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
            Self::RiscV64 => "riscv64",
        }
    }

    fn isa(self) -> Box<dyn TargetIsa> {
        match self {
            Self::X86_64 => Box::new(x86_64::X86_64),
            Self::Arm64 => Box::new(arm64::Arm64),
            Self::RiscV64 => Box::new(riscv64::RiscV64),
        }
    }
}

/// Optimization level hint from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    /// `-O0` (the default): no optimization.
    #[default]
    None,
    /// `-O1` / `-O2`.
    Speed,
    /// `-Os`.
    Size,
    /// `-g`.
    Debug,
}

impl OptLevel {
    /// Human-readable name for progress output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Speed => "speed",
            Self::Size => "size",
            Self::Debug => "debug",
        }
    }
}

/// Per-architecture instruction vocabulary.
///
/// The accumulator/scratch discipline is fixed by the walker; an
/// implementation only decides how each primitive spells on its target.
pub trait TargetIsa {
    /// Architecture name.
    fn name(&self) -> &'static str;
    /// Assembler comment prefix.
    fn comment_prefix(&self) -> &'static str;
    /// Bytes one `push_acc` occupies on the runtime stack.
    fn stack_slot_size(&self) -> i32 {
        8
    }

    /// Function prologue: save frame base, allocate `frame_size` bytes.
    fn prologue(&self, out: &mut String, frame_size: i32);
    /// Function epilogue: restore frame base and return.
    fn epilogue(&self, out: &mut String);
    /// `_start`: call `main`, pass its result to the exit syscall.
    fn entry_stub(&self, out: &mut String);

    /// Load an immediate into the accumulator.
    fn load_imm(&self, out: &mut String, value: i64);
    /// Push the accumulator.
    fn push_acc(&self, out: &mut String);
    /// Pop into the accumulator.
    fn pop_acc(&self, out: &mut String);
    /// Pop into the scratch register.
    fn pop_scratch(&self, out: &mut String);
    /// Read the top of stack into the accumulator without popping.
    fn peek_stack(&self, out: &mut String);
    /// Release `bytes` of stack.
    fn drop_stack(&self, out: &mut String, bytes: i32);
    /// Copy the accumulator into the scratch register.
    fn move_acc_to_scratch(&self, out: &mut String);

    /// Combine accumulator (left) and scratch (right) by `op`.
    fn binary_op(&self, out: &mut String, op: &str);
    /// Arithmetic negation of the accumulator.
    fn negate(&self, out: &mut String);
    /// Bitwise complement of the accumulator.
    fn bitwise_not(&self, out: &mut String);
    /// Logical negation of the accumulator (result 0/1).
    fn logical_not(&self, out: &mut String);

    /// Unconditional jump.
    fn jump(&self, out: &mut String, label: &str);
    /// Emit a label definition.
    fn label(&self, out: &mut String, label: &str);
    /// Branch when the accumulator is zero.
    fn branch_if_zero(&self, out: &mut String, label: &str);
    /// Branch when the accumulator is non-zero.
    fn branch_if_nonzero(&self, out: &mut String, label: &str);
    /// Branch when accumulator equals scratch.
    fn branch_if_equal_scratch(&self, out: &mut String, label: &str);

    /// Load a frame slot into the accumulator.
    fn load_local(&self, out: &mut String, offset: i32);
    /// Store the accumulator into a frame slot.
    fn store_local(&self, out: &mut String, offset: i32);
    /// Load the address of a frame slot.
    fn load_local_address(&self, out: &mut String, offset: i32);
    /// Dereference the accumulator.
    fn load_indirect(&self, out: &mut String);
    /// Store the accumulator through the address in scratch.
    fn store_indirect(&self, out: &mut String);
    /// Add an immediate to the accumulator.
    fn add_imm(&self, out: &mut String, value: i64);
    /// Multiply the accumulator by an immediate.
    fn mul_imm(&self, out: &mut String, value: i64);

    /// Call a named function.
    fn call(&self, out: &mut String, name: &str);
    /// Load the address of a data-section label.
    fn load_data_address(&self, out: &mut String, label: &str);

    /// Stage the write-syscall buffer argument from the accumulator.
    fn stage_write_buffer_from_acc(&self, out: &mut String);
    /// Stage the write-syscall buffer argument from a data label.
    fn stage_write_buffer_label(&self, out: &mut String, label: &str);
    /// Stage the write-syscall length argument.
    fn stage_write_length(&self, out: &mut String, len: i64);
    /// Emit the write-to-stdout syscall.
    fn syscall_write(&self, out: &mut String);

    /// Peephole hook over the emitted text. Identity by default.
    fn peephole(&self, text: String) -> String {
        text
    }
}

/// Labels a `break`/`continue` can target inside the current construct.
#[derive(Debug, Clone)]
struct LoopContext {
    /// Where `continue` goes; `None` inside a `switch`.
    continue_label: Option<String>,
    /// Where `break` goes.
    break_label: String,
}

/// The code generator for one compilation unit.
pub struct CodeGenerator {
    isa: Box<dyn TargetIsa>,
    arch: TargetArch,
    opt_level: OptLevel,
    debug_info: bool,
    /// Text section under construction (function bodies).
    text: String,
    /// Reserved bss section; currently always empty.
    bss: String,
    /// Deduplicated string literals, emitted into the data section.
    strings: Vec<String>,
    symbols: SymbolTable,
    layouts: LayoutRegistry,
    enum_constants: HashMap<String, i64>,
    label_counter: u32,
    loop_stack: Vec<LoopContext>,
    errors: Vec<CodeGenError>,
    in_function: bool,
    current_function: Option<String>,
}

impl std::fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("arch", &self.arch)
            .field("opt_level", &self.opt_level)
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl CodeGenerator {
    /// Creates a generator for the given target and optimization level.
    ///
    /// `-g` (the `Debug` level) turns on comment emission.
    #[must_use]
    pub fn new(arch: TargetArch, opt_level: OptLevel) -> Self {
        Self {
            isa: arch.isa(),
            arch,
            opt_level,
            debug_info: opt_level == OptLevel::Debug,
            text: String::new(),
            bss: String::new(),
            strings: Vec::new(),
            symbols: SymbolTable::new(),
            layouts: LayoutRegistry::new(),
            enum_constants: HashMap::new(),
            label_counter: 0,
            loop_stack: Vec::new(),
            errors: Vec::new(),
            in_function: false,
            current_function: None,
        }
    }

    /// Walks the AST and returns the complete assembly text.
    pub fn generate(&mut self, ast: &Ast, root: NodeId) -> String {
        tracing::debug!(
            target_arch = self.arch.name(),
            opt = self.opt_level.name(),
            nodes = ast.used(),
            "generating assembly"
        );
        self.gen_node(ast, root);

        let mut text = std::mem::take(&mut self.text);
        if matches!(self.opt_level, OptLevel::Speed | OptLevel::Size) {
            text = self.isa.peephole(text);
        }

        let mut output = String::with_capacity(text.len() + 256);
        output.push_str(".global _start\n");
        output.push_str(".section .data\n");
        for (i, string) in self.strings.iter().enumerate() {
            let _ = writeln!(output, "str{i}: .ascii \"{}\"", escape_asm_string(string));
        }
        output.push_str(".section .text\n");
        self.isa.entry_stub(&mut output);
        output.push_str(&text);
        if !self.bss.is_empty() {
            output.push_str(".section .bss\n");
            output.push_str(&self.bss);
        }
        output
    }

    /// Stored errors.
    #[must_use]
    pub fn errors(&self) -> &[CodeGenError] {
        &self.errors
    }

    /// Number of errors; non-zero fails the unit.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn error(&mut self, message: impl Into<String>) {
        if self.errors.len() >= MAX_ERRORS {
            return;
        }
        let message = message.into();
        let message = match &self.current_function {
            Some(name) => format!("In function '{name}': {message}"),
            None => message,
        };
        self.errors.push(CodeGenError { message });
    }

    fn new_label(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn comment(&mut self, text: &str) {
        if self.debug_info {
            let prefix = self.isa.comment_prefix();
            let _ = writeln!(self.text, "    {prefix} {text}");
        }
    }

    /// Interns a string literal into the data section, deduplicated.
    fn add_string(&mut self, value: &str) -> usize {
        if let Some(index) = self.strings.iter().position(|s| s == value) {
            return index;
        }
        self.strings.push(value.to_owned());
        self.strings.len() - 1
    }

    /// Renders a type subtree to its name (`i32`, `struct P*`, ...).
    fn type_name(&self, ast: &Ast, id: NodeId) -> String {
        match ast.kind(id) {
            NodeKind::Type => ast.value(id).unwrap_or("i64").to_owned(),
            NodeKind::PointerType => {
                let inner = ast
                    .child(id, 0)
                    .map_or_else(|| "i64".to_owned(), |c| self.type_name(ast, c));
                format!("{inner}*")
            }
            NodeKind::ArrayType => {
                let inner = ast
                    .child(id, 0)
                    .map_or_else(|| "i64".to_owned(), |c| self.type_name(ast, c));
                format!("{inner}[]")
            }
            _ => "i64".to_owned(),
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn gen_node(&mut self, ast: &Ast, id: NodeId) {
        if self.debug_info {
            self.comment(&format!("node: {}", ast.kind(id).name()));
        }

        match ast.kind(id) {
            NodeKind::Program => {
                for i in 0..ast.child_count(id) {
                    self.gen_node(ast, ast.children(id)[i]);
                }
            }
            NodeKind::Function => self.gen_function(ast, id),
            NodeKind::VariableDeclaration => self.gen_variable_declaration(ast, id),
            NodeKind::Struct => self.record_struct(ast, id, false),
            NodeKind::Union => self.record_struct(ast, id, true),
            NodeKind::Enum => self.record_enum(ast, id),
            NodeKind::Module | NodeKind::Import => {
                let name = ast.value(id).unwrap_or_default().to_owned();
                self.comment(&format!("{} {name}", ast.kind(id).name()));
            }
            NodeKind::Export => {
                if let Some(inner) = ast.child(id, 0) {
                    self.gen_node(ast, inner);
                }
            }
            NodeKind::Block => self.gen_block(ast, id),
            NodeKind::ExpressionStatement => {
                if let Some(expr) = ast.child(id, 0) {
                    self.gen_node(ast, expr);
                }
            }
            NodeKind::IfStatement => self.gen_if(ast, id),
            NodeKind::WhileStatement => self.gen_while(ast, id),
            NodeKind::ForStatement => self.gen_for(ast, id),
            NodeKind::DoWhileStatement => self.gen_do_while(ast, id),
            NodeKind::SwitchStatement => self.gen_switch(ast, id),
            NodeKind::ReturnStatement => self.gen_return(ast, id),
            NodeKind::BreakStatement => self.gen_break(),
            NodeKind::ContinueStatement => self.gen_continue(),
            NodeKind::Assignment => self.gen_assignment(ast, id),
            NodeKind::BinaryOp => self.gen_binary_op(ast, id),
            NodeKind::UnaryOp => self.gen_unary_op(ast, id),
            NodeKind::PostfixOp => self.gen_postfix_op(ast, id),
            NodeKind::Ternary => self.gen_ternary(ast, id),
            NodeKind::FunctionCall => self.gen_call(ast, id),
            NodeKind::ArrayAccess => self.gen_array_access(ast, id),
            NodeKind::MemberAccess => {
                if self.gen_member_address(ast, id) {
                    self.isa.load_indirect(&mut self.text);
                }
            }
            NodeKind::Sizeof => self.gen_sizeof(ast, id),
            NodeKind::NumberLiteral => {
                let value = int_value(ast, id);
                self.isa.load_imm(&mut self.text, value);
            }
            NodeKind::FloatLiteral => {
                // Integer-style move of the bit pattern; real FP emission
                // is out of scope.
                let bits = match ast.get(id).meta.literal {
                    Some(Literal::Float(f)) => i64::from_ne_bytes(f.to_bits().to_ne_bytes()),
                    _ => 0,
                };
                self.isa.load_imm(&mut self.text, bits);
            }
            NodeKind::StringLiteral => {
                let value = ast.value(id).unwrap_or_default().to_owned();
                let index = self.add_string(&value);
                self.isa.load_data_address(&mut self.text, &format!("str{index}"));
            }
            NodeKind::CharLiteral => {
                let value = int_value(ast, id);
                self.isa.load_imm(&mut self.text, value);
            }
            NodeKind::BoolLiteral => {
                let value = i64::from(ast.value(id) == Some("true"));
                self.isa.load_imm(&mut self.text, value);
            }
            NodeKind::NullLiteral => self.isa.load_imm(&mut self.text, 0),
            NodeKind::Identifier => self.gen_identifier(ast, id),
            NodeKind::Cast | NodeKind::TypeConversion => {
                if let Some(&operand) = ast.children(id).last() {
                    self.gen_node(ast, operand);
                }
            }
            NodeKind::Empty => {}
            other => {
                self.comment(&format!("unsupported node: {}", other.name()));
                self.error(format!("Unsupported node type: {}", other.name()));
            }
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn gen_function(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) < 2 {
            self.error("Malformed function node");
            return;
        }

        let name = ast.value(id).unwrap_or_default().to_owned();
        let return_type_node = ast.children(id)[0];
        let params = (ast.child_count(id) > 2).then(|| ast.children(id)[1]);
        let body = *ast.children(id).last().expect("child_count checked above");

        let return_type = self.type_name(ast, return_type_node);
        let param_count = params.map_or(0, |p| ast.child_count(p));
        self.symbols.add_function(&name, &return_type, param_count);

        self.in_function = true;
        self.current_function = Some(name.clone());
        self.symbols.reset_frame();
        self.symbols.enter_scope();

        self.isa.label(&mut self.text, &name);
        let frame_size = self.frame_size(ast, body);
        self.isa.prologue(&mut self.text, frame_size);

        if let Some(params) = params {
            for (index, &param) in ast.children(params).iter().enumerate() {
                if ast.kind(param) != NodeKind::Parameter {
                    continue;
                }
                let Some(type_node) = ast.child(param, 0) else {
                    continue;
                };
                let param_name = ast.value(param).unwrap_or("unnamed").to_owned();
                let ty = self.type_name(ast, type_node);
                self.symbols
                    .add_parameter(&param_name, &ty, type_size(&ty), index);
            }
        }

        self.gen_node(ast, body);

        // Fallback epilogue for control paths without an explicit return.
        self.isa.epilogue(&mut self.text);

        self.symbols.exit_scope();
        self.in_function = false;
        self.current_function = None;
    }

    /// Total bytes of locals declared anywhere in the body, 16-aligned.
    fn frame_size(&self, ast: &Ast, body: NodeId) -> i32 {
        let mut total = 0i32;
        ast.visit(body, &mut |_, node| {
            if node.kind == NodeKind::VariableDeclaration {
                let size = node
                    .children
                    .first()
                    .map_or(8, |&ty| type_size(&self.type_name(ast, ty)));
                total += size;
            }
        });
        (total + 15) & !15
    }

    fn gen_variable_declaration(&mut self, ast: &Ast, id: NodeId) {
        let Some(type_node) = ast.child(id, 0) else {
            self.error("Malformed variable declaration");
            return;
        };
        let name = ast.value(id).unwrap_or_default().to_owned();
        let ty = self.type_name(ast, type_node);
        let size = type_size(&ty);

        if self.in_function {
            let offset = self.symbols.add_local(&name, &ty, size);
            if let Some(init) = ast.child(id, 1) {
                self.gen_node(ast, init);
                self.isa.store_local(&mut self.text, offset);
            }
        } else {
            // File-scope variables are registered for name resolution only;
            // no storage is emitted for them.
            self.symbols.add_local(&name, &ty, size);
            self.comment(&format!("global variable {name}"));
        }
    }

    fn record_struct(&mut self, ast: &Ast, id: NodeId, is_union: bool) {
        let tag = ast.value(id).unwrap_or_default().to_owned();
        let fields: Vec<(String, i32)> = ast
            .children(id)
            .iter()
            .filter(|&&field| ast.kind(field) == NodeKind::VariableDeclaration)
            .map(|&field| {
                let name = ast.value(field).unwrap_or_default().to_owned();
                let size = ast
                    .child(field, 0)
                    .map_or(8, |ty| type_size(&self.type_name(ast, ty)));
                (name, size)
            })
            .collect();
        if is_union {
            self.layouts.record_union(&tag, &fields);
        } else {
            self.layouts.record_struct(&tag, &fields);
        }
    }

    fn record_enum(&mut self, ast: &Ast, id: NodeId) {
        let mut next = 0i64;
        for &value in ast.children(id) {
            if ast.kind(value) != NodeKind::EnumValue {
                continue;
            }
            let name = ast.value(value).unwrap_or_default().to_owned();
            if let Some(expr) = ast.child(value, 0) {
                if ast.kind(expr) == NodeKind::NumberLiteral {
                    next = int_value(ast, expr);
                } else {
                    self.error(format!(
                        "Enum value '{name}' requires a constant integer expression"
                    ));
                }
            }
            self.enum_constants.insert(name, next);
            next += 1;
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn gen_block(&mut self, ast: &Ast, id: NodeId) {
        self.symbols.enter_scope();
        for i in 0..ast.child_count(id) {
            self.gen_node(ast, ast.children(id)[i]);
        }
        self.symbols.exit_scope();
    }

    fn gen_if(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) < 2 {
            self.error("Malformed if statement");
            return;
        }
        let condition = ast.children(id)[0];
        let then_stmt = ast.children(id)[1];
        let else_stmt = ast.child(id, 2);

        let else_label = self.new_label("else_");
        let end_label = self.new_label("endif_");

        self.gen_node(ast, condition);
        self.isa.branch_if_zero(&mut self.text, &else_label);

        self.gen_node(ast, then_stmt);
        self.isa.jump(&mut self.text, &end_label);

        self.isa.label(&mut self.text, &else_label);
        if let Some(else_stmt) = else_stmt {
            self.gen_node(ast, else_stmt);
        }
        self.isa.label(&mut self.text, &end_label);
    }

    fn gen_while(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) < 2 {
            self.error("Malformed while statement");
            return;
        }
        let condition = ast.children(id)[0];
        let body = ast.children(id)[1];

        let loop_label = self.new_label("loop_");
        let end_label = self.new_label("endloop_");

        self.isa.label(&mut self.text, &loop_label);
        self.gen_node(ast, condition);
        self.isa.branch_if_zero(&mut self.text, &end_label);

        self.loop_stack.push(LoopContext {
            continue_label: Some(loop_label.clone()),
            break_label: end_label.clone(),
        });
        self.gen_node(ast, body);
        self.loop_stack.pop();

        self.isa.jump(&mut self.text, &loop_label);
        self.isa.label(&mut self.text, &end_label);
    }

    fn gen_for(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) < 4 {
            self.error("Malformed for statement");
            return;
        }
        let init = ast.children(id)[0];
        let condition = ast.children(id)[1];
        let update = ast.children(id)[2];
        let body = ast.children(id)[3];

        let loop_label = self.new_label("for_loop_");
        let update_label = self.new_label("for_update_");
        let condition_label = self.new_label("for_condition_");
        let end_label = self.new_label("for_end_");

        // The init's scope covers the whole loop.
        self.symbols.enter_scope();
        self.gen_node(ast, init);

        self.isa.jump(&mut self.text, &condition_label);
        self.isa.label(&mut self.text, &loop_label);

        self.loop_stack.push(LoopContext {
            continue_label: Some(update_label.clone()),
            break_label: end_label.clone(),
        });
        self.gen_node(ast, body);
        self.loop_stack.pop();

        self.isa.label(&mut self.text, &update_label);
        self.gen_node(ast, update);

        self.isa.label(&mut self.text, &condition_label);
        if ast.kind(condition) == NodeKind::Empty {
            self.isa.jump(&mut self.text, &loop_label);
        } else {
            self.gen_node(ast, condition);
            self.isa.branch_if_nonzero(&mut self.text, &loop_label);
        }

        self.isa.label(&mut self.text, &end_label);
        self.symbols.exit_scope();
    }

    fn gen_do_while(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) < 2 {
            self.error("Malformed do-while statement");
            return;
        }
        let body = ast.children(id)[0];
        let condition = ast.children(id)[1];

        let loop_label = self.new_label("do_loop_");
        let condition_label = self.new_label("do_condition_");
        let end_label = self.new_label("do_end_");

        self.isa.label(&mut self.text, &loop_label);

        self.loop_stack.push(LoopContext {
            continue_label: Some(condition_label.clone()),
            break_label: end_label.clone(),
        });
        self.gen_node(ast, body);
        self.loop_stack.pop();

        self.isa.label(&mut self.text, &condition_label);
        self.gen_node(ast, condition);
        self.isa.branch_if_nonzero(&mut self.text, &loop_label);
        self.isa.label(&mut self.text, &end_label);
    }

    fn gen_switch(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) < 1 {
            self.error("Malformed switch statement");
            return;
        }
        let subject = ast.children(id)[0];
        let arms: Vec<NodeId> = ast.children(id)[1..].to_vec();

        let end_label = self.new_label("switch_end_");
        // Labels are assigned up front so the comparison chain and the arm
        // bodies agree on them.
        let arm_labels: Vec<String> = arms
            .iter()
            .map(|&arm| {
                if ast.kind(arm) == NodeKind::DefaultStatement {
                    self.new_label("switch_default_")
                } else {
                    self.new_label("case_")
                }
            })
            .collect();
        let default_label = arms
            .iter()
            .zip(&arm_labels)
            .find(|(&arm, _)| ast.kind(arm) == NodeKind::DefaultStatement)
            .map(|(_, label)| label.clone());

        // Evaluate the subject once and keep it on the stack.
        self.gen_node(ast, subject);
        self.isa.push_acc(&mut self.text);

        for (&arm, label) in arms.iter().zip(&arm_labels) {
            if ast.kind(arm) != NodeKind::CaseStatement {
                continue;
            }
            let Some(case_value) = ast.child(arm, 0) else {
                continue;
            };
            self.gen_node(ast, case_value);
            self.isa.move_acc_to_scratch(&mut self.text);
            self.isa.peek_stack(&mut self.text);
            self.isa.branch_if_equal_scratch(&mut self.text, label);
        }

        match &default_label {
            Some(label) => self.isa.jump(&mut self.text, label),
            None => self.isa.jump(&mut self.text, &end_label),
        }

        self.loop_stack.push(LoopContext {
            continue_label: None,
            break_label: end_label.clone(),
        });
        for (&arm, label) in arms.iter().zip(&arm_labels) {
            self.isa.label(&mut self.text, label);
            let body_start = usize::from(ast.kind(arm) == NodeKind::CaseStatement);
            for &stmt in &ast.children(arm)[body_start.min(ast.child_count(arm))..] {
                self.gen_node(ast, stmt);
            }
        }
        self.loop_stack.pop();

        // The saved subject is released at the end label, so `break` lands
        // before the cleanup.
        self.isa.label(&mut self.text, &end_label);
        let slot = self.isa.stack_slot_size();
        self.isa.drop_stack(&mut self.text, slot);
    }

    fn gen_return(&mut self, ast: &Ast, id: NodeId) {
        match ast.child(id, 0) {
            Some(expr) => self.gen_node(ast, expr),
            None => self.isa.load_imm(&mut self.text, 0),
        }
        self.isa.epilogue(&mut self.text);
    }

    fn gen_break(&mut self) {
        match self.loop_stack.last() {
            Some(context) => {
                let label = context.break_label.clone();
                self.isa.jump(&mut self.text, &label);
            }
            None => self.error("'break' outside of a loop or switch"),
        }
    }

    fn gen_continue(&mut self) {
        let target = self
            .loop_stack
            .iter()
            .rev()
            .find_map(|context| context.continue_label.clone());
        match target {
            Some(label) => self.isa.jump(&mut self.text, &label),
            None => self.error("'continue' outside of a loop"),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn gen_binary_op(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) != 2 {
            self.error("Malformed binary operator");
            return;
        }
        let op = ast.value(id).unwrap_or_default().to_owned();

        self.gen_node(ast, ast.children(id)[0]);
        self.isa.push_acc(&mut self.text);
        self.gen_node(ast, ast.children(id)[1]);
        self.isa.move_acc_to_scratch(&mut self.text);
        self.isa.pop_acc(&mut self.text);
        self.isa.binary_op(&mut self.text, &op);
    }

    fn gen_unary_op(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) != 1 {
            self.error("Malformed unary operator");
            return;
        }
        let operand = ast.children(id)[0];
        let op = ast.value(id).unwrap_or_default().to_owned();

        match op.as_str() {
            "-" => {
                self.gen_node(ast, operand);
                self.isa.negate(&mut self.text);
            }
            "+" => self.gen_node(ast, operand),
            "!" => {
                self.gen_node(ast, operand);
                self.isa.logical_not(&mut self.text);
            }
            "~" => {
                self.gen_node(ast, operand);
                self.isa.bitwise_not(&mut self.text);
            }
            "*" => {
                self.gen_node(ast, operand);
                self.isa.load_indirect(&mut self.text);
            }
            "&" => {
                if let Some(offset) = self.variable_offset(ast, operand) {
                    self.isa.load_local_address(&mut self.text, offset);
                } else {
                    self.error("'&' requires a named variable");
                }
            }
            "++" | "--" => {
                let delta = if op == "++" { 1 } else { -1 };
                if let Some(offset) = self.variable_offset(ast, operand) {
                    self.isa.load_local(&mut self.text, offset);
                    self.isa.add_imm(&mut self.text, delta);
                    self.isa.store_local(&mut self.text, offset);
                } else {
                    self.error(format!("'{op}' requires a named variable"));
                }
            }
            other => self.error(format!("Unsupported unary operator '{other}'")),
        }
    }

    fn gen_postfix_op(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) != 1 {
            self.error("Malformed postfix operator");
            return;
        }
        let op = ast.value(id).unwrap_or_default().to_owned();
        let delta = if op == "++" { 1 } else { -1 };

        if let Some(offset) = self.variable_offset(ast, ast.children(id)[0]) {
            // Result is the old value; the slot gets the new one.
            self.isa.load_local(&mut self.text, offset);
            self.isa.push_acc(&mut self.text);
            self.isa.add_imm(&mut self.text, delta);
            self.isa.store_local(&mut self.text, offset);
            self.isa.pop_acc(&mut self.text);
        } else {
            self.error(format!("'{op}' requires a named variable"));
        }
    }

    /// Frame offset of an identifier operand, if it names a variable.
    fn variable_offset(&self, ast: &Ast, id: NodeId) -> Option<i32> {
        if ast.kind(id) != NodeKind::Identifier {
            return None;
        }
        let name = ast.value(id)?;
        self.symbols.find_variable(name).map(|var| var.stack_offset)
    }

    fn gen_assignment(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) != 2 {
            self.error("Malformed assignment");
            return;
        }
        let target = ast.children(id)[0];
        let value = ast.children(id)[1];
        let op = ast.value(id).unwrap_or("=").to_owned();

        self.gen_node(ast, value);

        if let Some(base_op) = op.strip_suffix('=').filter(|base| !base.is_empty()) {
            // Compound form: combine the target's current value (left) with
            // the right-hand side (right).
            self.isa.push_acc(&mut self.text);
            self.gen_node(ast, target);
            self.isa.pop_scratch(&mut self.text);
            self.isa.binary_op(&mut self.text, base_op);
        }

        match ast.kind(target) {
            NodeKind::Identifier => {
                let name = ast.value(target).unwrap_or_default().to_owned();
                match self.symbols.find_variable(&name) {
                    Some(var) => {
                        let offset = var.stack_offset;
                        self.isa.store_local(&mut self.text, offset);
                    }
                    None => self.error(format!("Undefined variable '{name}'")),
                }
            }
            NodeKind::UnaryOp if ast.value(target) == Some("*") => {
                // *p = value: stash the value, compute the address, store
                // through it.
                self.isa.push_acc(&mut self.text);
                if let Some(pointer) = ast.child(target, 0) {
                    self.gen_node(ast, pointer);
                }
                self.isa.move_acc_to_scratch(&mut self.text);
                self.isa.pop_acc(&mut self.text);
                self.isa.store_indirect(&mut self.text);
            }
            NodeKind::MemberAccess => {
                self.isa.push_acc(&mut self.text);
                if self.gen_member_address(ast, target) {
                    self.isa.move_acc_to_scratch(&mut self.text);
                    self.isa.pop_acc(&mut self.text);
                    self.isa.store_indirect(&mut self.text);
                } else {
                    self.isa.pop_acc(&mut self.text);
                }
            }
            NodeKind::ArrayAccess => {
                self.isa.push_acc(&mut self.text);
                self.gen_array_address(ast, target);
                self.isa.move_acc_to_scratch(&mut self.text);
                self.isa.pop_acc(&mut self.text);
                self.isa.store_indirect(&mut self.text);
            }
            _ => self.error("Invalid assignment target"),
        }
    }

    fn gen_ternary(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) != 3 {
            self.error("Malformed ternary expression");
            return;
        }
        let false_label = self.new_label("ternary_false_");
        let end_label = self.new_label("ternary_end_");

        self.gen_node(ast, ast.children(id)[0]);
        self.isa.branch_if_zero(&mut self.text, &false_label);
        self.gen_node(ast, ast.children(id)[1]);
        self.isa.jump(&mut self.text, &end_label);
        self.isa.label(&mut self.text, &false_label);
        self.gen_node(ast, ast.children(id)[2]);
        self.isa.label(&mut self.text, &end_label);
    }

    fn gen_call(&mut self, ast: &Ast, id: NodeId) {
        let name = ast.value(id).unwrap_or_default().to_owned();

        if name == "printf" {
            self.gen_printf(ast, id);
            return;
        }

        // Arguments are pushed right to left.
        let argc = ast.child_count(id);
        for i in (0..argc).rev() {
            self.gen_node(ast, ast.children(id)[i]);
            self.isa.push_acc(&mut self.text);
        }

        self.isa.call(&mut self.text, &name);

        if argc > 0 {
            let slot = self.isa.stack_slot_size();
            let bytes = slot * i32::try_from(argc).unwrap_or(i32::MAX);
            self.isa.drop_stack(&mut self.text, bytes);
        }
    }

    /// The built-in `printf` stub: handles the `"%d"` + one statically
    /// known integer shape and the plain one-string shape, both lowered to
    /// a write syscall.
    fn gen_printf(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) == 0 {
            return;
        }

        if ast.child_count(id) >= 2 {
            let format = ast.children(id)[0];
            let arg = ast.children(id)[1];

            if ast.kind(format) == NodeKind::StringLiteral && ast.value(format) == Some("%d") {
                self.gen_node(ast, arg);
                if let Some(Literal::Int(value)) = ast.get(arg).meta.literal {
                    let rendered = value.to_string();
                    let len = i64::try_from(rendered.len()).unwrap_or(0);
                    let index = self.add_string(&rendered);
                    self.isa
                        .stage_write_buffer_label(&mut self.text, &format!("str{index}"));
                    self.isa.stage_write_length(&mut self.text, len);
                } else {
                    self.comment("printf argument is not statically known");
                }
                self.isa.syscall_write(&mut self.text);
            }
            return;
        }

        let arg = ast.children(id)[0];
        self.gen_node(ast, arg);
        self.isa.stage_write_buffer_from_acc(&mut self.text);
        if ast.kind(arg) == NodeKind::StringLiteral {
            let len = ast.value(arg).map_or(0, str::len);
            self.isa
                .stage_write_length(&mut self.text, i64::try_from(len).unwrap_or(0));
        }
        self.isa.syscall_write(&mut self.text);
    }

    fn gen_array_access(&mut self, ast: &Ast, id: NodeId) {
        self.gen_array_address(ast, id);
        self.isa.load_indirect(&mut self.text);
    }

    /// Leaves the element address in the accumulator (8-byte elements).
    fn gen_array_address(&mut self, ast: &Ast, id: NodeId) {
        if ast.child_count(id) != 2 {
            self.error("Malformed array access");
            return;
        }
        self.gen_node(ast, ast.children(id)[0]);
        self.isa.push_acc(&mut self.text);
        self.gen_node(ast, ast.children(id)[1]);
        self.isa.mul_imm(&mut self.text, 8);
        self.isa.pop_scratch(&mut self.text);
        self.isa.binary_op(&mut self.text, "+");
    }

    /// Leaves the member's address in the accumulator. Returns `false`
    /// (with an error recorded) when the offset cannot be resolved.
    fn gen_member_address(&mut self, ast: &Ast, id: NodeId) -> bool {
        if ast.child_count(id) != 2 {
            self.error("Malformed member access");
            return false;
        }
        let object = ast.children(id)[0];
        let member = ast.value(ast.children(id)[1]).unwrap_or_default().to_owned();
        let op = ast.value(id).unwrap_or(".").to_owned();

        if ast.kind(object) != NodeKind::Identifier {
            self.error(format!(
                "Member access '{member}' requires a named variable"
            ));
            return false;
        }
        let name = ast.value(object).unwrap_or_default().to_owned();
        let Some(var) = self.symbols.find_variable(&name) else {
            self.error(format!("Undefined variable '{name}'"));
            return false;
        };
        let (ty, var_offset) = (var.ty.clone(), var.stack_offset);

        let Some(member_offset) = self.layouts.member_offset(&ty, &member) else {
            self.error(format!("Cannot resolve member '{member}' on type '{ty}'"));
            return false;
        };

        if op == "->" {
            // Pointer base: load the pointer value, offset into the pointee.
            self.isa.load_local(&mut self.text, var_offset);
            if member_offset != 0 {
                self.isa.add_imm(&mut self.text, i64::from(member_offset));
            }
        } else {
            // Direct base: offset from the variable's own address.
            self.isa.load_local_address(&mut self.text, var_offset);
            if member_offset != 0 {
                self.isa.add_imm(&mut self.text, i64::from(member_offset));
            }
        }
        true
    }

    fn gen_sizeof(&mut self, ast: &Ast, id: NodeId) {
        let size = ast
            .child(id, 0)
            .filter(|&operand| ast.kind(operand) == NodeKind::Identifier)
            .and_then(|operand| ast.value(operand))
            .and_then(|name| self.symbols.find_variable(name))
            .map_or(8, |var| i64::from(var.size));
        self.isa.load_imm(&mut self.text, size);
    }

    fn gen_identifier(&mut self, ast: &Ast, id: NodeId) {
        let name = ast.value(id).unwrap_or_default().to_owned();
        if let Some(var) = self.symbols.find_variable(&name) {
            let offset = var.stack_offset;
            self.isa.load_local(&mut self.text, offset);
        } else if let Some(&value) = self.enum_constants.get(&name) {
            self.isa.load_imm(&mut self.text, value);
        } else {
            self.error(format!("Undefined variable '{name}'"));
        }
    }
}

/// Integer value of a literal node, from metadata or its text.
fn int_value(ast: &Ast, id: NodeId) -> i64 {
    match ast.get(id).meta.literal {
        Some(Literal::Int(value)) => value,
        Some(Literal::Bool(value)) => i64::from(value),
        _ => ast
            .value(id)
            .and_then(|text| text.parse::<i64>().ok())
            .unwrap_or(0),
    }
}

/// Escapes a string literal for the assembler's `.ascii` directive.
fn escape_asm_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}
