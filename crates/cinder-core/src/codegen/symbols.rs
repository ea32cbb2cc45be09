// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Symbol table, type sizes, and aggregate layouts for code generation.
//!
//! One [`SymbolTable`] is shared across a compilation unit. Variables and
//! functions live in flat arrays; lexical scoping is a `scope_level`
//! stamped on each variable, popped wholesale when the scope exits.
//! Lookup scans newest-first, so the most recent declaration shadows.
//!
//! Stack frame model (simplified, caller-stacked arguments):
//! parameters sit at positive offsets `16 + 8 * index` from the frame
//! base; locals grow downward, each declaration decrementing the cursor by
//! the type's size.

use std::collections::HashMap;

/// A variable known to the generator.
#[derive(Debug, Clone)]
pub struct VariableInfo {
    /// Declared name.
    pub name: String,
    /// Rendered type name (`i32`, `struct P*`, ...).
    pub ty: String,
    /// Frame offset: negative for locals, positive for parameters.
    pub stack_offset: i32,
    /// Size in bytes of the variable's type.
    pub size: i32,
    /// Scope depth the variable was declared at.
    pub scope_level: u32,
    /// Whether this is a function parameter.
    pub is_parameter: bool,
    /// Whether this was declared at file scope.
    pub is_global: bool,
}

/// A function known to the generator.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Declared name.
    pub name: String,
    /// Rendered return type name.
    pub return_type: String,
    /// Number of declared parameters.
    pub param_count: usize,
    /// Whether this is the program entry `main`.
    pub is_main: bool,
}

/// The unit-wide symbol table.
#[derive(Debug, Default)]
pub struct SymbolTable {
    variables: Vec<VariableInfo>,
    functions: Vec<FunctionInfo>,
    /// Downward-growing local offset cursor, reset per function.
    current_stack_offset: i32,
    /// Current lexical depth; 0 is file scope.
    scope_level: u32,
}

impl SymbolTable {
    /// Creates an empty table at file scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lexical depth.
    #[must_use]
    pub fn scope_level(&self) -> u32 {
        self.scope_level
    }

    /// Number of live variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Enters a nested scope.
    pub fn enter_scope(&mut self) {
        self.scope_level += 1;
    }

    /// Leaves the current scope, dropping every variable declared in it.
    pub fn exit_scope(&mut self) {
        let level = self.scope_level;
        while self
            .variables
            .last()
            .is_some_and(|var| var.scope_level == level)
        {
            self.variables.pop();
        }
        self.scope_level = self.scope_level.saturating_sub(1);
    }

    /// Resets the local offset cursor at function entry.
    pub fn reset_frame(&mut self) {
        self.current_stack_offset = 0;
    }

    /// Registers a local variable, assigning the next downward offset.
    pub fn add_local(&mut self, name: &str, ty: &str, size: i32) -> i32 {
        self.current_stack_offset -= size;
        let offset = self.current_stack_offset;
        self.variables.push(VariableInfo {
            name: name.to_owned(),
            ty: ty.to_owned(),
            stack_offset: offset,
            size,
            scope_level: self.scope_level,
            is_parameter: false,
            is_global: self.scope_level == 0,
        });
        offset
    }

    /// Registers a parameter at its caller-stacked offset `16 + 8 * index`.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        reason = "parameter counts are tiny"
    )]
    pub fn add_parameter(&mut self, name: &str, ty: &str, size: i32, index: usize) -> i32 {
        let offset = 16 + 8 * index as i32;
        self.variables.push(VariableInfo {
            name: name.to_owned(),
            ty: ty.to_owned(),
            stack_offset: offset,
            size,
            scope_level: self.scope_level,
            is_parameter: true,
            is_global: false,
        });
        offset
    }

    /// Finds a variable by name; the most recent declaration wins.
    #[must_use]
    pub fn find_variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.iter().rev().find(|var| var.name == name)
    }

    /// Registers a function.
    pub fn add_function(&mut self, name: &str, return_type: &str, param_count: usize) {
        self.functions.push(FunctionInfo {
            name: name.to_owned(),
            return_type: return_type.to_owned(),
            param_count,
            is_main: name == "main",
        });
    }

    /// Finds a function by name.
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|func| func.name == name)
    }
}

/// Size in bytes of a named type.
///
/// Pointers are 8 bytes; unknown (user-defined) types default to 8.
#[must_use]
pub fn type_size(ty: &str) -> i32 {
    if ty.contains('*') {
        return 8;
    }
    match ty {
        "i8" | "u8" | "bool" => 1,
        "i16" | "u16" => 2,
        "i32" | "u32" | "f32" => 4,
        "i64" | "u64" | "f64" => 8,
        _ => 8,
    }
}

/// Whether a type name denotes a signed (or floating) numeric type.
#[must_use]
pub fn is_signed_type(ty: &str) -> bool {
    ty.starts_with('i') || is_floating_type(ty)
}

/// Whether a type name denotes a floating-point type.
#[must_use]
pub fn is_floating_type(ty: &str) -> bool {
    ty == "f32" || ty == "f64"
}

/// A recorded field of an aggregate layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    /// Field name.
    pub name: String,
    /// Byte offset from the start of the aggregate.
    pub offset: i32,
    /// Field size in bytes.
    pub size: i32,
}

/// Layout of one struct or union.
#[derive(Debug, Clone, Default)]
pub struct AggregateLayout {
    /// Fields in declaration order.
    pub fields: Vec<FieldLayout>,
    /// Total size in bytes.
    pub size: i32,
}

impl AggregateLayout {
    /// Finds a field's layout by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Registry of aggregate layouts, keyed by tag name.
///
/// Recorded when the declaration is generated so that member accesses can
/// resolve real offsets instead of a placeholder.
#[derive(Debug, Default)]
pub struct LayoutRegistry {
    layouts: HashMap<String, AggregateLayout>,
}

impl LayoutRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a struct layout: fields at sequential offsets.
    pub fn record_struct(&mut self, tag: &str, fields: &[(String, i32)]) {
        let mut layout = AggregateLayout::default();
        let mut offset = 0;
        for (name, size) in fields {
            layout.fields.push(FieldLayout {
                name: name.clone(),
                offset,
                size: *size,
            });
            offset += size;
        }
        layout.size = offset;
        self.layouts.insert(tag.to_owned(), layout);
    }

    /// Records a union layout: every field at offset 0, size is the max.
    pub fn record_union(&mut self, tag: &str, fields: &[(String, i32)]) {
        let mut layout = AggregateLayout::default();
        for (name, size) in fields {
            layout.fields.push(FieldLayout {
                name: name.clone(),
                offset: 0,
                size: *size,
            });
            layout.size = layout.size.max(*size);
        }
        self.layouts.insert(tag.to_owned(), layout);
    }

    /// Looks up a layout by tag name.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&AggregateLayout> {
        self.layouts.get(tag)
    }

    /// Resolves a member offset from a rendered type name.
    ///
    /// Accepts `struct P`, `union U`, a bare tag, and a single pointer
    /// wrapper (`struct P*`).
    #[must_use]
    pub fn member_offset(&self, ty: &str, member: &str) -> Option<i32> {
        let tag = ty
            .trim_end_matches('*')
            .trim()
            .trim_start_matches("struct ")
            .trim_start_matches("union ")
            .trim_start_matches("enum ");
        self.get(tag)
            .and_then(|layout| layout.field(member))
            .map(|f| f.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_get_descending_offsets() {
        let mut symbols = SymbolTable::new();
        symbols.enter_scope();
        assert_eq!(symbols.add_local("a", "i32", 4), -4);
        assert_eq!(symbols.add_local("b", "i64", 8), -12);
        assert_eq!(symbols.add_local("c", "u8", 1), -13);
    }

    #[test]
    fn parameters_get_caller_stacked_offsets() {
        let mut symbols = SymbolTable::new();
        symbols.enter_scope();
        assert_eq!(symbols.add_parameter("x", "i32", 4, 0), 16);
        assert_eq!(symbols.add_parameter("y", "i32", 4, 1), 24);
        assert_eq!(symbols.add_parameter("z", "i64*", 8, 2), 32);
    }

    #[test]
    fn lookup_is_last_wins() {
        let mut symbols = SymbolTable::new();
        symbols.enter_scope();
        symbols.add_local("x", "i32", 4);
        symbols.enter_scope();
        symbols.add_local("x", "i64", 8);
        let found = symbols.find_variable("x").unwrap();
        assert_eq!(found.ty, "i64");
        assert_eq!(found.scope_level, 2);
    }

    #[test]
    fn exit_scope_pops_only_that_level() {
        let mut symbols = SymbolTable::new();
        symbols.enter_scope();
        symbols.add_local("outer", "i32", 4);
        symbols.enter_scope();
        symbols.add_local("inner", "i32", 4);
        symbols.add_local("inner2", "i32", 4);
        symbols.exit_scope();

        assert!(symbols.find_variable("inner").is_none());
        assert!(symbols.find_variable("inner2").is_none());
        assert!(symbols.find_variable("outer").is_some());

        symbols.exit_scope();
        assert_eq!(symbols.scope_level(), 0);
        assert_eq!(symbols.variable_count(), 0);
    }

    #[test]
    fn functions_register_and_resolve() {
        let mut symbols = SymbolTable::new();
        symbols.add_function("main", "i32", 0);
        symbols.add_function("helper", "void", 2);
        assert!(symbols.find_function("main").unwrap().is_main);
        assert_eq!(symbols.find_function("helper").unwrap().param_count, 2);
        assert!(symbols.find_function("absent").is_none());
    }

    #[test]
    fn type_size_table() {
        assert_eq!(type_size("i8"), 1);
        assert_eq!(type_size("bool"), 1);
        assert_eq!(type_size("u16"), 2);
        assert_eq!(type_size("f32"), 4);
        assert_eq!(type_size("u64"), 8);
        assert_eq!(type_size("i32*"), 8);
        assert_eq!(type_size("struct P"), 8);
    }

    #[test]
    fn signedness_by_name_prefix() {
        assert!(is_signed_type("i32"));
        assert!(is_signed_type("f64"));
        assert!(!is_signed_type("u8"));
        assert!(is_floating_type("f32"));
        assert!(!is_floating_type("i64"));
    }

    #[test]
    fn struct_layout_offsets_are_sequential() {
        let mut layouts = LayoutRegistry::new();
        layouts.record_struct("P", &[("x".into(), 4), ("y".into(), 4)]);
        let layout = layouts.get("P").unwrap();
        assert_eq!(layout.size, 8);
        assert_eq!(layout.field("y").unwrap().offset, 4);
        assert_eq!(layouts.member_offset("struct P*", "y"), Some(4));
        assert_eq!(layouts.member_offset("struct P", "x"), Some(0));
        assert_eq!(layouts.member_offset("struct Q", "x"), None);
    }

    #[test]
    fn union_layout_overlaps_fields() {
        let mut layouts = LayoutRegistry::new();
        layouts.record_union("V", &[("i".into(), 4), ("d".into(), 8)]);
        let layout = layouts.get("V").unwrap();
        assert_eq!(layout.size, 8);
        assert_eq!(layout.field("d").unwrap().offset, 0);
    }
}
