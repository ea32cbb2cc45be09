// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! x86_64 instruction emission (AT&T syntax).
//!
//! Register mapping for the stack-machine discipline: the accumulator is
//! `%rax`, the scratch register is `%rbx`. Comparison results materialize
//! through `set*` + zero-extension. Program exit is Linux syscall 60.

use std::fmt::Write;

use super::TargetIsa;
use crate::codegen::peephole::collapse_push_pop;

/// The x86_64 backend.
#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
pub struct X86_64;

impl TargetIsa for X86_64 {
    fn name(&self) -> &'static str {
        "x86_64"
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn prologue(&self, out: &mut String, frame_size: i32) {
        let _ = writeln!(out, "    push %rbp");
        let _ = writeln!(out, "    mov %rsp, %rbp");
        if frame_size > 0 {
            let _ = writeln!(out, "    sub ${frame_size}, %rsp");
        }
    }

    fn epilogue(&self, out: &mut String) {
        let _ = writeln!(out, "    mov %rbp, %rsp");
        let _ = writeln!(out, "    pop %rbp");
        let _ = writeln!(out, "    ret");
    }

    fn entry_stub(&self, out: &mut String) {
        let _ = writeln!(out, "_start:");
        let _ = writeln!(out, "    call main");
        let _ = writeln!(out, "    mov %rax, %rdi");
        let _ = writeln!(out, "    mov $60, %rax");
        let _ = writeln!(out, "    syscall");
    }

    fn load_imm(&self, out: &mut String, value: i64) {
        let _ = writeln!(out, "    mov ${value}, %rax");
    }

    fn push_acc(&self, out: &mut String) {
        let _ = writeln!(out, "    push %rax");
    }

    fn pop_acc(&self, out: &mut String) {
        let _ = writeln!(out, "    pop %rax");
    }

    fn pop_scratch(&self, out: &mut String) {
        let _ = writeln!(out, "    pop %rbx");
    }

    fn peek_stack(&self, out: &mut String) {
        let _ = writeln!(out, "    mov (%rsp), %rax");
    }

    fn drop_stack(&self, out: &mut String, bytes: i32) {
        let _ = writeln!(out, "    add ${bytes}, %rsp");
    }

    fn move_acc_to_scratch(&self, out: &mut String) {
        let _ = writeln!(out, "    mov %rax, %rbx");
    }

    fn binary_op(&self, out: &mut String, op: &str) {
        match op {
            "+" => {
                let _ = writeln!(out, "    add %rbx, %rax");
            }
            "-" => {
                let _ = writeln!(out, "    sub %rbx, %rax");
            }
            "*" => {
                let _ = writeln!(out, "    imul %rbx, %rax");
            }
            "/" => {
                let _ = writeln!(out, "    cqo");
                let _ = writeln!(out, "    idiv %rbx");
            }
            "%" => {
                let _ = writeln!(out, "    cqo");
                let _ = writeln!(out, "    idiv %rbx");
                let _ = writeln!(out, "    mov %rdx, %rax");
            }
            "==" => self.compare(out, "sete"),
            "!=" => self.compare(out, "setne"),
            "<" => self.compare(out, "setl"),
            ">" => self.compare(out, "setg"),
            "<=" => self.compare(out, "setle"),
            ">=" => self.compare(out, "setge"),
            "&" => {
                let _ = writeln!(out, "    and %rbx, %rax");
            }
            "|" => {
                let _ = writeln!(out, "    or %rbx, %rax");
            }
            "^" => {
                let _ = writeln!(out, "    xor %rbx, %rax");
            }
            "<<" => {
                let _ = writeln!(out, "    mov %rbx, %rcx");
                let _ = writeln!(out, "    shl %cl, %rax");
            }
            ">>" => {
                let _ = writeln!(out, "    mov %rbx, %rcx");
                let _ = writeln!(out, "    sar %cl, %rax");
            }
            "&&" => {
                let _ = writeln!(out, "    test %rax, %rax");
                let _ = writeln!(out, "    setne %al");
                let _ = writeln!(out, "    test %rbx, %rbx");
                let _ = writeln!(out, "    setne %bl");
                let _ = writeln!(out, "    and %bl, %al");
                let _ = writeln!(out, "    movzbl %al, %eax");
            }
            "||" => {
                let _ = writeln!(out, "    or %rbx, %rax");
                let _ = writeln!(out, "    test %rax, %rax");
                let _ = writeln!(out, "    setne %al");
                let _ = writeln!(out, "    movzbl %al, %eax");
            }
            _ => {}
        }
    }

    fn negate(&self, out: &mut String) {
        let _ = writeln!(out, "    neg %rax");
    }

    fn bitwise_not(&self, out: &mut String) {
        let _ = writeln!(out, "    not %rax");
    }

    fn logical_not(&self, out: &mut String) {
        let _ = writeln!(out, "    test %rax, %rax");
        let _ = writeln!(out, "    sete %al");
        let _ = writeln!(out, "    movzbl %al, %eax");
    }

    fn jump(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    jmp {label}");
    }

    fn label(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "{label}:");
    }

    fn branch_if_zero(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    test %rax, %rax");
        let _ = writeln!(out, "    je {label}");
    }

    fn branch_if_nonzero(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    test %rax, %rax");
        let _ = writeln!(out, "    jne {label}");
    }

    fn branch_if_equal_scratch(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    cmp %rbx, %rax");
        let _ = writeln!(out, "    je {label}");
    }

    fn load_local(&self, out: &mut String, offset: i32) {
        let _ = writeln!(out, "    mov {offset}(%rbp), %rax");
    }

    fn store_local(&self, out: &mut String, offset: i32) {
        let _ = writeln!(out, "    mov %rax, {offset}(%rbp)");
    }

    fn load_local_address(&self, out: &mut String, offset: i32) {
        let _ = writeln!(out, "    lea {offset}(%rbp), %rax");
    }

    fn load_indirect(&self, out: &mut String) {
        let _ = writeln!(out, "    mov (%rax), %rax");
    }

    fn store_indirect(&self, out: &mut String) {
        let _ = writeln!(out, "    mov %rax, (%rbx)");
    }

    fn add_imm(&self, out: &mut String, value: i64) {
        let _ = writeln!(out, "    add ${value}, %rax");
    }

    fn mul_imm(&self, out: &mut String, value: i64) {
        let _ = writeln!(out, "    imul ${value}, %rax");
    }

    fn call(&self, out: &mut String, name: &str) {
        let _ = writeln!(out, "    call {name}");
    }

    fn load_data_address(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    mov ${label}, %rax");
    }

    fn stage_write_buffer_from_acc(&self, out: &mut String) {
        let _ = writeln!(out, "    mov %rax, %rsi");
    }

    fn stage_write_buffer_label(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    mov ${label}, %rsi");
    }

    fn stage_write_length(&self, out: &mut String, len: i64) {
        let _ = writeln!(out, "    mov ${len}, %rdx");
    }

    fn syscall_write(&self, out: &mut String) {
        let _ = writeln!(out, "    mov $1, %rdi");
        let _ = writeln!(out, "    mov $1, %rax");
        let _ = writeln!(out, "    syscall");
    }

    fn peephole(&self, text: String) -> String {
        collapse_push_pop(&text)
    }
}

impl X86_64 {
    fn compare(&self, out: &mut String, set: &str) {
        let _ = writeln!(out, "    cmp %rbx, %rax");
        let _ = writeln!(out, "    {set} %al");
        let _ = writeln!(out, "    movzbl %al, %eax");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_combines_scratch_into_acc() {
        let mut out = String::new();
        X86_64.binary_op(&mut out, "+");
        assert_eq!(out, "    add %rbx, %rax\n");
    }

    #[test]
    fn comparison_sets_and_extends() {
        let mut out = String::new();
        X86_64.binary_op(&mut out, "<=");
        assert!(out.contains("cmp %rbx, %rax"));
        assert!(out.contains("setle %al"));
        assert!(out.contains("movzbl %al, %eax"));
    }

    #[test]
    fn modulo_reads_remainder_from_rdx() {
        let mut out = String::new();
        X86_64.binary_op(&mut out, "%");
        assert!(out.contains("idiv %rbx"));
        assert!(out.contains("mov %rdx, %rax"));
    }

    #[test]
    fn entry_stub_exits_via_syscall_60() {
        let mut out = String::new();
        X86_64.entry_stub(&mut out);
        assert!(out.contains("_start:"));
        assert!(out.contains("call main"));
        assert!(out.contains("mov %rax, %rdi"));
        assert!(out.contains("mov $60, %rax"));
    }

    #[test]
    fn locals_address_relative_to_rbp() {
        let mut out = String::new();
        X86_64.load_local(&mut out, -8);
        X86_64.store_local(&mut out, 16);
        assert!(out.contains("mov -8(%rbp), %rax"));
        assert!(out.contains("mov %rax, 16(%rbp)"));
    }
}
