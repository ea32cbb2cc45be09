// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! RISC-V64 instruction emission.
//!
//! Register mapping: the accumulator is `a0`, the scratch register is
//! `a1`, `s0` is the frame pointer. The `li`/`neg`/`not`/`seqz`/`snez`
//! pseudo-instructions keep the output readable; the assembler expands
//! them. Program exit is Linux syscall 93 via `ecall`.

use std::fmt::Write;

use super::TargetIsa;

/// The RISC-V64 backend.
#[derive(Debug, Default)]
pub struct RiscV64;

impl TargetIsa for RiscV64 {
    fn name(&self) -> &'static str {
        "riscv64"
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn prologue(&self, out: &mut String, frame_size: i32) {
        let _ = writeln!(out, "    addi sp, sp, -16");
        let _ = writeln!(out, "    sd ra, 8(sp)");
        let _ = writeln!(out, "    sd s0, 0(sp)");
        let _ = writeln!(out, "    mv s0, sp");
        if frame_size > 0 {
            let _ = writeln!(out, "    addi sp, sp, -{frame_size}");
        }
    }

    fn epilogue(&self, out: &mut String) {
        let _ = writeln!(out, "    mv sp, s0");
        let _ = writeln!(out, "    ld s0, 0(sp)");
        let _ = writeln!(out, "    ld ra, 8(sp)");
        let _ = writeln!(out, "    addi sp, sp, 16");
        let _ = writeln!(out, "    ret");
    }

    fn entry_stub(&self, out: &mut String) {
        let _ = writeln!(out, "_start:");
        let _ = writeln!(out, "    call main");
        let _ = writeln!(out, "    li a7, 93");
        let _ = writeln!(out, "    ecall");
    }

    fn load_imm(&self, out: &mut String, value: i64) {
        let _ = writeln!(out, "    li a0, {value}");
    }

    fn push_acc(&self, out: &mut String) {
        let _ = writeln!(out, "    addi sp, sp, -8");
        let _ = writeln!(out, "    sd a0, 0(sp)");
    }

    fn pop_acc(&self, out: &mut String) {
        let _ = writeln!(out, "    ld a0, 0(sp)");
        let _ = writeln!(out, "    addi sp, sp, 8");
    }

    fn pop_scratch(&self, out: &mut String) {
        let _ = writeln!(out, "    ld a1, 0(sp)");
        let _ = writeln!(out, "    addi sp, sp, 8");
    }

    fn peek_stack(&self, out: &mut String) {
        let _ = writeln!(out, "    ld a0, 0(sp)");
    }

    fn drop_stack(&self, out: &mut String, bytes: i32) {
        let _ = writeln!(out, "    addi sp, sp, {bytes}");
    }

    fn move_acc_to_scratch(&self, out: &mut String) {
        let _ = writeln!(out, "    mv a1, a0");
    }

    fn binary_op(&self, out: &mut String, op: &str) {
        match op {
            "+" => {
                let _ = writeln!(out, "    add a0, a0, a1");
            }
            "-" => {
                let _ = writeln!(out, "    sub a0, a0, a1");
            }
            "*" => {
                let _ = writeln!(out, "    mul a0, a0, a1");
            }
            "/" => {
                let _ = writeln!(out, "    div a0, a0, a1");
            }
            "%" => {
                let _ = writeln!(out, "    rem a0, a0, a1");
            }
            "==" => {
                let _ = writeln!(out, "    xor a0, a0, a1");
                let _ = writeln!(out, "    seqz a0, a0");
            }
            "!=" => {
                let _ = writeln!(out, "    xor a0, a0, a1");
                let _ = writeln!(out, "    snez a0, a0");
            }
            "<" => {
                let _ = writeln!(out, "    slt a0, a0, a1");
            }
            ">" => {
                let _ = writeln!(out, "    slt a0, a1, a0");
            }
            "<=" => {
                let _ = writeln!(out, "    slt a0, a1, a0");
                let _ = writeln!(out, "    xori a0, a0, 1");
            }
            ">=" => {
                let _ = writeln!(out, "    slt a0, a0, a1");
                let _ = writeln!(out, "    xori a0, a0, 1");
            }
            "&" => {
                let _ = writeln!(out, "    and a0, a0, a1");
            }
            "|" => {
                let _ = writeln!(out, "    or a0, a0, a1");
            }
            "^" => {
                let _ = writeln!(out, "    xor a0, a0, a1");
            }
            "<<" => {
                let _ = writeln!(out, "    sll a0, a0, a1");
            }
            ">>" => {
                let _ = writeln!(out, "    sra a0, a0, a1");
            }
            "&&" => {
                let _ = writeln!(out, "    snez a0, a0");
                let _ = writeln!(out, "    snez a1, a1");
                let _ = writeln!(out, "    and a0, a0, a1");
            }
            "||" => {
                let _ = writeln!(out, "    or a0, a0, a1");
                let _ = writeln!(out, "    snez a0, a0");
            }
            _ => {}
        }
    }

    fn negate(&self, out: &mut String) {
        let _ = writeln!(out, "    neg a0, a0");
    }

    fn bitwise_not(&self, out: &mut String) {
        let _ = writeln!(out, "    not a0, a0");
    }

    fn logical_not(&self, out: &mut String) {
        let _ = writeln!(out, "    seqz a0, a0");
    }

    fn jump(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    j {label}");
    }

    fn label(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "{label}:");
    }

    fn branch_if_zero(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    beqz a0, {label}");
    }

    fn branch_if_nonzero(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    bnez a0, {label}");
    }

    fn branch_if_equal_scratch(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    beq a0, a1, {label}");
    }

    fn load_local(&self, out: &mut String, offset: i32) {
        let _ = writeln!(out, "    ld a0, {offset}(s0)");
    }

    fn store_local(&self, out: &mut String, offset: i32) {
        let _ = writeln!(out, "    sd a0, {offset}(s0)");
    }

    fn load_local_address(&self, out: &mut String, offset: i32) {
        let _ = writeln!(out, "    addi a0, s0, {offset}");
    }

    fn load_indirect(&self, out: &mut String) {
        let _ = writeln!(out, "    ld a0, 0(a0)");
    }

    fn store_indirect(&self, out: &mut String) {
        let _ = writeln!(out, "    sd a0, 0(a1)");
    }

    fn add_imm(&self, out: &mut String, value: i64) {
        let _ = writeln!(out, "    addi a0, a0, {value}");
    }

    fn mul_imm(&self, out: &mut String, value: i64) {
        let _ = writeln!(out, "    li a2, {value}");
        let _ = writeln!(out, "    mul a0, a0, a2");
    }

    fn call(&self, out: &mut String, name: &str) {
        let _ = writeln!(out, "    call {name}");
    }

    fn load_data_address(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    la a0, {label}");
    }

    fn stage_write_buffer_from_acc(&self, out: &mut String) {
        let _ = writeln!(out, "    mv a1, a0");
    }

    fn stage_write_buffer_label(&self, out: &mut String, label: &str) {
        let _ = writeln!(out, "    la a1, {label}");
    }

    fn stage_write_length(&self, out: &mut String, len: i64) {
        let _ = writeln!(out, "    li a2, {len}");
    }

    fn syscall_write(&self, out: &mut String) {
        let _ = writeln!(out, "    li a0, 1");
        let _ = writeln!(out, "    li a7, 64");
        let _ = writeln!(out, "    ecall");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_stub_exits_via_syscall_93() {
        let mut out = String::new();
        RiscV64.entry_stub(&mut out);
        assert!(out.contains("call main"));
        assert!(out.contains("li a7, 93"));
        assert!(out.contains("ecall"));
    }

    #[test]
    fn equality_lowers_to_xor_seqz() {
        let mut out = String::new();
        RiscV64.binary_op(&mut out, "==");
        assert_eq!(out, "    xor a0, a0, a1\n    seqz a0, a0\n");
    }

    #[test]
    fn greater_swaps_slt_operands() {
        let mut out = String::new();
        RiscV64.binary_op(&mut out, ">");
        assert_eq!(out, "    slt a0, a1, a0\n");
    }

    #[test]
    fn frame_accesses_go_through_s0() {
        let mut out = String::new();
        RiscV64.load_local(&mut out, -8);
        RiscV64.store_local(&mut out, 16);
        assert!(out.contains("ld a0, -8(s0)"));
        assert!(out.contains("sd a0, 16(s0)"));
    }
}
