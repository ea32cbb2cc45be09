// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Peephole pass over emitted assembly text.
//!
//! The only optimization in the compiler: adjacent push/pop pairs left
//! behind by the stack-machine discipline are collapsed. Everything else is emitted as-is. The pass is purely
//! line-local, so labels and control flow are never disturbed: a label
//! line between a push and a pop breaks adjacency and the pair survives.

/// Collapses adjacent x86_64 `push`/`pop` pairs.
///
/// - `push R` directly followed by `pop R` cancels out.
/// - `push %rax` directly followed by `pop %rbx` becomes a register move.
#[must_use]
pub fn collapse_push_pop(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if let (Some(pushed), Some(next)) = (push_operand(line), lines.get(i + 1)) {
            if let Some(popped) = pop_operand(next) {
                if pushed == popped {
                    i += 2;
                    continue;
                }
                if pushed == "%rax" && popped == "%rbx" {
                    out.push_str("    mov %rax, %rbx\n");
                    i += 2;
                    continue;
                }
            }
        }
        out.push_str(line);
        out.push('\n');
        i += 1;
    }

    out
}

fn push_operand(line: &str) -> Option<&str> {
    line.trim().strip_prefix("push ")
}

fn pop_operand(line: &str) -> Option<&str> {
    line.trim().strip_prefix("pop ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_register_pair_cancels() {
        let text = "    push %rax\n    pop %rax\n    ret\n";
        assert_eq!(collapse_push_pop(text), "    ret\n");
    }

    #[test]
    fn cross_register_pair_becomes_move() {
        let text = "    push %rax\n    pop %rbx\n";
        assert_eq!(collapse_push_pop(text), "    mov %rax, %rbx\n");
    }

    #[test]
    fn label_between_pair_blocks_the_rewrite() {
        let text = "    push %rax\nloop_0:\n    pop %rax\n";
        assert_eq!(collapse_push_pop(text), text);
    }

    #[test]
    fn unrelated_lines_pass_through() {
        let text = "main:\n    mov $1, %rax\n    push %rbp\n";
        assert_eq!(collapse_push_pop(text), text);
    }
}
