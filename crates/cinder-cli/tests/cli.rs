// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests for the `cinderc` binary.
//!
//! These drive the real executable via `CARGO_BIN_EXE_cinderc`. Tests
//! that need the external binutils toolchain (`as`, `ld`) are `#[ignore]`
//! by default; everything else stops before the assembler runs.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn cinderc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cinderc"))
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    cinderc()
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn cinderc")
}

fn write_source(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn version_exits_zero() {
    let output = cinderc().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("cinderc"));
}

#[test]
fn help_exits_zero_and_shows_usage() {
    let output = cinderc().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Usage"));
    assert!(text.contains("--target"));
    assert!(text.contains("--print-ast"));
}

#[test]
fn unknown_option_exits_one() {
    let output = cinderc().arg("--frobnicate").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn no_input_files_exits_one() {
    let output = cinderc().output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No input files"));
}

#[test]
fn missing_input_file_exits_one() {
    let output = cinderc().arg("definitely-not-there.cin").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unknown_target_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "main.cin", "i32 main() { return 0; }");
    let output = run_in(dir.path(), &["--target", "mips", "main.cin"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unknown target architecture"));
}

#[test]
fn unknown_optimization_level_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "main.cin", "i32 main() { return 0; }");
    let output = run_in(dir.path(), &["-O3", "main.cin"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("optimization level"));
}

#[test]
fn parse_error_reports_line_and_column() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "bad.cin", "i32 f() { return 1 +; }");
    let output = run_in(dir.path(), &["bad.cin"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("[Line 1, Column 21] Error at ';'"), "stderr: {err}");
}

#[test]
fn recovery_reports_error_but_keeps_parsing() {
    let dir = tempfile::tempdir().unwrap();
    write_source(
        dir.path(),
        "broken.cin",
        "i32 f() { return ; i32 g() { return 0; }",
    );
    let output = run_in(dir.path(), &["broken.cin"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error"));
}

#[test]
fn print_tokens_dumps_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    // Parse fails afterwards, but the dump comes first.
    write_source(dir.path(), "toks.cin", "i32 main( { return 4 2; }");
    let output = run_in(dir.path(), &["--print-tokens", "toks.cin"]);
    let out = stdout(&output);
    assert!(out.contains("I32: 'i32'"), "stdout: {out}");
    assert!(out.contains("IDENTIFIER: 'main'"));
    assert!(out.contains("LEFT_PAREN: '('"));
}

#[test]
fn print_ast_dumps_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "tree.cin", "i32 main() { return 42; }");
    let output = run_in(dir.path(), &["--print-ast", "-c", "tree.cin"]);
    let out = stdout(&output);
    assert!(out.contains("program"), "stdout: {out}");
    assert!(out.contains("function \"main\""));
    assert!(out.contains("number \"42\""));
}

#[test]
fn codegen_error_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "ghost.cin", "i32 main() { return ghost; }");
    let output = run_in(dir.path(), &["ghost.cin"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Code generation error"));
}

/// Full pipeline through `as` and `ld`; needs binutils on PATH.
///
/// ```bash
/// cargo test --test cli -- --ignored
/// ```
#[test]
#[ignore = "requires the system binutils toolchain"]
fn compiles_links_and_returns_forty_two() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "main.cin", "i32 main() { return 42; }");
    let output = run_in(dir.path(), &["-o", "hello", "main.cin"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let status = Command::new(dir.path().join("hello")).status().unwrap();
    assert_eq!(status.code(), Some(42));

    // Intermediates are cleaned up without -S.
    assert!(!dir.path().join("main.s").exists());
    assert!(!dir.path().join("main.o").exists());
}

/// `-c -S` keeps both the object and the assembly; needs `as` on PATH.
#[test]
#[ignore = "requires the system binutils toolchain"]
fn compile_only_keeps_objects_and_asm() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "unit.cin", "i32 main() { return 7; }");
    let output = run_in(dir.path(), &["-c", "-S", "unit.cin"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("unit.o").exists());

    let asm = std::fs::read_to_string(dir.path().join("unit.s")).unwrap();
    assert!(asm.contains("_start:"));
    assert!(asm.contains("mov $7, %rax"));
}
