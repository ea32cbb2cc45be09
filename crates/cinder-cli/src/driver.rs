// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Compilation driver: source files in, executable/archive/objects out.
//!
//! Per input file the pipeline is read → lex → parse → generate →
//! write `.s` → assemble to `.o`. The final step links with `ld`,
//! archives with `ar`, or stops after objects under `-c`. Intermediate
//! `.s` files are removed after success unless `-S`; `.o` files are
//! removed after a successful link or archive.

use camino::{Utf8Path, Utf8PathBuf};
use cinder_core::codegen::{CodeGenerator, OptLevel, TargetArch};
use cinder_core::parse::{lex, parse};
use cinder_core::unparse;
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::{debug, info};

use crate::diagnostic;
use crate::toolchain;

/// Resolved command-line options.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Target architecture.
    pub arch: TargetArch,
    /// Optimization level (`Debug` when `-g`).
    pub opt_level: OptLevel,
    /// Extra progress output.
    pub verbose: bool,
    /// `-c`: stop after objects.
    pub compile_only: bool,
    /// `--lib`: emit a static archive.
    pub create_library: bool,
    /// `--print-ast`.
    pub print_ast: bool,
    /// `--print-tokens`.
    pub print_tokens: bool,
    /// `-S`: keep intermediate assembly files.
    pub keep_asm: bool,
    /// `-o`: output path.
    pub output: Option<Utf8PathBuf>,
    /// `-L` search paths.
    pub lib_paths: Vec<Utf8PathBuf>,
    /// `-l` libraries.
    pub libraries: Vec<String>,
    /// Input files.
    pub inputs: Vec<Utf8PathBuf>,
}

/// Runs the whole build. Any error fails the invocation.
pub fn run(options: &CompileOptions) -> Result<()> {
    if options.inputs.is_empty() {
        miette::bail!("No input files specified");
    }

    info!(
        target = options.arch.name(),
        opt = options.opt_level.name(),
        files = options.inputs.len(),
        "starting build"
    );
    if options.verbose {
        println!(
            "Target: {}, optimization: {}",
            options.arch.name(),
            options.opt_level.name()
        );
    }

    let mut obj_files = Vec::new();
    let mut asm_files = Vec::new();

    for input in &options.inputs {
        println!("Compiling {input}...");
        let (obj_file, asm_file) = compile_file(input, options)?;
        obj_files.push(obj_file);
        asm_files.push(asm_file);
    }

    if !options.compile_only {
        if options.create_library {
            let output = options
                .output
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from("liboutput.a"));
            println!("Creating library {output}...");
            toolchain::archive(&obj_files, &output)?;
        } else {
            let output = options
                .output
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from("a.out"));
            println!("Linking {output}...");
            toolchain::link(
                &obj_files,
                &output,
                &options.lib_paths,
                &options.libraries,
                options.verbose,
            )?;
        }
        toolchain::cleanup_temp_files(&obj_files);
    }

    if !options.keep_asm {
        toolchain::cleanup_temp_files(&asm_files);
    }

    info!("build completed");
    Ok(())
}

/// Compiles one source file to an object file.
///
/// Returns the object and assembly paths so the caller can manage
/// cleanup.
pub fn compile_file(
    input: &Utf8Path,
    options: &CompileOptions,
) -> Result<(Utf8PathBuf, Utf8PathBuf)> {
    let source = std::fs::read_to_string(input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot read file {input}"))?;

    if options.verbose {
        println!("Read {} bytes from {input}", source.len());
    }

    let tokens = lex(&source);
    if options.print_tokens {
        println!("Tokens for {input}:");
        for token in &tokens {
            if token.kind().is_eof() {
                break;
            }
            println!("  {}: '{}'", token.kind().name(), token.lexeme());
        }
        println!();
    }

    let parsed = parse(tokens);
    if parsed.error_count() > 0 {
        diagnostic::report_parse_diagnostics(
            &parsed.diagnostics,
            input.as_str(),
            &source,
            options.verbose,
        );
        miette::bail!("Parse error in {input} ({} errors)", parsed.error_count());
    }

    if options.print_ast {
        println!("AST for {input}:");
        print!("{}", parsed.ast.dump(parsed.root));
        println!();
        debug!(unparsed = %unparse::unparse(&parsed.ast, parsed.root), "round-trip form");
    }

    let mut generator = CodeGenerator::new(options.arch, options.opt_level);
    let assembly = generator.generate(&parsed.ast, parsed.root);

    if generator.error_count() > 0 {
        diagnostic::report_codegen_errors(generator.errors());
        miette::bail!(
            "Code generation error in {input} ({} errors)",
            generator.error_count()
        );
    }

    let asm_file = input.with_extension("s");
    std::fs::write(&asm_file, &assembly)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot write to {asm_file}"))?;
    if options.verbose {
        println!("Generated assembly: {asm_file}");
    }

    let obj_file = input.with_extension("o");
    toolchain::assemble(&asm_file, &obj_file)?;
    if options.verbose {
        println!("Generated object file: {obj_file}");
    }

    Ok((obj_file, asm_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CompileOptions {
        CompileOptions {
            arch: TargetArch::X86_64,
            opt_level: OptLevel::None,
            verbose: false,
            compile_only: true,
            create_library: false,
            print_ast: false,
            print_tokens: false,
            keep_asm: false,
            output: None,
            lib_paths: Vec::new(),
            libraries: Vec::new(),
            inputs: Vec::new(),
        }
    }

    #[test]
    fn run_requires_input_files() {
        let err = run(&options()).unwrap_err();
        assert!(err.to_string().contains("No input files"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = compile_file(Utf8Path::new("/nonexistent/missing.cin"), &options()).unwrap_err();
        assert!(err.to_string().contains("missing.cin"));
    }

    #[test]
    fn parse_errors_fail_the_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bad.cin")).unwrap();
        std::fs::write(&path, "i32 f() { return 1 +; }").unwrap();

        let err = compile_file(&path, &options()).unwrap_err();
        assert!(err.to_string().contains("Parse error"));
    }

    #[test]
    fn codegen_errors_fail_the_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("ghost.cin")).unwrap();
        std::fs::write(&path, "i32 f() { return ghost; }").unwrap();

        let err = compile_file(&path, &options()).unwrap_err();
        assert!(err.to_string().contains("Code generation error"));
    }
}
