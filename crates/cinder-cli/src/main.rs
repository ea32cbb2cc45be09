// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Cinder compiler command-line interface.
//!
//! This is the main entry point for the `cinderc` command. The surface is
//! gcc-style: options plus input files, no subcommands. `-lib` (the
//! historical single-dash spelling) is normalized to `--lib` before
//! parsing.

use camino::Utf8PathBuf;
use cinder_core::codegen::{OptLevel, TargetArch};
use clap::Parser;
use clap::error::ErrorKind;

use cinder_cli::driver::{self, CompileOptions};

/// Maximum number of `-L` paths and `-l` libraries.
const MAX_LIBRARY_ARGS: usize = 16;

/// Cinder: a compiler for a small C-like language
#[derive(Debug, Parser)]
#[command(name = "cinderc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Output path (default: a.out, or liboutput.a with --lib)
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<Utf8PathBuf>,

    /// Compile only; do not link
    #[arg(short = 'c')]
    compile_only: bool,

    /// Emit a static archive instead of linking an executable
    #[arg(long = "lib")]
    lib: bool,

    /// Optimization level (0 = none, 1/2 = speed, s = size)
    #[arg(short = 'O', value_name = "LEVEL", default_value = "0")]
    opt: String,

    /// Enable debug info (implies the debug optimization level)
    #[arg(short = 'g')]
    debug: bool,

    /// Extra progress output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Keep intermediate assembly files
    #[arg(short = 'S')]
    keep_asm: bool,

    /// Print the abstract syntax tree
    #[arg(long)]
    print_ast: bool,

    /// Print the token stream
    #[arg(long)]
    print_tokens: bool,

    /// Target architecture (x86_64, arm64, riscv64)
    #[arg(long, value_name = "ARCH", default_value = "x86_64")]
    target: String,

    /// Library search path (up to 16)
    #[arg(short = 'L', value_name = "PATH")]
    lib_paths: Vec<Utf8PathBuf>,

    /// Link library (up to 16)
    #[arg(short = 'l', value_name = "NAME")]
    libraries: Vec<String>,

    /// Input source files
    #[arg(value_name = "FILES")]
    inputs: Vec<Utf8PathBuf>,
}

fn main() {
    // Initialize tracing only when RUST_LOG is explicitly set, to keep
    // stdout/stderr clean for scripted use.
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    }

    let _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(false)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }));

    let args = normalize_args(std::env::args().collect());
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            std::process::exit(0);
        }
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    let options = match resolve_options(cli) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };

    match driver::run(&options) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::exit(1);
        }
    }
}

/// Rewrites the historical `-lib` spelling to `--lib` so clap does not
/// read it as `-l ib`.
fn normalize_args(args: Vec<String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| if arg == "-lib" { "--lib".to_owned() } else { arg })
        .collect()
}

/// Validates and converts parsed flags into driver options.
fn resolve_options(cli: Cli) -> Result<CompileOptions, String> {
    let Some(arch) = TargetArch::parse(&cli.target) else {
        return Err(format!("Unknown target architecture: {}", cli.target));
    };

    let opt_level = if cli.debug {
        OptLevel::Debug
    } else {
        match cli.opt.as_str() {
            "0" => OptLevel::None,
            "1" | "2" => OptLevel::Speed,
            "s" => OptLevel::Size,
            other => return Err(format!("Unknown optimization level: -O{other}")),
        }
    };

    if cli.lib_paths.len() > MAX_LIBRARY_ARGS {
        return Err(format!("Too many -L paths (maximum {MAX_LIBRARY_ARGS})"));
    }
    if cli.libraries.len() > MAX_LIBRARY_ARGS {
        return Err(format!("Too many -l libraries (maximum {MAX_LIBRARY_ARGS})"));
    }

    Ok(CompileOptions {
        arch,
        opt_level,
        verbose: cli.verbose,
        compile_only: cli.compile_only,
        create_library: cli.lib,
        print_ast: cli.print_ast,
        print_tokens: cli.print_tokens,
        keep_asm: cli.keep_asm,
        output: cli.output,
        lib_paths: cli.lib_paths,
        libraries: cli.libraries,
        inputs: cli.inputs,
    })
}
