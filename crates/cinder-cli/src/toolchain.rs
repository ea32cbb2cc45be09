// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! External toolchain integration.
//!
//! The compiler stops at textual assembly; this module hands the rest to
//! the system binutils: `as` to assemble, `ld` to link, `ar` to archive.
//! Tool stderr is suppressed in the default configuration, so the only
//! diagnostics the user sees come from the compiler itself.

use camino::{Utf8Path, Utf8PathBuf};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::process::{Command, Stdio};
use tracing::debug;

/// Assembles one `.s` file into an object file with `as -64`.
pub fn assemble(asm_file: &Utf8Path, obj_file: &Utf8Path) -> Result<()> {
    debug!(%asm_file, %obj_file, "invoking assembler");
    let status = Command::new("as")
        .arg("-64")
        .arg(asm_file)
        .arg("-o")
        .arg(obj_file)
        .stderr(Stdio::null())
        .status()
        .into_diagnostic()
        .wrap_err("Failed to run assembler 'as'")?;

    if !status.success() {
        miette::bail!("Assembly failed for {asm_file}");
    }
    Ok(())
}

/// Links object files into an executable with `ld`.
pub fn link(
    obj_files: &[Utf8PathBuf],
    output: &Utf8Path,
    lib_paths: &[Utf8PathBuf],
    libraries: &[String],
    verbose: bool,
) -> Result<()> {
    if obj_files.is_empty() {
        miette::bail!("No object files to link");
    }

    let mut command = Command::new("ld");
    for obj in obj_files {
        command.arg(obj);
    }
    for path in lib_paths {
        command.arg(format!("-L{path}"));
    }
    for library in libraries {
        command.arg(format!("-l{library}"));
    }
    command.arg("-o").arg(output);

    if verbose {
        println!("Link command: {command:?}");
    }
    debug!(?command, "invoking linker");

    let status = command
        .stderr(Stdio::null())
        .status()
        .into_diagnostic()
        .wrap_err("Failed to run linker 'ld'")?;

    if !status.success() {
        miette::bail!("Linking failed");
    }
    Ok(())
}

/// Bundles object files into a static archive with `ar rcs`.
pub fn archive(obj_files: &[Utf8PathBuf], output: &Utf8Path) -> Result<()> {
    if obj_files.is_empty() {
        miette::bail!("No object files for library");
    }

    debug!(%output, count = obj_files.len(), "invoking archiver");
    let mut command = Command::new("ar");
    command.arg("rcs").arg(output);
    for obj in obj_files {
        command.arg(obj);
    }

    let status = command
        .stderr(Stdio::null())
        .status()
        .into_diagnostic()
        .wrap_err("Failed to run archiver 'ar'")?;

    if !status.success() {
        miette::bail!("Library creation failed");
    }
    Ok(())
}

/// Deletes intermediate files, ignoring failures.
pub fn cleanup_temp_files(files: &[Utf8PathBuf]) {
    for file in files {
        if file.exists() {
            let _ = std::fs::remove_file(file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_rejects_empty_object_list() {
        let err = link(&[], Utf8Path::new("a.out"), &[], &[], false).unwrap_err();
        assert!(err.to_string().contains("No object files"));
    }

    #[test]
    fn archive_rejects_empty_object_list() {
        let err = archive(&[], Utf8Path::new("liboutput.a")).unwrap_err();
        assert!(err.to_string().contains("No object files"));
    }

    #[test]
    fn cleanup_ignores_missing_files() {
        cleanup_temp_files(&[Utf8PathBuf::from("/nonexistent/never-there.s")]);
    }
}
