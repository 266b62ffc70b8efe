//! Secure file writing for bundle output.
//!
//! All chunk file names are validated against the output directory before
//! anything touches disk, and a bundle is written as a unit: content goes
//! to `.tmp` files first, which are renamed into place only after every
//! write succeeded. A failure rolls the temp files back, so readers never
//! observe a partially written bundle.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::compiler::BundleOutput;
use crate::{Error, Result};

/// Write every chunk of a bundle (plus source maps) under `dir`.
pub fn write_bundle_to(output: &BundleOutput, dir: &Path) -> Result<()> {
    let dir = normalize_dir(dir)?;
    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "failed to create output directory '{}': {e}",
            dir.display()
        ))
    })?;

    let mut operations: Vec<(PathBuf, &[u8])> = Vec::new();
    for chunk in &output.chunks {
        let target = validate_output_path(&dir, &chunk.file_name)?;
        operations.push((target, chunk.code.as_bytes()));

        if let Some(map) = &chunk.map {
            let map_name = format!("{}.map", chunk.file_name);
            let target = validate_output_path(&dir, &map_name)?;
            operations.push((target, map.as_bytes()));
        }
    }

    write_files_atomic(&operations)
}

/// Write the merged vendor artifact to `path` with the same temp-and-rename
/// discipline.
pub fn write_vendor_artifact(code: &str, path: &Path) -> Result<()> {
    let dir = normalize_dir(path.parent().unwrap_or(Path::new(".")))?;
    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "failed to create output directory '{}': {e}",
            dir.display()
        ))
    })?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidOutputPath(path.display().to_string()))?;
    let target = validate_output_path(&dir, file_name)?;

    write_files_atomic(&[(target, code.as_bytes())])
}

/// Resolve `dir` to a clean absolute path.
fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::InvalidOutputPath(format!("failed to get current directory: {e}")))?;
    Ok(cwd.join(cleaned).clean())
}

/// Reject file names that would escape the output directory.
fn validate_output_path(base_dir: &Path, file_name: &str) -> Result<PathBuf> {
    if file_name.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "file name contains null byte".to_string(),
        ));
    }

    let full = base_dir.join(Path::new(file_name).clean()).clean();
    if !full.starts_with(base_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "'{file_name}' escapes output directory '{}'",
            base_dir.display()
        )));
    }

    Ok(full)
}

/// Two-phase write: temp files first, then atomic renames, rollback on any
/// failure.
fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files = Vec::new();

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                cleanup_temp_files(&temp_files);
                return Err(Error::WriteFailure(format!(
                    "failed to create directory '{}': {e}",
                    parent.display()
                )));
            }
        }

        let temp = target.with_extension("tmp");
        if let Err(e) = fs::write(&temp, content) {
            cleanup_temp_files(&temp_files);
            return Err(Error::WriteFailure(format!(
                "failed to write '{}': {e}",
                temp.display()
            )));
        }
        temp_files.push((temp, target.clone()));
    }

    for (temp, target) in &temp_files {
        if let Err(e) = fs::rename(temp, target) {
            cleanup_temp_files(&temp_files);
            return Err(Error::WriteFailure(format!(
                "failed to rename '{}' to '{}': {e}",
                temp.display(),
                target.display()
            )));
        }
    }

    Ok(())
}

/// Best-effort removal; we are already unwinding an error.
fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp, _) in temp_files {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                tracing::warn!(path = %temp.display(), error = %e, "failed to clean up temp file");
            }
        }
    }
}
