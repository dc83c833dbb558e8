use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::CycleError;

/// Remove a file or symlink, ignoring "not found".
pub fn silent_remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

/// Remove a directory tree if it exists.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))
}

/// Fail with a configuration error when a required file is absent.
pub fn require_file(path: &Path, label: &str) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(anyhow!(CycleError::Configuration(format!(
        "{label} not found at {}",
        path.display()
    ))))
}

/// Replace `dest` with a copy of `source`.
pub fn replace_with_copy(source: &Path, dest: &Path) -> Result<()> {
    silent_remove(dest)?;
    fs::copy(source, dest)
        .with_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
    Ok(())
}

/// Point `link` at `target`, replacing whatever was there.
///
/// The target must exist; a dangling link would only fail later inside an
/// external executable with a far less useful message.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if !target.exists() {
        return Err(anyhow!(CycleError::MissingAsset(target.to_path_buf())));
    }
    silent_remove(link)?;
    symlink(target, link)
        .with_context(|| format!("link {} -> {}", link.display(), target.display()))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
