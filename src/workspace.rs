//! Per-domain WRFDA working directories.
//!
//! A workspace is rebuilt from scratch once per cycle, at the start of the
//! lower-boundary preparation. Large read-only model resources are symlinked;
//! per-cycle inputs that the executables modify in place are copied.
use crate::cycle::{AnalysisCycle, Domain};
use crate::error::CycleError;
use crate::fsutil::{create_dir_all, remove_tree, replace_symlink, silent_remove};
use crate::paths::CyclePaths;
use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Symlink names created by [`WorkspaceManager::link_static_assets`].
pub const STATIC_ASSET_LINKS: [&str; 4] = ["da_wrfvar.exe", "be.dat", "LANDUSE.TBL", "ob.ascii"];
/// Symlink name of the boundary updater inside a workspace.
pub const UPDATER_LINK: &str = "da_update_bc.exe";

/// A domain's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    domain: Domain,
    root: PathBuf,
}

impl Workspace {
    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

pub struct WorkspaceManager<'a> {
    paths: &'a CyclePaths,
}

impl<'a> WorkspaceManager<'a> {
    pub fn new(paths: &'a CyclePaths) -> Self {
        Self { paths }
    }

    /// Handle to an existing workspace without touching the filesystem.
    pub fn open(&self, domain: Domain) -> Workspace {
        Workspace {
            domain,
            root: self.paths.workspace_dir(domain),
        }
    }

    /// Delete and recreate the domain's workspace, including `var/da`.
    ///
    /// Destroys everything earlier stages of this cycle produced for the
    /// domain.
    pub fn reset(&self, domain: Domain) -> Result<Workspace> {
        let workspace = self.open(domain);
        remove_tree(workspace.root())?;
        create_dir_all(&workspace.root().join("var").join("da"))?;
        tracing::debug!(%domain, root = %workspace.root().display(), "workspace reset");
        Ok(workspace)
    }

    /// Link the analysis executable and its static inputs into the workspace.
    pub fn link_static_assets(&self, workspace: &Workspace, cycle: &AnalysisCycle) -> Result<()> {
        let sources = [
            self.paths.wrfvar_exe(),
            self.paths.background_error(),
            self.paths.landuse_table(),
            self.paths.obsproc_output(cycle),
        ];
        for source in &sources {
            if !source.exists() {
                return Err(anyhow!(CycleError::MissingAsset(source.clone())));
            }
        }
        for (name, source) in STATIC_ASSET_LINKS.iter().zip(sources.iter()) {
            replace_symlink(source, &workspace.path(name))?;
        }
        Ok(())
    }

    /// Link `da_update_bc.exe` into the workspace.
    pub fn link_updater(&self, workspace: &Workspace) -> Result<()> {
        replace_symlink(&self.paths.updatebc_exe(), &workspace.path(UPDATER_LINK))
    }

    /// Copy a per-cycle input into the workspace as `dest_name`.
    ///
    /// `preferred` is tried first; `fallback` only when copying `preferred`
    /// fails. Returns the source actually used.
    pub fn stage_input(
        &self,
        workspace: &Workspace,
        preferred: &Path,
        fallback: Option<&Path>,
        dest_name: &str,
    ) -> Result<PathBuf> {
        let dest = workspace.path(dest_name);
        silent_remove(&dest)?;
        let preferred_err = match fs::copy(preferred, &dest) {
            Ok(_) => return Ok(preferred.to_path_buf()),
            Err(err) => err,
        };
        let Some(fallback) = fallback else {
            return Err(anyhow!(CycleError::Configuration(format!(
                "cannot stage {dest_name} from {}: {preferred_err}",
                preferred.display()
            ))));
        };
        tracing::info!(
            domain = %workspace.domain(),
            preferred = %preferred.display(),
            fallback = %fallback.display(),
            "preferred input unavailable, using fallback"
        );
        match fs::copy(fallback, &dest) {
            Ok(_) => Ok(fallback.to_path_buf()),
            Err(fallback_err) => Err(anyhow!(CycleError::Configuration(format!(
                "cannot stage {dest_name}: {} ({preferred_err}); {} ({fallback_err})",
                preferred.display(),
                fallback.display()
            )))),
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
