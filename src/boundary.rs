//! Control file (`parame.in`) for the boundary-condition updater.
//!
//! `da_update_bc.exe` runs twice per cycle: once before the analysis to
//! refresh the lower boundary of every domain, and once after it to refresh
//! the lateral boundary of the outer domain from the analysis output. The
//! control file is written in two passes: a template with placeholder paths,
//! then a rewrite that injects the resolved domain and file paths.
use crate::cycle::{AnalysisCycle, Domain};
use crate::error::CycleError;
use crate::namelist::{self, KeySchema, Namelist, Overrides, Value};
use crate::paths::{CyclePaths, ANALYSIS_OUTPUT, FIRST_GUESS, LATERAL_BOUNDARY, PARAME_FILE};
use crate::workspace::{Workspace, WorkspaceManager};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const CONTROL_GROUP: &str = "control_param";

static PARAME_SCHEMA: KeySchema = KeySchema {
    name: "parame.in",
    groups: &[(
        CONTROL_GROUP,
        &[
            "da_file",
            "wrf_input",
            "wrf_bdy_file",
            "domain_id",
            "cycling",
            "debug",
            "low_bdy_only",
            "update_low_bdy",
            "update_lateral_bdy",
            "update_lsm",
            "var4d_lbc",
            "iswater",
        ],
    )],
};

/// Which boundary the updater refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Lower,
    Lateral,
}

impl FromStr for BoundaryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lower" => Ok(BoundaryKind::Lower),
            "lateral" => Ok(BoundaryKind::Lateral),
            other => Err(anyhow!(CycleError::Configuration(format!(
                "unknown boundary type {other:?} (expected \"lower\" or \"lateral\")"
            )))),
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryKind::Lower => f.write_str("lower"),
            BoundaryKind::Lateral => f.write_str("lateral"),
        }
    }
}

/// Resolved inputs for one updater run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundarySpec {
    pub kind: BoundaryKind,
    pub domain: Domain,
    /// File the updater modifies in place.
    pub da_file: PathBuf,
    /// Model input (`lower`) or lateral boundary file (`lateral`).
    pub companion_file: PathBuf,
}

impl BoundarySpec {
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides::new(&PARAME_SCHEMA);
        overrides.set(CONTROL_GROUP, "domain_id", i64::from(self.domain.id()));
        match self.kind {
            BoundaryKind::Lower => {
                overrides.set(
                    CONTROL_GROUP,
                    "wrf_input",
                    self.companion_file.display().to_string(),
                );
            }
            BoundaryKind::Lateral => {
                overrides.set(CONTROL_GROUP, "da_file", self.da_file.display().to_string());
            }
        }
        overrides
    }
}

/// Template bindings written before paths are resolved.
pub fn template(kind: BoundaryKind) -> Namelist {
    let bindings: Vec<(&str, Value)> = match kind {
        BoundaryKind::Lower => vec![
            ("da_file", "./fg".into()),
            ("wrf_input", "./wrfinput_d01".into()),
            ("domain_id", 1_i64.into()),
            ("cycling", true.into()),
            ("debug", true.into()),
            ("low_bdy_only", true.into()),
            ("update_lsm", false.into()),
            ("var4d_lbc", false.into()),
            ("iswater", 16_i64.into()),
        ],
        BoundaryKind::Lateral => vec![
            ("da_file", "./wrfvar_output".into()),
            ("wrf_bdy_file", "./wrfbdy_d01".into()),
            ("domain_id", 1_i64.into()),
            ("cycling", true.into()),
            ("debug", true.into()),
            ("update_low_bdy", false.into()),
            ("update_lateral_bdy", true.into()),
            ("update_lsm", false.into()),
            ("var4d_lbc", false.into()),
        ],
    };
    let mut nml = Namelist::default();
    for (key, value) in bindings {
        nml.set(CONTROL_GROUP, key, value);
    }
    nml
}

pub struct BoundaryUpdateStep<'a> {
    paths: &'a CyclePaths,
}

impl<'a> BoundaryUpdateStep<'a> {
    pub fn new(paths: &'a CyclePaths) -> Self {
        Self { paths }
    }

    /// The paths wired into `parame.in` for `kind` in this workspace.
    pub fn spec(&self, kind: BoundaryKind, workspace: &Workspace) -> BoundarySpec {
        let domain = workspace.domain();
        match kind {
            BoundaryKind::Lower => BoundarySpec {
                kind,
                domain,
                da_file: workspace.path(FIRST_GUESS),
                companion_file: self.paths.wrfinput(domain),
            },
            BoundaryKind::Lateral => BoundarySpec {
                kind,
                domain,
                da_file: workspace.path(ANALYSIS_OUTPUT),
                companion_file: workspace.path(LATERAL_BOUNDARY),
            },
        }
    }

    /// First pass: replace `parame.in` with the template for `kind`.
    pub fn write_template(&self, kind: BoundaryKind, workspace: &Workspace) -> Result<()> {
        namelist::write(&workspace.path(PARAME_FILE), &template(kind))
            .with_context(|| format!("write {kind} boundary template for {}", workspace.domain()))
    }

    /// Second pass: stage inputs and inject the resolved domain and paths.
    ///
    /// For the lower boundary the first guess is copied in first, preferring
    /// the previous forecast and falling back to the `real.exe` initial
    /// conditions on the first cycle of a run.
    pub fn resolve(
        &self,
        kind: BoundaryKind,
        workspace: &Workspace,
        cycle: &AnalysisCycle,
    ) -> Result<BoundarySpec> {
        let spec = self.spec(kind, workspace);
        if kind == BoundaryKind::Lower {
            let manager = WorkspaceManager::new(self.paths);
            let preferred = self.paths.forecast_first_guess(spec.domain, cycle);
            let fallback = self.paths.wrfinput(spec.domain);
            manager
                .stage_input(workspace, &preferred, Some(&fallback), FIRST_GUESS)
                .with_context(|| format!("stage first guess for {}", spec.domain))?;
        }
        let parame_path = workspace.path(PARAME_FILE);
        let current = namelist::read(&parame_path)?;
        let merged = namelist::merge(&current, &spec.overrides())?;
        namelist::write(&parame_path, &merged)?;
        tracing::debug!(domain = %spec.domain, %kind, "parame.in resolved");
        Ok(spec)
    }

    /// Both passes for a boundary type given by name.
    ///
    /// The name is checked before any file is touched.
    pub fn prepare_named(
        &self,
        kind: &str,
        workspace: &Workspace,
        cycle: &AnalysisCycle,
    ) -> Result<BoundarySpec> {
        let kind: BoundaryKind = kind.parse()?;
        self.write_template(kind, workspace)?;
        self.resolve(kind, workspace, cycle)
    }
}

#[cfg(test)]
#[path = "boundary_tests.rs"]
mod tests;
