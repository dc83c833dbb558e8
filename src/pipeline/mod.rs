//! The analysis cycle as a fixed sequence of states.
//!
//! Each state runs to completion, for every domain it covers, before the
//! next one starts. Any failure aborts the cycle; there is no retry and no
//! resumption from a partial run.
mod sync;

use crate::boundary::{BoundaryKind, BoundarySpec, BoundaryUpdateStep};
use crate::config::Config;
use crate::cycle::{AnalysisCycle, Domain};
use crate::error::CycleError;
use crate::fsutil::{create_dir_all, replace_with_copy, require_file};
use crate::job::{ExecBackend, JobHandle, JobId, JobLauncher, JobMonitor, Scheduler, TerminalStatus};
use crate::namelist::{self, Namelist};
use crate::paths::{ANALYSIS_OUTPUT, LATERAL_BOUNDARY, MODEL_NAMELIST};
use crate::workspace::{WorkspaceManager, UPDATER_LINK};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Instant;

pub use sync::{obsproc_overrides, wrfda_overrides};

/// Executable linked into each workspace by the analysis preparation.
const WRFVAR_LINK: &str = "da_wrfvar.exe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    ObsInit,
    BoundaryPrep(BoundaryKind),
    BoundaryUpdate(BoundaryKind),
    AnalysisPrep,
    AnalysisRun,
    Promote,
}

/// Which domains a state runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    Global,
    EveryDomain,
    OuterOnly,
}

impl CycleState {
    /// Execution order of one cycle.
    pub const SEQUENCE: [CycleState; 8] = [
        CycleState::ObsInit,
        CycleState::BoundaryPrep(BoundaryKind::Lower),
        CycleState::BoundaryUpdate(BoundaryKind::Lower),
        CycleState::AnalysisPrep,
        CycleState::AnalysisRun,
        CycleState::BoundaryPrep(BoundaryKind::Lateral),
        CycleState::BoundaryUpdate(BoundaryKind::Lateral),
        CycleState::Promote,
    ];

    fn coverage(self) -> Coverage {
        match self {
            CycleState::ObsInit => Coverage::Global,
            CycleState::BoundaryPrep(BoundaryKind::Lateral)
            | CycleState::BoundaryUpdate(BoundaryKind::Lateral) => Coverage::OuterOnly,
            _ => Coverage::EveryDomain,
        }
    }

    /// The domains this state visits, in order; `None` for the global state.
    fn targets(self, max_dom: u32) -> Vec<Option<Domain>> {
        match self.coverage() {
            Coverage::Global => vec![None],
            Coverage::EveryDomain => Domain::all(max_dom).map(Some).collect(),
            Coverage::OuterOnly => vec![Some(Domain::OUTER)],
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleState::ObsInit => f.write_str("obs_init"),
            CycleState::BoundaryPrep(kind) => write!(f, "boundary_prep_{kind}"),
            CycleState::BoundaryUpdate(kind) => write!(f, "boundary_update_{kind}"),
            CycleState::AnalysisPrep => f.write_str("analysis_prep"),
            CycleState::AnalysisRun => f.write_str("analysis_run"),
            CycleState::Promote => f.write_str("promote"),
        }
    }
}

/// One completed state for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<u32>,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

/// Progress of a finished cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub analysis_date: String,
    pub max_dom: u32,
    pub stages: Vec<StageRecord>,
    pub elapsed_ms: u128,
}

impl CycleReport {
    /// One line per completed state.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for record in &self.stages {
            let domain = record
                .domain
                .map(|id| format!("d{id:02}"))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "{:<26} {domain:<4} {:>8}ms",
                record.state, record.elapsed_ms
            ));
            if let Some(job_id) = record.job_id {
                out.push_str(&format!("  job {job_id}"));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "cycle {} complete ({} domain(s), {}ms)\n",
            self.analysis_date, self.max_dom, self.elapsed_ms
        ));
        out
    }
}

/// Drives one analysis cycle.
pub struct Pipeline<'a> {
    config: &'a Config,
    scheduler: &'a dyn Scheduler,
    cycle: AnalysisCycle,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, scheduler: &'a dyn Scheduler, cycle: AnalysisCycle) -> Self {
        Self {
            config,
            scheduler,
            cycle,
        }
    }

    /// Run every state in order for every configured domain.
    pub fn run(&self) -> Result<CycleReport> {
        let start = Instant::now();
        let model = self.model_namelist()?;
        let max_dom = max_dom(&model)?;
        tracing::info!(
            analysis_date = %self.cycle,
            max_dom,
            "cycle started"
        );

        let mut stages = Vec::new();
        for state in CycleState::SEQUENCE {
            for domain in state.targets(max_dom) {
                let state_start = Instant::now();
                let job_id = self
                    .run_state(state, domain, &model)
                    .with_context(|| match domain {
                        Some(domain) => format!("{state} for {domain}"),
                        None => state.to_string(),
                    })?;
                let elapsed_ms = state_start.elapsed().as_millis();
                tracing::info!(
                    stage = %state,
                    domain = domain.map(|domain| domain.id()),
                    job_id,
                    elapsed_ms,
                    "stage complete"
                );
                stages.push(StageRecord {
                    state: state.to_string(),
                    domain: domain.map(|domain| domain.id()),
                    elapsed_ms,
                    job_id,
                });
            }
        }

        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(elapsed_ms, "cycle complete");
        Ok(CycleReport {
            analysis_date: self.cycle.analysis_stamp(),
            max_dom,
            stages,
            elapsed_ms,
        })
    }

    /// Both passes of the boundary control file for a type given by name,
    /// outside a full cycle. The workspace must already exist.
    pub fn prepare_boundary(&self, kind: &str, domain: Domain) -> Result<BoundarySpec> {
        kind.parse::<BoundaryKind>()?;
        let workspace = self.workspaces().open(domain);
        if !workspace.root().is_dir() {
            return Err(anyhow!(CycleError::Configuration(format!(
                "workspace {} does not exist; run the cycle first",
                workspace.root().display()
            ))));
        }
        BoundaryUpdateStep::new(&self.config.paths).prepare_named(kind, &workspace, &self.cycle)
    }

    fn run_state(
        &self,
        state: CycleState,
        domain: Option<Domain>,
        model: &Namelist,
    ) -> Result<Option<JobId>> {
        let domain = domain.unwrap_or(Domain::OUTER);
        match state {
            CycleState::ObsInit => self.obs_init(model),
            CycleState::BoundaryPrep(kind) => self.boundary_prep(kind, domain).map(|_| None),
            CycleState::BoundaryUpdate(kind) => self.boundary_update(kind, domain),
            CycleState::AnalysisPrep => self.analysis_prep(model, domain).map(|_| None),
            CycleState::AnalysisRun => self.analysis_run(domain),
            CycleState::Promote => self.promote(domain).map(|_| None),
        }
    }

    fn obs_init(&self, model: &Namelist) -> Result<Option<JobId>> {
        let paths = &self.config.paths;
        let obsproc_dir = paths.obsproc_dir();
        let source = paths.obs_source(&self.config.obs_filename);
        require_file(&source, "observation file")?;
        replace_with_copy(&source, &obsproc_dir.join(&self.config.obs_filename))?;

        let template = namelist::read(&paths.obsproc_template())?;
        let overrides = obsproc_overrides(model, &self.cycle, &self.config.obs_filename)?;
        let synced = namelist::merge(&template, &overrides)?;
        namelist::write(&paths.obsproc_namelist(), &synced)?;

        if !self.config.stages.run_obsproc {
            tracing::info!("obsproc.exe disabled; expecting existing output");
            require_file(&paths.obsproc_output(&self.cycle), "obsproc output")?;
            return Ok(None);
        }
        create_dir_all(&paths.wrfda_work_root())?;
        let log = paths.wrfda_work_root().join("log.obsproc");
        self.run_job(
            &self.config.backends.obsproc,
            &paths.obsproc_exe(),
            &obsproc_dir,
            &log,
        )
    }

    fn boundary_prep(&self, kind: BoundaryKind, domain: Domain) -> Result<BoundarySpec> {
        let paths = &self.config.paths;
        let manager = self.workspaces();
        let step = BoundaryUpdateStep::new(paths);
        let workspace = match kind {
            BoundaryKind::Lower => {
                let workspace = manager.reset(domain)?;
                step.write_template(kind, &workspace)?;
                manager.link_updater(&workspace)?;
                if domain.is_outer() {
                    let boundary = paths.lateral_boundary();
                    require_file(&boundary, "lateral boundary file")?;
                    replace_with_copy(&boundary, &workspace.path(LATERAL_BOUNDARY))?;
                }
                workspace
            }
            BoundaryKind::Lateral => {
                let workspace = manager.open(domain);
                step.write_template(kind, &workspace)?;
                workspace
            }
        };
        step.resolve(kind, &workspace, &self.cycle)
    }

    fn boundary_update(&self, kind: BoundaryKind, domain: Domain) -> Result<Option<JobId>> {
        let workspace = self.workspaces().open(domain);
        let log = self
            .config
            .paths
            .log_path(&format!("update_bc_{kind}"), domain);
        self.run_job(
            &self.config.backends.updatebc,
            &workspace.path(UPDATER_LINK),
            workspace.root(),
            &log,
        )
    }

    fn analysis_prep(&self, model: &Namelist, domain: Domain) -> Result<()> {
        let paths = &self.config.paths;
        let manager = self.workspaces();
        let workspace = manager.open(domain);
        manager.link_static_assets(&workspace, &self.cycle)?;

        let template = namelist::read(&paths.wrfda_template())?;
        let obsproc = namelist::read(&paths.obsproc_namelist())?;
        let overrides = wrfda_overrides(model, &obsproc, &self.cycle, domain)?;
        let synced = namelist::merge(&template, &overrides)?;
        namelist::write(&workspace.path(MODEL_NAMELIST), &synced)
    }

    fn analysis_run(&self, domain: Domain) -> Result<Option<JobId>> {
        let workspace = self.workspaces().open(domain);
        let log = self.config.paths.log_path("wrfda", domain);
        self.run_job(
            &self.config.backends.wrfvar,
            &workspace.path(WRFVAR_LINK),
            workspace.root(),
            &log,
        )
    }

    fn promote(&self, domain: Domain) -> Result<()> {
        let paths = &self.config.paths;
        let workspace = self.workspaces().open(domain);
        let analysis = workspace.path(ANALYSIS_OUTPUT);
        require_file(&analysis, "analysis output")?;
        replace_with_copy(&analysis, &paths.wrfinput(domain))?;
        if domain.is_outer() {
            replace_with_copy(&workspace.path(LATERAL_BOUNDARY), &paths.lateral_boundary())?;
        }
        tracing::info!(%domain, "analysis promoted to run directory");
        Ok(())
    }

    /// Launch one executable and wait for it; a failed job aborts the cycle.
    fn run_job(
        &self,
        backend: &ExecBackend,
        executable: &Path,
        cwd: &Path,
        log: &Path,
    ) -> Result<Option<JobId>> {
        let launcher = JobLauncher::new(self.scheduler);
        let handle = launcher.launch(backend, executable, cwd, Some(log))?;
        let monitor = JobMonitor::new(self.scheduler, self.config.poll_policy());
        match monitor.await_completion(&handle)? {
            TerminalStatus::Success => Ok(handle.job_id()),
            TerminalStatus::Failure => Err(anyhow!(CycleError::ExternalProcess {
                command: handle.describe(),
                detail: failure_detail(&handle, log),
            })),
        }
    }

    fn model_namelist(&self) -> Result<Namelist> {
        namelist::read(&self.config.paths.model_namelist()).context("read model namelist")
    }

    fn workspaces(&self) -> WorkspaceManager<'a> {
        WorkspaceManager::new(&self.config.paths)
    }
}

fn failure_detail(handle: &JobHandle, log: &Path) -> String {
    let reason = match handle {
        JobHandle::Local { detail, .. } => detail.clone().unwrap_or_else(|| "failed".to_string()),
        JobHandle::Batch { .. } => "job ended in a failed state".to_string(),
    };
    format!("{reason} (log: {})", log.display())
}

/// Number of nested domains configured in the model namelist.
pub fn max_dom(model: &Namelist) -> Result<u32> {
    let value = model.require("domains", "max_dom")?;
    value
        .as_integer()
        .and_then(|count| u32::try_from(count).ok())
        .filter(|count| *count >= 1)
        .ok_or_else(|| {
            anyhow!(CycleError::Configuration(format!(
                "domains.max_dom must be a positive integer (got {})",
                namelist::render_value(value)
            )))
        })
}
