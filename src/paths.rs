//! Typed paths into the WRF run directory, the WRFDA install and the
//! per-domain workspaces.
use crate::cycle::{AnalysisCycle, Domain};
use std::path::PathBuf;

/// Name of the model namelist inside the run directory.
pub const MODEL_NAMELIST: &str = "namelist.input";
/// Name of the updater control file inside a workspace.
pub const PARAME_FILE: &str = "parame.in";
/// First-guess file inside a workspace.
pub const FIRST_GUESS: &str = "fg";
/// Analysis output written by `da_wrfvar.exe`.
pub const ANALYSIS_OUTPUT: &str = "wrfvar_output";
/// Lateral boundary file, owned by the outer domain.
pub const LATERAL_BOUNDARY: &str = "wrfbdy_d01";

#[derive(Debug, Clone)]
pub struct CyclePaths {
    run_dir: PathBuf,
    work_dir: PathBuf,
    wrfda_dir: PathBuf,
    obs_dir: PathBuf,
}

impl CyclePaths {
    pub fn new(run_dir: PathBuf, work_dir: PathBuf, wrfda_dir: PathBuf, obs_dir: PathBuf) -> Self {
        Self {
            run_dir,
            work_dir,
            wrfda_dir,
            obs_dir,
        }
    }

    pub fn model_namelist(&self) -> PathBuf {
        self.run_dir.join(MODEL_NAMELIST)
    }

    /// `<work_dir>/wrfda`, parent of every domain workspace.
    pub fn wrfda_work_root(&self) -> PathBuf {
        self.work_dir.join("wrfda")
    }

    /// `<work_dir>/wrfda/dNN`.
    pub fn workspace_dir(&self, domain: Domain) -> PathBuf {
        self.wrfda_work_root().join(domain.tag())
    }

    /// Log file for one executable run against one domain.
    pub fn log_path(&self, program: &str, domain: Domain) -> PathBuf {
        self.wrfda_work_root()
            .join(format!("log.{program}_{}", domain.tag()))
    }

    pub fn obsproc_dir(&self) -> PathBuf {
        self.wrfda_dir.join("var").join("obsproc")
    }

    pub fn obsproc_template(&self) -> PathBuf {
        self.obsproc_dir().join("namelist.obsproc.3dvar.wrfvar-tut")
    }

    pub fn obsproc_namelist(&self) -> PathBuf {
        self.obsproc_dir().join("namelist.obsproc")
    }

    pub fn obsproc_exe(&self) -> PathBuf {
        self.obsproc_dir().join("obsproc.exe")
    }

    /// Observation file produced by `obsproc.exe` for this cycle.
    pub fn obsproc_output(&self, cycle: &AnalysisCycle) -> PathBuf {
        self.obsproc_dir()
            .join(format!("obs_gts_{}.3DVAR", cycle.analysis_stamp()))
    }

    pub fn obs_source(&self, obs_filename: &str) -> PathBuf {
        self.obs_dir.join(obs_filename)
    }

    pub fn wrfda_template(&self) -> PathBuf {
        self.wrfda_dir
            .join("var")
            .join("test")
            .join("tutorial")
            .join(MODEL_NAMELIST)
    }

    pub fn wrfvar_exe(&self) -> PathBuf {
        self.wrfda_dir.join("var").join("da").join("da_wrfvar.exe")
    }

    pub fn updatebc_exe(&self) -> PathBuf {
        self.wrfda_dir.join("var").join("da").join("da_update_bc.exe")
    }

    pub fn background_error(&self) -> PathBuf {
        self.wrfda_dir.join("var").join("run").join("be.dat.cv3")
    }

    pub fn landuse_table(&self) -> PathBuf {
        self.wrfda_dir.join("run").join("LANDUSE.TBL")
    }

    /// `wrfinput_dNN` in the run directory.
    pub fn wrfinput(&self, domain: Domain) -> PathBuf {
        self.run_dir.join(format!("wrfinput_{}", domain.tag()))
    }

    /// Previous forecast converted to WRFDA input format, if the model wrote one.
    pub fn forecast_first_guess(&self, domain: Domain, cycle: &AnalysisCycle) -> PathBuf {
        self.run_dir.join(format!(
            "wrfvar_input_{}_{}",
            domain.tag(),
            cycle.analysis_stamp()
        ))
    }

    pub fn lateral_boundary(&self) -> PathBuf {
        self.run_dir.join(LATERAL_BOUNDARY)
    }
}
