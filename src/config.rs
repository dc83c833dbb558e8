//! Cycle configuration loading and validation.
//!
//! The on-disk file has `filesystem` and `options_slurm` sections plus
//! optional `scheduler` and `stages` tuning. It is resolved once into an
//! immutable [`Config`]; components receive that value and never re-read or
//! mutate it mid-cycle.
use crate::error::CycleError;
use crate::job::{ExecBackend, PollPolicy};
use crate::paths::CyclePaths;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "wrfda-cycle";
const CONFIG_FILE_NAME: &str = "config.json";

/// Raw configuration file as written by users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub options_slurm: SlurmScripts,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub stages: StageOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesystemConfig {
    pub wrf_run_dir: PathBuf,
    pub work_dir: PathBuf,
    pub wrfda_dir: PathBuf,
    pub obs_dir: PathBuf,
    pub obs_filename: String,
}

/// Batch script per executable; an empty string runs the executable locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlurmScripts {
    #[serde(rename = "slurm_obsproc.exe", default)]
    pub obsproc: String,
    #[serde(rename = "slurm_updatebc.exe", default)]
    pub updatebc: String,
    #[serde(rename = "slurm_wrfvar.exe", default)]
    pub wrfvar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SchedulerConfig {
    /// Submission command line, split with shell-words.
    pub submit_command: String,
    /// Active-job query command line (`squeue`-compatible).
    pub query_command: String,
    /// Accounting command line (`sacct`-compatible) for final job state.
    pub accounting_command: String,
    pub poll_interval_ms: u64,
    /// Give up on a batch job after this long; `null` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            submit_command: "sbatch".to_string(),
            query_command: "squeue".to_string(),
            accounting_command: "sacct".to_string(),
            poll_interval_ms: 1000,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StageOptions {
    /// Run `obsproc.exe`; when false its output must already be in place.
    pub run_obsproc: bool,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self { run_obsproc: true }
    }
}

/// Execution backend for each external executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backends {
    pub obsproc: ExecBackend,
    pub updatebc: ExecBackend,
    pub wrfvar: ExecBackend,
}

/// Validated, resolved configuration for one cycle.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: CyclePaths,
    pub obs_filename: String,
    pub backends: Backends,
    pub scheduler: SchedulerConfig,
    pub stages: StageOptions,
}

impl Config {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.scheduler.poll_interval_ms),
            deadline: self.scheduler.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Default config location under the user's config directory.
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine config directory"))?;
    Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load, validate and resolve the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.is_file() {
        return Err(anyhow!(CycleError::Configuration(format!(
            "config file not found at {}",
            path.display()
        ))));
    }
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let file: ConfigFile = serde_json::from_slice(&bytes).map_err(|err| {
        anyhow!(CycleError::Configuration(format!(
            "parse config {}: {err}",
            path.display()
        )))
    })?;
    resolve_config(file)
}

/// Validate a parsed config file and resolve backends and paths.
pub fn resolve_config(file: ConfigFile) -> Result<Config> {
    validate_config(&file)?;
    let backends = Backends {
        obsproc: ExecBackend::from_script_setting(&file.options_slurm.obsproc),
        updatebc: ExecBackend::from_script_setting(&file.options_slurm.updatebc),
        wrfvar: ExecBackend::from_script_setting(&file.options_slurm.wrfvar),
    };
    let fs_config = file.filesystem;
    Ok(Config {
        paths: CyclePaths::new(
            fs_config.wrf_run_dir,
            fs_config.work_dir,
            fs_config.wrfda_dir,
            fs_config.obs_dir,
        ),
        obs_filename: fs_config.obs_filename,
        backends,
        scheduler: file.scheduler,
        stages: file.stages,
    })
}

pub fn validate_config(file: &ConfigFile) -> Result<()> {
    let fs_config = &file.filesystem;
    let required = [
        ("wrf_run_dir", fs_config.wrf_run_dir.as_os_str().is_empty()),
        ("work_dir", fs_config.work_dir.as_os_str().is_empty()),
        ("wrfda_dir", fs_config.wrfda_dir.as_os_str().is_empty()),
        ("obs_dir", fs_config.obs_dir.as_os_str().is_empty()),
        ("obs_filename", fs_config.obs_filename.trim().is_empty()),
    ];
    if let Some((key, _)) = required.iter().find(|(_, empty)| *empty) {
        return Err(anyhow!(CycleError::Configuration(format!(
            "filesystem.{key} must be non-empty"
        ))));
    }
    if Path::new(&fs_config.obs_filename).components().count() != 1 {
        return Err(anyhow!(CycleError::Configuration(format!(
            "filesystem.obs_filename must be a bare file name (got {:?})",
            fs_config.obs_filename
        ))));
    }
    let scheduler = &file.scheduler;
    for (key, command) in [
        ("submit_command", &scheduler.submit_command),
        ("query_command", &scheduler.query_command),
        ("accounting_command", &scheduler.accounting_command),
    ] {
        let words = shell_words::split(command).map_err(|err| {
            anyhow!(CycleError::Configuration(format!(
                "scheduler.{key} is not a valid command line: {err}"
            )))
        })?;
        if words.is_empty() {
            return Err(anyhow!(CycleError::Configuration(format!(
                "scheduler.{key} must be non-empty"
            ))));
        }
    }
    if scheduler.poll_interval_ms == 0 {
        return Err(anyhow!(CycleError::Configuration(
            "scheduler.poll_interval_ms must be positive".to_string()
        )));
    }
    Ok(())
}

/// Render a pretty JSON config stub for new installations.
pub fn config_stub() -> Result<String> {
    let stub = ConfigFile {
        filesystem: FilesystemConfig {
            wrf_run_dir: PathBuf::from("/path/to/WRFV3/run"),
            work_dir: PathBuf::from("/path/to/work"),
            wrfda_dir: PathBuf::from("/path/to/WRFDA"),
            obs_dir: PathBuf::from("/path/to/obs"),
            obs_filename: "obs.2014072702".to_string(),
        },
        options_slurm: SlurmScripts::default(),
        scheduler: SchedulerConfig::default(),
        stages: StageOptions::default(),
    };
    serde_json::to_string_pretty(&stub).context("serialize config stub")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
