use super::*;
use crate::error::cycle_error;

fn write_config(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("config.json");
    fs::write(&path, json).expect("write config");
    path
}

const MINIMAL: &str = r#"{
  "filesystem": {
    "wrf_run_dir": "/data/run",
    "work_dir": "/data/work",
    "wrfda_dir": "/opt/WRFDA",
    "obs_dir": "/data/obs",
    "obs_filename": "obs.2014072702"
  },
  "options_slurm": {
    "slurm_obsproc.exe": "",
    "slurm_updatebc.exe": "",
    "slurm_wrfvar.exe": "/opt/scripts/wrfvar.sh"
  }
}"#;

#[test]
fn resolves_backends_once_at_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = load_config(&write_config(dir.path(), MINIMAL)).expect("load config");
    assert_eq!(config.backends.obsproc, ExecBackend::Local);
    assert_eq!(config.backends.updatebc, ExecBackend::Local);
    assert_eq!(
        config.backends.wrfvar,
        ExecBackend::Batch {
            script: PathBuf::from("/opt/scripts/wrfvar.sh")
        }
    );
    assert!(config.stages.run_obsproc);
    let policy = config.poll_policy();
    assert_eq!(policy.interval, Duration::from_millis(1000));
    assert_eq!(policy.deadline, None);
}

#[test]
fn rejects_unknown_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json = MINIMAL.replace("\"obs_dir\"", "\"obs_directory\"");
    let err = load_config(&write_config(dir.path(), &json)).expect_err("unknown key");
    assert!(matches!(
        cycle_error(&err),
        Some(CycleError::Configuration(_))
    ));
}

#[test]
fn rejects_empty_required_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json = MINIMAL.replace("\"/data/run\"", "\"\"");
    let err = load_config(&write_config(dir.path(), &json)).expect_err("empty path");
    assert!(err.to_string().contains("wrf_run_dir"));
}

#[test]
fn missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_config(&dir.path().join("absent.json")).expect_err("missing");
    assert!(matches!(
        cycle_error(&err),
        Some(CycleError::Configuration(_))
    ));
}

#[test]
fn stub_round_trips_through_loader() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stub = config_stub().expect("render stub");
    let config = load_config(&write_config(dir.path(), &stub)).expect("load stub");
    assert_eq!(config.backends.wrfvar, ExecBackend::Local);
    assert_eq!(config.scheduler.submit_command, "sbatch");
}
