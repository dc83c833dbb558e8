//! Shared test infrastructure for integration tests.
//!
//! Builds a scratch WRF run directory and WRFDA install whose executables are
//! small shell scripts, then drives the built `wrfda-cycle` binary against it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const ANALYSIS_TIME: &str = "2014-07-27T02:00:00";

const MODEL_NAMELIST: &str = "\
&time_control
 run_hours = 6,
 start_year = 2014,
/

&domains
 max_dom = 1,
 e_we = 100,
 e_sn = 90,
 e_vert = 40,
 dx = 27000,
 dy = 27000,
 i_parent_start = 1,
 j_parent_start = 1,
 parent_id = 0,
/

&physics
 mp_physics = 3,
 ra_lw_physics = 1,
 ra_sw_physics = 1,
 radt = 30,
 sf_sfclay_physics = 1,
 sf_surface_physics = 2,
 bl_pbl_physics = 1,
 cu_physics = 1,
 cudt = 5,
 num_soil_layers = 4,
/
";

const OBSPROC_TEMPLATE: &str = "\
&record1
 obs_gts_filename = 'obs.2008020512',
/

&record2
 time_window_min = '2008-02-05_11:00:00',
 time_analysis = '2008-02-05_12:00:00',
 time_window_max = '2008-02-05_13:00:00',
/

&record8
 nesti = 1,
 nestj = 1,
 nestix = 45,
 nestjx = 45,
 numc = 0,
 dis = 60.0,
 maxnes = 1,
/
";

const WRFDA_TEMPLATE: &str = "\
&wrfvar7
 cv_options = 5,
/

&wrfvar18
 analysis_date = '2008-02-05_12:00:00.0000',
/

&wrfvar21
 time_window_min = '2008-02-05_11:00:00.0000',
/

&wrfvar22
 time_window_max = '2008-02-05_13:00:00.0000',
/

&time_control
 start_year = 2008,
 start_month = 2,
 start_day = 5,
 start_hour = 12,
 end_year = 2008,
 end_month = 2,
 end_day = 5,
 end_hour = 12,
/

&domains
 e_we = 45,
 e_sn = 45,
 e_vert = 28,
 dx = 60000,
 dy = 60000,
/

&physics
 mp_physics = 4,
/
";

/// A single-domain run directory plus a fake WRFDA install.
pub struct CycleFixture {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl CycleFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();
        let run = root.join("run");
        let wrfda = root.join("WRFDA");

        write(&run.join("namelist.input"), MODEL_NAMELIST);
        write(&run.join("wrfinput_d01"), "real.exe initial conditions");
        write(&run.join("wrfbdy_d01"), "real.exe boundary\n");
        write(&root.join("obs/obs.2014072702"), "little_r observations");

        write(
            &wrfda.join("var/obsproc/namelist.obsproc.3dvar.wrfvar-tut"),
            OBSPROC_TEMPLATE,
        );
        write_exe(
            &wrfda.join("var/obsproc/obsproc.exe"),
            "test -f namelist.obsproc || exit 5\nprintf obs > 'obs_gts_2014-07-27_02:00:00.3DVAR'",
        );
        write(&wrfda.join("var/test/tutorial/namelist.input"), WRFDA_TEMPLATE);
        write(&wrfda.join("var/run/be.dat.cv3"), "cv3 statistics");
        write(&wrfda.join("run/LANDUSE.TBL"), "landuse");
        write_exe(
            &wrfda.join("var/da/da_update_bc.exe"),
            "test -f parame.in || exit 4\necho updated >> wrfbdy_d01",
        );
        write_exe(
            &wrfda.join("var/da/da_wrfvar.exe"),
            "test -f namelist.input || exit 6\ntest -L ob.ascii || exit 7\n{ cat fg; echo ' + analysis'; } > wrfvar_output",
        );

        let config = serde_json::json!({
            "filesystem": {
                "wrf_run_dir": run,
                "work_dir": root.join("work"),
                "wrfda_dir": wrfda,
                "obs_dir": root.join("obs"),
                "obs_filename": "obs.2014072702",
            },
            "options_slurm": {
                "slurm_obsproc.exe": "",
                "slurm_updatebc.exe": "",
                "slurm_wrfvar.exe": "",
            },
        });
        let config_path = root.join("config.json");
        write(
            &config_path,
            &serde_json::to_string_pretty(&config).expect("serialize config"),
        );
        Self { dir, config_path }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root().join("run")
    }

    pub fn workspace(&self) -> PathBuf {
        self.root().join("work/wrfda/d01")
    }

    /// Run the binary with `args` followed by `--config <fixture config>`.
    pub fn run_cli(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_wrfda-cycle"))
            .args(args)
            .arg("--config")
            .arg(&self.config_path)
            .env("RUST_LOG", "wrfda_cycle=info")
            .output()
            .expect("run wrfda-cycle")
    }
}

pub fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write fixture file");
}

pub fn write_exe(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    write(path, &format!("#!/bin/sh\n{body}\n"));
    let mut perms = fs::metadata(path).expect("exe metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod exe");
}

/// Assert a namelist line `key = value,` is present, ignoring alignment.
pub fn assert_binding(namelist: &str, key: &str, value: &str) {
    let found = namelist.lines().any(|line| {
        line.split_once('=').is_some_and(|(name, rest)| {
            name.trim() == key && rest.trim().trim_end_matches(',').trim() == value
        })
    });
    assert!(found, "expected {key} = {value} in:\n{namelist}");
}
