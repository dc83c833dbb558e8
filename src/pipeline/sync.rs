//! Overrides that keep the tool namelists consistent with the model namelist
//! and the analysis cycle.
use crate::cycle::{AnalysisCycle, Domain};
use crate::namelist::{KeySchema, Namelist, Overrides};
use anyhow::{Context, Result};

static OBSPROC_SCHEMA: KeySchema = KeySchema {
    name: "namelist.obsproc",
    groups: &[
        ("record1", &["obs_gts_filename"]),
        (
            "record2",
            &["time_analysis", "time_window_min", "time_window_max"],
        ),
        (
            "record8",
            &["nesti", "nestj", "nestix", "nestjx", "numc", "dis", "maxnes"],
        ),
    ],
};

static WRFDA_SCHEMA: KeySchema = KeySchema {
    name: "WRFDA namelist.input",
    groups: &[
        ("domains", &DOMAIN_GRID_KEYS),
        ("physics", &DOMAIN_PHYSICS_KEYS),
        ("wrfvar7", &["cv_options"]),
        ("wrfvar18", &["analysis_date"]),
        ("wrfvar21", &["time_window_min"]),
        ("wrfvar22", &["time_window_max"]),
        (
            "time_control",
            &[
                "start_year",
                "start_month",
                "start_day",
                "start_hour",
                "end_year",
                "end_month",
                "end_day",
                "end_hour",
            ],
        ),
    ],
};

/// Grid dimensions copied per domain from the model namelist.
const DOMAIN_GRID_KEYS: [&str; 5] = ["e_we", "e_sn", "e_vert", "dx", "dy"];

/// Physics selections copied per domain; scalar in single-scheme setups.
const DOMAIN_PHYSICS_KEYS: [&str; 10] = [
    "mp_physics",
    "ra_lw_physics",
    "ra_sw_physics",
    "radt",
    "sf_sfclay_physics",
    "sf_surface_physics",
    "bl_pbl_physics",
    "cu_physics",
    "cudt",
    "num_soil_layers",
];

/// Nest geometry in `record8` mapped from `&domains` in the model namelist.
const OBSPROC_NEST_KEYS: [(&str, &str); 7] = [
    ("nesti", "i_parent_start"),
    ("nestj", "j_parent_start"),
    ("nestix", "e_we"),
    ("nestjx", "e_sn"),
    ("numc", "parent_id"),
    ("dis", "dx"),
    ("maxnes", "max_dom"),
];

/// Control variable option used for the CV3 background error statistics.
const CV_OPTIONS: i64 = 3;

/// Overrides for `namelist.obsproc`: observation file, time window and the
/// full nest layout of the model run.
pub fn obsproc_overrides(
    model: &Namelist,
    cycle: &AnalysisCycle,
    obs_filename: &str,
) -> Result<Overrides> {
    let mut overrides = Overrides::new(&OBSPROC_SCHEMA);
    overrides
        .set("record1", "obs_gts_filename", obs_filename)
        .set("record2", "time_analysis", cycle.analysis_stamp())
        .set("record2", "time_window_min", cycle.window_min_stamp())
        .set("record2", "time_window_max", cycle.window_max_stamp());
    for (key, model_key) in OBSPROC_NEST_KEYS {
        let value = model
            .require("domains", model_key)
            .context("sync namelist.obsproc with model namelist")?;
        overrides.set("record8", key, value.clone());
    }
    Ok(overrides)
}

/// Overrides for a domain's WRFDA `namelist.input`.
///
/// Grid and physics values are narrowed to `domain`; the analysis time and
/// window are taken from the already-synchronized obsproc namelist so both
/// tools agree on the window.
pub fn wrfda_overrides(
    model: &Namelist,
    obsproc: &Namelist,
    cycle: &AnalysisCycle,
    domain: Domain,
) -> Result<Overrides> {
    let mut overrides = Overrides::new(&WRFDA_SCHEMA);
    for key in DOMAIN_GRID_KEYS {
        overrides.set_for_domain(model, "domains", "domains", key, domain)?;
    }
    for key in DOMAIN_PHYSICS_KEYS {
        overrides.set_for_domain(model, "physics", "physics", key, domain)?;
    }
    let window = [
        ("wrfvar18", "analysis_date", "time_analysis"),
        ("wrfvar21", "time_window_min", "time_window_min"),
        ("wrfvar22", "time_window_max", "time_window_max"),
    ];
    for (group, key, obsproc_key) in window {
        let value = obsproc
            .require("record2", obsproc_key)
            .context("read analysis window from namelist.obsproc")?;
        overrides.set(group, key, value.clone());
    }
    overrides.set("wrfvar7", "cv_options", CV_OPTIONS);
    for prefix in ["start", "end"] {
        overrides
            .set("time_control", &format!("{prefix}_year"), cycle.year())
            .set("time_control", &format!("{prefix}_month"), cycle.month())
            .set("time_control", &format!("{prefix}_day"), cycle.day())
            .set("time_control", &format!("{prefix}_hour"), cycle.hour());
    }
    Ok(overrides)
}
