//! Analysis cycle timestamp and domain identifiers.
use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use std::fmt;

use crate::error::CycleError;

/// Half-width of the observation window around the analysis time.
pub const WINDOW_HALF_WIDTH_MINUTES: i64 = 15;

/// Timestamp layout used inside WRF and WRFDA namelists.
pub const NAMELIST_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

const ACCEPTED_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d_%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d_%H:%M",
];

/// The center of one assimilation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisCycle {
    analysis_time: NaiveDateTime,
}

impl AnalysisCycle {
    pub fn new(analysis_time: NaiveDateTime) -> Self {
        Self { analysis_time }
    }

    /// Parse a cycle start given on the command line.
    ///
    /// Accepts full timestamps with `T`, `_` or a space as the date/time
    /// separator, plus the hour-only forms `YYYY-MM-DDTHH` and `YYYY-MM-DD_HH`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        for format in ACCEPTED_FORMATS {
            if let Ok(time) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::new(time));
            }
        }
        if let Some(time) = parse_hour_only(trimmed) {
            return Ok(Self::new(time));
        }
        Err(anyhow!(CycleError::Validation {
            input: input.to_string(),
            detail: "expected YYYY-MM-DDTHH:MM:SS".to_string(),
        }))
    }

    pub fn window_min(&self) -> NaiveDateTime {
        self.analysis_time - Duration::minutes(WINDOW_HALF_WIDTH_MINUTES)
    }

    pub fn window_max(&self) -> NaiveDateTime {
        self.analysis_time + Duration::minutes(WINDOW_HALF_WIDTH_MINUTES)
    }

    /// `time_analysis` as written into namelists.
    pub fn analysis_stamp(&self) -> String {
        format_namelist_time(self.analysis_time)
    }

    pub fn window_min_stamp(&self) -> String {
        format_namelist_time(self.window_min())
    }

    pub fn window_max_stamp(&self) -> String {
        format_namelist_time(self.window_max())
    }

    pub fn year(&self) -> i64 {
        i64::from(self.analysis_time.year())
    }

    pub fn month(&self) -> i64 {
        i64::from(self.analysis_time.month())
    }

    pub fn day(&self) -> i64 {
        i64::from(self.analysis_time.day())
    }

    pub fn hour(&self) -> i64 {
        i64::from(self.analysis_time.hour())
    }
}

impl fmt::Display for AnalysisCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.analysis_stamp())
    }
}

pub fn format_namelist_time(time: NaiveDateTime) -> String {
    time.format(NAMELIST_TIME_FORMAT).to_string()
}

fn parse_hour_only(input: &str) -> Option<NaiveDateTime> {
    let (date, hour) = input.split_once(['T', '_'])?;
    if hour.len() != 2 {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{date}T{hour}:00:00"), ACCEPTED_FORMATS[0]).ok()
}

/// A nested model grid, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Domain(u32);

impl Domain {
    /// The outermost grid, the only one with lateral boundaries.
    pub const OUTER: Domain = Domain(1);

    pub fn new(id: u32) -> Result<Self> {
        if id == 0 {
            return Err(anyhow!(CycleError::Configuration(
                "domain ids start at 1".to_string()
            )));
        }
        Ok(Self(id))
    }

    /// Every domain in `1..=max_dom`, in processing order.
    pub fn all(max_dom: u32) -> impl Iterator<Item = Domain> {
        (1..=max_dom).map(Domain)
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    /// Zero-based index into per-domain namelist arrays.
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }

    pub fn is_outer(&self) -> bool {
        self.0 == 1
    }

    /// The `dNN` suffix used by WRF file and directory names.
    pub fn tag(&self) -> String {
        format!("d{:02}", self.0)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
