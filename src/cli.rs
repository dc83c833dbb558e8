//! CLI argument parsing for the cycle orchestrator.
//!
//! The CLI only routes: every command maps onto one call into the pipeline,
//! the config loader or the namelist codec.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "wrfda-cycle",
    version,
    about = "Run one WRFDA data-assimilation cycle against a WRF run directory",
    after_help = "Commands:\n  run --cycle <TS>                      Run the full cycle for an analysis time\n  check                                 Load and validate the configuration\n  stub                                  Print a configuration skeleton\n  namelist show <PATH>                  Parse and re-render a namelist\n  prepare-boundary --type <T> --domain <N> --cycle <TS>\n                                        Rewrite one workspace's parame.in\n\nExamples:\n  wrfda-cycle stub > ~/.config/wrfda-cycle/config.json\n  wrfda-cycle check\n  wrfda-cycle run --cycle 2014-07-27T02:00:00\n  wrfda-cycle run --cycle 2014-07-27_02 --json\n  wrfda-cycle namelist show /path/to/WRFV3/run/namelist.input",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Check(CheckArgs),
    Stub(StubArgs),
    Namelist(NamelistArgs),
    PrepareBoundary(PrepareBoundaryArgs),
}

impl Command {
    /// Whether debug-level logging was requested.
    pub fn verbose(&self) -> bool {
        match self {
            Command::Run(args) => args.verbose,
            Command::Check(args) => args.verbose,
            Command::PrepareBoundary(args) => args.verbose,
            Command::Stub(_) | Command::Namelist(_) => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Run every stage of one analysis cycle")]
pub struct RunArgs {
    /// Analysis time, e.g. 2014-07-27T02:00:00 or 2014-07-27_02
    #[arg(long, value_name = "TIMESTAMP")]
    pub cycle: String,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit the cycle report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log at debug level
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Load and validate the configuration, then print resolved backends")]
pub struct CheckArgs {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print a configuration skeleton to stdout")]
pub struct StubArgs {}

#[derive(Parser, Debug)]
#[command(about = "Namelist utilities")]
pub struct NamelistArgs {
    #[command(subcommand)]
    pub command: NamelistCommand,
}

#[derive(Subcommand, Debug)]
pub enum NamelistCommand {
    /// Parse a namelist and print it in canonical form
    Show {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(about = "Write and resolve parame.in in an existing domain workspace")]
pub struct PrepareBoundaryArgs {
    /// Boundary to refresh: lower or lateral
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: String,

    /// Domain number, starting at 1
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub domain: u32,

    /// Analysis time used to locate the previous forecast
    #[arg(long, value_name = "TIMESTAMP")]
    pub cycle: String,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    pub verbose: bool,
}
