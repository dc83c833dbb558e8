use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod boundary;
mod cli;
mod config;
mod cycle;
mod error;
mod fsutil;
mod job;
mod namelist;
mod paths;
mod pipeline;
mod workspace;

use cli::{CheckArgs, Command, NamelistCommand, PrepareBoundaryArgs, RootArgs, RunArgs};
use cycle::{AnalysisCycle, Domain};
use job::SlurmScheduler;
use pipeline::Pipeline;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    if let Err(err) = init_tracing(args.command.verbose()) {
        eprintln!("warning: logging disabled: {err:#}");
    }
    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = error::cycle_error(&err).map_or("error", error::CycleError::kind);
            tracing::error!(kind, "wrfda-cycle failed");
            eprintln!("error[{kind}]: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env().add_directive(format!("wrfda_cycle={level}").parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("{err}"))
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => cmd_run(args),
        Command::Check(args) => cmd_check(args),
        Command::Stub(_) => {
            println!("{}", config::config_stub()?);
            Ok(())
        }
        Command::Namelist(args) => match args.command {
            NamelistCommand::Show { path } => {
                let nml = namelist::read(&path)?;
                print!("{}", namelist::render(&nml));
                Ok(())
            }
        },
        Command::PrepareBoundary(args) => cmd_prepare_boundary(args),
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    // Reject a bad timestamp before the config is even read.
    let cycle = AnalysisCycle::parse(&args.cycle)?;
    let config = config::load_config(&config_path(args.config)?)?;
    let scheduler = SlurmScheduler::from_config(&config.scheduler)?;
    let report = Pipeline::new(&config, &scheduler, cycle).run()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    let path = config_path(args.config)?;
    let config = config::load_config(&path)?;
    let scheduler = SlurmScheduler::from_config(&config.scheduler)?;
    let batch = [
        &config.backends.obsproc,
        &config.backends.updatebc,
        &config.backends.wrfvar,
    ]
    .into_iter()
    .any(|backend| matches!(backend, job::ExecBackend::Batch { .. }));
    if batch {
        scheduler.check_available()?;
    }
    println!("config ok: {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config.backends)?);
    Ok(())
}

fn cmd_prepare_boundary(args: PrepareBoundaryArgs) -> Result<()> {
    let cycle = AnalysisCycle::parse(&args.cycle)?;
    let domain = Domain::new(args.domain)?;
    let config = config::load_config(&config_path(args.config)?)?;
    let scheduler = SlurmScheduler::from_config(&config.scheduler)?;
    let spec = Pipeline::new(&config, &scheduler, cycle).prepare_boundary(&args.kind, domain)?;
    println!(
        "{} boundary prepared for {}: {}",
        spec.kind,
        spec.domain,
        spec.da_file.display()
    );
    Ok(())
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => config::default_config_path(),
    }
}
