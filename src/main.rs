use std::{fs::File, process::ExitCode, sync::Mutex};

use anyhow::{Context, Error};
use clap::Parser;
use log::{error, info, LevelFilter};
use serde::Serialize;

use nvm_api::error::{InternalError, NvmError, NvmResultExt, ReportError};
use nvmcfg::{
    cli::{Cli, Commands},
    load_agent_config, FileLog, GoalFilter, MultiLogger, NvmCfg, NVMCFG_VERSION,
};

fn print_yaml(value: &impl Serialize) -> Result<(), NvmError> {
    let yaml = serde_yaml::to_string(value).structured(InternalError::SerializeLayout)?;
    print!("{yaml}");
    Ok(())
}

fn run_nvmcfg(args: &Cli) -> Result<(), NvmError> {
    // Log version ASAP
    info!("nvmcfg version: {NVMCFG_VERSION}");

    let config =
        load_agent_config(&args.config).message("Failed to load agent configuration")?;
    let nvmcfg = NvmCfg::new(config);

    let result = match &args.command {
        Commands::CreateGoal { request, force } => nvmcfg
            .create_goal(request, *force)
            .and_then(|plan| print_yaml(&plan)),
        Commands::Validate { request } => nvmcfg.validate(request),
        Commands::ShowGoal { targets } => nvmcfg
            .show_goals(&GoalFilter::from(targets))
            .and_then(|goals| print_yaml(&goals)),
        Commands::DeleteGoal { targets } => nvmcfg.delete_goals(&GoalFilter::from(targets)),
        Commands::DumpConfig { path } => nvmcfg.dump_config(path),
        Commands::LoadGoal { path, targets } => {
            nvmcfg.load_goal(path, &GoalFilter::from(targets))
        }
    };
    result.message(format!("Failed to execute '{}' command", args.command))?;

    if args.command.modifies_goals() {
        info!("Configuration goals changed, they take effect on the next reboot");
    }
    Ok(())
}

fn setup_logging(args: &Cli) -> Result<(), Error> {
    let mut multilogger = MultiLogger::new()
        // Add regular env_logger to output to stderr
        .with_logger(Box::new(
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(args.verbosity)
                .build(),
        ))
        // Per-DIMM trace output of the layout steps is too noisy
        .with_global_filter("nvmcfg::engine::steps", LevelFilter::Debug);

    if let Some(log_file) = &args.log_file {
        multilogger.add_logger(FileLog::new(log_file).into_logger());
    }

    multilogger.init().context("Logger already registered")?;

    Ok(())
}

fn setup_tracing(args: &Cli) -> Result<(), Error> {
    use tracing_subscriber::{filter, fmt::format::FmtSpan, layer::SubscriberExt, Layer};

    let Some(trace_file) = &args.trace_file else {
        return Ok(());
    };

    let file = File::create(trace_file)
        .with_context(|| format!("Failed to create trace file '{}'", trace_file.display()))?;
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(Mutex::new(file))
        .with_filter(filter::LevelFilter::INFO);

    tracing::subscriber::set_global_default(tracing_subscriber::Registry::default().with(json_layer))
        .context("Failed to set global default subscriber")?;

    Ok(())
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // Initialize the loggers
    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    // Initialize the span recorder
    if let Err(e) = setup_tracing(&args) {
        error!("Failed to initialize tracing: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = run_nvmcfg(&args) {
        error!("nvmcfg failed: {e:?}");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}
