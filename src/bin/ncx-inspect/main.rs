mod cli;

use apithing::ApiOperation;
use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use ncx_inspect::api::{
    InspectContext, RunMisplacedFieldsReport, RunMisplacedFieldsReportParams, ScanDuplicates, ScanDuplicatesParams,
    SummarizeIndex, SummarizeIndexParams,
};
use ncx_inspect::{InspectError, InspectorConfig, Report};
use std::process::ExitCode;

fn init_tracing(cli: &Cli) {
    // --quiet is always off; otherwise RUST_LOG wins, then --verbose, then warnings only
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ncx_inspect=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<InspectorConfig, InspectError> {
    match &cli.config {
        Some(path) => InspectorConfig::load(path),
        None => Ok(InspectorConfig::default()),
    }
}

fn print_report(report: &Report, format: OutputFormat) -> Result<(), InspectError> {
    match format {
        OutputFormat::Text => print!("{}", report.render()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), InspectError> {
    let mut context = InspectContext::with_config(load_config(&cli)?);

    let report = match cli.command {
        Commands::Misplaced {
            root,
            threshold,
            max_records,
            counts_only,
        } => {
            let mut builder = RunMisplacedFieldsReportParams::builder().root(root);
            if let Some(threshold) = threshold {
                builder = builder.threshold(threshold);
            }
            if let Some(max) = max_records {
                builder = builder.max_records_per_variable(usize::try_from(max).unwrap_or(usize::MAX));
            }
            if counts_only {
                builder = builder.show_records(false);
            }
            RunMisplacedFieldsReport::execute(&mut context, &builder.build()?)?
        }
        Commands::Summary { index, records } => {
            let mut params = SummarizeIndexParams::new(index)?;
            if let Some(variable) = records {
                params = params.with_records(variable)?;
            }
            SummarizeIndex::execute(&mut context, &params)?
        }
        Commands::Duplicates { root } => ScanDuplicates::execute(&mut context, &ScanDuplicatesParams::new(root)?)?,
        Commands::WriteConfig { path } => {
            context.config().save(&path)?;
            eprintln!("wrote {}", path.display());
            return Ok(());
        }
    };

    print_report(&report, cli.format)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
