//! Etlflow CLI: runs one extract-transform-load job.
//!
//! Exit code 0 on success, 1 when the job or its configuration fails, 2 for
//! invalid arguments.

mod logging;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use etlflow::config::{load_config, ConfigOverrides};
use etlflow::events::TracingEventSink;
use etlflow::extract::SourceSelector;
use etlflow::load::{JsonLinesSink, LoadMode};
use etlflow::pipeline::EtlPipeline;
use etlflow::transform::RecordSchema;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Run an extract-transform-load job
#[derive(Parser, Debug)]
#[command(name = "etlflow", version, about, long_about = None)]
struct Cli {
    /// CSV file path
    #[arg(long)]
    file: Option<PathBuf>,

    /// API URL returning a JSON array of objects
    #[arg(long)]
    api: Option<String>,

    /// Records per batch [default: 1000]
    #[arg(long)]
    batch_size: Option<usize>,

    /// Target schema
    #[arg(long, value_enum, default_value_t = SchemaArg::Orders)]
    schema: SchemaArg,

    /// What happens to existing rows [default: append]
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Directory the JSON-lines sink writes to
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum attempts for every retried operation
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Default log level, e.g. `warn` or `etlflow=debug` [default: info]
    #[arg(long)]
    log_level: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SchemaArg {
    /// Order events into `orders_etl`
    Orders,
    /// Personal expenses into `expenses`
    Expenses,
}

impl From<SchemaArg> for RecordSchema {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Orders => Self::orders(),
            SchemaArg::Expenses => Self::expenses(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Keep existing rows
    Append,
    /// Truncate the table before loading
    ReplaceAll,
}

impl From<ModeArg> for LoadMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Append => Self::Append,
            ModeArg::ReplaceAll => Self::ReplaceAll,
        }
    }
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            batch_size: self.batch_size,
            mode: self.mode.map(LoadMode::from),
            max_attempts: self.max_attempts,
            log_level: self.log_level.clone(),
        }
    }

    /// Both selectors are passed on so the pipeline rejects them as a
    /// configuration error.
    fn selector(&self) -> SourceSelector {
        SourceSelector {
            file: self.file.clone(),
            api: self.api.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref(), &cli.overrides())
        .context("Configuration error")?;
    let _guards = logging::init(&config.logging, cli.verbose)?;
    info!(dir = %config.logging.dir.display(), "Logging initialized");

    let pipeline = EtlPipeline::builder(Arc::new(JsonLinesSink::new(&cli.output_dir)))
        .schema(cli.schema.into())
        .config(config)
        .events(Arc::new(TracingEventSink))
        .build()
        .context("Configuration error")?;

    match pipeline.run(&cli.selector()).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        // The job guard has already logged the classified failure.
        Err(_) => Ok(ExitCode::FAILURE),
    }
}
