//! Command-line driver: runs or explains serialized plan documents.
#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rowpipe::{
    config::{ConfigError, EngineConfig},
    error::{PipelineError, PipelineErrorWithCode},
    logging::init_logging,
    query::{profile::profile_snapshot, Executor, PhysicalRel, PlanDocument, QueryResult},
};

#[derive(Parser, Debug)]
#[command(
    name = "rowpipe",
    version,
    about = "Compile and run physical row-pipeline plans",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "ROWPIPE_CONFIG",
        help = "Engine config file (TOML)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILTER",
        help = "Log filter directive; overrides the config file"
    )]
    log_level: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for query results"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a plan document and print its rows
    Run {
        #[arg(value_name = "PLAN")]
        plan: PathBuf,
    },
    /// Print the operator tree of a plan document
    Explain {
        #[arg(value_name = "PLAN")]
        plan: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug)]
enum CliError {
    Pipeline(PipelineError),
    Config(ConfigError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Pipeline(err) => write!(f, "{}", PipelineErrorWithCode(err)),
            CliError::Config(err) => write!(f, "[Config] {err}"),
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        CliError::Pipeline(err)
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err)
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.clone())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level().to_string());
    init_logging(&level)?;

    match cli.command {
        Command::Run { plan } => {
            let plan = PlanDocument::load(&plan)?.build()?;
            let result = Executor::new(config.executor_options()).execute(&plan, None)?;
            emit(cli.format, &result)?;
            if let Some(profile) = profile_snapshot(true) {
                eprintln!(
                    "profile: compile_ns={} compiles={} drive_ns={} drives={} steps={} filter_ns={} filters={}",
                    profile.compile_ns,
                    profile.compile_count,
                    profile.drive_ns,
                    profile.drive_count,
                    profile.steps,
                    profile.filter_ns,
                    profile.filter_count
                );
            }
        }
        Command::Explain { plan } => {
            let plan = PlanDocument::load(&plan)?.build()?;
            print!("{}", plan.explain(0));
        }
    }
    Ok(())
}

fn emit(format: OutputFormat, result: &QueryResult) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(result).map_err(PipelineError::from)?;
            println!("{json}");
        }
        OutputFormat::Text => print_rows_text(result),
    }
    Ok(())
}

fn print_rows_text(result: &QueryResult) {
    let header: Vec<&str> = result.schema.names().collect();
    println!("{}", header.join("\t"));
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", cells.join("\t"));
    }
    let noun = if result.rows.len() == 1 { "row" } else { "rows" };
    println!("({} {noun})", result.rows.len());
}
