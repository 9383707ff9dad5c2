use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use arcs_engine::{Engine, EngineConfig};
use arcs_store::SqliteProfileStore;
use clap::{Parser, Subcommand};
use commands::{
    group::{CohortArgs, GroupArgs},
    import::{self, ImportArgs},
};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "arcs-sim", about = "ARCS motivation clustering and study-group CLI")]
struct Cli {
    /// SQLite database holding the student profiles.
    #[arg(long, global = true, default_value = "arcs.sqlite")]
    db: PathBuf,
    /// YAML engine configuration; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write the JSON result here instead of stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record ARCS responses from a CSV file.
    Import(ImportArgs),
    /// Re-cluster every complete profile and store the labels.
    Cluster,
    /// Report class metrics and a priority-mode recommendation.
    Analyze(CohortArgs),
    /// Form study groups.
    Group(GroupArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    debug!(db = %cli.db.display(), "opening profile store");
    let store = SqliteProfileStore::open(&cli.db)?;
    let engine = Engine::new(store, config)?;

    match &cli.command {
        Command::Import(args) => import::run(args, engine.store()),
        Command::Cluster => match engine.cluster_motivation()? {
            Some(outcome) => emit(cli.out.as_deref(), &outcome),
            None => {
                warn!("fewer than three separable ARCS vectors; labels left unchanged");
                emit(cli.out.as_deref(), &serde_json::Value::Null)
            }
        },
        Command::Analyze(args) => {
            let analysis = engine.analyze_class(args.filter().as_ref())?;
            emit(cli.out.as_deref(), &analysis)
        }
        Command::Group(args) => {
            let outcome = engine.form_groups(&args.request()?)?;
            emit(cli.out.as_deref(), &outcome)
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn emit<T: Serialize>(out: Option<&Path>, value: &T) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
