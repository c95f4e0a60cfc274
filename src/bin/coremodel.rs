//! Coremodel CLI
//!
//! Validates and translates instances against the lineages found in the
//! configured lineages directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use coremodels::{CoremodelConfig, Ordinal, Registry, Runtime};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coremodel")]
#[command(about = "Validate and translate coremodel instances")]
#[command(version)]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Lineage definitions directory (overrides config)
    #[arg(short, long)]
    lineages: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered coremodels and their versions
    List,

    /// Validate an instance against one coremodel version
    Validate {
        /// Coremodel name
        #[arg(short = 'm', long)]
        coremodel: String,
        /// Version to validate against (defaults to current)
        #[arg(short, long)]
        version: Option<Ordinal>,
        /// Instance file (JSON)
        file: PathBuf,
    },

    /// Translate an instance between two versions
    Translate {
        #[arg(short = 'm', long)]
        coremodel: String,
        #[arg(short, long)]
        from: Ordinal,
        /// Target version (defaults to current)
        #[arg(short, long)]
        to: Option<Ordinal>,
        /// Instance file (JSON)
        file: PathBuf,
    },

    /// Validate an instance against every coremodel and print a JSON report
    Report {
        /// Instance file (JSON)
        file: PathBuf,
        /// Output file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn read_instance(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Build every coremodel in the configured lineages directory, or fail as a whole
fn load_registry(config: &CoremodelConfig) -> anyhow::Result<Registry> {
    let runtime = Runtime::new(config.runtime.clone()).context("starting schema runtime")?;
    let lineages_dir = config.lineages_dir();
    Registry::load_dir(&runtime, &lineages_dir)
        .with_context(|| format!("building registry from {}", lineages_dir.display()))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CoremodelConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.lineages {
        config.registry.lineages_dir = dir;
    }

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }

        Commands::List => {
            let registry = load_registry(&config)?;
            if registry.is_empty() {
                println!("No coremodels found in {}", config.lineages_dir().display());
            }
            for model in registry.all() {
                let lineage = model.lineage();
                let versions: Vec<String> = lineage
                    .versions()
                    .iter()
                    .map(|v| {
                        if v.is_deprecated() {
                            format!("{} (deprecated)", v.ordinal())
                        } else {
                            v.ordinal().to_string()
                        }
                    })
                    .collect();
                println!("{}  current={}  versions=[{}]", model.name(), model.current_version(), versions.join(", "));
                println!("    fingerprint {}", lineage.fingerprint());
            }
            Ok(())
        }

        Commands::Validate {
            coremodel,
            version,
            file,
        } => {
            let registry = load_registry(&config)?;
            let model = registry.get(&coremodel)?;
            let version = version.unwrap_or_else(|| model.current_version());
            let instance = read_instance(&file)?;

            match model.validate(&instance, version) {
                Ok(()) => {
                    println!("✅ {} conforms to {} v{}", file.display(), coremodel, version);
                    Ok(())
                }
                Err(coremodels::Error::Validation(e)) => {
                    println!("❌ {} does not conform to {} v{}", file.display(), coremodel, version);
                    for violation in &e.violations {
                        println!("   └─ {}", violation);
                    }
                    std::process::exit(1);
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Translate {
            coremodel,
            from,
            to,
            file,
        } => {
            let registry = load_registry(&config)?;
            let model = registry.get(&coremodel)?;
            let to = to.unwrap_or_else(|| model.current_version());
            let instance = read_instance(&file)?;
            let translated = model.translate(&instance, from, to)?;
            println!("{}", serde_json::to_string_pretty(&translated)?);
            Ok(())
        }

        Commands::Report { file, output } => {
            let registry = load_registry(&config)?;
            let instance = read_instance(&file)?;
            let reports = registry.validate_all(&instance);
            let matched = reports.iter().filter(|r| r.is_valid()).count();

            let report = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "instance": file.display().to_string(),
                "coremodels": reports.len(),
                "matched": matched,
                "results": reports,
            });
            let report_json = serde_json::to_string_pretty(&report)?;

            if let Some(path) = output {
                std::fs::write(&path, &report_json)?;
                println!("✅ Report written to {:?}", path);
            } else {
                println!("{}", report_json);
            }

            if matched == 0 && !reports.is_empty() {
                bail!("instance conforms to no registered coremodel");
            }
            Ok(())
        }
    }
}
