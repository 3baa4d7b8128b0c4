//! Binary entrypoint for the Dramaturg command-line tool.
//!
//! ```bash
//! # Analyze a script file, report on stdout
//! dramaturg analyze script.fountain
//!
//! # From stdin, with run options and the full result as JSON
//! cat draft.txt | dramaturg analyze - --options '{"genre_hint": "thriller"}' --json
//!
//! # Show the active compliance principles
//! dramaturg --config dramaturg.yaml principles
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dramaturg::{standard_orchestrator, AppConfig, RawInput};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "dramaturg")]
#[command(version, about = "Seven-station script analysis", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $DRAMATURG_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline on a script
    Analyze {
        /// Script file, or "-" for stdin
        #[arg(default_value = "-")]
        path: PathBuf,

        /// Run options as a JSON object
        #[arg(short, long)]
        options: Option<String>,

        /// Print the whole result as JSON instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Print the active compliance principles as YAML
    Principles,
}

fn read_script(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading script from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn parse_options(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw).context("parsing --options")? {
        Value::Object(options) => Ok(options),
        other => bail!("--options must be a JSON object, got {}", other),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { path, options, json } => {
            let text = read_script(&path)?;
            let options = parse_options(options.as_deref())?;
            let orchestrator = standard_orchestrator(&config, None)?;
            let result = orchestrator
                .run_pipeline(RawInput::structured(text, options))
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.final_report);
            }
            if let Some(flag) = &result.report_meta.compliance_flag {
                eprintln!(
                    "compliance: {:.2} below threshold {:.2}",
                    flag.score, flag.threshold
                );
                for recommendation in &flag.recommendations {
                    eprintln!("  - {}", recommendation);
                }
            }
        }
        Commands::Principles => {
            print!("{}", config.compliance.to_yaml()?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dramaturg=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
