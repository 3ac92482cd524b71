//! Descript CLI entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use descript_cli::config::resolve_plan_path;
use descript_cli::extract::extract_from_file;
use descript_cli::materialize::{render, OutputFormat};
use descript_cli::plan::Plan;
use descript_cli::types::CliResult;

#[derive(Parser)]
#[command(
    name = "descript",
    about = "Defer, regroup and rewrite a page's scripts without losing document order",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the managed scripts found in a page as JSON.
    Extract {
        /// HTML page to scan.
        page: PathBuf,
    },

    /// Run a partition plan over a page and print the resulting containers.
    Apply {
        /// HTML page to scan.
        page: PathBuf,

        /// Plan file. Falls back to DESCRIPT_PLAN, then .descript/plan.json.
        #[arg(short, long)]
        plan: Option<String>,

        /// Print only this container.
        #[arg(short, long)]
        container: Option<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,

        /// Print the plan report as JSON to stderr.
        #[arg(long)]
        report: bool,
    },

    /// Summarize a page's containers and registered predicates as JSON.
    Info {
        /// HTML page to scan.
        page: PathBuf,

        /// Plan file to apply first.
        #[arg(short, long)]
        plan: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   descript completions bash > ~/.local/share/bash-completion/completions/descript
    ///   descript completions zsh > ~/.zfunc/_descript
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl {
        /// Page to load on start.
        page: Option<PathBuf>,

        /// Plan to run over the page on load.
        #[arg(short, long)]
        plan: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "descript", &mut std::io::stdout());
        }

        Commands::Repl { page, plan } => {
            let plan = resolve_plan_path(plan.as_deref());
            descript_cli::repl::run(page.as_deref(), plan.as_deref())?;
        }

        command => {
            if let Err(e) = run(command) {
                eprintln!("Error: {e}");
                std::process::exit(e.exit_code());
            }
        }
    }

    Ok(())
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Extract { page } => {
            let scripts = extract_from_file(&page)?;
            println!("{}", serde_json::to_string_pretty(&scripts)?);
        }

        Commands::Apply {
            page,
            plan,
            container,
            format,
            report,
        } => {
            let plan = load_plan(plan.as_deref())?;
            let (registry, plan_report) = plan.run(extract_from_file(&page)?)?;
            if report {
                eprintln!("{}", serde_json::to_string_pretty(&plan_report)?);
            }

            let output = match container {
                Some(name) => {
                    let mut views = std::collections::BTreeMap::new();
                    views.insert(name.as_str(), registry.get(&name)?);
                    render(&views, format)?
                }
                None => render(&registry.get_all(), format)?,
            };
            println!("{output}");
        }

        Commands::Info { page, plan } => {
            let plan = load_plan(plan.as_deref())?;
            let (registry, _) = plan.run(extract_from_file(&page)?)?;
            let containers: serde_json::Map<String, serde_json::Value> = registry
                .get_all()
                .into_iter()
                .map(|(name, entries)| (name.to_string(), entries.len().into()))
                .collect();
            let info = serde_json::json!({
                "page": page.display().to_string(),
                "scripts": registry.len(),
                "inline": registry.entries().iter().filter(|e| e.is_inline()).count(),
                "containers": containers,
                "predicates": registry.predicates().names(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { .. } | Commands::Repl { .. } => {}
    }

    Ok(())
}

/// Load the resolved plan, or an empty one when none is configured.
fn load_plan(explicit: Option<&str>) -> CliResult<Plan> {
    match resolve_plan_path(explicit) {
        Some(path) => Plan::load(&path),
        None => {
            tracing::debug!("No plan configured, using an empty plan");
            Ok(Plan::default())
        }
    }
}
