use anyhow::Context;
use clap::{Parser, Subcommand};
use mesh_composer::compose::Assembly;
use mesh_composer::config::Settings;
use mesh_composer::spec::TopologySpec;
use mesh_composer::{assembly, render};
use std::path::PathBuf;
use tracing::info;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "mesh-compose")]
#[command(about = "Compose mesh-enabled services into a desired-state document", long_about = None)]
struct Cli {
    /// Settings file (TOML). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the assembly and emit the JSON document.
    Synth {
        /// Topology file (TOML or JSON). Uses the built-in greeter app if omitted.
        #[arg(long)]
        topology: Option<PathBuf>,

        /// Write to this file instead of stdout.
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Print the call graph as Graphviz DOT.
    Graph {
        #[arg(long)]
        topology: Option<PathBuf>,
    },
    /// Print a human-readable plan.
    Plan {
        #[arg(long)]
        topology: Option<PathBuf>,
    },
    /// Parse and validate a topology file without rendering.
    Validate {
        #[arg(long)]
        topology: PathBuf,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(p) => Settings::load(p).with_context(|| format!("load settings {}", p.display())),
        None => Ok(Settings::default()),
    }
}

fn build(topology: Option<&PathBuf>, settings: &Settings) -> Result<Assembly> {
    match topology {
        Some(path) => {
            let spec = TopologySpec::load(path)
                .with_context(|| format!("load topology {}", path.display()))?;
            spec.validate_and_build(settings)
                .with_context(|| format!("build topology {}", path.display()))
        }
        None => assembly::greeter(settings).context("build greeter assembly"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;
    settings.init_logging();

    match cli.cmd {
        Commands::Synth { topology, out } => {
            let assembly = build(topology.as_ref(), &settings)?;
            let json = render::render_document(&assembly)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("write {}", path.display()))?;
                    info!(path = %path.display(), "wrote document");
                }
                None => println!("{json}"),
            }
        }
        Commands::Graph { topology } => {
            let assembly = build(topology.as_ref(), &settings)?;
            print!("{}", render::render_dot(&assembly));
        }
        Commands::Plan { topology } => {
            let assembly = build(topology.as_ref(), &settings)?;
            print!("{}", render::render_summary(&assembly));
        }
        Commands::Validate { topology } => {
            let assembly = build(Some(&topology), &settings)?;
            println!(
                "{}: {} services, {} connections OK",
                topology.display(),
                assembly.services().count(),
                assembly.edges().len()
            );
        }
    }

    Ok(())
}
