//! nixfleet
//!
//! Runs flake, package and rolling NixOS node updates

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nixfleet_core::{
    CoreError, FleetOrchestrator, FleetReport, check_dependencies, discover_nodes, update_flake,
    update_package, update_packages,
};
use nixfleet_exec::{CommandRunner, ProcessRunner};

use crate::config::Config;

mod config;
mod render;

const NODE_DEPENDENCIES: &[&str] = &["nix", "ssh", "nixos-rebuild"];
const PACKAGE_DEPENDENCIES: &[&str] = &["nix-update"];

#[derive(Parser)]
#[command(name = "nixfleet")]
#[command(about = "Run updates on NixOS nodes", long_about = None)]
struct Cli {
    /// Debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to nixfleet.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run updates
    #[command(subcommand, visible_alias = "u")]
    Update(UpdateCommands),

    /// Print the version
    #[command(visible_alias = "v")]
    Version,
}

#[derive(Subcommand)]
enum UpdateCommands {
    /// Run updates on NixOS nodes
    #[command(visible_alias = "n")]
    Node(NodeArgs),

    /// Run `nix flake update`
    #[command(visible_alias = "f")]
    Flake,

    /// Run nix-update on packages, or on every updatable local package
    #[command(visible_alias = "p")]
    Package(PackageArgs),

    /// Run all updates: flake, local packages and every node
    #[command(visible_alias = "a")]
    All(AllArgs),
}

#[derive(Args)]
struct NodeArgs {
    /// Comma-separated list of nodes
    nodes: Option<String>,

    /// Run updates on all nodes
    #[arg(short, long)]
    all_nodes: bool,

    /// Reboot nodes that need it after updating
    #[arg(short, long)]
    reboot: bool,

    /// Update the local flake first
    #[arg(long)]
    update_flake: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PackageArgs {
    /// Comma-separated list of packages
    packages: Option<String>,

    /// Directory containing local package definitions
    #[arg(long)]
    pkg_dir: Option<PathBuf>,
}

#[derive(Args)]
struct AllArgs {
    /// Reboot nodes that need it after updating
    #[arg(short, long)]
    reboot: bool,

    /// Directory containing local package definitions
    #[arg(long)]
    pkg_dir: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(debug: bool, log_level: &str) {
    let level = if debug { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Split a comma-separated CLI list, dropping empty entries
fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

struct App {
    config: Config,
    runner: Arc<dyn CommandRunner>,
}

impl App {
    /// Run the orchestrator and print its report
    ///
    /// Returns whether every node finished without failing.
    async fn update_nodes(&self, nodes: Vec<String>, reboot: bool, json: bool) -> Result<bool> {
        if nodes.is_empty() {
            return Err(eyre::eyre!(CoreError::NoNodes)
                .wrap_err("couldn't find any nodes in the node list, cowardly aborting"));
        }

        let orchestrator = FleetOrchestrator::new(self.config.fleet_config(), self.runner.clone());
        let mut events = orchestrator.subscribe();

        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(line) = render::event_line(&event) {
                            eprintln!("{line}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "progress output fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let report = orchestrator.run(&nodes, reboot || self.config.fleet.reboot).await;

        // Dropping the last sender ends the printer
        drop(orchestrator);
        let _ = printer.await;

        self.print_report(&report, json)?;
        Ok(!report.has_failures())
    }

    fn print_report(&self, report: &FleetReport, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            println!("{}", render::report_text(report));
        }
        Ok(())
    }

    async fn update_flake(&self) -> bool {
        update_flake(self.runner.as_ref(), self.config.flake_dir())
            .await
            .success()
    }

    async fn update_packages(&self, pkg_dir: Option<PathBuf>) -> Result<bool> {
        let pkg_dir = pkg_dir.unwrap_or_else(|| self.config.packages.pkg_dir.clone());
        info!(pkg_dir = %pkg_dir.display(), "updating locally defined packages");

        let report = update_packages(self.runner.as_ref(), &pkg_dir, &self.config.packages.marker).await?;
        println!("{}", render::package_text(&report));
        Ok(report.failed.is_empty())
    }

    /// Flake, local packages, then every discovered node
    ///
    /// A flake or package failure does not stop the node updates, but it
    /// still fails the whole run.
    async fn update_all(&self, args: AllArgs) -> Result<bool> {
        let flake_ok = self.update_flake().await;
        let packages_ok = self.update_packages(args.pkg_dir).await?;

        let nodes = discover_nodes(self.runner.as_ref(), &self.config.fleet.flake).await?;
        let nodes_ok = self.update_nodes(nodes, args.reboot, args.json).await?;

        if !flake_ok {
            warn!("flake update failed");
        }
        if !packages_ok {
            warn!("some packages failed to update");
        }
        Ok(flake_ok && packages_ok && nodes_ok)
    }

    async fn run(&self, command: UpdateCommands) -> Result<ExitCode> {
        match command {
            UpdateCommands::Node(args) => {
                check_dependencies(NODE_DEPENDENCIES)?;

                if args.update_flake {
                    self.update_flake().await;
                }

                let nodes = if args.all_nodes {
                    info!("running updates on all nodes");
                    discover_nodes(self.runner.as_ref(), &self.config.fleet.flake).await?
                } else if let Some(list) = args.nodes.as_deref() {
                    split_list(list)
                } else {
                    eyre::bail!(
                        "must specify either `--all-nodes` or a comma-separated list of nodes to update"
                    );
                };

                let ok = self.update_nodes(nodes, args.reboot, args.json).await?;
                Ok(exit_code(!ok))
            }
            UpdateCommands::Flake => Ok(exit_code(!self.update_flake().await)),
            UpdateCommands::Package(args) => {
                check_dependencies(PACKAGE_DEPENDENCIES)?;

                let Some(list) = args.packages.as_deref() else {
                    return Ok(exit_code(!self.update_packages(args.pkg_dir).await?));
                };

                let pkg_dir = args
                    .pkg_dir
                    .unwrap_or_else(|| self.config.packages.pkg_dir.clone());
                let mut ok = true;
                for name in split_list(list) {
                    ok &= update_package(self.runner.as_ref(), &name, &pkg_dir)
                        .await
                        .success();
                }
                Ok(exit_code(!ok))
            }
            UpdateCommands::All(args) => {
                let deps: Vec<&str> = PACKAGE_DEPENDENCIES
                    .iter()
                    .chain(NODE_DEPENDENCIES)
                    .copied()
                    .collect();
                check_dependencies(&deps)?;

                Ok(exit_code(!self.update_all(args).await?))
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Config::locate);
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    init_tracing(cli.debug, &config.log_level);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => warn!("no config file found, using defaults"),
    }

    let update = match cli.command {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Update(update) => update,
    };

    let app = App {
        config,
        runner: Arc::new(ProcessRunner::new()),
    };
    app.run(update).await
}
