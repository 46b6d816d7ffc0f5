//! CLI entry point for the Vigil backup freshness tracker.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use vigil_core::ServerStatus;
use vigil_store::{CatalogStore, GraphStore, MemoryStore};

use vigil_scan::config::{effective_config, load_graph_config, load_scan_config};
use vigil_scan::error::ScanError;
use vigil_scan::listing::{sort_files, sort_servers, FileSortKey, ServerSortKey};
use vigil_scan::orchestrator::{ProbePrivilege, ScanOrchestrator, ScanOutcome};
use vigil_scan::probe::NetworkProbe;
use vigil_scan::scanner::NmapScanner;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Backup freshness tracker: crawls backup storage and discovers servers")]
struct Cli {
    /// Config file prefix (default: vigil).
    #[arg(short, long, default_value = "vigil", global = true)]
    config: String,

    /// Keep the catalogue in memory instead of Neo4j.
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Human-readable logs instead of JSON.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the file catalogue from the configured backup roots.
    ScanDirs,
    /// Discover servers on the configured subnets.
    ScanServers {
        /// Treat the process as privileged even when not running as root.
        #[arg(long)]
        assume_privileged: bool,
    },
    /// Backup freshness of every known server.
    Status {
        #[arg(long)]
        json: bool,
        #[arg(long, value_enum)]
        sort: Option<ServerSortKey>,
        /// Sort descending.
        #[arg(long)]
        desc: bool,
    },
    /// List known servers with their fingerprint and backup status.
    Servers {
        #[arg(long)]
        json: bool,
        #[arg(long, value_enum)]
        sort: Option<ServerSortKey>,
        /// Sort descending.
        #[arg(long)]
        desc: bool,
    },
    /// List the file catalogue.
    Files {
        #[arg(long)]
        json: bool,
        #[arg(long, value_enum)]
        sort: Option<FileSortKey>,
        /// Sort descending.
        #[arg(long)]
        desc: bool,
    },
    /// Show the effective configuration.
    Config {
        #[arg(long)]
        json: bool,
    },
    /// Forget every discovered server.
    ClearServers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.pretty {
        fmt().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).json().init();
    }

    if let Command::Config { json } = cli.command {
        print_config(&cli.config, json)?;
        return Ok(());
    }

    // Before any store or network I/O.
    let privilege = preflight(&cli.command, running_as_root())?;

    let scan_config = load_scan_config(&cli.config);
    let store = open_store(&cli).await?;

    let scanner = Arc::new(NmapScanner::new(
        &scan_config.nmap_path,
        Duration::from_secs(scan_config.host_timeout_secs),
    ));
    let probe: Arc<dyn NetworkProbe> = scanner.clone();
    let orchestrator = ScanOrchestrator::new(scan_config, store, probe, privilege);

    match cli.command {
        Command::ScanDirs => match orchestrator.run_directory_scan().await? {
            ScanOutcome::Completed(summary) => {
                for (root, count) in &summary.per_root_file_counts {
                    println!("{}: {count} files", root.display());
                }
                println!("Total: {} files", summary.total_files);
            }
            ScanOutcome::Empty => println!("No backup files found"),
        },
        Command::ScanServers { .. } => {
            let version = scanner.verify_installation().await?;
            tracing::info!(nmap_version = %version.lines().next().unwrap_or_default(), "Nmap verified");

            match orchestrator.run_server_scan().await? {
                ScanOutcome::Completed(summary) => {
                    for (subnet, count) in &summary.per_subnet_counts {
                        println!("{subnet}: {count} servers");
                    }
                    println!("Total: {} servers", summary.server_count);
                }
                ScanOutcome::Empty => println!("No servers found"),
            }
        }
        Command::Status { json, sort, desc } => {
            let mut report = orchestrator.freshness_report(chrono::Utc::now()).await?;
            if let Some(key) = sort {
                sort_servers(&mut report, key, desc);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for entry in &report {
                    let latest = entry
                        .latest_backup
                        .as_ref()
                        .map(|f| f.filename.as_str())
                        .unwrap_or("-");
                    println!(
                        "{:<8} {:<32} {:<16} {}",
                        entry.status,
                        entry.server.hostname,
                        entry.server.ip_address.as_deref().unwrap_or("-"),
                        latest
                    );
                }
            }
        }
        Command::Servers { json, sort, desc } => {
            let mut report = orchestrator.freshness_report(chrono::Utc::now()).await?;
            if let Some(key) = sort {
                sort_servers(&mut report, key, desc);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for entry in &report {
                    println!("{}", server_line(entry));
                }
            }
        }
        Command::Files { json, sort, desc } => {
            let mut files = orchestrator.list_files().await?;
            if let Some(key) = sort {
                sort_files(&mut files, key, desc);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    println!(
                        "{}  {:>12}  {}",
                        file.last_modified.format("%Y-%m-%d %H:%M"),
                        file.size,
                        file.filepath
                    );
                }
            }
        }
        Command::ClearServers => {
            orchestrator.clear_servers().await?;
            println!("Server catalogue cleared");
        }
        Command::Config { .. } => {}
    }

    Ok(())
}

/// Checks that need neither the store nor the network. Returns the probe
/// privilege the orchestrator runs with.
fn preflight(command: &Command, running_as_root: bool) -> Result<ProbePrivilege, ScanError> {
    match command {
        Command::ScanServers { assume_privileged } => {
            let privilege = if *assume_privileged || running_as_root {
                ProbePrivilege::granted()
            } else {
                ProbePrivilege::denied()
            };
            privilege.require()?;
            Ok(privilege)
        }
        _ => Ok(ProbePrivilege::denied()),
    }
}

fn server_line(entry: &ServerStatus) -> String {
    let server = &entry.server;
    let ports = server.open_ports_display();
    format!(
        "{:<8} {:<32} {:<16} {:<24} {:<5} {}  {}",
        entry.status,
        server.hostname,
        server.ip_address.as_deref().unwrap_or("-"),
        server.detected_os,
        if server.is_reachable { "up" } else { "down" },
        server.last_scan.format("%Y-%m-%d %H:%M"),
        if ports.is_empty() { "-" } else { ports.as_str() },
    )
}

fn print_config(file_prefix: &str, json: bool) -> anyhow::Result<()> {
    let effective = effective_config(file_prefix);
    if json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    println!("nmap_path: {}", effective.scan.nmap_path);
    println!("host_timeout_secs: {}", effective.scan.host_timeout_secs);
    println!("neo4j: {} (user {})", effective.neo4j_uri, effective.neo4j_user);
    println!("directories_to_scan:");
    for dir in &effective.targets.directories {
        println!("  {}", dir.display());
    }
    println!("subnets_to_scan:");
    for subnet in &effective.targets.subnets {
        println!("  {subnet}");
    }
    Ok(())
}

async fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn CatalogStore>> {
    if cli.ephemeral {
        tracing::info!("Using in-memory catalogue");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let graph_config = load_graph_config(&cli.config);
    let graph = GraphStore::connect(&graph_config).await?;
    Ok(Arc::new(graph))
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}
