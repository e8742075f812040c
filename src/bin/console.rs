//! Operator console CLI

use anyhow::Context;
use clap::{Parser, Subcommand};
use kvconsole::logs::Severity;
use kvconsole::{Console, ConsoleConfig, MetricsSnapshot, ReadOutcome, StreamState};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kvconsole")]
#[command(about = "Operator console for a self-hosted key-value cluster")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./kvconsole.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Control-plane URL
    #[arg(long, global = true)]
    controller: Option<String>,

    /// Host the nodes listen on
    #[arg(long, global = true)]
    node_host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the nodes known to the control plane
    Nodes,

    /// Start a node
    Add {
        /// Port for the new node
        port: u16,
    },

    /// Stop a node
    Remove {
        /// Port of the node to stop
        port: u16,
    },

    /// Write a key to every node
    Write { key: String, value: String },

    /// Read a key from the first node that answers
    Read { key: String },

    /// Poll metrics until interrupted
    Watch {
        /// Also print each node's full state dump
        #[arg(long)]
        dump: bool,

        /// Polling period override (e.g. "2s")
        #[arg(long)]
        interval: Option<String>,
    },

    /// Tail one node's log until interrupted
    Logs {
        /// Node port
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConsoleConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(controller) = cli.controller {
        config.controller_url = controller;
    }
    if let Some(node_host) = cli.node_host {
        config.node_host = node_host;
    }
    if let Commands::Watch {
        interval: Some(interval),
        ..
    } = &cli.command
    {
        config.poll_interval = interval.clone();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut console = Console::new(config)?;

    match cli.command {
        Commands::Nodes => {
            let nodes = console.lifecycle().sync().await?;
            if nodes.is_empty() {
                println!("No active nodes");
            }
            for node in nodes {
                println!("{}", node);
            }
        }

        Commands::Add { port } => {
            console.lifecycle().sync().await?;
            let node = console.lifecycle().add_node(port).await?;
            println!("Started {}", node);
        }

        Commands::Remove { port } => {
            console.lifecycle().sync().await?;
            let node = console.lifecycle().remove_node(port).await?;
            println!("Stopped node on port {}", node.port);
        }

        Commands::Write { key, value } => {
            console.lifecycle().sync().await?;
            let report = console.fanout().write(&key, &value).await?;
            for (port, outcome) in &report.outcomes {
                println!("  {}: {:?}", port, outcome);
            }
            if report.is_success() {
                println!("Success!");
            } else {
                anyhow::bail!("Failed to add {}: no node acknowledged the write", key);
            }
        }

        Commands::Read { key } => {
            console.lifecycle().sync().await?;
            match console.fanout().read(&key).await? {
                ReadOutcome::Found { port, value } => {
                    println!("Result (node {}): {}", port, value);
                }
                ReadOutcome::NotFound { port } => {
                    println!("{} does not exist (node {})", key, port);
                }
                outcome @ ReadOutcome::Exhausted { .. } => {
                    outcome.into_result(&key)?;
                }
            }
        }

        Commands::Watch { dump, .. } => {
            watch(&mut console, dump, interrupted()).await?;
        }

        Commands::Logs { port } => {
            tail(&mut console, port, interrupted()).await?;
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
}

/// Print every published snapshot until `interrupt` resolves.
async fn watch(
    console: &mut Console,
    dump: bool,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    if let Err(e) = console.lifecycle().sync().await {
        tracing::warn!("Starting with an empty registry: {}", e);
    }
    let mut snapshots = console.aggregator().subscribe();
    console.start_polling();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(&snapshot, dump)?;
                // membership changes land in the next cycle
                if let Err(e) = console.lifecycle().sync().await {
                    tracing::warn!("Registry sync failed: {}", e);
                }
            }
        }
    }
    console.shutdown().await;
    Ok(())
}

/// Print `port`'s log lines until `interrupt` resolves or the stream closes.
async fn tail(
    console: &mut Console,
    port: u16,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let mut lines = console.logs().lines();
    console.logs_mut().select(port).await?;
    let mut check = tokio::time::interval(Duration::from_secs(1));
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => break,
            line = lines.recv() => match line {
                Ok(line) => println!("{:>5} | {}", tag(line.severity), line.text),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} log lines", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = check.tick() => {
                if console.logs().state() == StreamState::Closed(port) {
                    eprintln!("Log stream for node {} closed", port);
                    break;
                }
            }
        }
    }
    console.shutdown().await;
    Ok(())
}

fn tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "ERROR",
        Severity::Warn => "WARN",
        Severity::Info => "INFO",
        Severity::Plain => "",
    }
}

fn print_snapshot(snapshot: &MetricsSnapshot, dump: bool) -> anyhow::Result<()> {
    let taken_at = snapshot
        .taken_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!("=== cycle {} at {} ===", snapshot.cycle, taken_at);
    if snapshot.is_empty() {
        println!("No nodes registered");
    }
    for port in snapshot.ports() {
        let leader = if snapshot.is_leader(port) { " (leader)" } else { "" };
        println!("Port {}{}", port, leader);
        if let Some(metrics) = snapshot.metrics.get(&port) {
            println!("{}", serde_json::to_string_pretty(metrics)?);
        }
        if dump {
            if let Some(data) = snapshot.dumps.get(&port) {
                println!("data: {}", serde_json::to_string_pretty(data)?);
            }
        }
    }
    Ok(())
}
