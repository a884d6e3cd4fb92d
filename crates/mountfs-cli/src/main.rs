//! Mountfs CLI - Command line interface for mounted virtual filesystems
//!
//! Usage:
//!   mountfs --config mounts.json ls file:///root/    # List a directory
//!   mountfs --config mounts.json cat file:///a.txt   # Print a file
//!   echo hi | mountfs write file:///a.txt            # Write stdin to a file
//!   mountfs probe --staging ./stage                  # Check handle API support

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mountfs::{
    FileSystem, HandleFs, HostStorageManager, InMemoryFs, MountFs, MountTableConfig, Support,
};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Mountfs - URI-addressed virtual filesystems
#[derive(Parser, Debug)]
#[command(name = "mountfs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mount table file (JSON). Without it, one in-memory store is mounted at file:///
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log routing decisions (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a file's content
    Cat { address: String },
    /// List a directory
    Ls { address: String },
    /// Show whether an address is a file or a directory
    Stat { address: String },
    /// Create a directory
    Mkdir {
        /// Create missing ancestors; accept an existing directory
        #[arg(short = 'p')]
        parents: bool,
        address: String,
    },
    /// Write stdin (or a host file) to an address
    Write {
        address: String,
        /// Read content from this host file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Remove a file or directory
    Rm { address: String },
    /// List mount bindings in resolution order
    Mounts,
    /// Probe whether host directories work as a handle store
    Probe {
        /// Staging directory to probe
        #[arg(long)]
        staging: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mountfs=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_router(config: Option<&PathBuf>) -> Result<MountFs> {
    match config {
        Some(path) => {
            let table = MountTableConfig::load(path)
                .await
                .with_context(|| format!("Failed to load mount table: {}", path.display()))?;
            table
                .build()
                .await
                .context("Failed to open mounted stores")
        }
        None => {
            let router = MountFs::new();
            router.mount("file:///", Arc::new(InMemoryFs::new()));
            Ok(router)
        }
    }
}

/// Run a filesystem command. Filesystem errors are returned separately so
/// they print as their POSIX message.
async fn run(fs: &MountFs, command: Command) -> Result<mountfs::Result<()>> {
    let mut out: Vec<u8> = Vec::new();
    let outcome = match command {
        Command::Cat { address } => match fs.read_file(&address).await {
            Ok(content) => {
                out.write_all(&content)?;
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Ls { address } => match fs.read_dir(&address).await {
            Ok(mut entries) => {
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                for entry in entries {
                    let suffix = if entry.is_dir() { "/" } else { "" };
                    writeln!(out, "{}{suffix}", entry.name)?;
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Stat { address } => match fs.stat(&address).await {
            Ok(meta) => {
                let kind = if meta.is_dir() { "directory" } else { "file" };
                writeln!(out, "{address}: {kind}")?;
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Mkdir { parents, address } => fs.mkdir(&address, parents).await,
        Command::Write { address, from } => {
            let content = match from {
                Some(path) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read: {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin()
                        .read_to_end(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            fs.write_file(&address, &content).await
        }
        Command::Rm { address } => fs.remove(&address).await,
        Command::Mounts => {
            for mount in fs.mounts() {
                writeln!(out, "{} -> {}", mount.source, mount.target)?;
            }
            Ok(())
        }
        Command::Probe { staging } => {
            let manager = HostStorageManager::new(staging);
            let support = HandleFs::probe_support(&manager).await;
            let answer = match support {
                Support::Supported => "supported",
                Support::Unsupported | Support::Unknown => "unsupported",
            };
            writeln!(out, "{answer}")?;
            Ok(())
        }
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&out)?;
    stdout.flush()?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let fs = open_router(args.config.as_ref()).await?;
    match run(&fs, args.command).await? {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("mountfs: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
