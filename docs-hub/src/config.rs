//! Runtime configuration from command-line flags with environment fallbacks.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_LOG: &str = "info,tower_http=debug";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-process tables, lost on exit
    Memory,
    /// One JSON file per record under the data directory
    File,
}

#[derive(Parser, Debug, Default)]
#[command(name = "docs-hub")]
#[command(about = "Section and document tree service for the operations console")]
pub struct Cli {
    /// Listen address [env: DOCS_HUB_ADDR]
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Storage backend [env: DOCS_HUB_BACKEND]
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Directory for the file backend [env: DOCS_HUB_DATA_DIR]
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Log filter directives [env: RUST_LOG]
    #[arg(short, long)]
    pub log: Option<String>,

    /// Skip eager renumbering of gapped sibling groups during listings
    #[arg(long)]
    pub no_repair: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    pub log: String,
    pub repair_on_read: bool,
}

/// Resolve flags against the process environment.
pub fn load_config(cli: Cli) -> Result<Config> {
    resolve(cli, |key| std::env::var(key).ok())
}

/// Flags win over environment values, which win over defaults.
pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let addr = cli
        .addr
        .or_else(|| env("DOCS_HUB_ADDR"))
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| anyhow!("invalid listen address {:?}: {}", addr, e))?;

    let backend = match cli.backend {
        Some(kind) => kind,
        None => match env("DOCS_HUB_BACKEND") {
            Some(name) => BackendKind::from_str(&name, true)
                .map_err(|_| anyhow!("unknown backend {:?} (expected memory or file)", name))?,
            None => BackendKind::File,
        },
    };

    let data_dir = cli
        .data_dir
        .or_else(|| env("DOCS_HUB_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let log = cli
        .log
        .or_else(|| env("RUST_LOG"))
        .unwrap_or_else(|| DEFAULT_LOG.to_string());

    Ok(Config {
        addr,
        backend,
        data_dir,
        log,
        repair_on_read: !cli.no_repair,
    })
}
