//! Rowsync CLI
//!
//! Command-line tooling for rowsync nodes.
//!
//! # Commands
//!
//! - `ensure-node-id` - Lease or reuse a unique node id from the server
//! - `show` - Show the cached device key and node id

mod cache;

use cache::NodeIdCache;
use clap::{Parser, Subcommand};
use rowsync_protocol::{RegisterRequest, RegisterResponse, REGISTER_PATH};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit code for transport failures.
const EXIT_TRANSPORT: u8 = 2;
/// Exit code when the server denies the request.
const EXIT_DENIED: u8 = 3;

/// Rowsync node tools.
#[derive(Parser)]
#[command(name = "rowsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lease or reuse a unique node id from the server
    EnsureNodeId {
        /// Server base URL (e.g., http://127.0.0.1:5001)
        #[arg(long)]
        server: String,

        /// Path of the node id cache file
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Show the cached device key and node id
    Show {
        /// Path of the node id cache file
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::EnsureNodeId { server, cache } => cmd_ensure_node_id(&server, cache),
        Commands::Show { cache } => cmd_show(cache),
    }
}

fn cache_path(overridden: Option<PathBuf>) -> PathBuf {
    overridden.unwrap_or_else(|| {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        home.join(".rowsync").join("node.json")
    })
}

fn cmd_ensure_node_id(server: &str, cache: Option<PathBuf>) -> ExitCode {
    let path = cache_path(cache);
    let mut cache = match NodeIdCache::load_or_create(&path) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(node_id) = cache.node_id() {
        debug!(node_id, "using cached node id");
        println!("{node_id}");
        return ExitCode::SUCCESS;
    }

    let node_id = match register(server, cache.device_key()) {
        Ok(node_id) => node_id,
        Err(failure) => {
            eprintln!("error: {failure}");
            return match failure {
                RegisterFailure::Transport(_) => ExitCode::from(EXIT_TRANSPORT),
                RegisterFailure::Denied(_) => ExitCode::from(EXIT_DENIED),
            };
        }
    };

    if let Err(e) = cache.store_node_id(node_id) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    println!("{node_id}");
    ExitCode::SUCCESS
}

fn cmd_show(cache: Option<PathBuf>) -> ExitCode {
    let path = cache_path(cache);
    match NodeIdCache::load_or_create(&path) {
        Ok(cache) => {
            println!("device_key={}", cache.device_key());
            match cache.node_id() {
                Some(node_id) => println!("node_id={node_id}"),
                None => println!("node_id=unset"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug)]
enum RegisterFailure {
    /// The server could not be reached; retryable.
    Transport(String),
    /// The server answered but refused the registration.
    Denied(String),
}

impl std::fmt::Display for RegisterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterFailure::Transport(msg) => write!(f, "transport failure: {msg}"),
            RegisterFailure::Denied(msg) => write!(f, "server denied registration: {msg}"),
        }
    }
}

fn register(server: &str, device_key: &str) -> Result<u16, RegisterFailure> {
    let url = format!("{}{}", server.trim_end_matches('/'), REGISTER_PATH);
    debug!(%url, "registering device");

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| RegisterFailure::Transport(e.to_string()))?;

    let response = client
        .post(&url)
        .json(&RegisterRequest {
            device_key: device_key.to_string(),
        })
        .send()
        .map_err(|e| RegisterFailure::Transport(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(RegisterFailure::Denied(format!("{status}: {body}")));
    }

    let decoded: RegisterResponse = response
        .json()
        .map_err(|e| RegisterFailure::Denied(format!("unreadable response: {e}")))?;
    Ok(decoded.node_id)
}
