/// Main entry point for the Diet Coach MCP server
///
/// This file sets up logging, parses command line arguments, and starts the MCP server.
/// The server listens for JSON-RPC requests over stdin/stdout following the MCP protocol.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use diet_coach::config::{DEFAULT_API_BASE_URL, DEFAULT_APP_ID, DEFAULT_MODEL};
use diet_coach::{Config, DietCoachServer};

/// Get the default database path, falling back through the usual user directories
fn get_default_database_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let potential_paths = [
        dirs::home_dir().map(|mut p| {
            p.push(".diet_coach");
            p
        }),
        dirs::data_dir().map(|mut p| {
            p.push("diet_coach");
            p
        }),
        dirs::config_dir().map(|mut p| {
            p.push("diet_coach");
            p
        }),
        std::env::current_dir().ok().map(|mut p| {
            p.push(".diet_coach");
            p
        }),
    ];

    for potential_path in potential_paths.iter().flatten() {
        if std::fs::create_dir_all(potential_path).is_ok() {
            // Only use the directory if we can actually write there
            let test_file = potential_path.join(".test_write");
            if std::fs::write(&test_file, "test").is_ok() {
                let _ = std::fs::remove_file(&test_file);
                return Ok(potential_path.join("diet.db"));
            }
        }
    }

    let mut temp_path = std::env::temp_dir();
    temp_path.push("diet_coach");
    std::fs::create_dir_all(&temp_path)?;
    temp_path.push("diet.db");

    tracing::warn!("Using temporary directory for database: {}", temp_path.display());
    Ok(temp_path)
}

/// Command line arguments for the Diet Coach MCP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    /// If not provided, uses a default location in the user's home directory
    #[arg(long, env = "DIET_COACH_DATABASE")]
    database: Option<PathBuf>,

    /// Application id that partitions stored data
    #[arg(long, env = "DIET_COACH_APP_ID", default_value = DEFAULT_APP_ID)]
    app_id: String,

    /// Gemini API key used by the AI tools
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Gemini model name
    #[arg(long, env = "DIET_COACH_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of the generative language API
    #[arg(long, env = "DIET_COACH_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Retries after the first attempt for rate limits and server errors
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Delay before the first retry in milliseconds, doubled each retry
    #[arg(long, default_value_t = 1000)]
    initial_delay_ms: u64,

    /// Per-attempt HTTP timeout in seconds
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("diet_coach={}", log_level))
        .with_writer(std::io::stderr) // stdout carries the protocol
        .init();

    info!("Starting Diet Coach MCP server");

    let db_path = match args.database {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            path
        }
        None => get_default_database_path()?,
    };

    info!("Using database at: {}", db_path.display());

    let config = Config {
        app_id: args.app_id,
        api_key: args.api_key,
        model: args.model,
        api_base_url: args.api_base_url,
        max_retries: args.max_retries,
        initial_delay_ms: args.initial_delay_ms,
        request_timeout_secs: args.request_timeout_secs,
        ..Config::new(db_path)
    };

    let server = DietCoachServer::new(config).await?;
    server.run().await?;

    info!("Diet Coach MCP server shutdown complete");
    Ok(())
}
