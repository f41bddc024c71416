//! buildkite-ls - Language server for Buildkite pipeline files
//!
//! Runs the LSP server over stdio. Logging goes to stderr so stdout
//! stays clean for JSON-RPC frames.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Language server for Buildkite pipeline files
#[derive(Parser)]
#[command(name = "buildkite-ls", disable_version_flag = true)]
struct Cli {
    /// Show version information
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        print_version();
        return Ok(());
    }

    init_logging();

    tracing::info!("starting buildkite-ls");
    buildkite_lsp::run_stdio_server().await
}

fn print_version() {
    println!("buildkite-ls {}", env!("CARGO_PKG_VERSION"));
    println!("Commit: {}", option_env!("BUILDKITE_LS_COMMIT").unwrap_or("none"));
    println!("Built: {}", option_env!("BUILDKITE_LS_BUILD_DATE").unwrap_or("unknown"));
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
