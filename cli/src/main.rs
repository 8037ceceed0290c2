//! CLI for Vantage
//!
//! Talks to a running coordinator over its HTTP API:
//! - launch: start profiling a process on a node
//! - status: show the state of a profiling job
//! - fetch: print the payload of a finished job
//! - wait: poll a job until it finishes, then print the payload
//! - nodes: list the nodes with an open agent connection

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod client;
mod commands;
mod output;

#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "Vantage - cluster profiling coordinator client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Coordinator API base URL
    #[arg(long, global = true, env = "VANTAGE_ENDPOINT", default_value = "http://127.0.0.1:8265")]
    pub endpoint: String,

    /// Bearer token for the coordinator API
    #[arg(long, global = true, env = "VANTAGE_API_TOKEN")]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start profiling a process on a node
    Launch(commands::launch::LaunchArgs),

    /// Show the status of a profiling job
    Status(commands::status::StatusArgs),

    /// Print the payload of a finished profiling job
    Fetch(commands::fetch::FetchArgs),

    /// Wait for a profiling job to finish and print its payload
    Wait(commands::wait::WaitArgs),

    /// List connected nodes
    Nodes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let client = client::ApiClient::new(&cli.global.endpoint, cli.global.token.clone())?;
    let result = match cli.command {
        Commands::Launch(args) => commands::launch::run(&client, args).await,
        Commands::Status(args) => commands::status::run(&client, args).await,
        Commands::Fetch(args) => commands::fetch::run(&client, args).await,
        Commands::Wait(args) => commands::wait::run(&client, args).await,
        Commands::Nodes => commands::nodes::run(&client).await,
    };

    if let Err(e) = &result {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
