use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

mod commands;
mod utils;

/// healthwatch - gRPC health-check service and demo client
#[derive(Parser)]
#[command(name = "healthwatch")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level or filter directive (overrides configuration)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Connection options shared by the client commands
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Server endpoint
    #[arg(
        short,
        long,
        env = "HEALTHWATCH_ENDPOINT",
        default_value = "http://localhost:9090"
    )]
    endpoint: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the health service until SIGINT/SIGTERM
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,

        /// Configuration file (skips the default search path)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Liveness ping
    Ping {
        #[command(flatten)]
        client: ClientArgs,
    },
    /// One-shot aggregated health check
    Check {
        #[command(flatten)]
        client: ClientArgs,

        /// Components to check (server defaults when omitted)
        components: Vec<String>,

        /// Include dependency details
        #[arg(short = 'd', long)]
        include_dependencies: bool,

        /// Per-probe timeout in seconds (0 = server default)
        #[arg(short, long, default_value_t = 0)]
        timeout: i32,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stream periodic health updates
    Watch {
        #[command(flatten)]
        client: ClientArgs,

        /// Components to watch (server defaults when omitted)
        components: Vec<String>,

        /// Seconds between checks (0 = server default)
        #[arg(short, long, default_value_t = 5)]
        interval: i32,

        /// Stop after this many updates
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Walk through every RPC against a running server
    Demo {
        #[command(flatten)]
        client: ClientArgs,
    },
}

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();
    let log_level = cli.log_level;

    // Execute command
    let result = match cli.command {
        Commands::Serve { port, config } => commands::serve::execute(port, config, log_level),
        Commands::Ping { client } => {
            run_client(log_level, commands::ping::execute(client.endpoint))
        }
        Commands::Check {
            client,
            components,
            include_dependencies,
            timeout,
            json,
        } => run_client(
            log_level,
            commands::check::execute(
                client.endpoint,
                components,
                include_dependencies,
                timeout,
                json,
            ),
        ),
        Commands::Watch {
            client,
            components,
            interval,
            count,
        } => run_client(
            log_level,
            commands::watch::execute(client.endpoint, components, interval, count),
        ),
        Commands::Demo { client } => {
            run_client(log_level, commands::demo::execute(client.endpoint))
        }
    };

    // Handle result
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // Show context if available
            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}

/// Run a client command on a default runtime with quiet logging
fn run_client<F>(log_level: Option<String>, command: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let mut config = healthwatch::config::Config::default();
    config.service.log_level = log_level.unwrap_or_else(|| "warn".to_string());
    config.service.log_format = "pretty".to_string();
    healthwatch::observability::init_tracing(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(command)
}
