use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use healthwatch::config::Config;
use healthwatch::grpc::HealthServer;
use healthwatch::health::ProbeSet;
use healthwatch::observability::init_tracing;

pub fn execute(
    port: Option<u16>,
    config_path: Option<PathBuf>,
    log_level: Option<String>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::load_from(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    if let Some(port) = port {
        config.service.port = port;
    }
    if let Some(level) = log_level {
        config.service.log_level = level;
    }

    init_tracing(&config).context("Failed to initialize tracing")?;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = config.runtime.worker_threads {
        builder.worker_threads(threads.max(1));
    }
    let runtime = builder
        .enable_all()
        .thread_name("healthwatch-worker")
        .build()
        .context("Failed to start async runtime")?;

    display_startup_info(&config);

    let grace = config.health.shutdown_grace();
    let server = HealthServer::new(config, ProbeSet::placeholders());
    runtime
        .block_on(server.serve_with_shutdown())
        .context("Health server failed")?;

    runtime.shutdown_timeout(grace);

    Ok(())
}

fn display_startup_info(config: &Config) {
    let port = config.service.port;

    println!();
    println!("{}", format!("{} {}", config.service.name, config.service.version).bold());
    println!("  Port:        {}", port.to_string().cyan());
    println!("  Environment: {}", config.service.environment);
    println!(
        "  Components:  {}",
        config.health.default_components.join(", ")
    );
    println!();
    println!("{}", "Try it:".bold());
    println!("  healthwatch ping --endpoint http://localhost:{}", port);
    if config.grpc.reflection_enabled {
        println!(
            "  grpcurl -plaintext localhost:{} health.v1.HealthService/Ping",
            port
        );
        println!(
            "  grpcurl -plaintext -d '{{\"components\":[\"database\",\"cache\"],\"include_dependencies\":true}}' \\"
        );
        println!("    localhost:{} health.v1.HealthService/CheckHealth", port);
    }
    println!();
}
