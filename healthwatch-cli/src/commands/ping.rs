use anyhow::{Context, Result};
use colored::Colorize;

use crate::utils::{connect, format::format_timestamp};

pub async fn execute(endpoint: String) -> Result<()> {
    let mut client = connect(&endpoint).await?;

    print!("Ping ({})... ", endpoint);
    let ping = client.ping().await.context("Ping failed")?;

    println!("{}", "✓ OK".green().bold());
    println!("  Success:   {}", ping.success);
    println!("  Version:   {}", ping.version);
    println!(
        "  Timestamp: {} ({})",
        ping.timestamp_ms,
        format_timestamp(ping.timestamp_ms)
    );

    Ok(())
}
