use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use futures::StreamExt;
use healthwatch::client::HealthClient;

use crate::utils::{
    connect,
    format::{format_timestamp, print_result, print_update},
};

const DEMO_COMPONENTS: [&str; 2] = ["database", "cache"];
const WATCH_INTERVAL_SECS: i32 = 5;
const WATCH_UPDATES: usize = 3;
const WATCH_DEADLINE: Duration = Duration::from_secs(20);

pub async fn execute(endpoint: String) -> Result<()> {
    println!();
    println!("{}", "Testing health service".bold());
    println!("  Target: {}", endpoint.cyan());
    println!();

    let mut client = connect(&endpoint).await?;
    let mut failures = 0;

    for (name, outcome) in [
        ("Ping", ping(&mut client).await),
        ("CheckHealth", check(&mut client).await),
        ("WatchHealth", watch(&mut client).await),
    ] {
        if let Err(e) = outcome {
            failures += 1;
            println!("{} {} failed: {}", "✗".red().bold(), name, e);
        }
        println!();
    }

    if failures > 0 {
        anyhow::bail!("{} of 3 calls failed", failures);
    }

    println!("{}", "All calls completed!".green().bold());

    Ok(())
}

fn demo_components() -> Vec<String> {
    DEMO_COMPONENTS.iter().map(|s| s.to_string()).collect()
}

async fn ping(client: &mut HealthClient) -> Result<()> {
    println!("{}", "Ping".bold());

    let ping = client.ping().await?;
    println!("{} Ping successful", "✓".green().bold());
    println!("  Success:   {}", ping.success);
    println!("  Version:   {}", ping.version);
    println!(
        "  Timestamp: {} ({})",
        ping.timestamp_ms,
        format_timestamp(ping.timestamp_ms)
    );

    Ok(())
}

async fn check(client: &mut HealthClient) -> Result<()> {
    println!("{}", "CheckHealth".bold());

    let result = client.check(demo_components(), true, 10).await?;
    println!("{} Health check completed", "✓".green().bold());
    print_result(&result);

    Ok(())
}

async fn watch(client: &mut HealthClient) -> Result<()> {
    println!(
        "{}",
        format!(
            "WatchHealth (every {}s, {} updates)",
            WATCH_INTERVAL_SECS, WATCH_UPDATES
        )
        .bold()
    );

    let mut updates = client
        .watch(demo_components(), WATCH_INTERVAL_SECS)
        .await?
        .take(WATCH_UPDATES);

    let mut received = 0;
    let finished = tokio::time::timeout(WATCH_DEADLINE, async {
        while let Some(update) = updates.next().await {
            received += 1;
            print_update(received, &update?);
        }
        Ok::<_, anyhow::Error>(())
    })
    .await;

    match finished {
        Ok(result) => result?,
        Err(_) => println!(
            "{} Deadline reached after {} update(s)",
            "⏰".yellow(),
            received
        ),
    }

    println!("{} Health watch completed", "✓".green().bold());

    Ok(())
}
