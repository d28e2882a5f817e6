use anyhow::{Context, Result};
use colored::Colorize;
use futures::StreamExt;

use crate::utils::{connect, format::print_update};

pub async fn execute(
    endpoint: String,
    components: Vec<String>,
    interval: i32,
    count: Option<usize>,
) -> Result<()> {
    let mut client = connect(&endpoint).await?;
    let mut updates = client
        .watch(components, interval)
        .await
        .context("Failed to start health watch")?;

    println!("{}", "Watching health (Ctrl+C to stop)...".bold());

    let mut received = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Watch stopped".yellow());
                break;
            }
            next = updates.next() => match next {
                Some(Ok(update)) => {
                    received += 1;
                    print_update(received, &update);
                    if count.is_some_and(|limit| received >= limit) {
                        break;
                    }
                }
                Some(Err(e)) => return Err(e).context("Health watch failed"),
                None => {
                    println!("{}", "Server ended the watch".yellow());
                    break;
                }
            }
        }
    }

    println!("Received {} update(s)", received);

    Ok(())
}
