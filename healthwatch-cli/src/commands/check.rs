use anyhow::{Context, Result};
use healthwatch::health::OverallStatus;

use crate::utils::{connect, format::print_result};

pub async fn execute(
    endpoint: String,
    components: Vec<String>,
    include_dependencies: bool,
    timeout: i32,
    json: bool,
) -> Result<()> {
    let mut client = connect(&endpoint).await?;

    let result = client
        .check(components, include_dependencies, timeout)
        .await
        .context("Health check failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if result.overall_status == OverallStatus::Unhealthy {
        anyhow::bail!("Service is {}", result.overall_status);
    }

    Ok(())
}
