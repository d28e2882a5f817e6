use anyhow::{Context, Result};
use healthwatch::client::HealthClient;

pub mod format;

/// Connect to the health service, with the endpoint in the error
pub async fn connect(endpoint: &str) -> Result<HealthClient> {
    HealthClient::connect(endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))
}
