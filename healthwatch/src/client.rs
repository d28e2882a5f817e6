//! Client for `health.v1.HealthService`
//!
//! Thin wrapper over the generated client that speaks the health model
//! instead of protobuf messages.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use healthwatch::client::HealthClient;
//!
//! # async fn example() -> healthwatch::Result<()> {
//! let mut client = HealthClient::connect("http://localhost:9090").await?;
//! println!("{}", client.ping().await?.version);
//!
//! let mut updates = client.watch(vec!["database".into()], 5).await?.take(3);
//! while let Some(update) = updates.next().await {
//!     println!("{}", update?.overall_status);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tonic::transport::{Channel, Endpoint};

use crate::error::{Error, Result};
use crate::grpc::proto::health_service_client::HealthServiceClient;
use crate::grpc::proto::{HealthCheckRequest, HealthWatchRequest, PingRequest};
use crate::health::{AggregateResult, PingResult};

/// Stream of decoded watch updates
pub type WatchStream = BoxStream<'static, Result<AggregateResult>>;

/// Health service client
#[derive(Debug, Clone)]
pub struct HealthClient {
    inner: HealthServiceClient<Channel>,
}

impl HealthClient {
    /// Connect to `endpoint`, e.g. `http://localhost:9090`
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        tracing::debug!(endpoint = %endpoint, "Connecting to health service");

        let channel = Endpoint::from_shared(endpoint)?
            .connect_timeout(Duration::from_secs(5))
            .connect()
            .await?;

        Ok(Self::new(channel))
    }

    /// Wrap an existing channel
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: HealthServiceClient::new(channel),
        }
    }

    /// Liveness ping
    pub async fn ping(&mut self) -> Result<PingResult> {
        let response = self.inner.ping(PingRequest {}).await?;
        Ok(response.into_inner().into())
    }

    /// One-shot check; `timeout_seconds` of zero uses the server default
    pub async fn check(
        &mut self,
        components: Vec<String>,
        include_dependencies: bool,
        timeout_seconds: i32,
    ) -> Result<AggregateResult> {
        let response = self
            .inner
            .check_health(HealthCheckRequest {
                components,
                include_dependencies,
                timeout_seconds,
            })
            .await?;

        AggregateResult::try_from(response.into_inner())
    }

    /// Open a watch; the stream runs until dropped or the server ends it
    pub async fn watch(
        &mut self,
        components: Vec<String>,
        interval_seconds: i32,
    ) -> Result<WatchStream> {
        let response = self
            .inner
            .watch_health(HealthWatchRequest {
                components,
                interval_seconds,
            })
            .await?;

        let updates = response.into_inner().map(|item| {
            item.map_err(Error::from)
                .and_then(AggregateResult::try_from)
        });

        Ok(updates.boxed())
    }
}
