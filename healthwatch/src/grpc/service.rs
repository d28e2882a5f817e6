//! `health.v1.HealthService` implementation

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tonic::{Request, Response, Status};

use super::interceptors::request_id_of;
use super::proto::health_service_server::HealthService;
use super::proto::{
    HealthCheckRequest, HealthCheckResponse, HealthWatchRequest, PingRequest, PingResponse,
};
use crate::error::Error;
use crate::health::{HealthCheckService, WatchScheduler};

/// Stream returned by `WatchHealth`
pub type WatchHealthStream =
    Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send + 'static>>;

/// gRPC adapter over the health core
#[derive(Debug, Clone)]
pub struct GrpcHealthService {
    health: HealthCheckService,
    scheduler: WatchScheduler,
}

impl GrpcHealthService {
    /// Create the adapter
    pub fn new(health: HealthCheckService, scheduler: WatchScheduler) -> Self {
        Self { health, scheduler }
    }
}

/// Reject blank component names; an empty list is fine
fn validate_components(components: &[String]) -> Result<(), Error> {
    if components.iter().any(|name| name.trim().is_empty()) {
        return Err(Error::InvalidRequest(
            "component names must not be blank".to_string(),
        ));
    }
    Ok(())
}

/// Zero or negative means "use the server default"
fn timeout_hint(timeout_seconds: i32) -> Option<Duration> {
    u64::try_from(timeout_seconds)
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[tonic::async_trait]
impl HealthService for GrpcHealthService {
    type WatchHealthStream = WatchHealthStream;

    async fn ping(&self, request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        let request_id = request_id_of(&request);
        let ping = self.health.ping();

        tracing::debug!(request_id = %request_id, timestamp_ms = ping.timestamp_ms, "Ping");

        Ok(Response::new(ping.into()))
    }

    async fn check_health(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let request_id = request_id_of(&request);
        let req = request.into_inner();

        tracing::info!(
            request_id = %request_id,
            components = ?req.components,
            include_dependencies = req.include_dependencies,
            timeout_seconds = req.timeout_seconds,
            "CheckHealth"
        );

        validate_components(&req.components)?;

        let result = self
            .health
            .check(
                &req.components,
                req.include_dependencies,
                timeout_hint(req.timeout_seconds),
            )
            .await;

        Ok(Response::new(result.into()))
    }

    async fn watch_health(
        &self,
        request: Request<HealthWatchRequest>,
    ) -> Result<Response<Self::WatchHealthStream>, Status> {
        let request_id = request_id_of(&request);
        let req = request.into_inner();

        validate_components(&req.components)?;

        let (handle, updates) = self
            .scheduler
            .watch(req.components.clone(), i64::from(req.interval_seconds))
            .await?;

        tracing::info!(
            request_id = %request_id,
            subscription_id = %handle.id(),
            components = ?req.components,
            interval_secs = handle.interval().as_secs(),
            "WatchHealth"
        );

        let stream = updates.map(|update| match update {
            Ok(result) => Ok(HealthCheckResponse::from(result)),
            Err(e) => Err(Status::from(e)),
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
