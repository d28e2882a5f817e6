//! One-shot health checks and liveness ping

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;

use super::engine::AggregationEngine;
use super::model::{AggregateResult, PingResult};
use crate::error::{Error, Result};

/// Unary health operations on top of the aggregation engine
#[derive(Debug, Clone)]
pub struct HealthCheckService {
    engine: Arc<AggregationEngine>,
    version: String,
    last_ping_ms: Arc<AtomicI64>,
}

impl HealthCheckService {
    /// Create a service reporting `version` from `ping`
    pub fn new(engine: AggregationEngine, version: impl Into<String>) -> Self {
        Self {
            engine: Arc::new(engine),
            version: version.into(),
            last_ping_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    /// The engine backing this service
    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// Version reported by `ping`
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Liveness answer; never runs probes
    ///
    /// Timestamps never go backwards within one service instance, even if
    /// the wall clock is stepped back.
    pub fn ping(&self) -> PingResult {
        let now = Utc::now().timestamp_millis();
        let previous = self.last_ping_ms.fetch_max(now, Ordering::AcqRel);

        PingResult {
            success: true,
            version: self.version.clone(),
            timestamp_ms: now.max(previous),
        }
    }

    /// Run one aggregated check
    ///
    /// Always produces a result: an engine failure becomes an `UNHEALTHY`
    /// result carrying the cause, with no components.
    pub async fn check(
        &self,
        components: &[String],
        include_dependencies: bool,
        timeout_hint: Option<Duration>,
    ) -> AggregateResult {
        let started = Instant::now();

        let outcome = AssertUnwindSafe(self.engine.run_checks_with_timeout(
            components,
            include_dependencies,
            timeout_hint,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(Error::Internal("health check panicked".to_string())));

        match outcome {
            Ok(results) => {
                let result = AggregateResult::from_components(results, elapsed_ms(started));
                tracing::info!(
                    overall_status = %result.overall_status,
                    components = result.components.len(),
                    duration_ms = result.duration_ms,
                    "Health check completed"
                );
                result
            }
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                AggregateResult::failed(e, elapsed_ms(started))
            }
        }
    }

    /// Run one aggregated check, surfacing engine failures
    ///
    /// Used by the watch scheduler, where an engine failure ends the stream.
    pub async fn try_check(
        &self,
        components: &[String],
        include_dependencies: bool,
        timeout_hint: Option<Duration>,
    ) -> Result<AggregateResult> {
        let started = Instant::now();
        let results = self
            .engine
            .run_checks_with_timeout(components, include_dependencies, timeout_hint)
            .await?;

        Ok(AggregateResult::from_components(results, elapsed_ms(started)))
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::health::model::OverallStatus;
    use crate::health::probe::{FnProbe, ProbeReport, ProbeSet, StaticProbe};

    fn service(probes: ProbeSet) -> HealthCheckService {
        HealthCheckService::new(AggregationEngine::new(probes), "1.0.0")
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ping() {
        let svc = service(ProbeSet::placeholders());

        let first = svc.ping();
        let second = svc.ping();
        assert!(first.success);
        assert_eq!(first.version, "1.0.0");
        assert!(second.timestamp_ms >= first.timestamp_ms);
    }

    #[tokio::test]
    async fn test_database_up_cache_down_is_degraded() {
        let probes = ProbeSet::new()
            .with("database", StaticProbe::new(ProbeReport::up(50)))
            .with("cache", StaticProbe::new(ProbeReport::down()));
        let svc = service(probes);

        let result = svc.check(&names(&["database", "cache"]), true, None).await;

        assert_eq!(result.overall_status, OverallStatus::Degraded);
        assert_eq!(result.components.len(), 2);
        assert!(result.error_message.is_none());

        let database = &result.components["database"];
        assert_eq!(database.response_time_ms, 50);
        assert_eq!(database.dependencies.len(), 1);

        assert!(result.components["cache"].error_details.is_some());
    }

    #[tokio::test]
    async fn test_empty_request_reports_default_components() {
        let svc = service(ProbeSet::placeholders());
        let result = svc.check(&[], false, None).await;

        assert_eq!(result.overall_status, OverallStatus::Healthy);
        let mut keys: Vec<_> = result.components.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["cache", "database", "external-api"]);
    }

    #[tokio::test]
    async fn test_everything_down_is_unhealthy() {
        let probes = ProbeSet::new()
            .with(
                "database",
                FnProbe::new(|| async { Err::<ProbeReport, _>(ProbeError::failed("refused")) }),
            )
            .with("cache", StaticProbe::new(ProbeReport::down()));
        let svc = service(probes);

        let result = svc.check(&names(&["database", "cache"]), false, None).await;
        assert_eq!(result.overall_status, OverallStatus::Unhealthy);
        assert_eq!(result.components.len(), 2);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_panicking_probe_still_yields_structured_result() {
        let probes = ProbeSet::new()
            .with("database", StaticProbe::new(ProbeReport::up(5)))
            .with("cache", crate::health::engine::tests::EagerPanicProbe);
        let svc = service(probes);

        let result = svc.check(&names(&["database", "cache"]), false, None).await;
        assert_eq!(result.overall_status, OverallStatus::Degraded);
        assert!(!result.components["cache"].available);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_becomes_structured_result() {
        let engine = AggregationEngine::new(ProbeSet::placeholders())
            .with_default_components(Vec::<String>::new());
        let svc = HealthCheckService::new(engine, "1.0.0");

        let result = svc.check(&[], false, None).await;
        assert_eq!(result.overall_status, OverallStatus::Unhealthy);
        assert!(result.components.is_empty());
        assert!(result
            .error_message
            .as_deref()
            .is_some_and(|m| m.starts_with("health check failed: ")));

        assert!(svc.try_check(&[], false, None).await.is_err());
    }
}
