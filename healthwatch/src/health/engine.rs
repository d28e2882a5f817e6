//! Aggregation engine
//!
//! Runs the probes for a set of components concurrently and merges their
//! answers into one mapping. A probe that errors, panics or overruns its
//! bound only marks its own component as down; the batch always completes.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;

use super::model::{ComponentHealth, DependencyInfo};
use super::probe::{ProbeReport, ProbeSet};
use crate::config::HealthConfig;
use crate::error::{Error, ProbeError, Result};

/// Runs probes and merges their results
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    probes: ProbeSet,
    default_components: Vec<String>,
    probe_timeout: Duration,
    dependency_version: String,
}

impl AggregationEngine {
    /// Create an engine with the built-in default components
    pub fn new(probes: ProbeSet) -> Self {
        Self::from_config(probes, &HealthConfig::default(), env!("CARGO_PKG_VERSION"))
    }

    /// Create an engine from the health configuration
    ///
    /// `version` is stamped on synthesized dependency records.
    pub fn from_config(
        probes: ProbeSet,
        config: &HealthConfig,
        version: impl Into<String>,
    ) -> Self {
        Self {
            probes,
            default_components: config.default_components.clone(),
            probe_timeout: config.probe_timeout(),
            dependency_version: version.into(),
        }
    }

    /// Override the component set used for empty requests
    #[must_use]
    pub fn with_default_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_components = components.into_iter().map(Into::into).collect();
        self
    }

    /// Override the per-probe bound
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Components checked when a request names none
    pub fn default_components(&self) -> &[String] {
        &self.default_components
    }

    /// Check the requested components with the default probe bound
    pub async fn run_checks(
        &self,
        requested: &[String],
        include_dependencies: bool,
    ) -> Result<HashMap<String, ComponentHealth>> {
        self.run_checks_with_timeout(requested, include_dependencies, None)
            .await
    }

    /// Check the requested components
    ///
    /// An empty request checks the default components. `timeout` bounds each
    /// probe call; `None` uses the engine default.
    pub async fn run_checks_with_timeout(
        &self,
        requested: &[String],
        include_dependencies: bool,
        timeout: Option<Duration>,
    ) -> Result<HashMap<String, ComponentHealth>> {
        let names = self.resolve_components(requested);
        if names.is_empty() {
            return Err(Error::Aggregation(
                "no components to check: request is empty and no defaults are configured"
                    .to_string(),
            ));
        }

        let bound = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.probe_timeout);

        let checks = names.iter().map(|name| async move {
            let health = self.check_component(name, include_dependencies, bound).await;
            (name.clone(), health)
        });

        let components: HashMap<String, ComponentHealth> =
            join_all(checks).await.into_iter().collect();

        if components.len() != names.len() {
            return Err(Error::Aggregation(format!(
                "merged {} component results for {} requested components",
                components.len(),
                names.len()
            )));
        }

        Ok(components)
    }

    /// Requested names without duplicates, or the defaults
    fn resolve_components(&self, requested: &[String]) -> Vec<String> {
        let source = if requested.is_empty() {
            &self.default_components
        } else {
            requested
        };

        let mut seen = HashSet::new();
        source
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }

    async fn check_component(
        &self,
        name: &str,
        include_dependencies: bool,
        bound: Duration,
    ) -> ComponentHealth {
        tracing::debug!(component = %name, "Checking component health");

        let Some(probe) = self.probes.get(name) else {
            tracing::debug!(component = %name, "No probe registered, assuming healthy");
            let mut health = ComponentHealth::unknown();
            if include_dependencies {
                health.dependencies.push(self.synthesized_dependency(name));
            }
            return health;
        };

        // Build the probe future inside the guard so an eager panic is caught too
        let checked = AssertUnwindSafe(async { probe.probe().await }).catch_unwind();
        let outcome = match tokio::time::timeout(bound, checked).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ProbeError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(ProbeError::TimedOut(bound)),
        };

        match outcome {
            Ok(report) => self.health_from_report(name, report, include_dependencies),
            Err(e) => {
                tracing::warn!(component = %name, error = %e, "Component probe failed");
                ComponentHealth::failed(e.to_string())
            }
        }
    }

    fn health_from_report(
        &self,
        name: &str,
        report: ProbeReport,
        include_dependencies: bool,
    ) -> ComponentHealth {
        let error_details = report
            .error_details
            .or_else(|| (!report.available).then(|| format!("{} is unavailable", name)));

        let dependencies = if include_dependencies {
            let mut dependencies = report.dependencies;
            dependencies.push(self.synthesized_dependency(name));
            dependencies
        } else {
            Vec::new()
        };

        ComponentHealth {
            available: report.available,
            functional: report.functional,
            response_time_ms: report.response_time_ms,
            error_details,
            last_check_info: None,
            dependencies,
        }
    }

    fn synthesized_dependency(&self, component: &str) -> DependencyInfo {
        DependencyInfo {
            name: format!("{}-dependency", component),
            available: true,
            version: self.dependency_version.clone(),
            last_successful_check_ms: Utc::now().timestamp_millis(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::health::model::OverallStatus;
    use crate::health::probe::{FnProbe, StaticProbe};

    struct PanickingProbe;

    #[async_trait::async_trait]
    impl crate::health::probe::ComponentProbe for PanickingProbe {
        async fn probe(&self) -> std::result::Result<ProbeReport, ProbeError> {
            panic!("probe blew up")
        }
    }

    /// Panics while building its future rather than when polled
    pub(crate) struct EagerPanicProbe;

    impl crate::health::probe::ComponentProbe for EagerPanicProbe {
        fn probe<'life0, 'async_trait>(
            &'life0 self,
        ) -> std::pin::Pin<
            Box<
                dyn std::future::Future<Output = std::result::Result<ProbeReport, ProbeError>>
                    + Send
                    + 'async_trait,
            >,
        >
        where
            'life0: 'async_trait,
            Self: 'async_trait,
        {
            panic!("probe setup failed")
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_request_uses_defaults() {
        let engine = AggregationEngine::new(ProbeSet::placeholders());
        let results = engine.run_checks(&[], false).await.unwrap();

        let mut keys: Vec<_> = results.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, names(&["cache", "database", "external-api"]));
    }

    #[tokio::test]
    async fn test_keys_match_request() {
        let engine = AggregationEngine::new(ProbeSet::placeholders());
        let requested = names(&["database", "queue", "database"]);
        let results = engine.run_checks(&requested, false).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.contains_key("database"));
        assert!(results.contains_key("queue"));
    }

    #[tokio::test]
    async fn test_unknown_component_assumed_healthy() {
        let engine = AggregationEngine::new(ProbeSet::new());
        let results = engine.run_checks(&names(&["queue"]), false).await.unwrap();

        let queue = &results["queue"];
        assert!(queue.available && queue.functional);
        assert_eq!(queue.response_time_ms, 1);
        assert_eq!(queue.last_check_info.as_deref(), Some("unknown component"));
    }

    #[tokio::test]
    async fn test_failing_probe_is_isolated() {
        let probes = ProbeSet::placeholders()
            .with(
                "cache",
                FnProbe::new(|| async {
                    Err::<ProbeReport, _>(ProbeError::failed("connection refused"))
                }),
            )
            .with("external-api", PanickingProbe);
        let engine = AggregationEngine::new(probes);

        let results = engine.run_checks(&[], true).await.unwrap();
        assert_eq!(results.len(), 3);

        let cache = &results["cache"];
        assert!(!cache.available && !cache.functional);
        assert_eq!(cache.response_time_ms, 0);
        assert_eq!(cache.error_details.as_deref(), Some("connection refused"));
        assert!(cache.dependencies.is_empty());

        let api = &results["external-api"];
        assert_eq!(api.error_details.as_deref(), Some("probe panicked: probe blew up"));

        assert!(results["database"].functional);
        assert_eq!(OverallStatus::derive(results.values()), OverallStatus::Degraded);
    }

    #[tokio::test]
    async fn test_eager_panic_is_isolated() {
        let probes = ProbeSet::placeholders().with("cache", EagerPanicProbe);
        let engine = AggregationEngine::new(probes);

        let results = engine.run_checks(&names(&["database", "cache"]), false).await.unwrap();
        assert_eq!(results.len(), 2);

        let cache = &results["cache"];
        assert!(!cache.available);
        assert_eq!(cache.error_details.as_deref(), Some("probe panicked: probe setup failed"));
        assert!(results["database"].functional);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out() {
        let probes = ProbeSet::new().with(
            "slow",
            FnProbe::new(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ProbeReport::up(60_000))
            }),
        );
        let engine = AggregationEngine::new(probes).with_probe_timeout(Duration::from_secs(1));

        let results = engine.run_checks(&names(&["slow"]), false).await.unwrap();
        assert_eq!(
            results["slow"].error_details.as_deref(),
            Some("probe timed out after 1000ms")
        );

        let results = engine
            .run_checks_with_timeout(&names(&["slow"]), false, Some(Duration::from_millis(200)))
            .await
            .unwrap();
        assert_eq!(
            results["slow"].error_details.as_deref(),
            Some("probe timed out after 200ms")
        );
    }

    #[tokio::test]
    async fn test_dependencies_appended_when_requested() {
        let engine = AggregationEngine::new(ProbeSet::placeholders());

        let with = engine.run_checks(&names(&["database"]), true).await.unwrap();
        let deps = &with["database"].dependencies;
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "database-dependency");
        assert!(deps[0].available);

        let without = engine.run_checks(&names(&["database"]), false).await.unwrap();
        assert!(without["database"].dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_report_gets_details() {
        let probes = ProbeSet::new().with("cache", StaticProbe::new(ProbeReport::down()));
        let engine = AggregationEngine::new(probes);

        let results = engine.run_checks(&names(&["cache"]), false).await.unwrap();
        assert_eq!(results["cache"].error_details.as_deref(), Some("cache is unavailable"));
    }

    #[tokio::test]
    async fn test_no_defaults_is_engine_failure() {
        let engine = AggregationEngine::new(ProbeSet::placeholders())
            .with_default_components(Vec::<String>::new());

        let err = engine.run_checks(&[], false).await.unwrap_err();
        assert!(matches!(err, Error::Aggregation(_)));
    }
}
