//! Component probes
//!
//! A probe answers "how is component X doing right now". The engine owns a
//! [`ProbeSet`] and never knows what a probe actually talks to, so a real
//! deployment registers live checks without touching aggregation or
//! scheduling.
//!
//! # Example
//!
//! ```rust,ignore
//! use healthwatch::health::{FnProbe, ProbeReport, ProbeSet};
//! use healthwatch::ProbeError;
//!
//! let probes = ProbeSet::placeholders().with(
//!     "database",
//!     FnProbe::new(|| async {
//!         let started = std::time::Instant::now();
//!         pool.ping().await.map_err(|e| ProbeError::failed(e.to_string()))?;
//!         Ok(ProbeReport::up(started.elapsed().as_millis() as i64))
//!     }),
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::model::DependencyInfo;
use crate::error::ProbeError;

/// What a probe found out about its component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Component is reachable
    pub available: bool,
    /// Component serves requests correctly
    pub functional: bool,
    /// Observed latency in milliseconds
    pub response_time_ms: i64,
    /// Optional explanation, usually set when unavailable
    pub error_details: Option<String>,
    /// Dependencies the probe discovered
    pub dependencies: Vec<DependencyInfo>,
}

impl ProbeReport {
    /// Available and functional
    pub fn up(response_time_ms: i64) -> Self {
        Self {
            available: true,
            functional: true,
            response_time_ms,
            error_details: None,
            dependencies: Vec::new(),
        }
    }

    /// Neither available nor functional
    pub fn down() -> Self {
        Self {
            available: false,
            functional: false,
            response_time_ms: 0,
            error_details: None,
            dependencies: Vec::new(),
        }
    }

    /// Attach an explanation
    #[must_use]
    pub fn with_error(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }

    /// Attach a discovered dependency
    #[must_use]
    pub fn with_dependency(mut self, dependency: DependencyInfo) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Health probe for one named component
#[async_trait]
pub trait ComponentProbe: Send + Sync {
    /// Check the component once
    async fn probe(&self) -> Result<ProbeReport, ProbeError>;
}

/// Probe that always returns the same report
#[derive(Debug, Clone)]
pub struct StaticProbe {
    report: ProbeReport,
}

impl StaticProbe {
    /// Create a probe returning `report` on every call
    pub fn new(report: ProbeReport) -> Self {
        Self { report }
    }
}

#[async_trait]
impl ComponentProbe for StaticProbe {
    async fn probe(&self) -> Result<ProbeReport, ProbeError> {
        Ok(self.report.clone())
    }
}

/// Probe backed by an async closure
pub struct FnProbe<F> {
    check: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeReport, ProbeError>> + Send + 'static,
{
    /// Wrap a closure producing a probe future
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

#[async_trait]
impl<F, Fut> ComponentProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeReport, ProbeError>> + Send + 'static,
{
    async fn probe(&self) -> Result<ProbeReport, ProbeError> {
        (self.check)().await
    }
}

/// Registry of probes keyed by component name
///
/// Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct ProbeSet {
    probes: HashMap<String, Arc<dyn ComponentProbe>>,
}

impl ProbeSet {
    /// Empty registry; every lookup falls through to the unknown-component record
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder probes for the default components
    ///
    /// They report fixed latencies and never fail. Replace them with real
    /// checks via [`ProbeSet::register`].
    pub fn placeholders() -> Self {
        Self::new()
            .with("database", StaticProbe::new(ProbeReport::up(5)))
            .with("cache", StaticProbe::new(ProbeReport::up(2)))
            .with("external-api", StaticProbe::new(ProbeReport::up(150)))
    }

    /// Register (or replace) the probe for a component
    pub fn register(&mut self, name: impl AsRef<str>, probe: impl ComponentProbe + 'static) {
        self.probes
            .insert(normalize(name.as_ref()), Arc::new(probe));
    }

    /// Builder-style [`ProbeSet::register`]
    #[must_use]
    pub fn with(mut self, name: impl AsRef<str>, probe: impl ComponentProbe + 'static) -> Self {
        self.register(name, probe);
        self
    }

    /// Probe registered for a component, if any
    pub fn get(&self, name: &str) -> Option<Arc<dyn ComponentProbe>> {
        self.probes.get(&normalize(name)).cloned()
    }

    /// Number of registered probes
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether no probe is registered
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.probes.keys().collect();
        names.sort();
        f.debug_struct("ProbeSet").field("components", &names).finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_latencies() {
        let probes = ProbeSet::placeholders();
        assert_eq!(probes.len(), 3);

        let db = probes.get("database").unwrap().probe().await.unwrap();
        assert!(db.available && db.functional);
        assert_eq!(db.response_time_ms, 5);

        let api = probes.get("external-api").unwrap().probe().await.unwrap();
        assert_eq!(api.response_time_ms, 150);
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let probes = ProbeSet::placeholders();
        assert!(probes.get("Database").is_some());
        assert!(probes.get(" CACHE ").is_some());
        assert!(probes.get("queue").is_none());
    }

    #[tokio::test]
    async fn test_fn_probe() {
        let probes = ProbeSet::new().with(
            "queue",
            FnProbe::new(|| async {
                Err::<ProbeReport, _>(ProbeError::failed("broker refused connection"))
            }),
        );

        let err = probes.get("queue").unwrap().probe().await.unwrap_err();
        assert_eq!(err, ProbeError::failed("broker refused connection"));
    }
}
