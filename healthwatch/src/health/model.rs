//! Health data model
//!
//! Every value here is produced fresh by a check and never mutated after it
//! leaves the engine.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Overall verdict derived from a set of component results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    /// Every component is functional
    Healthy,
    /// At least one component is not functional but some are reachable
    Degraded,
    /// No component is reachable
    Unhealthy,
}

impl OverallStatus {
    /// Derive the overall status from component results
    ///
    /// `Healthy` when every component is functional, otherwise `Degraded`
    /// while at least one component is available, otherwise `Unhealthy`.
    pub fn derive<'a, I>(components: I) -> Self
    where
        I: IntoIterator<Item = &'a ComponentHealth>,
    {
        let mut all_functional = true;
        let mut any_available = false;

        for health in components {
            all_functional &= health.functional;
            any_available |= health.available;
        }

        if all_functional {
            Self::Healthy
        } else if any_available {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

/// A dependency reported alongside a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    /// Dependency name
    pub name: String,
    /// Whether the dependency answered
    pub available: bool,
    /// Dependency version
    pub version: String,
    /// Wall-clock time of the last successful check, epoch milliseconds
    pub last_successful_check_ms: i64,
}

/// Health of a single component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component is reachable
    pub available: bool,
    /// Component serves requests correctly
    pub functional: bool,
    /// Probe latency in milliseconds
    pub response_time_ms: i64,
    /// Why the component is unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Free-form note about the last check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_info: Option<String>,
    /// Dependencies, in report order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyInfo>,
}

impl ComponentHealth {
    /// Record for a component whose probe failed
    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            available: false,
            functional: false,
            response_time_ms: 0,
            error_details: Some(details.into()),
            last_check_info: None,
            dependencies: Vec::new(),
        }
    }

    /// Record for a component nobody registered a probe for
    pub fn unknown() -> Self {
        Self {
            available: true,
            functional: true,
            response_time_ms: 1,
            error_details: None,
            last_check_info: Some("unknown component".to_string()),
            dependencies: Vec::new(),
        }
    }
}

/// Merged snapshot of one check run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Derived verdict
    pub overall_status: OverallStatus,
    /// Component name to health
    pub components: HashMap<String, ComponentHealth>,
    /// Time spent in the engine, milliseconds
    pub duration_ms: i64,
    /// Set only when the check itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AggregateResult {
    /// Successful result; the status is derived from the components
    pub fn from_components(components: HashMap<String, ComponentHealth>, duration_ms: i64) -> Self {
        Self {
            overall_status: OverallStatus::derive(components.values()),
            components,
            duration_ms,
            error_message: None,
        }
    }

    /// Result for a check that failed as a whole
    pub fn failed(cause: impl fmt::Display, duration_ms: i64) -> Self {
        Self {
            overall_status: OverallStatus::Unhealthy,
            components: HashMap::new(),
            duration_ms,
            error_message: Some(format!("health check failed: {}", cause)),
        }
    }
}

/// Answer to a liveness ping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResult {
    /// Always true when the service answers
    pub success: bool,
    /// Service version
    pub version: String,
    /// Wall-clock time, epoch milliseconds
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(available: bool, functional: bool) -> ComponentHealth {
        ComponentHealth {
            available,
            functional,
            response_time_ms: 1,
            error_details: None,
            last_check_info: None,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_all_functional_is_healthy() {
        let all = [component(true, true), component(true, true)];
        assert_eq!(OverallStatus::derive(&all), OverallStatus::Healthy);
    }

    #[test]
    fn test_partial_availability_is_degraded() {
        let some = [component(true, true), component(false, false)];
        assert_eq!(OverallStatus::derive(&some), OverallStatus::Degraded);

        // Reachable but broken still counts as available
        let broken = [component(true, false)];
        assert_eq!(OverallStatus::derive(&broken), OverallStatus::Degraded);
    }

    #[test]
    fn test_nothing_available_is_unhealthy() {
        let none = [component(false, false), component(false, false)];
        assert_eq!(OverallStatus::derive(&none), OverallStatus::Unhealthy);
    }

    #[test]
    fn test_failed_result_shape() {
        let result = AggregateResult::failed("boom", 7);
        assert_eq!(result.overall_status, OverallStatus::Unhealthy);
        assert!(result.components.is_empty());
        assert_eq!(result.duration_ms, 7);
        assert_eq!(result.error_message.as_deref(), Some("health check failed: boom"));
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&OverallStatus::Degraded).unwrap();
        assert_eq!(json, "\"DEGRADED\"");
    }
}
