//! Conversions between the health model and protobuf messages

use std::collections::HashMap;

use super::proto;
use super::proto::health_check_response::ServiceStatus;
use crate::error::{Error, Result};
use crate::health::{AggregateResult, ComponentHealth, DependencyInfo, OverallStatus, PingResult};

impl From<OverallStatus> for ServiceStatus {
    fn from(status: OverallStatus) -> Self {
        match status {
            OverallStatus::Healthy => ServiceStatus::Healthy,
            OverallStatus::Degraded => ServiceStatus::Degraded,
            OverallStatus::Unhealthy => ServiceStatus::Unhealthy,
        }
    }
}

impl TryFrom<ServiceStatus> for OverallStatus {
    type Error = Error;

    fn try_from(status: ServiceStatus) -> Result<Self> {
        match status {
            ServiceStatus::Healthy => Ok(OverallStatus::Healthy),
            ServiceStatus::Degraded => Ok(OverallStatus::Degraded),
            ServiceStatus::Unhealthy => Ok(OverallStatus::Unhealthy),
            ServiceStatus::Unspecified => {
                Err(Error::Protocol("overall status is unspecified".to_string()))
            }
        }
    }
}

impl From<DependencyInfo> for proto::DependentComponent {
    fn from(dep: DependencyInfo) -> Self {
        Self {
            name: dep.name,
            available: dep.available,
            version: dep.version,
            last_successful_check_ms: dep.last_successful_check_ms,
        }
    }
}

impl From<proto::DependentComponent> for DependencyInfo {
    fn from(dep: proto::DependentComponent) -> Self {
        Self {
            name: dep.name,
            available: dep.available,
            version: dep.version,
            last_successful_check_ms: dep.last_successful_check_ms,
        }
    }
}

impl From<ComponentHealth> for proto::ComponentHealth {
    fn from(health: ComponentHealth) -> Self {
        Self {
            available: health.available,
            functional: health.functional,
            response_time_ms: health.response_time_ms,
            error_details: health.error_details,
            last_check_info: health.last_check_info,
            dependencies: health.dependencies.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<proto::ComponentHealth> for ComponentHealth {
    fn from(health: proto::ComponentHealth) -> Self {
        Self {
            available: health.available,
            functional: health.functional,
            response_time_ms: health.response_time_ms,
            error_details: health.error_details,
            last_check_info: health.last_check_info,
            dependencies: health.dependencies.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<AggregateResult> for proto::HealthCheckResponse {
    fn from(result: AggregateResult) -> Self {
        Self {
            overall_status: ServiceStatus::from(result.overall_status) as i32,
            components: result
                .components
                .into_iter()
                .map(|(name, health)| (name, health.into()))
                .collect(),
            total_check_duration_ms: result.duration_ms,
            error_message: result.error_message,
        }
    }
}

impl TryFrom<proto::HealthCheckResponse> for AggregateResult {
    type Error = Error;

    fn try_from(response: proto::HealthCheckResponse) -> Result<Self> {
        let status = ServiceStatus::try_from(response.overall_status).map_err(|_| {
            Error::Protocol(format!(
                "unknown overall status value {}",
                response.overall_status
            ))
        })?;

        let components: HashMap<String, ComponentHealth> = response
            .components
            .into_iter()
            .map(|(name, health)| (name, health.into()))
            .collect();

        Ok(Self {
            overall_status: status.try_into()?,
            components,
            duration_ms: response.total_check_duration_ms,
            error_message: response.error_message,
        })
    }
}

impl From<PingResult> for proto::PingResponse {
    fn from(ping: PingResult) -> Self {
        Self {
            success: ping.success,
            version: ping.version,
            timestamp_ms: ping.timestamp_ms,
        }
    }
}

impl From<proto::PingResponse> for PingResult {
    fn from(ping: proto::PingResponse) -> Self {
        Self {
            success: ping.success,
            version: ping.version,
            timestamp_ms: ping.timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn degraded_result() -> AggregateResult {
        let mut components = HashMap::new();
        components.insert(
            "database".to_string(),
            ComponentHealth {
                available: true,
                functional: true,
                response_time_ms: 5,
                error_details: None,
                last_check_info: None,
                dependencies: vec![DependencyInfo {
                    name: "database-dependency".to_string(),
                    available: true,
                    version: "1.0.0".to_string(),
                    last_successful_check_ms: 1_700_000_000_000,
                }],
            },
        );
        components.insert("cache".to_string(), ComponentHealth::failed("cache is unavailable"));
        AggregateResult::from_components(components, 12)
    }

    #[test]
    fn test_result_to_proto() {
        let response = proto::HealthCheckResponse::from(degraded_result());

        assert_eq!(response.overall_status(), ServiceStatus::Degraded);
        assert_eq!(response.total_check_duration_ms, 12);
        assert!(response.error_message.is_none());

        let database = &response.components["database"];
        assert_eq!(database.dependencies.len(), 1);
        assert_eq!(database.dependencies[0].name, "database-dependency");
        assert!(database.error_details.is_none());

        let cache = &response.components["cache"];
        assert!(!cache.available);
        assert_eq!(cache.error_details.as_deref(), Some("cache is unavailable"));
    }

    #[test]
    fn test_failed_result_carries_message() {
        let response = proto::HealthCheckResponse::from(AggregateResult::failed("boom", 3));
        assert_eq!(response.overall_status(), ServiceStatus::Unhealthy);
        assert!(response.components.is_empty());
        assert_eq!(
            response.error_message.as_deref(),
            Some("health check failed: boom")
        );
    }

    #[test]
    fn test_unspecified_status_is_rejected() {
        let response = proto::HealthCheckResponse {
            overall_status: ServiceStatus::Unspecified as i32,
            ..Default::default()
        };
        assert!(matches!(
            AggregateResult::try_from(response),
            Err(Error::Protocol(_))
        ));

        let response = proto::HealthCheckResponse {
            overall_status: 42,
            ..Default::default()
        };
        assert!(AggregateResult::try_from(response).is_err());
    }

    #[test]
    fn test_response_back_to_model() {
        let original = degraded_result();
        let decoded =
            AggregateResult::try_from(proto::HealthCheckResponse::from(original.clone())).unwrap();
        assert_eq!(decoded, original);
    }
}
