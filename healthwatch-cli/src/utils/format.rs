use chrono::{DateTime, SecondsFormat};
use colored::{ColoredString, Colorize};
use healthwatch::health::{AggregateResult, ComponentHealth, OverallStatus};

/// Overall status colored by severity
pub fn status_label(status: OverallStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        OverallStatus::Healthy => label.green().bold(),
        OverallStatus::Degraded => label.yellow().bold(),
        OverallStatus::Unhealthy => label.red().bold(),
    }
}

/// Epoch milliseconds as RFC 3339 UTC
pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "invalid timestamp".to_string())
}

/// Components ordered by name
pub fn sorted_components(result: &AggregateResult) -> Vec<(&str, &ComponentHealth)> {
    let mut components: Vec<_> = result
        .components
        .iter()
        .map(|(name, health)| (name.as_str(), health))
        .collect();
    components.sort_by(|a, b| a.0.cmp(b.0));
    components
}

/// Full check result with component and dependency details
pub fn print_result(result: &AggregateResult) {
    println!("  Overall Status: {}", status_label(result.overall_status));
    println!("  Duration: {}ms", result.duration_ms);

    if let Some(message) = &result.error_message {
        println!("  {} {}", "Error Message:".yellow(), message);
    }

    println!("  Component Details:");
    for (name, health) in sorted_components(result) {
        println!(
            "    {}: Available={}, Functional={}, ResponseTime={}ms",
            name.bold(),
            health.available,
            health.functional,
            health.response_time_ms
        );

        if let Some(details) = &health.error_details {
            println!("      {} {}", "Error:".yellow(), details);
        }
        if let Some(info) = &health.last_check_info {
            println!("      Note: {}", info);
        }
        for dep in &health.dependencies {
            println!(
                "      Dependency {}: Available={}, Version={}",
                dep.name, dep.available, dep.version
            );
        }
    }
}

/// One watch update, numbered from 1
pub fn print_update(sequence: usize, result: &AggregateResult) {
    println!(
        "Health update #{} at {}: {}",
        sequence,
        chrono::Utc::now().format("%H:%M:%S"),
        status_label(result.overall_status)
    );

    for (name, health) in sorted_components(result) {
        println!(
            "  {} - Available: {}, Functional: {}",
            name, health.available, health.functional
        );
    }
}
