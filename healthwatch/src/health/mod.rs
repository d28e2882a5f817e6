//! Health checking core
//!
//! - [`probe`]: per-component probes and their registry
//! - [`engine`]: concurrent probe execution and result merging
//! - [`service`]: ping and one-shot aggregated checks
//! - [`scheduler`]: periodic checks pushed to watch subscribers

pub mod engine;
pub mod model;
pub mod probe;
pub mod scheduler;
pub mod service;

pub use engine::AggregationEngine;
pub use model::{AggregateResult, ComponentHealth, DependencyInfo, OverallStatus, PingResult};
pub use probe::{ComponentProbe, FnProbe, ProbeReport, ProbeSet, StaticProbe};
pub use scheduler::{
    SubscriptionHandle, SubscriptionId, WatchScheduler, WatchSettings, WatchSink, WatchUpdates,
    MIN_WATCH_INTERVAL,
};
pub use service::HealthCheckService;
