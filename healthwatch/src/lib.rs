//! # healthwatch
//!
//! gRPC health-check service: a liveness ping, one-shot aggregated readiness
//! checks over named components, and server-streamed periodic health watches.
//!
//! ## Features
//!
//! - **Aggregation**: probes run concurrently, each bounded by a timeout;
//!   a failing, slow or panicking probe only marks its own component down
//! - **Watch**: fixed-rate per-subscription ticks, in-order delivery,
//!   cancellation on client disconnect
//! - **Graceful shutdown**: NOT_SERVING, watch streams closed, active calls
//!   drained within a bound
//! - **Standard services**: `grpc.health.v1` and server reflection
//!
//! ## Example
//!
//! ```rust,no_run
//! use healthwatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // Register real probes here; placeholders always report healthy
//!     let probes = ProbeSet::placeholders();
//!
//!     // Run until SIGINT/SIGTERM
//!     HealthServer::new(config, probes)
//!         .serve_with_shutdown()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod grpc;
pub mod health;
pub mod observability;

pub use error::{Error, ProbeError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{HealthClient, WatchStream};
    pub use crate::config::{Config, GrpcConfig, HealthConfig, RuntimeConfig, ServiceConfig};
    pub use crate::error::{Error, ProbeError, Result};
    pub use crate::grpc::{request_id_interceptor, GrpcHealthService, HealthServer};
    pub use crate::health::{
        AggregateResult, AggregationEngine, ComponentHealth, ComponentProbe, DependencyInfo,
        FnProbe, HealthCheckService, OverallStatus, PingResult, ProbeReport, ProbeSet,
        StaticProbe, SubscriptionHandle, SubscriptionId, WatchScheduler, WatchSettings,
    };
    pub use crate::observability::init_tracing;
}
