//! gRPC surface
//!
//! Exposes the health core as `health.v1.HealthService` and wires in the
//! standard `grpc.health.v1` service and server reflection.
//!
//! ## Example
//!
//! ```ignore
//! use healthwatch::grpc::HealthServer;
//! use healthwatch::health::ProbeSet;
//!
//! # async fn example(config: healthwatch::config::Config) -> healthwatch::Result<()> {
//! HealthServer::new(config, ProbeSet::placeholders())
//!     .serve_with_shutdown()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod interceptors;
pub mod server;
pub mod service;

/// Generated protobuf types and service stubs
pub mod proto {
    #![allow(missing_docs)]

    tonic::include_proto!("health.v1");

    /// Encoded descriptor set for server reflection
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("health_descriptor");
}

pub use interceptors::{request_id_interceptor, request_id_of, REQUEST_ID_HEADER};
pub use server::{shutdown_signal, HealthServer};
pub use service::GrpcHealthService;

// Re-export tonic types for convenience
pub use tonic::{Code, Request, Response, Status};
