//! gRPC server with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;

use super::interceptors::request_id_interceptor;
use super::proto::health_service_server::HealthServiceServer;
use super::proto::FILE_DESCRIPTOR_SET;
use super::service::GrpcHealthService;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::health::{
    AggregationEngine, HealthCheckService, ProbeSet, WatchScheduler, WatchSettings,
};

type ServeFuture =
    Pin<Box<dyn Future<Output = std::result::Result<(), tonic::transport::Error>> + Send>>;

/// Health service process: gRPC endpoint plus watch scheduler
#[derive(Debug)]
pub struct HealthServer {
    config: Config,
    health: HealthCheckService,
    scheduler: WatchScheduler,
}

impl HealthServer {
    /// Wire the health core from configuration and a probe registry
    pub fn new(config: Config, probes: ProbeSet) -> Self {
        let version = config.service.version.clone();
        let engine = AggregationEngine::from_config(probes, &config.health, version.clone());
        let health = HealthCheckService::new(engine, version);
        let scheduler = WatchScheduler::new(health.clone(), WatchSettings::from(&config.health));

        Self {
            config,
            health,
            scheduler,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One-shot check service
    pub fn health(&self) -> &HealthCheckService {
        &self.health
    }

    /// Watch scheduler
    pub fn scheduler(&self) -> &WatchScheduler {
        &self.scheduler
    }

    /// Socket address for the configured port
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.service.port))
    }

    /// Serve on the configured port until SIGINT or SIGTERM
    pub async fn serve_with_shutdown(self) -> Result<()> {
        let addr = self.socket_addr();
        let (router, reporter) = self.router().await?;

        tracing::info!("Starting {} on {}", self.config.service.name, addr);

        let stop = CancellationToken::new();
        let serving: ServeFuture =
            Box::pin(router.serve_with_shutdown(addr, stop.clone().cancelled_owned()));

        self.run(serving, stop, reporter, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `signal` resolves
    pub async fn serve_with_listener<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        let (router, reporter) = self.router().await?;

        tracing::info!("Starting {} on {}", self.config.service.name, local_addr);

        let stop = CancellationToken::new();
        let serving: ServeFuture = Box::pin(router.serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            stop.clone().cancelled_owned(),
        ));

        self.run(serving, stop, reporter, signal).await
    }

    /// Build the tonic server with transport limits from configuration
    fn builder(&self) -> Server {
        let grpc = &self.config.grpc;
        let frame_size = u32::try_from(grpc.max_message_size_bytes()).unwrap_or(u32::MAX);

        Server::builder()
            .max_frame_size(Some(frame_size))
            .tcp_keepalive(Some(grpc.tcp_keepalive()))
    }

    async fn router(&self) -> Result<(Router, HealthReporter)> {
        let grpc = &self.config.grpc;

        let (reporter, standard_health) = tonic_health::server::health_reporter();
        reporter
            .set_serving::<HealthServiceServer<GrpcHealthService>>()
            .await;

        let service = HealthServiceServer::new(GrpcHealthService::new(
            self.health.clone(),
            self.scheduler.clone(),
        ))
        .max_decoding_message_size(grpc.max_message_size_bytes())
        .max_encoding_message_size(grpc.max_message_size_bytes());

        let reflection = if grpc.reflection_enabled {
            let service = tonic_reflection::server::Builder::configure()
                .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
                .build_v1()
                .map_err(|e| Error::Reflection(e.to_string()))?;
            Some(service)
        } else {
            None
        };

        tracing::info!("gRPC configuration:");
        tracing::info!("  - Request ID tracking: enabled");
        tracing::info!("  - Max message size: {} MB", grpc.max_message_size_mb);
        tracing::info!("  - Reflection: {}", grpc.reflection_enabled);
        tracing::info!("  - Standard health service: {}", grpc.standard_health_enabled);

        let router = self
            .builder()
            .add_service(InterceptedService::new(service, request_id_interceptor))
            .add_optional_service(grpc.standard_health_enabled.then_some(standard_health))
            .add_optional_service(reflection);

        Ok((router, reporter))
    }

    /// Wait for the signal, then stop in order: health status, watches,
    /// listener, active calls
    async fn run<F>(
        self,
        serving: ServeFuture,
        stop: CancellationToken,
        reporter: HealthReporter,
        signal: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut server = tokio::spawn(serving);

        tokio::select! {
            () = signal => {}
            finished = &mut server => {
                // The transport stopped on its own, usually a bind failure
                self.scheduler.shutdown().await;
                return match finished {
                    Ok(result) => result.map_err(Error::from),
                    Err(e) => Err(Error::Internal(format!("server task failed: {}", e))),
                };
            }
        }

        tracing::info!("Shutdown signal received, draining requests...");

        reporter
            .set_not_serving::<HealthServiceServer<GrpcHealthService>>()
            .await;
        reporter
            .set_service_status("", ServingStatus::NotServing)
            .await;

        self.scheduler.shutdown().await;
        stop.cancel();

        let drain = self.config.grpc.shutdown_timeout();
        let drained = tokio::time::timeout(drain, &mut server).await;

        match drained {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(Error::Internal(format!("server task failed: {}", e))),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = drain.as_secs(),
                    "Active calls did not drain in time, forcing close"
                );
                server.abort();
            }
        }

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HealthClient;
    use crate::health::{OverallStatus, ProbeReport, StaticProbe};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tonic::transport::Endpoint;
    use tonic_health::pb::health_check_response::ServingStatus as StandardStatus;
    use tonic_health::pb::health_client::HealthClient as StandardHealthClient;
    use tonic_health::pb::HealthCheckRequest as StandardCheckRequest;

    async fn start(
        probes: ProbeSet,
    ) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = HealthServer::new(Config::default(), probes);
        let handle = tokio::spawn(server.serve_with_listener(listener, async move {
            let _ = stop_rx.await;
        }));

        (endpoint, stop_tx, handle)
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let probes = ProbeSet::placeholders().with("cache", StaticProbe::new(ProbeReport::down()));
        let (endpoint, stop, handle) = start(probes).await;

        let mut client = HealthClient::connect(endpoint.clone()).await.unwrap();

        let ping = client.ping().await.unwrap();
        assert!(ping.success);
        assert_eq!(ping.version, env!("CARGO_PKG_VERSION"));

        let result = client
            .check(vec!["database".to_string(), "cache".to_string()], true, 0)
            .await
            .unwrap();
        assert_eq!(result.overall_status, OverallStatus::Degraded);
        assert_eq!(result.components.len(), 2);
        assert_eq!(result.components["database"].dependencies.len(), 1);

        let channel = Endpoint::from_shared(endpoint).unwrap().connect().await.unwrap();
        let mut standard = StandardHealthClient::new(channel);
        let status = standard
            .check(StandardCheckRequest {
                service: "health.v1.HealthService".to_string(),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(status.status(), StandardStatus::Serving);

        drop(client);
        drop(standard);
        let _ = stop.send(());
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("server stops")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_standard_health_reports_not_serving_on_shutdown() {
        let (endpoint, stop, handle) = start(ProbeSet::placeholders()).await;

        let channel = Endpoint::from_shared(endpoint).unwrap().connect().await.unwrap();
        let mut standard = StandardHealthClient::new(channel);
        let mut statuses = standard
            .watch(StandardCheckRequest {
                service: "health.v1.HealthService".to_string(),
            })
            .await
            .unwrap()
            .into_inner();

        let initial = statuses.message().await.unwrap().unwrap();
        assert_eq!(initial.status(), StandardStatus::Serving);

        let _ = stop.send(());

        let changed = tokio::time::timeout(Duration::from_secs(10), statuses.message())
            .await
            .expect("status change after shutdown signal")
            .unwrap()
            .unwrap();
        assert_eq!(changed.status(), StandardStatus::NotServing);

        drop(statuses);
        drop(standard);
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("server stops")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_ends_watch_streams() {
        let (endpoint, stop, handle) = start(ProbeSet::placeholders()).await;

        let mut client = HealthClient::connect(endpoint).await.unwrap();
        let mut updates = client
            .watch(vec!["database".to_string()], 1)
            .await
            .unwrap();

        let first = updates.next().await.unwrap().unwrap();
        assert_eq!(first.overall_status, OverallStatus::Healthy);

        let _ = stop.send(());

        let ended = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(Ok(_)) = updates.next().await {}
        })
        .await;
        assert!(ended.is_ok(), "watch stream should end on shutdown");
        drop(updates);
        drop(client);

        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("server stops")
            .unwrap()
            .unwrap();
    }
}
