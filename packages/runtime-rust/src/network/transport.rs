//! RPC transport with a deferred startup lifecycle.
//!
//! `bind()` takes the port, `emit_handshake()` announces it to the host, and
//! `serve()` accepts calls until the termination signal fires. Keeping the
//! steps apart lets the bootstrap sequence record each state transition.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{info, warn};

use super::handshake::{write_handshake, BootstrapError, LISTEN_HOST};
use super::shutdown::{BootstrapState, ShutdownController};
use crate::proto::plugin_server::PluginServer;
use crate::service::PluginService;

/// Owns the listener from bind until the server shuts down.
pub struct Transport {
    requested_port: u16,
    grace: Duration,
    listener: Option<TcpListener>,
    port: Option<u16>,
    shutdown: Arc<ShutdownController>,
}

impl Transport {
    /// Creates a transport without binding. Port 0 means OS-assigned.
    #[must_use]
    pub fn new(requested_port: u16, grace: Duration, shutdown: Arc<ShutdownController>) -> Self {
        Self {
            requested_port,
            grace,
            listener: None,
            port: None,
            shutdown,
        }
    }

    /// The bound port, once `bind()` has succeeded.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Binds the listener on the loopback interface.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Bind`] if the address cannot be bound.
    pub async fn bind(&mut self) -> Result<u16, BootstrapError> {
        let addr = format!("{LISTEN_HOST}:{}", self.requested_port);
        let bind_err = |source| BootstrapError::Bind {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let port = listener.local_addr().map_err(bind_err)?.port();

        info!(host = LISTEN_HOST, port, "RPC listener bound");
        self.listener = Some(listener);
        self.port = Some(port);
        self.shutdown.advance(BootstrapState::ListenerBound);
        Ok(port)
    }

    /// Writes the handshake line for the bound port to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::NotBound`] before `bind()`, or
    /// [`BootstrapError::Handshake`] if the write fails.
    pub fn emit_handshake<W: Write>(&self, out: &mut W) -> Result<(), BootstrapError> {
        let port = self.port.ok_or(BootstrapError::NotBound)?;
        write_handshake(out, port)?;
        self.shutdown.advance(BootstrapState::HandshakeEmitted);
        Ok(())
    }

    /// Serves `service` until `signal` resolves, then drains.
    ///
    /// After the signal the server stops accepting new calls and in-flight
    /// calls get up to the grace period to finish. Anything still running
    /// after that is abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::NotBound`] before `bind()`, or the server
    /// error if it stops on its own.
    pub async fn serve(
        self,
        service: PluginService,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), BootstrapError> {
        let listener = self.listener.ok_or(BootstrapError::NotBound)?;
        let shutdown = self.shutdown;
        let grace = self.grace;

        let mut stop = shutdown.shutdown_receiver();
        let server = tonic::transport::Server::builder()
            .add_service(PluginServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                // Sender lives as long as the controller.
                let _ = stop.changed().await;
            });
        let mut server_task = tokio::spawn(server);

        shutdown.advance(BootstrapState::Serving);
        info!("serving");

        tokio::select! {
            joined = &mut server_task => {
                shutdown.advance(BootstrapState::Stopped);
                return Ok(joined??);
            }
            () = signal => {
                info!("termination signal received, draining in-flight calls");
                shutdown.trigger_shutdown();
            }
        }

        if shutdown.wait_for_drain(grace).await {
            info!("in-flight calls drained");
            match tokio::time::timeout(grace, &mut server_task).await {
                Ok(joined) => {
                    if let Err(err) = joined? {
                        warn!(error = %err, "RPC server reported an error while closing");
                    }
                }
                Err(_) => {
                    warn!("RPC server did not close in time, aborting");
                    server_task.abort();
                }
            }
        } else {
            warn!(
                remaining = shutdown.in_flight_count(),
                grace_secs = grace.as_secs(),
                "drain timeout expired, abandoning in-flight calls"
            );
            server_task.abort();
        }

        shutdown.advance(BootstrapState::Stopped);
        Ok(())
    }
}

/// Returns a future resolving on SIGINT or SIGTERM.
///
/// Handlers are installed when this is called, not when the future is first
/// polled, so a signal arriving right after the handshake is not lost.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
#[cfg(unix)]
pub fn termination_signal() -> impl Future<Output = ()> + Send + 'static {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = signal(SignalKind::interrupt());
    let terminate = signal(SignalKind::terminate());
    async move {
        match (interrupt, terminate) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => {}
                    _ = terminate.recv() => {}
                }
            }
            _ => {
                warn!("failed to install unix signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
}

/// Returns a future resolving on ctrl-c.
#[cfg(not(unix))]
pub fn termination_signal() -> impl Future<Output = ()> + Send + 'static {
    async {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use plugkit_core::codec::struct_to_wire;
    use plugkit_core::Value;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    use super::*;
    use crate::config::PluginInfo;
    use crate::dispatch::Dispatcher;
    use crate::handler::{Args, Context};
    use crate::health::HealthMonitor;
    use crate::lifecycle::LifecycleController;
    use crate::proto::plugin_client::PluginClient;
    use crate::proto::{Empty, ExecuteRequest};
    use crate::registry::SchemaRegistry;

    fn service(shutdown: &Arc<ShutdownController>) -> PluginService {
        let info = PluginInfo::new("transport-test", "0.9.0");
        let mut registry = SchemaRegistry::new();
        registry.register_function("echo", |_ctx: Context, args: Args| async move {
            anyhow::Ok(args.get("text").cloned().unwrap_or_default())
        });
        registry.register_function("sleep", |_ctx: Context, args: Args| async move {
            let ms = args.f64("ms").unwrap_or_default();
            tokio::time::sleep(Duration::from_secs_f64(ms / 1000.0)).await;
            anyhow::Ok(Value::Bool(true))
        });
        let registry = Arc::new(registry);
        let health = Arc::new(HealthMonitor::new(
            info.clone(),
            Vec::new(),
            Arc::clone(&registry),
            Arc::clone(shutdown),
        ));
        PluginService::new(
            Dispatcher::new(registry, health, None),
            LifecycleController::new(info),
            Arc::clone(shutdown),
        )
    }

    #[tokio::test]
    async fn bind_uses_os_assigned_port() {
        let shutdown = Arc::new(ShutdownController::new());
        let mut transport = Transport::new(0, Duration::from_secs(1), Arc::clone(&shutdown));

        let port = transport.bind().await.unwrap();
        assert!(port > 0);
        assert_eq!(transport.port(), Some(port));
        assert_eq!(shutdown.state(), BootstrapState::ListenerBound);
    }

    #[tokio::test]
    async fn handshake_before_bind_fails() {
        let transport = Transport::new(0, Duration::from_secs(1), Arc::new(ShutdownController::new()));
        let mut out = Vec::new();
        assert!(matches!(
            transport.emit_handshake(&mut out),
            Err(BootstrapError::NotBound)
        ));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn serve_before_bind_fails() {
        let shutdown = Arc::new(ShutdownController::new());
        let transport = Transport::new(0, Duration::from_secs(1), Arc::clone(&shutdown));
        let result = transport.serve(service(&shutdown), std::future::pending()).await;
        assert!(matches!(result, Err(BootstrapError::NotBound)));
    }

    #[tokio::test]
    async fn serves_calls_then_stops_on_signal() {
        let shutdown = Arc::new(ShutdownController::new());
        let mut transport = Transport::new(0, Duration::from_secs(2), Arc::clone(&shutdown));
        let port = transport.bind().await.unwrap();

        let mut handshake = Vec::new();
        transport.emit_handshake(&mut handshake).unwrap();
        assert_eq!(
            String::from_utf8(handshake).unwrap(),
            format!("1|1|tcp|127.0.0.1:{port}|grpc\n")
        );
        assert_eq!(shutdown.state(), BootstrapState::HandshakeEmitted);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let svc = service(&shutdown);
        let server = tokio::spawn(transport.serve(svc, async move {
            let _ = stop_rx.await;
        }));

        let mut client = PluginClient::connect(format!("http://127.0.0.1:{port}"))
            .await
            .unwrap();

        let version = client.get_version(Empty {}).await.unwrap().into_inner();
        assert_eq!(version.version, "0.9.0");

        let args: BTreeMap<String, Value> =
            [("text".to_string(), Value::from("ping"))].into_iter().collect();
        let resp = client
            .execute(ExecuteRequest {
                operation_name: "echo".to_string(),
                operation_kind: "function".to_string(),
                args: Some(struct_to_wire(&args)),
                context: None,
            })
            .await
            .unwrap()
            .into_inner();
        assert!(resp.success, "{}", resp.message);
        assert_eq!(shutdown.state(), BootstrapState::Serving);

        drop(client);
        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(shutdown.state(), BootstrapState::Stopped);
    }
    fn sleep_request(ms: f64) -> ExecuteRequest {
        let args: BTreeMap<String, Value> =
            [("ms".to_string(), Value::Number(ms))].into_iter().collect();
        ExecuteRequest {
            operation_name: "sleep".to_string(),
            operation_kind: "function".to_string(),
            args: Some(struct_to_wire(&args)),
            context: None,
        }
    }

    async fn wait_for_in_flight(shutdown: &ShutdownController) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while shutdown.in_flight_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("call never became in-flight");
    }

    /// Binds, starts serving, and returns the server task plus its stop
    /// trigger and a connected client.
    async fn start(
        shutdown: &Arc<ShutdownController>,
        grace: Duration,
    ) -> (
        tokio::task::JoinHandle<Result<(), BootstrapError>>,
        oneshot::Sender<()>,
        PluginClient<tonic::transport::Channel>,
    ) {
        let mut transport = Transport::new(0, grace, Arc::clone(shutdown));
        let port = transport.bind().await.unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(transport.serve(service(shutdown), async move {
            let _ = stop_rx.await;
        }));
        let client = PluginClient::connect(format!("http://127.0.0.1:{port}"))
            .await
            .unwrap();
        (server, stop_tx, client)
    }

    #[tokio::test]
    async fn in_flight_call_finishes_within_grace() {
        let shutdown = Arc::new(ShutdownController::new());
        let (server, stop_tx, mut client) = start(&shutdown, Duration::from_secs(5)).await;

        let call = tokio::spawn(async move {
            client
                .execute(sleep_request(300.0))
                .await
                .map(|resp| resp.into_inner().success)
        });
        wait_for_in_flight(&shutdown).await;

        stop_tx.send(()).unwrap();
        let succeeded = call.await.unwrap().unwrap();
        assert!(succeeded);

        server.await.unwrap().unwrap();
        assert_eq!(shutdown.state(), BootstrapState::Stopped);
        assert_eq!(shutdown.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn in_flight_call_is_abandoned_after_grace() {
        let shutdown = Arc::new(ShutdownController::new());
        let (server, stop_tx, mut client) = start(&shutdown, Duration::from_millis(200)).await;

        let call = tokio::spawn(async move { client.execute(sleep_request(10_000.0)).await });
        wait_for_in_flight(&shutdown).await;

        let stopped_at = Instant::now();
        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("serve did not return after the grace period")
            .unwrap()
            .unwrap();
        assert!(stopped_at.elapsed() < Duration::from_secs(2));
        assert_eq!(shutdown.state(), BootstrapState::Stopped);

        call.abort();
    }
}
