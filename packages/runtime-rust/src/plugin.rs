//! The plugin builder and process entry point.
//!
//! A [`Plugin`] collects registrations, then [`Plugin::serve`] freezes them
//! and runs the bootstrap sequence: secret check, bind, handshake, serve.

use std::collections::HashMap;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use plugkit_core::{EndpointDescriptor, FieldDescriptor};
use tracing::{error, info};

use crate::config::{LogFormat, PluginInfo, RuntimeConfig, MAGIC_COOKIE_ENV};
use crate::dispatch::Dispatcher;
use crate::handler::{Handler, HealthProbe, SharedHandler, SharedProbe};
use crate::health::HealthMonitor;
use crate::host::HostClient;
use crate::lifecycle::LifecycleController;
use crate::network::{
    termination_signal, validate_secret, BootstrapError, BootstrapState, ShutdownController,
    Transport,
};
use crate::registry::SchemaRegistry;
use crate::service::PluginService;
use crate::telemetry::init_tracing;

/// A plugin under construction.
///
/// Registration takes `&mut self` and only happens before serving, so the
/// registry needs no locking once it is frozen.
pub struct Plugin {
    info: PluginInfo,
    registry: SchemaRegistry,
    probes: Vec<SharedProbe>,
    host: Option<Arc<dyn HostClient>>,
}

impl Plugin {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: PluginInfo::new(name, version),
            registry: SchemaRegistry::new(),
            probes: Vec::new(),
            host: None,
        }
    }

    #[must_use]
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Attaches the client handlers use to call back into the host.
    pub fn host_client(&mut self, host: Arc<dyn HostClient>) -> &mut Self {
        self.host = Some(host);
        self
    }

    // -- registration ----------------------------------------------------------

    pub fn register_query(
        &mut self,
        name: &str,
        field: FieldDescriptor,
        resolver: impl Handler,
    ) -> &mut Self {
        self.registry.register_query(name, field, resolver);
        self
    }

    pub fn register_mutation(
        &mut self,
        name: &str,
        field: FieldDescriptor,
        resolver: impl Handler,
    ) -> &mut Self {
        self.registry.register_mutation(name, field, resolver);
        self
    }

    pub fn register_function(&mut self, name: &str, handler: impl Handler) -> &mut Self {
        self.registry.register_function(name, handler);
        self
    }

    pub fn register_rest_endpoint(
        &mut self,
        endpoint: EndpointDescriptor,
        handler: impl Handler,
    ) -> &mut Self {
        self.registry.register_rest_endpoint(endpoint, handler);
        self
    }

    /// Adds a probe to the built-in health report. Probes run in
    /// registration order.
    pub fn register_health_probe(&mut self, probe: impl HealthProbe) -> &mut Self {
        self.probes.push(Arc::new(probe));
        info!(index = self.probes.len() - 1, "registered health probe");
        self
    }

    pub fn register_queries(
        &mut self,
        fields: impl IntoIterator<Item = (String, FieldDescriptor)>,
        resolvers: &HashMap<String, SharedHandler>,
    ) -> &mut Self {
        self.registry.register_queries(fields, resolvers);
        self
    }

    pub fn register_mutations(
        &mut self,
        fields: impl IntoIterator<Item = (String, FieldDescriptor)>,
        resolvers: &HashMap<String, SharedHandler>,
    ) -> &mut Self {
        self.registry.register_mutations(fields, resolvers);
        self
    }

    pub fn register_functions(
        &mut self,
        functions: impl IntoIterator<Item = (String, Option<SharedHandler>)>,
    ) -> &mut Self {
        self.registry.register_functions(functions);
        self
    }

    pub fn register_rest_endpoints(
        &mut self,
        endpoints: impl IntoIterator<Item = EndpointDescriptor>,
        handlers: &HashMap<String, SharedHandler>,
    ) -> &mut Self {
        self.registry.register_rest_endpoints(endpoints, handlers);
        self
    }

    // -- serving ---------------------------------------------------------------

    /// Freezes the registrations into the RPC service.
    #[must_use]
    pub fn into_service(self, shutdown: Arc<ShutdownController>) -> PluginService {
        let registry = Arc::new(self.registry);
        let health = Arc::new(HealthMonitor::new(
            self.info.clone(),
            self.probes,
            Arc::clone(&registry),
            Arc::clone(&shutdown),
        ));
        PluginService::new(
            Dispatcher::new(registry, health, self.host),
            LifecycleController::new(self.info),
            shutdown,
        )
    }

    /// Runs the bootstrap with configuration from the environment and stops
    /// on SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns a [`BootstrapError`] if configuration, the secret check,
    /// binding, or the handshake fails.
    pub async fn serve(self) -> Result<(), BootstrapError> {
        let config = RuntimeConfig::from_env()?;
        let signal = termination_signal();
        self.serve_with(config, signal).await
    }

    /// Runs the bootstrap with explicit configuration, stopping when
    /// `signal` resolves.
    ///
    /// Nothing is bound or written before the secret check passes.
    ///
    /// # Errors
    ///
    /// See [`Plugin::serve`].
    pub async fn serve_with(
        self,
        config: RuntimeConfig,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), BootstrapError> {
        let shutdown = Arc::new(ShutdownController::new());

        validate_secret(config.magic_cookie.as_deref())?;
        shutdown.advance(BootstrapState::SecretValidated);

        info!(
            plugin = %self.info.name,
            version = %self.info.version,
            queries = self.registry.query_count(),
            mutations = self.registry.mutation_count(),
            functions = self.registry.function_count(),
            endpoints = self.registry.endpoint_count(),
            probes = self.probes.len(),
            "starting plugin"
        );

        let mut transport =
            Transport::new(config.port, config.shutdown_grace(), Arc::clone(&shutdown));
        transport.bind().await?;
        transport.emit_handshake(&mut std::io::stdout())?;

        let service = self.into_service(shutdown);
        transport.serve(service, signal).await
    }
}

/// Process entry point for plugin binaries.
///
/// Returns [`ExitCode::FAILURE`] on any bootstrap error, after logging it to
/// stderr, and [`ExitCode::SUCCESS`] after a clean shutdown.
#[must_use]
pub fn run(plugin: Plugin) -> ExitCode {
    let secret = std::env::var(MAGIC_COOKIE_ENV).ok();
    let config = match checked_config(secret.as_deref(), RuntimeConfig::from_env) {
        Ok(config) => config,
        Err(err) => {
            init_tracing(LogFormat::Text);
            error!(error = %err, "plugin bootstrap failed");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(async move {
        let signal = termination_signal();
        plugin.serve_with(config, signal).await
    });
    match outcome {
        Ok(()) => {
            info!("plugin stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "plugin bootstrap failed");
            ExitCode::FAILURE
        }
    }
}

/// Validates `secret` before reading any other setting.
fn checked_config(
    secret: Option<&str>,
    parse: impl FnOnce() -> Result<RuntimeConfig, clap::Error>,
) -> Result<RuntimeConfig, BootstrapError> {
    validate_secret(secret)?;
    Ok(parse()?)
}
