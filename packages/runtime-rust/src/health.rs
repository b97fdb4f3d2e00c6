//! Built-in health report aggregating user-registered probes.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use futures_util::FutureExt;
use plugkit_core::Value;
use tracing::warn;

use crate::config::PluginInfo;
use crate::dispatch::panic_message;
use crate::handler::{Context, SharedProbe};
use crate::network::ShutdownController;
use crate::registry::SchemaRegistry;

pub const STATUS_HEALTHY: &str = "healthy";
pub const STATUS_DEGRADED: &str = "degraded";
pub const STATUS_ERROR: &str = "error";

/// Builds the health report returned by the `system`/`health_check`
/// operation.
///
/// The base record describes the plugin itself; every registered probe then
/// runs in registration order and its result lands under
/// `checks.custom_check_<index>`. A probe that reports anything but
/// `healthy`, fails, or panics downgrades the aggregate to `degraded`.
pub struct HealthMonitor {
    info: PluginInfo,
    probes: Vec<SharedProbe>,
    registry: Arc<SchemaRegistry>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl HealthMonitor {
    #[must_use]
    pub fn new(
        info: PluginInfo,
        probes: Vec<SharedProbe>,
        registry: Arc<SchemaRegistry>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            info,
            probes,
            registry,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Runs all probes and assembles the report. Never fails.
    pub async fn check(&self, ctx: Context) -> Value {
        let mut status = STATUS_HEALTHY;
        let mut checks = BTreeMap::new();

        for (index, probe) in self.probes.iter().enumerate() {
            let outcome = AssertUnwindSafe(probe.check(ctx.clone()))
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(Ok(value)) => value,
                Ok(Err(err)) => error_record(&format!("{err:#}")),
                Err(panic) => error_record(&panic_message(panic.as_ref())),
            };

            if result.get("status").and_then(Value::as_str) != Some(STATUS_HEALTHY) {
                warn!(probe = index, result = %result, "health probe not healthy");
                status = STATUS_DEGRADED;
            }
            checks.insert(format!("custom_check_{index}"), result);
        }

        let mut report = self.base_record();
        report.insert("status".to_string(), Value::from(status));
        report.insert("checks".to_string(), Value::Struct(checks));
        Value::Struct(report)
    }

    #[allow(clippy::cast_precision_loss)]
    fn base_record(&self) -> BTreeMap<String, Value> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());

        let plugin = record([
            ("name", Value::from(self.info.name.as_str())),
            ("version", Value::from(self.info.version.as_str())),
        ]);
        let resources = record([
            ("pid", Value::from(std::process::id())),
            (
                "in_flight",
                Value::Number(self.shutdown.in_flight_count() as f64),
            ),
            ("state", Value::from(self.shutdown.state().as_str())),
        ]);
        let registry = &self.registry;
        let capabilities = record([
            (
                "graphql",
                Value::Bool(registry.query_count() + registry.mutation_count() > 0),
            ),
            ("queries", Value::Number(registry.query_count() as f64)),
            ("mutations", Value::Number(registry.mutation_count() as f64)),
            ("rest", Value::Bool(registry.endpoint_count() > 0)),
            ("functions", Value::Bool(registry.function_count() > 0)),
        ]);
        let environment = record([
            ("runtime", Value::from("rust")),
            ("os", Value::from(std::env::consts::OS)),
            ("arch", Value::from(std::env::consts::ARCH)),
            ("debug", Value::Bool(cfg!(debug_assertions))),
        ]);

        let mut out = BTreeMap::new();
        out.insert("plugin".to_string(), plugin);
        out.insert(
            "uptime_secs".to_string(),
            Value::Number(self.start_time.elapsed().as_secs_f64()),
        );
        out.insert("timestamp_ms".to_string(), Value::Number(timestamp_ms as f64));
        out.insert("resources".to_string(), resources);
        out.insert("capabilities".to_string(), capabilities);
        out.insert("environment".to_string(), environment);
        out
    }
}

fn record<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Struct(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn error_record(message: &str) -> Value {
    record([
        ("status", Value::from(STATUS_ERROR)),
        ("error", Value::from(message)),
    ])
}
