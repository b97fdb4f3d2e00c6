//! Metrics middleware for invocations.
//!
//! Wraps each invocation in a `tracing` span carrying its duration and
//! outcome, and feeds the `metrics` facade. No exporter is installed here;
//! embedders that want the numbers install a recorder themselves.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use plugkit_core::Value;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::operation::{ExecutionError, Invocation};

/// Counter of completed invocations, labelled by `kind` and `outcome`.
pub const OPERATIONS_TOTAL: &str = "plugkit_operations_total";

/// Histogram of invocation latency in milliseconds, labelled by `kind`.
pub const OPERATION_DURATION_MS: &str = "plugkit_operation_duration_ms";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments invocations with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Invocation> for MetricsService<S>
where
    S: Service<Invocation, Response = Value, Error = ExecutionError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = ExecutionError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, ExecutionError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let kind = invocation.kind.clone();
        let name = invocation.name.clone();

        let span = info_span!(
            "invocation",
            id = %invocation.id,
            kind = %kind,
            name = %name,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(invocation);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.label(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!(OPERATIONS_TOTAL, "kind" => kind.clone(), "outcome" => outcome)
                    .increment(1);
                metrics::histogram!(OPERATION_DURATION_MS, "kind" => kind)
                    .record(elapsed.as_secs_f64() * 1000.0);

                match &result {
                    Ok(value) => tracing::info!(
                        name = %name,
                        duration_ms,
                        result = value.kind_name(),
                        "invocation complete"
                    ),
                    Err(err) => tracing::warn!(
                        name = %name,
                        duration_ms,
                        outcome,
                        error = %err,
                        "invocation failed"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
