//! Handler traits and the values passed to every invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use plugkit_core::Value;
use serde::de::DeserializeOwned;

use crate::host::{HostCall, HostClient};

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

/// Decoded arguments of an invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(BTreeMap<String, Value>);

impl Args {
    #[must_use]
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self(values)
    }

    /// Returns the argument, or `None` when it is missing or null.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Deserializes all arguments into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not match the shape of `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Value::Struct(self.0.clone())
            .deserialize_into()
            .context("invalid arguments")
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-invocation context: the decoded context struct sent by the host and
/// an optional client for calling back into the host.
#[derive(Clone, Default)]
pub struct Context {
    values: BTreeMap<String, Value>,
    host: Option<Arc<dyn HostClient>>,
}

impl Context {
    #[must_use]
    pub fn new(values: BTreeMap<String, Value>, host: Option<Arc<dyn HostClient>>) -> Self {
        Self { values, host }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    #[must_use]
    pub fn host(&self) -> Option<&Arc<dyn HostClient>> {
        self.host.as_ref()
    }

    /// Calls into the host.
    ///
    /// # Errors
    ///
    /// Fails if no host client is attached or the host call itself fails.
    pub async fn call_host(&self, call: HostCall, payload: Value) -> anyhow::Result<Value> {
        let host = self
            .host
            .as_ref()
            .with_context(|| format!("host call '{call}' requires an attached host client"))?;
        host.call(call, payload).await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values)
            .field("host", &self.host.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// User logic behind a query, mutation, function, or REST endpoint.
///
/// Implemented for any `Fn(Context, Args) -> impl Future<Output =
/// anyhow::Result<Value>>`, so plain async closures can be registered.
/// Returning a [`GraphQlError`](plugkit_core::GraphQlError) inside the
/// `anyhow::Error` produces a structured error for the host.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: Context, args: Args) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Context, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, ctx: Context, args: Args) -> anyhow::Result<Value> {
        (self)(ctx, args).await
    }
}

pub type SharedHandler = Arc<dyn Handler>;

// ---------------------------------------------------------------------------
// HealthProbe
// ---------------------------------------------------------------------------

/// Custom health check aggregated into the built-in health report.
///
/// Should return a struct with a `status` of `healthy`, `degraded`, or
/// `error`, plus any free-form fields.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    async fn check(&self, ctx: Context) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> HealthProbe for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn check(&self, ctx: Context) -> anyhow::Result<Value> {
        (self)(ctx).await
    }
}

pub type SharedProbe = Arc<dyn HealthProbe>;

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn args(pairs: &[(&str, Value)]) -> Args {
        Args::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn null_arguments_read_as_missing() {
        let args = args(&[("name", Value::Null), ("formal", Value::Bool(true))]);
        assert!(args.get("name").is_none());
        assert_eq!(args.bool("formal"), Some(true));
        assert!(args.get("absent").is_none());
    }

    #[derive(Debug, Deserialize)]
    struct Greet {
        name: String,
        formal: bool,
    }

    #[test]
    fn parse_into_typed_arguments() {
        let args = args(&[("name", Value::from("Ada")), ("formal", Value::Bool(true))]);
        let greet: Greet = args.parse().unwrap();
        assert_eq!(greet.name, "Ada");
        assert!(greet.formal);
    }

    #[test]
    fn parse_reports_shape_mismatch() {
        let args = args(&[("name", Value::Number(1.0))]);
        assert!(args.parse::<Greet>().is_err());
    }

    #[tokio::test]
    async fn closures_are_handlers() {
        let handler: SharedHandler = Arc::new(|_ctx: Context, args: Args| async move {
            anyhow::Ok(Value::from(args.str("name").unwrap_or("nobody").to_uppercase()))
        });

        let out = handler
            .call(Context::default(), args(&[("name", Value::from("ada"))]))
            .await
            .unwrap();
        assert_eq!(out, Value::from("ADA"));
    }

    #[tokio::test]
    async fn call_host_without_client_fails() {
        let err = Context::default()
            .call_host(HostCall::GetProject, Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("get_project"));
    }

    struct EchoHost;

    #[async_trait]
    impl HostClient for EchoHost {
        async fn call(&self, call: HostCall, payload: Value) -> anyhow::Result<Value> {
            Ok(Value::List(vec![Value::from(call.as_str()), payload]))
        }
    }

    #[tokio::test]
    async fn call_host_reaches_attached_client() {
        let ctx = Context::new(BTreeMap::new(), Some(Arc::new(EchoHost)));
        let out = ctx
            .call_host(HostCall::Debug, Value::from("ping"))
            .await
            .unwrap();
        assert_eq!(
            out,
            Value::List(vec![Value::from("debug"), Value::from("ping")])
        );
    }
}
