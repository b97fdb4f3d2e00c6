//! Dispatch engine: resolves an [`Invocation`] to its registered handler and
//! runs it with panic isolation.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures_util::FutureExt;
use plugkit_core::Value;
use tower::Service;
use tracing::debug;

use crate::handler::{Args, Context, SharedHandler};
use crate::health::HealthMonitor;
use crate::host::HostClient;
use crate::operation::{ExecutionError, Invocation, OperationKind, HEALTH_CHECK_FUNCTION};
use crate::registry::SchemaRegistry;

/// Routes invocations to handlers in a frozen [`SchemaRegistry`].
///
/// Cheap to clone; every clone shares the same registry and health monitor.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SchemaRegistry>,
    health: Arc<HealthMonitor>,
    host: Option<Arc<dyn HostClient>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<SchemaRegistry>,
        health: Arc<HealthMonitor>,
        host: Option<Arc<dyn HostClient>>,
    ) -> Self {
        Self {
            registry,
            health,
            host,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Executes one invocation.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] for an unknown kind, a lookup miss, a
    /// handler error, or a handler panic. Nothing here tears down the
    /// process.
    pub async fn execute(&self, invocation: Invocation) -> Result<Value, ExecutionError> {
        let kind: OperationKind = invocation.kind.parse()?;
        let name = invocation.name;
        let ctx = Context::new(invocation.context, self.host.clone());

        if kind == OperationKind::System && name == HEALTH_CHECK_FUNCTION {
            return Ok(self.health.check(ctx).await);
        }

        let handler = self
            .resolve(kind, &name)
            .ok_or_else(|| ExecutionError::NotFound {
                kind,
                name: name.clone(),
            })?;
        debug!(id = %invocation.id, kind = %kind, name = %name, "dispatching");

        match AssertUnwindSafe(handler.call(ctx, Args::new(invocation.args)))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ExecutionError::from_handler(&name, err)),
            Err(panic) => Err(ExecutionError::Panicked {
                message: panic_message(panic.as_ref()),
                name,
            }),
        }
    }

    fn resolve(&self, kind: OperationKind, name: &str) -> Option<SharedHandler> {
        match kind {
            OperationKind::GraphqlQuery => self.registry.query(name).map(|e| e.resolver.clone()),
            OperationKind::GraphqlMutation => {
                self.registry.mutation(name).map(|e| e.resolver.clone())
            }
            OperationKind::Function | OperationKind::System => self.registry.function(name).cloned(),
            OperationKind::Rest => self.registry.rest_handler(name).cloned(),
        }
    }
}

impl Service<Invocation> for Dispatcher {
    type Response = Value;
    type Error = ExecutionError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, ExecutionError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.execute(invocation).await })
    }
}

/// Extracts the text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use parking_lot::Mutex;
    use plugkit_core::{
        EndpointBuilder, FieldDescriptor, GraphQlError, HttpMethod, TypeDescriptor,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::PluginInfo;
    use crate::network::ShutdownController;

    fn dispatcher(registry: SchemaRegistry) -> Dispatcher {
        let registry = Arc::new(registry);
        let health = Arc::new(HealthMonitor::new(
            PluginInfo::new("dispatch-test", "0.0.1"),
            Vec::new(),
            Arc::clone(&registry),
            Arc::new(ShutdownController::new()),
        ));
        Dispatcher::new(registry, health, None)
    }

    fn greet_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register_query(
            "greet",
            FieldDescriptor::new(TypeDescriptor::string()),
            |_ctx: Context, args: Args| async move {
                let name = args.str("name").unwrap_or("stranger").to_string();
                let greeting = if args.bool("formal") == Some(true) {
                    format!("Good day, {name}!")
                } else {
                    format!("Hi, {name}!")
                };
                anyhow::Ok(Value::from(greeting))
            },
        );
        registry
    }

    fn args(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn greet_query_returns_exact_string() {
        let invocation = Invocation::new("graphql_query", "greet").with_args(args(&[
            ("name", Value::from("Ada")),
            ("formal", Value::Bool(true)),
        ]));

        let result = dispatcher(greet_registry()).execute(invocation).await.unwrap();
        assert_eq!(result, Value::from("Good day, Ada!"));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SchemaRegistry::new();
        for label in ["first", "second"] {
            let calls = Arc::clone(&calls);
            registry.register_query(
                "x",
                FieldDescriptor::new(TypeDescriptor::string()),
                move |_ctx: Context, _args: Args| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.lock().push(label);
                        anyhow::Ok(Value::from(label))
                    }
                },
            );
        }

        let result = dispatcher(registry)
            .execute(Invocation::new("graphql_query", "x"))
            .await
            .unwrap();
        assert_eq!(result, Value::from("second"));
        assert_eq!(*calls.lock(), vec!["second"]);
    }

    #[tokio::test]
    async fn unknown_name_fails_with_the_name_for_every_kind() {
        let dispatcher = dispatcher(SchemaRegistry::new());
        for kind in ["graphql_query", "graphql_mutation", "function", "system", "rest_api"] {
            let err = dispatcher
                .execute(Invocation::new(kind, "does_not_exist"))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("does_not_exist"), "{kind}: {err}");
        }
    }

    #[tokio::test]
    async fn unknown_kind_fails() {
        let err = dispatcher(SchemaRegistry::new())
            .execute(Invocation::new("graphql_subscription", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownKind { .. }));
    }

    #[tokio::test]
    async fn failing_handler_does_not_poison_later_calls() {
        let mut registry = greet_registry();
        registry.register_function("explode", |_ctx: Context, _args: Args| async move {
            Err::<Value, _>(anyhow::anyhow!("boom"))
        });
        let dispatcher = dispatcher(registry);

        let err = dispatcher
            .execute(Invocation::new("function", "explode"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));

        let ok = dispatcher
            .execute(Invocation::new("graphql_query", "greet"))
            .await
            .unwrap();
        assert_eq!(ok, Value::from("Hi, stranger!"));
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let mut registry = greet_registry();
        registry.register_function("crash", |_ctx: Context, _args: Args| async move {
            if true {
                panic!("handler went sideways");
            }
            anyhow::Ok(Value::Null)
        });
        let dispatcher = dispatcher(registry);

        let err = dispatcher
            .execute(Invocation::new("function", "crash"))
            .await
            .unwrap_err();
        match err {
            ExecutionError::Panicked { name, message } => {
                assert_eq!(name, "crash");
                assert_eq!(message, "handler went sideways");
            }
            other => panic!("expected panic error, got {other:?}"),
        }

        assert!(dispatcher
            .execute(Invocation::new("graphql_query", "greet"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn domain_errors_are_lifted() {
        let mut registry = SchemaRegistry::new();
        registry.register_mutation(
            "deleteUser",
            FieldDescriptor::new(TypeDescriptor::boolean()),
            |_ctx: Context, _args: Args| async move {
                Err::<Value, _>(GraphQlError::not_found("User", "42").into())
            },
        );

        let err = dispatcher(registry)
            .execute(Invocation::new("graphql_mutation", "deleteUser"))
            .await
            .unwrap_err();
        match err {
            ExecutionError::Domain(domain) => {
                assert_eq!(domain.message, "User '42' not found");
            }
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rest_lookup_falls_back_to_derived_key() {
        let mut registry = SchemaRegistry::new();
        let endpoint = EndpointBuilder::new(HttpMethod::Get, "/users/list")
            .handler("listUsers")
            .build();
        registry.register_rest_endpoint(endpoint, |_ctx: Context, _args: Args| async move {
            anyhow::Ok(Value::List(vec![Value::from("ada"), Value::from("grace")]))
        });
        let dispatcher = dispatcher(registry);

        let by_handler = dispatcher
            .execute(Invocation::new("rest_api", "listUsers"))
            .await
            .unwrap();
        let by_convention = dispatcher
            .execute(Invocation::new("rest", "rest_get_users_list"))
            .await
            .unwrap();
        assert_eq!(by_handler, by_convention);
    }

    #[tokio::test]
    async fn system_health_check_needs_no_registration() {
        let report = dispatcher(SchemaRegistry::new())
            .execute(Invocation::new("system", HEALTH_CHECK_FUNCTION))
            .await
            .unwrap();
        assert_eq!(report.get("status"), Some(&Value::from("healthy")));
    }

    #[tokio::test]
    async fn handler_sees_context_and_args() {
        let mut registry = SchemaRegistry::new();
        registry.register_function("whoami", |ctx: Context, args: Args| async move {
            let user = ctx.get("user_id").cloned().unwrap_or_default();
            let echo = args.get("echo").cloned().unwrap_or_default();
            anyhow::Ok(Value::List(vec![user, echo]))
        });

        let invocation = Invocation::new("function", "whoami")
            .with_args(args(&[("echo", Value::from("hello"))]))
            .with_context(args(&[("user_id", Value::from("u-1"))]));
        let result = dispatcher(registry).oneshot(invocation).await.unwrap();
        assert_eq!(
            result,
            Value::List(vec![Value::from("u-1"), Value::from("hello")])
        );
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
