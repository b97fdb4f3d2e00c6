//! The `plugkit.v1.Plugin` RPC surface.
//!
//! Every method completes at the transport level. Execution failures travel
//! inside the [`ExecuteResponse`] envelope instead of as gRPC status codes.

use std::collections::BTreeMap;
use std::sync::Arc;

use plugkit_core::codec::{encode_endpoint_schema, struct_from_wire, struct_to_wire, to_wire};
use plugkit_core::Value;
use tonic::{Request, Response, Status};
use tower::{Layer, ServiceExt};
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::lifecycle::{EnvVar, LifecycleController, LifecycleStatus};
use crate::middleware::MetricsLayer;
use crate::network::ShutdownController;
use crate::operation::{ExecutionError, Invocation};
use crate::proto::plugin_server::Plugin;
use crate::proto::{
    Empty, Endpoint, ErrorDetail, ExecuteRequest, ExecuteResponse, InitRequest, RestApiResponse,
    ResultValue, SchemaResponse, StatusResponse, VersionResponse,
};

/// Result tag for a bare value (scalar, null, or list).
pub const RESULT_TYPE_VALUE: &str = "value";
/// Result tag for a struct.
pub const RESULT_TYPE_STRUCT: &str = "struct";

/// Error kind for structured domain errors.
pub const ERROR_KIND_GRAPHQL: &str = "graphql";
/// Error kind for every other failure.
pub const ERROR_KIND_EXECUTION: &str = "execution";

/// Serves the plugin RPC surface over a frozen registry.
#[derive(Clone)]
pub struct PluginService {
    dispatcher: Dispatcher,
    lifecycle: LifecycleController,
    shutdown: Arc<ShutdownController>,
}

impl PluginService {
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        lifecycle: LifecycleController,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            dispatcher,
            lifecycle,
            shutdown,
        }
    }

    /// Runs one invocation through the metrics layer and wraps the outcome
    /// in the response envelope.
    pub async fn dispatch(&self, invocation: Invocation) -> ExecuteResponse {
        let _guard = self.shutdown.in_flight_guard();
        let svc = MetricsLayer.layer(self.dispatcher.clone());
        envelope(svc.oneshot(invocation).await)
    }
}

#[tonic::async_trait]
impl Plugin for PluginService {
    async fn init(&self, request: Request<InitRequest>) -> Result<Response<StatusResponse>, Status> {
        let env_vars: Vec<EnvVar> = request
            .into_inner()
            .env_vars
            .into_iter()
            .map(|var| EnvVar {
                key: var.key,
                value: var.value,
                hidden: var.hidden,
                system: var.system_flag,
            })
            .collect();
        Ok(Response::new(status(self.lifecycle.init(&env_vars))))
    }

    async fn migration(&self, _request: Request<Empty>) -> Result<Response<StatusResponse>, Status> {
        Ok(Response::new(status(self.lifecycle.migration())))
    }

    async fn schema_register(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<SchemaResponse>, Status> {
        let schema = self.dispatcher.registry().export_schema();
        debug!(
            queries = schema.queries.len(),
            mutations = schema.mutations.len(),
            "exporting schema"
        );
        Ok(Response::new(SchemaResponse {
            queries: Some(struct_to_wire(&schema.queries)),
            mutations: Some(struct_to_wire(&schema.mutations)),
            subscriptions: Some(struct_to_wire(&schema.subscriptions)),
        }))
    }

    async fn rest_api_register(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<RestApiResponse>, Status> {
        let endpoints = self
            .dispatcher
            .registry()
            .export_endpoints()
            .iter()
            .map(|endpoint| Endpoint {
                method: endpoint.method.as_str().to_string(),
                path: endpoint.path.clone(),
                description: endpoint.description.clone(),
                schema: encode_endpoint_schema(endpoint)
                    .as_struct()
                    .map(struct_to_wire),
                handler: endpoint.handler.clone(),
            })
            .collect::<Vec<_>>();
        debug!(count = endpoints.len(), "exporting REST endpoints");
        Ok(Response::new(RestApiResponse { endpoints }))
    }

    async fn get_version(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<VersionResponse>, Status> {
        Ok(Response::new(VersionResponse {
            version: self.lifecycle.version().to_string(),
        }))
    }

    async fn execute(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<ExecuteResponse>, Status> {
        let req = request.into_inner();
        let invocation = Invocation::new(req.operation_kind, req.operation_name)
            .with_args(struct_from_wire(req.args.as_ref()))
            .with_context(struct_from_wire(req.context.as_ref()));
        Ok(Response::new(self.dispatch(invocation).await))
    }
}

fn status(status: LifecycleStatus) -> StatusResponse {
    StatusResponse {
        success: status.success,
        message: status.message,
    }
}

/// Maps a dispatch outcome onto the wire envelope.
#[must_use]
pub fn envelope(outcome: Result<Value, ExecutionError>) -> ExecuteResponse {
    match outcome {
        Ok(value) => ExecuteResponse {
            success: true,
            message: String::new(),
            result: Some(result_value(&value)),
            error: None,
        },
        Err(err) => {
            let message = err.to_string();
            let (kind, extensions) = match &err {
                ExecutionError::Domain(domain) => (ERROR_KIND_GRAPHQL, domain.extensions()),
                _ => (ERROR_KIND_EXECUTION, BTreeMap::new()),
            };
            ExecuteResponse {
                success: false,
                message: message.clone(),
                result: None,
                error: Some(ErrorDetail {
                    kind: kind.to_string(),
                    message,
                    extensions: Some(struct_to_wire(&extensions)),
                }),
            }
        }
    }
}

fn result_value(value: &Value) -> ResultValue {
    match value {
        Value::Struct(fields) => ResultValue {
            result_type: RESULT_TYPE_STRUCT.to_string(),
            value: None,
            struct_value: Some(struct_to_wire(fields)),
        },
        other => ResultValue {
            result_type: RESULT_TYPE_VALUE.to_string(),
            value: Some(to_wire(other)),
            struct_value: None,
        },
    }
}
