//! Operation kinds, invocations, and execution errors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use plugkit_core::{GraphQlError, Value};
use uuid::Uuid;

/// Built-in system function reporting plugin health. Always available on
/// the `system` kind without registration.
pub const HEALTH_CHECK_FUNCTION: &str = "health_check";

/// Kind of operation requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GraphqlQuery,
    GraphqlMutation,
    Function,
    System,
    Rest,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::GraphqlQuery => "graphql_query",
            OperationKind::GraphqlMutation => "graphql_mutation",
            OperationKind::Function => "function",
            OperationKind::System => "system",
            OperationKind::Rest => "rest_api",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graphql_query" => Ok(OperationKind::GraphqlQuery),
            "graphql_mutation" => Ok(OperationKind::GraphqlMutation),
            "function" => Ok(OperationKind::Function),
            "system" => Ok(OperationKind::System),
            "rest_api" | "rest" => Ok(OperationKind::Rest),
            other => Err(ExecutionError::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// One inbound call to execute, already decoded from the wire.
///
/// The kind is kept as the raw wire string so an unknown kind surfaces as
/// an execution failure rather than a decode error.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub args: BTreeMap<String, Value>,
    pub context: BTreeMap<String, Value>,
}

impl Invocation {
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            name: name.into(),
            args: BTreeMap::new(),
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: BTreeMap<String, Value>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: BTreeMap<String, Value>) -> Self {
        self.context = context;
        self
    }
}

/// Failure of a single invocation. Always reported back to the host inside
/// the response envelope, never as a transport fault.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("unknown operation kind: {kind}")]
    UnknownKind { kind: String },
    #[error("no {kind} handler registered for '{name}'")]
    NotFound { kind: OperationKind, name: String },
    #[error(transparent)]
    Domain(GraphQlError),
    #[error("{name}: {source}")]
    Handler {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{name}: handler panicked: {message}")]
    Panicked { name: String, message: String },
}

impl ExecutionError {
    /// Classifies a handler error, lifting domain errors out of `anyhow`.
    #[must_use]
    pub fn from_handler(name: &str, err: anyhow::Error) -> Self {
        match err.downcast::<GraphQlError>() {
            Ok(domain) => ExecutionError::Domain(domain),
            Err(source) => ExecutionError::Handler {
                name: name.to_string(),
                source,
            },
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionError::UnknownKind { .. } => "unknown_kind",
            ExecutionError::NotFound { .. } => "not_found",
            ExecutionError::Domain(_) => "domain",
            ExecutionError::Handler { .. } => "handler",
            ExecutionError::Panicked { .. } => "panicked",
        }
    }
}
