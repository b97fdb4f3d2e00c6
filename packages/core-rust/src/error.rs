//! Domain errors raised by plugin handlers.
//!
//! Unlike generic handler failures, these carry a machine-readable category
//! so the host can render them as structured GraphQL errors.

use std::collections::BTreeMap;

use crate::value::Value;

/// Category of a domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Internal,
    BadInput,
}

impl ErrorCode {
    /// Stable wire code placed under `extensions.code`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Authentication => "UNAUTHENTICATED",
            ErrorCode::Authorization => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Internal => "INTERNAL_SERVER_ERROR",
            ErrorCode::BadInput => "BAD_USER_INPUT",
        }
    }
}

/// Structured error returned from a resolver or handler.
///
/// Handlers return it through `anyhow::Error`; the dispatcher recognizes it
/// by downcasting and serializes `message` plus [`GraphQlError::extensions`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct GraphQlError {
    pub message: String,
    pub code: ErrorCode,
    /// Offending input field, for validation and bad-input errors.
    pub field: Option<String>,
    /// Resource identifier, for not-found and authorization errors.
    pub resource: Option<String>,
    /// Additional free-form extension entries.
    pub extra: BTreeMap<String, Value>,
}

impl GraphQlError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            field: None,
            resource: None,
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message).with_field(field)
    }

    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Authentication, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Authorization, message)
    }

    /// Not-found error whose message names the resource.
    #[must_use]
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        let resource = resource.into();
        let id = id.into();
        Self::new(ErrorCode::NotFound, format!("{resource} '{id}' not found"))
            .with_resource(resource)
            .with_extra("id", Value::String(id))
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    #[must_use]
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadInput, message)
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Extension map: `{code, field?, resource?, ...extra}`.
    #[must_use]
    pub fn extensions(&self) -> BTreeMap<String, Value> {
        let mut out = self.extra.clone();
        out.insert("code".to_string(), Value::from(self.code.as_str()));
        if let Some(field) = &self.field {
            out.insert("field".to_string(), Value::from(field.as_str()));
        }
        if let Some(resource) = &self.resource {
            out.insert("resource".to_string(), Value::from(resource.as_str()));
        }
        out
    }
}
