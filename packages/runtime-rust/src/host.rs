//! Callbacks from plugin handlers into the host.
//!
//! The runtime only carries a [`HostClient`] to handlers through their
//! [`Context`](crate::handler::Context); the host side of each call lives
//! outside this crate.

use std::fmt;

use async_trait::async_trait;
use plugkit_core::Value;

/// Operations the host exposes to plugin handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    GenerateToken,
    GetProject,
    GetResource,
    GetResources,
    CreateResource,
    UpdateResource,
    DeleteResource,
    GetRelated,
    AuditLog,
    Debug,
}

impl HostCall {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HostCall::GenerateToken => "generate_token",
            HostCall::GetProject => "get_project",
            HostCall::GetResource => "get_resource",
            HostCall::GetResources => "get_resources",
            HostCall::CreateResource => "create_resource",
            HostCall::UpdateResource => "update_resource",
            HostCall::DeleteResource => "delete_resource",
            HostCall::GetRelated => "get_related",
            HostCall::AuditLog => "audit_log",
            HostCall::Debug => "debug",
        }
    }
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for host callbacks. Each call is a struct-in, struct-out request.
#[async_trait]
pub trait HostClient: Send + Sync {
    async fn call(&self, call: HostCall, payload: Value) -> anyhow::Result<Value>;
}
