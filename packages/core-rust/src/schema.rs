//! Endpoint descriptors and builders for object types, fields, and REST endpoints.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::types::{ArgDescriptor, FieldDescriptor, TypeDescriptor};
use crate::value::Value;

/// Prefix of operation names that encode a REST method and path.
pub const REST_OPERATION_PREFIX: &str = "rest_";

/// HTTP method of a REST endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// Composite `"<METHOD> <path>"` key identifying an endpoint.
#[must_use]
pub fn endpoint_key(method: HttpMethod, path: &str) -> String {
    format!("{method} {path}")
}

/// Re-derives an endpoint key from an operation name of the form
/// `rest_<method>_<seg1>_<seg2>...`.
///
/// `rest_get_users_:id` becomes `GET /users/:id`; `rest_get` becomes `GET /`.
/// Path segments cannot contain `_` under this convention.
#[must_use]
pub fn derive_endpoint_key(operation_name: &str) -> Option<String> {
    let rest = operation_name.strip_prefix(REST_OPERATION_PREFIX)?;
    let (method, segments) = match rest.split_once('_') {
        Some((method, segments)) => (method, segments),
        None => (rest, ""),
    };
    let method = method.parse::<HttpMethod>().ok()?;
    let path = segments
        .split('_')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    Some(endpoint_key(method, &format!("/{path}")))
}

/// A REST endpoint exposed by the plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub description: String,
    /// JSON-schema-shaped description of the request body.
    pub request_schema: Option<Value>,
    /// JSON-schema-shaped description of the response body.
    pub response_schema: Option<Value>,
    /// Handler lookup key. Defaults to the endpoint key.
    pub handler: String,
}

impl EndpointDescriptor {
    #[must_use]
    pub fn key(&self) -> String {
        endpoint_key(self.method, &self.path)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builds an object type descriptor field by field.
#[derive(Debug, Clone)]
pub struct ObjectTypeBuilder {
    name: String,
    fields: BTreeMap<String, FieldDescriptor>,
}

impl ObjectTypeBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Shorthand for a field with no description or arguments.
    #[must_use]
    pub fn simple(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.field(name, FieldDescriptor::new(ty))
    }

    #[must_use]
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor::Object {
            name: self.name,
            fields: self.fields,
        }
    }
}

/// Builds a field descriptor.
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field: FieldDescriptor,
}

impl FieldBuilder {
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            field: FieldDescriptor::new(ty),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.field.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, arg: ArgDescriptor) -> Self {
        self.field.args.insert(name.into(), arg);
        self
    }

    #[must_use]
    pub fn build(self) -> FieldDescriptor {
        self.field
    }
}

/// Builds an argument descriptor.
#[derive(Debug, Clone)]
pub struct ArgBuilder {
    arg: ArgDescriptor,
}

impl ArgBuilder {
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            arg: ArgDescriptor::new(ty),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.arg.description = Some(description.into());
        self
    }

    /// Adds a nested property, making this an object-shaped argument.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.arg
            .properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), field);
        self
    }

    #[must_use]
    pub fn build(self) -> ArgDescriptor {
        self.arg
    }
}

/// Builds a REST endpoint descriptor.
#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    method: HttpMethod,
    path: String,
    description: String,
    request_schema: Option<Value>,
    response_schema: Option<Value>,
    handler: Option<String>,
}

impl EndpointBuilder {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            description: String::new(),
            request_schema: None,
            response_schema: None,
            handler: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn request_schema(mut self, schema: Value) -> Self {
        self.request_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Overrides the handler lookup key.
    #[must_use]
    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    #[must_use]
    pub fn build(self) -> EndpointDescriptor {
        let handler = self
            .handler
            .unwrap_or_else(|| endpoint_key(self.method, &self.path));
        EndpointDescriptor {
            method: self.method,
            path: self.path,
            description: self.description,
            request_schema: self.request_schema,
            response_schema: self.response_schema,
            handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_endpoint_key_decodes_method_and_segments() {
        assert_eq!(
            derive_endpoint_key("rest_get_users_:id").as_deref(),
            Some("GET /users/:id")
        );
        assert_eq!(
            derive_endpoint_key("rest_POST_projects_tasks").as_deref(),
            Some("POST /projects/tasks")
        );
        assert_eq!(derive_endpoint_key("rest_delete").as_deref(), Some("DELETE /"));
    }

    #[test]
    fn derive_endpoint_key_rejects_foreign_names() {
        assert_eq!(derive_endpoint_key("listUsers"), None);
        assert_eq!(derive_endpoint_key("rest_fetch_users"), None);
    }

    #[test]
    fn endpoint_builder_defaults_handler_to_key() {
        let endpoint = EndpointBuilder::new(HttpMethod::Get, "/users")
            .description("List users")
            .build();
        assert_eq!(endpoint.handler, "GET /users");
        assert_eq!(endpoint.key(), "GET /users");

        let named = EndpointBuilder::new(HttpMethod::Post, "/users")
            .handler("createUser")
            .build();
        assert_eq!(named.handler, "createUser");
        assert_eq!(named.key(), "POST /users");
    }

    #[test]
    fn object_builder_collects_fields() {
        let ty = ObjectTypeBuilder::new("User")
            .simple("id", TypeDescriptor::id().required())
            .field(
                "name",
                FieldBuilder::new(TypeDescriptor::string())
                    .description("Display name")
                    .build(),
            )
            .build();

        match ty {
            TypeDescriptor::Object { name, fields } => {
                assert_eq!(name, "User");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["name"].description.as_deref(), Some("Display name"));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn arg_builder_properties_make_object_argument() {
        let arg = ArgBuilder::new(TypeDescriptor::string())
            .property("street", FieldDescriptor::new(TypeDescriptor::string()))
            .property("zip", FieldDescriptor::new(TypeDescriptor::int()))
            .build();
        assert_eq!(arg.properties.map(|p| p.len()), Some(2));
    }
}
