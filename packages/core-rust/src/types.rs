//! Type descriptors for schema-described operations.
//!
//! These describe the GraphQL-shaped surface a plugin exposes. They are
//! immutable once built and are owned by the schema registry entry they
//! belong to.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Primitive kind underlying a scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Boolean,
    Id,
}

impl ScalarKind {
    /// Wire name of the primitive kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Id => "ID",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(ScalarKind::String),
            "Int" => Ok(ScalarKind::Int),
            "Float" => Ok(ScalarKind::Float),
            "Boolean" => Ok(ScalarKind::Boolean),
            "ID" => Ok(ScalarKind::Id),
            other => Err(format!("unknown scalar kind: {other}")),
        }
    }
}

/// GraphQL type descriptor.
///
/// Object fields are owned, so a descriptor graph is always a tree: an
/// object type cannot contain itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Named scalar with its underlying primitive kind. Built-in scalars use
    /// the kind's own name; custom scalars (e.g. `DateTime`) pick any name.
    Scalar { name: String, kind: ScalarKind },
    NonNull(Box<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    Object {
        name: String,
        fields: BTreeMap<String, FieldDescriptor>,
    },
}

impl TypeDescriptor {
    #[must_use]
    pub fn scalar(kind: ScalarKind) -> Self {
        TypeDescriptor::Scalar {
            name: kind.as_str().to_string(),
            kind,
        }
    }

    /// Custom scalar serialized as `kind` on the wire.
    #[must_use]
    pub fn custom_scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        TypeDescriptor::Scalar {
            name: name.into(),
            kind,
        }
    }

    #[must_use]
    pub fn string() -> Self {
        Self::scalar(ScalarKind::String)
    }

    #[must_use]
    pub fn int() -> Self {
        Self::scalar(ScalarKind::Int)
    }

    #[must_use]
    pub fn float() -> Self {
        Self::scalar(ScalarKind::Float)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::scalar(ScalarKind::Boolean)
    }

    #[must_use]
    pub fn id() -> Self {
        Self::scalar(ScalarKind::Id)
    }

    #[must_use]
    pub fn non_null(inner: TypeDescriptor) -> Self {
        TypeDescriptor::NonNull(Box::new(inner))
    }

    #[must_use]
    pub fn list(inner: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(inner))
    }

    /// Wraps `self` in `NonNull`.
    #[must_use]
    pub fn required(self) -> Self {
        Self::non_null(self)
    }

    /// Wire discriminator for this descriptor.
    #[must_use]
    pub fn kind_tag(&self) -> &'static str {
        match self {
            TypeDescriptor::Scalar { .. } => "scalar",
            TypeDescriptor::NonNull(_) => "non_null",
            TypeDescriptor::List(_) => "list",
            TypeDescriptor::Object { .. } => "object",
        }
    }
}

/// A field of an object type, or the root field of a query or mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub ty: TypeDescriptor,
    pub description: Option<String>,
    pub args: BTreeMap<String, ArgDescriptor>,
    /// Operation identifier of the resolver. Set by the registry for root
    /// fields; `None` for plain object fields.
    pub resolver: Option<String>,
}

impl FieldDescriptor {
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            ty,
            description: None,
            args: BTreeMap::new(),
            resolver: None,
        }
    }
}

/// An argument accepted by a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDescriptor {
    pub ty: TypeDescriptor,
    pub description: Option<String>,
    /// Field-level shape of an object-valued argument.
    pub properties: Option<BTreeMap<String, FieldDescriptor>>,
}

impl ArgDescriptor {
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            ty,
            description: None,
            properties: None,
        }
    }
}
