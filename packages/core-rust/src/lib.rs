//! `plugkit` Core: value model, type descriptors, wire codec, and domain errors.

pub mod codec;
pub mod error;
pub mod schema;
pub mod types;
pub mod value;

pub use error::{ErrorCode, GraphQlError};
pub use schema::{
    derive_endpoint_key, endpoint_key, ArgBuilder, EndpointBuilder, EndpointDescriptor,
    FieldBuilder, HttpMethod, ObjectTypeBuilder,
};
pub use types::{ArgDescriptor, FieldDescriptor, ScalarKind, TypeDescriptor};
pub use value::Value;
