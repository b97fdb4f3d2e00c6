//! Conversion between native values and the `google.protobuf.Value` wire
//! encoding, plus descriptor encoding for schema introspection.
//!
//! Decoding is lenient: a wire value with no kind set decodes to
//! [`Value::Null`] instead of failing. Descriptor encoders produce native
//! struct values; callers convert them with [`to_wire`] at the RPC boundary.

use std::collections::BTreeMap;

use prost_types::value::Kind;
use prost_types::{ListValue, Struct};

use crate::schema::EndpointDescriptor;
use crate::types::{ArgDescriptor, FieldDescriptor, TypeDescriptor};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Value <-> wire
// ---------------------------------------------------------------------------

/// Encodes a native value into its wire form.
#[must_use]
pub fn to_wire(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(*n),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::List(items) => Kind::ListValue(ListValue {
            values: items.iter().map(to_wire).collect(),
        }),
        Value::Struct(fields) => Kind::StructValue(struct_to_wire(fields)),
    };
    prost_types::Value { kind: Some(kind) }
}

/// Decodes a wire value. Unset kinds decode to [`Value::Null`].
#[must_use]
pub fn from_wire(wire: &prost_types::Value) -> Value {
    match &wire.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => Value::Number(*n),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::List(list.values.iter().map(from_wire).collect()),
        Some(Kind::StructValue(s)) => Value::Struct(struct_fields_from_wire(s)),
    }
}

#[must_use]
pub fn struct_to_wire(fields: &BTreeMap<String, Value>) -> Struct {
    Struct {
        fields: fields
            .iter()
            .map(|(k, v)| (k.clone(), to_wire(v)))
            .collect(),
    }
}

/// Decodes an optional wire struct. An absent struct is an empty mapping.
#[must_use]
pub fn struct_from_wire(wire: Option<&Struct>) -> BTreeMap<String, Value> {
    wire.map(struct_fields_from_wire).unwrap_or_default()
}

fn struct_fields_from_wire(wire: &Struct) -> BTreeMap<String, Value> {
    wire.fields
        .iter()
        .map(|(k, v)| (k.clone(), from_wire(v)))
        .collect()
}

// ---------------------------------------------------------------------------
// Descriptor encoding
// ---------------------------------------------------------------------------

/// Encodes a type descriptor.
///
/// Scalars always carry `scalarType`, the primitive kind, alongside their
/// display name. Consumers rely on it to type scalars correctly.
#[must_use]
pub fn encode_type(ty: &TypeDescriptor) -> Value {
    let mut out = BTreeMap::new();
    out.insert("kind".to_string(), Value::from(ty.kind_tag()));
    match ty {
        TypeDescriptor::Scalar { name, kind } => {
            out.insert("name".to_string(), Value::from(name.as_str()));
            out.insert("scalarType".to_string(), Value::from(kind.as_str()));
        }
        TypeDescriptor::NonNull(inner) | TypeDescriptor::List(inner) => {
            out.insert("ofType".to_string(), encode_type(inner));
        }
        TypeDescriptor::Object { name, fields } => {
            out.insert("name".to_string(), Value::from(name.as_str()));
            out.insert("fields".to_string(), encode_fields(fields));
        }
    }
    Value::Struct(out)
}

/// Encodes a field descriptor: `{type, description?, args, resolve?}`.
#[must_use]
pub fn encode_field(field: &FieldDescriptor) -> Value {
    let mut out = BTreeMap::new();
    out.insert("type".to_string(), encode_type(&field.ty));
    if let Some(description) = &field.description {
        out.insert("description".to_string(), Value::from(description.as_str()));
    }
    out.insert(
        "args".to_string(),
        Value::Struct(
            field
                .args
                .iter()
                .map(|(name, arg)| (name.clone(), encode_arg(arg)))
                .collect(),
        ),
    );
    if let Some(resolver) = &field.resolver {
        out.insert("resolve".to_string(), Value::from(resolver.as_str()));
    }
    Value::Struct(out)
}

/// Encodes an argument descriptor. Nested properties go through
/// [`encode_field`], the same routine used for object type fields.
#[must_use]
pub fn encode_arg(arg: &ArgDescriptor) -> Value {
    let mut out = BTreeMap::new();
    out.insert("type".to_string(), encode_type(&arg.ty));
    if let Some(description) = &arg.description {
        out.insert("description".to_string(), Value::from(description.as_str()));
    }
    if let Some(properties) = &arg.properties {
        out.insert("properties".to_string(), encode_fields(properties));
    }
    Value::Struct(out)
}

fn encode_fields(fields: &BTreeMap<String, FieldDescriptor>) -> Value {
    Value::Struct(
        fields
            .iter()
            .map(|(name, field)| (name.clone(), encode_field(field)))
            .collect(),
    )
}

/// Encodes the JSON-schema part of an endpoint: `{request?, response?}`.
#[must_use]
pub fn encode_endpoint_schema(endpoint: &EndpointDescriptor) -> Value {
    let mut out = BTreeMap::new();
    if let Some(request) = &endpoint.request_schema {
        out.insert("request".to_string(), request.clone());
    }
    if let Some(response) = &endpoint.response_schema {
        out.insert("response".to_string(), response.clone());
    }
    Value::Struct(out)
}

/// Encodes a full endpoint descriptor.
#[must_use]
pub fn encode_endpoint(endpoint: &EndpointDescriptor) -> Value {
    let mut out = BTreeMap::new();
    out.insert("method".to_string(), Value::from(endpoint.method.as_str()));
    out.insert("path".to_string(), Value::from(endpoint.path.as_str()));
    out.insert(
        "description".to_string(),
        Value::from(endpoint.description.as_str()),
    );
    out.insert("handler".to_string(), Value::from(endpoint.handler.as_str()));
    out.insert("schema".to_string(), encode_endpoint_schema(endpoint));
    Value::Struct(out)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::schema::{ArgBuilder, EndpointBuilder, FieldBuilder, HttpMethod, ObjectTypeBuilder};
    use crate::types::ScalarKind;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            // NaN != NaN, so equality checks need finite numbers.
            any::<f64>()
                .prop_filter("finite", |n| n.is_finite())
                .prop_map(Value::Number),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::List),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..8).prop_map(Value::Struct),
            ]
        })
    }

    proptest! {
        #[test]
        fn native_values_survive_the_wire(value in arb_value()) {
            prop_assert_eq!(from_wire(&to_wire(&value)), value);
        }

        #[test]
        fn wire_values_survive_native_decoding(value in arb_value()) {
            let wire = to_wire(&value);
            prop_assert_eq!(to_wire(&from_wire(&wire)), wire);
        }
    }

    #[test]
    fn unset_kind_decodes_to_null() {
        assert_eq!(from_wire(&prost_types::Value { kind: None }), Value::Null);
    }

    #[test]
    fn absent_struct_decodes_to_empty_mapping() {
        assert!(struct_from_wire(None).is_empty());
    }

    #[test]
    fn greeting_string_is_preserved_exactly() {
        let value = Value::from("Good day, Ada!");
        let wire = to_wire(&value);
        assert_eq!(
            wire.kind,
            Some(Kind::StringValue("Good day, Ada!".to_string()))
        );
        assert_eq!(from_wire(&wire), value);
    }

    #[test]
    fn scalar_encoding_carries_primitive_kind() {
        let encoded = encode_type(&TypeDescriptor::custom_scalar("DateTime", ScalarKind::String));
        assert_eq!(encoded.get("kind"), Some(&Value::from("scalar")));
        assert_eq!(encoded.get("name"), Some(&Value::from("DateTime")));
        assert_eq!(encoded.get("scalarType"), Some(&Value::from("String")));
    }

    #[test]
    fn wrappers_nest_through_of_type() {
        let ty = TypeDescriptor::list(TypeDescriptor::int().required()).required();
        let encoded = encode_type(&ty);

        assert_eq!(encoded.get("kind"), Some(&Value::from("non_null")));
        let list = encoded.get("ofType").unwrap();
        assert_eq!(list.get("kind"), Some(&Value::from("list")));
        let item = list.get("ofType").unwrap();
        assert_eq!(item.get("kind"), Some(&Value::from("non_null")));
        assert_eq!(
            item.get("ofType").and_then(|s| s.get("scalarType")),
            Some(&Value::from("Int"))
        );
    }

    #[test]
    fn object_encoding_includes_fields() {
        let ty = ObjectTypeBuilder::new("User")
            .simple("active", TypeDescriptor::boolean())
            .build();
        let encoded = encode_type(&ty);

        assert_eq!(encoded.get("kind"), Some(&Value::from("object")));
        assert_eq!(encoded.get("name"), Some(&Value::from("User")));
        let active = encoded.get("fields").and_then(|f| f.get("active")).unwrap();
        assert_eq!(
            active.get("type").and_then(|t| t.get("scalarType")),
            Some(&Value::from("Boolean"))
        );
        assert!(active.get("resolve").is_none());
    }

    #[test]
    fn boolean_argument_exports_boolean_scalar_type() {
        let field = FieldBuilder::new(TypeDescriptor::string())
            .arg("formal", ArgBuilder::new(TypeDescriptor::boolean()).build())
            .build();
        let encoded = encode_field(&field);

        let scalar_type = encoded
            .get("args")
            .and_then(|a| a.get("formal"))
            .and_then(|a| a.get("type"))
            .and_then(|t| t.get("scalarType"));
        assert_eq!(scalar_type, Some(&Value::from("Boolean")));
    }

    #[test]
    fn argument_properties_encode_like_object_fields() {
        let street = FieldBuilder::new(TypeDescriptor::string().required())
            .description("Street line")
            .build();
        let arg = ArgBuilder::new(TypeDescriptor::custom_scalar("AddressInput", ScalarKind::String))
            .property("street", street.clone())
            .build();

        let encoded = encode_arg(&arg);
        let property = encoded.get("properties").and_then(|p| p.get("street"));
        assert_eq!(property, Some(&encode_field(&street)));
    }

    #[test]
    fn endpoint_encoding_includes_schema_parts() {
        let endpoint = EndpointBuilder::new(HttpMethod::Post, "/users")
            .description("Create a user")
            .request_schema(Value::from(serde_json::json!({"type": "object"})))
            .build();
        let encoded = encode_endpoint(&endpoint);

        assert_eq!(encoded.get("method"), Some(&Value::from("POST")));
        assert_eq!(encoded.get("path"), Some(&Value::from("/users")));
        assert_eq!(encoded.get("handler"), Some(&Value::from("POST /users")));
        let schema = encoded.get("schema").unwrap();
        assert!(schema.get("request").is_some());
        assert!(schema.get("response").is_none());
    }
}
