//! Demo plugin exercising every registration kind.
//!
//! Launched by a host with `PLUGKIT_MAGIC_COOKIE` set; exits 1 otherwise.

use std::process::ExitCode;

use plugkit_core::{
    ArgBuilder, EndpointBuilder, FieldBuilder, GraphQlError, HttpMethod,
    ObjectTypeBuilder, TypeDescriptor, Value,
};
use plugkit_runtime::{Args, Context, Plugin};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GreetArgs {
    name: String,
    #[serde(default)]
    formal: bool,
}

fn main() -> ExitCode {
    let mut plugin = Plugin::new("echo-plugin", env!("CARGO_PKG_VERSION"));

    let message_type = ObjectTypeBuilder::new("EchoMessage")
        .simple("text", TypeDescriptor::string().required())
        .simple("length", TypeDescriptor::int())
        .build();

    plugin
        .register_query(
            "greet",
            FieldBuilder::new(TypeDescriptor::string().required())
                .description("Greets someone by name")
                .arg("name", ArgBuilder::new(TypeDescriptor::string().required()).build())
                .arg("formal", ArgBuilder::new(TypeDescriptor::boolean()).build())
                .build(),
            |_ctx: Context, args: Args| async move {
                let GreetArgs { name, formal } = args.parse()?;
                let greeting = if formal {
                    format!("Good day, {name}!")
                } else {
                    format!("Hey {name}!")
                };
                anyhow::Ok(Value::from(greeting))
            },
        )
        .register_mutation(
            "echo",
            FieldBuilder::new(message_type)
                .arg("text", ArgBuilder::new(TypeDescriptor::string().required()).build())
                .build(),
            |_ctx: Context, args: Args| async move {
                let text = args
                    .str("text")
                    .ok_or_else(|| GraphQlError::validation("text is required", "text"))?
                    .to_string();
                #[allow(clippy::cast_precision_loss)]
                let length = text.chars().count() as f64;
                anyhow::Ok(Value::Struct(
                    [
                        ("text".to_string(), Value::from(text)),
                        ("length".to_string(), Value::Number(length)),
                    ]
                    .into_iter()
                    .collect(),
                ))
            },
        )
        .register_function("reverse", |_ctx: Context, args: Args| async move {
            let text = args.str("text").unwrap_or_default();
            anyhow::Ok(Value::from(text.chars().rev().collect::<String>()))
        })
        .register_rest_endpoint(
            EndpointBuilder::new(HttpMethod::Get, "/echo/ping")
                .description("Liveness ping")
                .response_schema(Value::from(serde_json::json!({"type": "string"})))
                .build(),
            |_ctx: Context, _args: Args| async move { anyhow::Ok(Value::from("pong")) },
        )
        .register_health_probe(|_ctx: Context| async move {
            anyhow::Ok(Value::from(serde_json::json!({"status": "healthy", "echo": "ok"})))
        });

    plugkit_runtime::run(plugin)
}
