//! `plugkit.v1` wire messages and the tonic service plumbing for them.
//!
//! Mirrors `proto/plugkit.proto`. Messages and service glue are written out
//! here instead of generated at build time, so building the runtime needs no
//! `protoc` and no descriptor file on disk.

#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnvVar {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub hidden: bool,
    #[prost(bool, tag = "4")]
    pub system_flag: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitRequest {
    #[prost(message, repeated, tag = "1")]
    pub env_vars: ::prost::alloc::vec::Vec<EnvVar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SchemaResponse {
    #[prost(message, optional, tag = "1")]
    pub queries: ::core::option::Option<::prost_types::Struct>,
    #[prost(message, optional, tag = "2")]
    pub mutations: ::core::option::Option<::prost_types::Struct>,
    #[prost(message, optional, tag = "3")]
    pub subscriptions: ::core::option::Option<::prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Endpoint {
    #[prost(string, tag = "1")]
    pub method: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub path: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub description: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub schema: ::core::option::Option<::prost_types::Struct>,
    #[prost(string, tag = "5")]
    pub handler: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RestApiResponse {
    #[prost(message, repeated, tag = "1")]
    pub endpoints: ::prost::alloc::vec::Vec<Endpoint>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VersionResponse {
    #[prost(string, tag = "1")]
    pub version: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteRequest {
    #[prost(string, tag = "1")]
    pub operation_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub operation_kind: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub args: ::core::option::Option<::prost_types::Struct>,
    #[prost(message, optional, tag = "4")]
    pub context: ::core::option::Option<::prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultValue {
    /// `"struct"` when `struct_value` is set, `"value"` otherwise.
    #[prost(string, tag = "1")]
    pub result_type: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub value: ::core::option::Option<::prost_types::Value>,
    #[prost(message, optional, tag = "3")]
    pub struct_value: ::core::option::Option<::prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorDetail {
    /// `"graphql"` for structured domain errors, `"execution"` otherwise.
    #[prost(string, tag = "1")]
    pub kind: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub extensions: ::core::option::Option<::prost_types::Struct>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub result: ::core::option::Option<ResultValue>,
    #[prost(message, optional, tag = "4")]
    pub error: ::core::option::Option<ErrorDetail>,
}

/// Fully-qualified gRPC service name.
pub const SERVICE_NAME: &str = "plugkit.v1.Plugin";

// ---------------------------------------------------------------------------
// Service glue macros
// ---------------------------------------------------------------------------

/// Routes one unary method of the server to the matching trait method.
macro_rules! unary_route {
    ($inner:expr, $req:expr, $method:ident, $Req:ty, $Resp:ty) => {{
        struct Svc<T: Plugin>(Arc<T>);

        impl<T: Plugin> tonic::server::UnaryService<$Req> for Svc<T> {
            type Response = $Resp;
            type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

            fn call(&mut self, request: tonic::Request<$Req>) -> Self::Future {
                let inner = Arc::clone(&self.0);
                Box::pin(async move { <T as Plugin>::$method(&inner, request).await })
            }
        }

        let inner = $inner;
        let req = $req;
        Box::pin(async move {
            let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
            Ok(grpc.unary(Svc(inner), req).await)
        })
    }};
}

/// Defines one unary client method.
macro_rules! client_method {
    ($name:ident, $Req:ty, $Resp:ty, $path:literal) => {
        pub async fn $name(
            &mut self,
            request: impl tonic::IntoRequest<$Req>,
        ) -> std::result::Result<tonic::Response<$Resp>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!(
                    "service was not ready: {}",
                    Into::<StdError>::into(e)
                ))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static($path);
            self.inner.unary(request.into_request(), path, codec).await
        }
    };
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub mod plugin_server {
    use tonic::codegen::*;

    use super::{
        Empty, ExecuteRequest, ExecuteResponse, InitRequest, RestApiResponse, SchemaResponse,
        StatusResponse, VersionResponse,
    };

    /// Server-side behavior of the `plugkit.v1.Plugin` service.
    #[async_trait]
    pub trait Plugin: Send + Sync + 'static {
        async fn init(
            &self,
            request: tonic::Request<InitRequest>,
        ) -> std::result::Result<tonic::Response<StatusResponse>, tonic::Status>;

        async fn migration(
            &self,
            request: tonic::Request<Empty>,
        ) -> std::result::Result<tonic::Response<StatusResponse>, tonic::Status>;

        async fn schema_register(
            &self,
            request: tonic::Request<Empty>,
        ) -> std::result::Result<tonic::Response<SchemaResponse>, tonic::Status>;

        async fn rest_api_register(
            &self,
            request: tonic::Request<Empty>,
        ) -> std::result::Result<tonic::Response<RestApiResponse>, tonic::Status>;

        async fn get_version(
            &self,
            request: tonic::Request<Empty>,
        ) -> std::result::Result<tonic::Response<VersionResponse>, tonic::Status>;

        async fn execute(
            &self,
            request: tonic::Request<ExecuteRequest>,
        ) -> std::result::Result<tonic::Response<ExecuteResponse>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct PluginServer<T> {
        inner: Arc<T>,
    }

    impl<T> PluginServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T> Clone for PluginServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<T, B> Service<http::Request<B>> for PluginServer<T>
    where
        T: Plugin,
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = Arc::clone(&self.inner);
            match req.uri().path() {
                "/plugkit.v1.Plugin/Init" => {
                    unary_route!(inner, req, init, InitRequest, StatusResponse)
                }
                "/plugkit.v1.Plugin/Migration" => {
                    unary_route!(inner, req, migration, Empty, StatusResponse)
                }
                "/plugkit.v1.Plugin/SchemaRegister" => {
                    unary_route!(inner, req, schema_register, Empty, SchemaResponse)
                }
                "/plugkit.v1.Plugin/RESTApiRegister" => {
                    unary_route!(inner, req, rest_api_register, Empty, RestApiResponse)
                }
                "/plugkit.v1.Plugin/GetVersion" => {
                    unary_route!(inner, req, get_version, Empty, VersionResponse)
                }
                "/plugkit.v1.Plugin/Execute" => {
                    unary_route!(inner, req, execute, ExecuteRequest, ExecuteResponse)
                }
                _ => Box::pin(async move {
                    let mut response = http::Response::new(empty_body());
                    let headers = response.headers_mut();
                    headers.insert(
                        http::header::HeaderName::from_static("grpc-status"),
                        http::HeaderValue::from(tonic::Code::Unimplemented as i32),
                    );
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_static("application/grpc"),
                    );
                    Ok(response)
                }),
            }
        }
    }

    impl<T> tonic::server::NamedService for PluginServer<T> {
        const NAME: &'static str = super::SERVICE_NAME;
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Host-side client, used by hosts written in Rust and by the runtime's own
/// end-to-end tests.
pub mod plugin_client {
    use tonic::codegen::*;

    use super::{
        Empty, ExecuteRequest, ExecuteResponse, InitRequest, RestApiResponse, SchemaResponse,
        StatusResponse, VersionResponse,
    };

    #[derive(Debug, Clone)]
    pub struct PluginClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl PluginClient<tonic::transport::Channel> {
        /// Connects to a plugin at `dst`, e.g. `http://127.0.0.1:50051`.
        ///
        /// # Errors
        ///
        /// Returns an error if the endpoint is invalid or unreachable.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> PluginClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            Self {
                inner: tonic::client::Grpc::new(inner),
            }
        }

        client_method!(init, InitRequest, StatusResponse, "/plugkit.v1.Plugin/Init");
        client_method!(migration, Empty, StatusResponse, "/plugkit.v1.Plugin/Migration");
        client_method!(
            schema_register,
            Empty,
            SchemaResponse,
            "/plugkit.v1.Plugin/SchemaRegister"
        );
        client_method!(
            rest_api_register,
            Empty,
            RestApiResponse,
            "/plugkit.v1.Plugin/RESTApiRegister"
        );
        client_method!(get_version, Empty, VersionResponse, "/plugkit.v1.Plugin/GetVersion");
        client_method!(execute, ExecuteRequest, ExecuteResponse, "/plugkit.v1.Plugin/Execute");
    }
}
