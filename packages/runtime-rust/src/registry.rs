use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use plugkit_core::codec::encode_field;
use plugkit_core::{derive_endpoint_key, EndpointDescriptor, FieldDescriptor, Value};
use tracing::{debug, info};

use crate::handler::{Handler, SharedHandler};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A registered query or mutation: its root field plus resolver.
#[derive(Clone)]
pub struct RegistryEntry {
    pub field: FieldDescriptor,
    pub resolver: SharedHandler,
}

/// Exported GraphQL schema. Subscriptions are not supported and always empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaExport {
    pub queries: BTreeMap<String, Value>,
    pub mutations: BTreeMap<String, Value>,
    pub subscriptions: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// SchemaRegistry
// ---------------------------------------------------------------------------

/// In-memory registry of everything a plugin can execute.
///
/// Four namespaces: queries, mutations, functions, and REST endpoints.
/// Registration happens through `&mut self` before serving starts; the
/// runtime then freezes the registry behind an `Arc` and only reads it, so
/// no locking is needed.
///
/// Re-registering an existing key silently replaces the prior entry.
#[derive(Default)]
pub struct SchemaRegistry {
    queries: BTreeMap<String, RegistryEntry>,
    mutations: BTreeMap<String, RegistryEntry>,
    functions: HashMap<String, SharedHandler>,
    /// Endpoints in registration order.
    endpoints: Vec<EndpointDescriptor>,
    /// Endpoint key (`"<METHOD> <path>"`) -> index into `endpoints`.
    endpoint_index: HashMap<String, usize>,
    /// Handler key or endpoint key -> REST handler.
    rest_handlers: HashMap<String, SharedHandler>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a query resolver under `name`.
    pub fn register_query(&mut self, name: &str, field: FieldDescriptor, resolver: impl Handler) {
        self.register_query_shared(name, field, Arc::new(resolver));
    }

    pub fn register_query_shared(
        &mut self,
        name: &str,
        field: FieldDescriptor,
        resolver: SharedHandler,
    ) {
        info!(query = name, "registering query");
        self.queries
            .insert(name.to_string(), root_entry(name, field, resolver));
    }

    /// Registers a mutation resolver under `name`.
    pub fn register_mutation(
        &mut self,
        name: &str,
        field: FieldDescriptor,
        resolver: impl Handler,
    ) {
        self.register_mutation_shared(name, field, Arc::new(resolver));
    }

    pub fn register_mutation_shared(
        &mut self,
        name: &str,
        field: FieldDescriptor,
        resolver: SharedHandler,
    ) {
        info!(mutation = name, "registering mutation");
        self.mutations
            .insert(name.to_string(), root_entry(name, field, resolver));
    }

    /// Registers a free-standing function.
    pub fn register_function(&mut self, name: &str, handler: impl Handler) {
        self.register_function_shared(name, Arc::new(handler));
    }

    pub fn register_function_shared(&mut self, name: &str, handler: SharedHandler) {
        info!(function = name, "registering function");
        self.functions.insert(name.to_string(), handler);
    }

    /// Registers a REST endpoint and its handler.
    ///
    /// The handler is reachable both by the descriptor's handler key and by
    /// the endpoint key. Re-registering the same endpoint key replaces the
    /// descriptor in place, keeping its original export position, and
    /// retires the previous handler key unless another endpoint still uses it.
    pub fn register_rest_endpoint(&mut self, endpoint: EndpointDescriptor, handler: impl Handler) {
        self.register_rest_endpoint_shared(endpoint, Arc::new(handler));
    }

    pub fn register_rest_endpoint_shared(
        &mut self,
        endpoint: EndpointDescriptor,
        handler: SharedHandler,
    ) {
        let key = endpoint.key();
        info!(endpoint = %key, handler = %endpoint.handler, "registering REST endpoint");

        match self.endpoint_index.get(&key) {
            Some(&idx) => {
                let previous = &self.endpoints[idx].handler;
                let shared = self
                    .endpoints
                    .iter()
                    .enumerate()
                    .any(|(i, e)| i != idx && e.handler == *previous);
                if *previous != endpoint.handler && *previous != key && !shared {
                    self.rest_handlers.remove(previous);
                }
                self.endpoints[idx] = endpoint.clone();
            }
            None => {
                self.endpoint_index.insert(key.clone(), self.endpoints.len());
                self.endpoints.push(endpoint.clone());
            }
        }

        self.rest_handlers
            .insert(endpoint.handler, Arc::clone(&handler));
        self.rest_handlers.insert(key, handler);
    }

    // -- batch variants ------------------------------------------------------

    /// Registers every field that has a paired resolver; unpaired fields are
    /// skipped.
    pub fn register_queries(
        &mut self,
        fields: impl IntoIterator<Item = (String, FieldDescriptor)>,
        resolvers: &HashMap<String, SharedHandler>,
    ) {
        for (name, field) in fields {
            if let Some(resolver) = resolvers.get(&name) {
                self.register_query_shared(&name, field, Arc::clone(resolver));
            }
        }
    }

    /// Registers every field that has a paired resolver; unpaired fields are
    /// skipped.
    pub fn register_mutations(
        &mut self,
        fields: impl IntoIterator<Item = (String, FieldDescriptor)>,
        resolvers: &HashMap<String, SharedHandler>,
    ) {
        for (name, field) in fields {
            if let Some(resolver) = resolvers.get(&name) {
                self.register_mutation_shared(&name, field, Arc::clone(resolver));
            }
        }
    }

    /// Registers each named function; entries without a handler are skipped.
    pub fn register_functions(
        &mut self,
        functions: impl IntoIterator<Item = (String, Option<SharedHandler>)>,
    ) {
        for (name, handler) in functions {
            if let Some(handler) = handler {
                self.register_function_shared(&name, handler);
            }
        }
    }

    /// Registers each endpoint whose handler key has a paired handler;
    /// unpaired endpoints are skipped.
    pub fn register_rest_endpoints(
        &mut self,
        endpoints: impl IntoIterator<Item = EndpointDescriptor>,
        handlers: &HashMap<String, SharedHandler>,
    ) {
        for endpoint in endpoints {
            if let Some(handler) = handlers.get(&endpoint.handler) {
                let handler = Arc::clone(handler);
                self.register_rest_endpoint_shared(endpoint, handler);
            }
        }
    }

    // -- lookup ----------------------------------------------------------------

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&RegistryEntry> {
        self.queries.get(name)
    }

    #[must_use]
    pub fn mutation(&self, name: &str) -> Option<&RegistryEntry> {
        self.mutations.get(name)
    }

    #[must_use]
    pub fn function(&self, name: &str) -> Option<&SharedHandler> {
        self.functions.get(name)
    }

    /// Finds a REST handler in two steps: the literal handler key first,
    /// then the endpoint key re-derived from a `rest_<method>_<segments>`
    /// operation name.
    #[must_use]
    pub fn rest_handler(&self, name: &str) -> Option<&SharedHandler> {
        self.rest_handlers.get(name).or_else(|| {
            let derived = derive_endpoint_key(name)?;
            debug!(operation = name, derived = %derived, "retrying REST lookup with derived key");
            self.rest_handlers.get(&derived)
        })
    }

    // -- export ----------------------------------------------------------------

    #[must_use]
    pub fn export_schema(&self) -> SchemaExport {
        SchemaExport {
            queries: encode_entries(&self.queries),
            mutations: encode_entries(&self.mutations),
            subscriptions: BTreeMap::new(),
        }
    }

    /// Endpoints in registration order.
    #[must_use]
    pub fn export_endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    // -- occupancy ---------------------------------------------------------------

    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

fn root_entry(name: &str, mut field: FieldDescriptor, resolver: SharedHandler) -> RegistryEntry {
    field.resolver = Some(name.to_string());
    RegistryEntry { field, resolver }
}

fn encode_entries(entries: &BTreeMap<String, RegistryEntry>) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(name, entry)| (name.clone(), encode_field(&entry.field)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
