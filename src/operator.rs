//! Static operator registration.
//!
//! An [`Operator`] records, once at setup, which named states it uses and how
//! the engine should fetch each of them, plus the sinks it writes to.

use std::collections::HashMap;

use crate::sink::Sink;
use crate::state::QueryType;

#[derive(Debug, Clone, Default)]
pub struct Operator {
    id: String,
    state_specs: HashMap<String, QueryType>,
    sinks: Vec<String>,
}

impl Operator {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state_specs: HashMap::new(),
            sinks: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declare a named state and its query type.
    ///
    /// Registering the same id again replaces the earlier query type.
    pub fn register_spec(&mut self, id: &str, query: QueryType) {
        if let Some(previous) = self.state_specs.insert(id.to_string(), query) {
            tracing::warn!(
                operator = %self.id,
                state = id,
                %previous,
                %query,
                "State spec registered twice"
            );
        }
    }

    /// Registered state specs sorted by id.
    pub fn state_specs(&self) -> Vec<(String, QueryType)> {
        let mut specs: Vec<_> = self
            .state_specs
            .iter()
            .map(|(id, query)| (id.clone(), *query))
            .collect();
        specs.sort_by(|a, b| a.0.cmp(&b.0));
        specs
    }

    pub fn query_type(&self, id: &str) -> Option<QueryType> {
        self.state_specs.get(id).copied()
    }

    /// Connect a sink and get a handle for buffering requests to it.
    pub fn register_sink(&mut self, id: impl Into<String>) -> Sink {
        let id = id.into();
        if !self.sinks.contains(&id) {
            self.sinks.push(id.clone());
        }
        Sink::new(id)
    }

    /// Connected sink ids in registration order.
    pub fn sinks(&self) -> &[String] {
        &self.sinks
    }
}
