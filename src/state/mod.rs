//! Keyed state items and their schemas.
//!
//! A state item is loaded from the rows the engine pre-fetched for a key,
//! edited in memory by user callbacks, and rendered back as a list of
//! [`StateMutation`]s when the batch response is assembled.
//!
//! - [`ValueState`] holds a single value.
//! - [`MapState`] holds a key/value table.
//! - [`StateSpec`] binds a state name to a loader and caches one instance
//!   per [`Subject`](crate::subject::Subject).

mod map;
mod spec;
mod value;

pub use map::MapState;
pub use spec::{MapSpec, StateSpec, ValueSpec};
pub use value::ValueState;

use crate::error::Result;
use crate::protocol::messages as pb;

/// One persisted row of a named state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl StateEntry {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<pb::StateEntry> for StateEntry {
    fn from(entry: pb::StateEntry) -> Self {
        Self {
            key: entry.key,
            value: entry.value,
        }
    }
}

/// A pending change to one row of a named state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMutation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl StateMutation {
    /// The row key this mutation applies to.
    pub fn key(&self) -> &[u8] {
        match self {
            StateMutation::Put { key, .. } | StateMutation::Delete { key } => key,
        }
    }

    pub(crate) fn into_wire(self) -> pb::StateMutation {
        use pb::state_mutation::Mutation;

        let mutation = match self {
            StateMutation::Put { key, value } => Mutation::Put(pb::PutMutation { key, value }),
            StateMutation::Delete { key } => Mutation::Delete(pb::DeleteMutation { key }),
        };
        pb::StateMutation {
            mutation: Some(mutation),
        }
    }
}

/// A named state item scoped to one subject.
pub trait StateItem: Send + 'static {
    /// The state's name; also its namespace in the wire response.
    fn name(&self) -> &str;

    /// Hydrate from the rows the engine delivered.
    fn load(&mut self, entries: &[StateEntry]) -> Result<()>;

    /// Render the pending edits.
    fn mutations(&self) -> Result<Vec<StateMutation>>;
}

/// How the engine fetches the rows of a named state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// Point lookup of a single row.
    Get,
    /// Full scan of every row under the key.
    Scan,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Get => "get",
            QueryType::Scan => "scan",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_key() {
        let put = StateMutation::Put {
            key: b"a".to_vec(),
            value: b"1".to_vec(),
        };
        let delete = StateMutation::Delete { key: b"b".to_vec() };
        assert_eq!(put.key(), b"a");
        assert_eq!(delete.key(), b"b");
    }

    #[test]
    fn test_mutation_into_wire() {
        let wire = StateMutation::Delete { key: b"k".to_vec() }.into_wire();
        assert_eq!(
            wire.mutation,
            Some(pb::state_mutation::Mutation::Delete(pb::DeleteMutation {
                key: b"k".to_vec()
            }))
        );
    }

    #[test]
    fn test_query_type_display() {
        assert_eq!(QueryType::Get.to_string(), "get");
        assert_eq!(QueryType::Scan.to_string(), "scan");
    }
}
