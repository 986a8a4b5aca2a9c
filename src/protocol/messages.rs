//! Handler protocol messages (`handlerpb`).
//!
//! Declared by hand with `prost` derives so no protoc step is needed. Tags
//! follow field declaration order in the protocol definition.

use prost::Message;
use prost_types::Timestamp;

/// An event after source key extraction.
#[derive(Clone, PartialEq, Message)]
pub struct KeyedEvent {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<Timestamp>,
    #[prost(bytes = "vec", tag = "3")]
    pub value: Vec<u8>,
}

/// A previously set timer that the watermark has passed.
#[derive(Clone, PartialEq, Message)]
pub struct TimerExpired {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<Timestamp>,
}

/// One entry of a process-event batch.
#[derive(Clone, PartialEq, Message)]
pub struct Event {
    #[prost(oneof = "event::Event", tags = "1, 2")]
    pub event: Option<event::Event>,
}

pub mod event {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Event {
        #[prost(message, tag = "1")]
        KeyedEvent(super::KeyedEvent),
        #[prost(message, tag = "2")]
        TimerExpired(super::TimerExpired),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct StateEntry {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// The persisted rows of one named state.
#[derive(Clone, PartialEq, Message)]
pub struct StateEntryNamespace {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(message, repeated, tag = "2")]
    pub entries: Vec<StateEntry>,
}

/// Pre-fetched state for one key.
#[derive(Clone, PartialEq, Message)]
pub struct KeyState {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub state_entry_namespaces: Vec<StateEntryNamespace>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProcessEventBatchRequest {
    #[prost(message, repeated, tag = "1")]
    pub events: Vec<Event>,
    #[prost(message, repeated, tag = "2")]
    pub key_states: Vec<KeyState>,
    #[prost(message, optional, tag = "3")]
    pub watermark: Option<Timestamp>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PutMutation {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeleteMutation {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StateMutation {
    #[prost(oneof = "state_mutation::Mutation", tags = "1, 2")]
    pub mutation: Option<state_mutation::Mutation>,
}

pub mod state_mutation {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Mutation {
        #[prost(message, tag = "1")]
        Put(super::PutMutation),
        #[prost(message, tag = "2")]
        Delete(super::DeleteMutation),
    }
}

/// Coalesced mutations for one named state.
#[derive(Clone, PartialEq, Message)]
pub struct StateMutationNamespace {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(message, repeated, tag = "2")]
    pub mutations: Vec<StateMutation>,
}

/// Everything one subject produced during a batch.
#[derive(Clone, PartialEq, Message)]
pub struct KeyResult {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub new_timers: Vec<Timestamp>,
    #[prost(message, repeated, tag = "3")]
    pub state_mutation_namespaces: Vec<StateMutationNamespace>,
}

/// A buffered request for the engine to deliver `value` to sink `id`.
#[derive(Clone, PartialEq, Message)]
pub struct SinkRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProcessEventBatchResponse {
    #[prost(message, repeated, tag = "1")]
    pub key_results: Vec<KeyResult>,
    #[prost(message, repeated, tag = "2")]
    pub sink_requests: Vec<SinkRequest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct KeyEventBatchRequest {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub values: Vec<Vec<u8>>,
}

/// Keyed events extracted from one raw record.
#[derive(Clone, PartialEq, Message)]
pub struct KeyEventResult {
    #[prost(message, repeated, tag = "1")]
    pub events: Vec<KeyedEvent>,
}

#[derive(Clone, PartialEq, Message)]
pub struct KeyEventBatchResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<KeyEventResult>,
}
