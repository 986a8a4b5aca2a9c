//! Test-run pipe commands (`testrunpb`).
//!
//! [`HandlerCommand`] is what the companion process sends to the handler over
//! the pipe; [`RunnerCommand`] is what the handler queues for the companion.

use prost::Message;

use super::messages::{KeyEventBatchRequest, KeyedEvent, ProcessEventBatchRequest};

#[derive(Clone, PartialEq, Message)]
pub struct KeyEventBatch {
    #[prost(message, optional, tag = "1")]
    pub key_event_batch_request: Option<KeyEventBatchRequest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProcessEventBatch {
    #[prost(message, optional, tag = "1")]
    pub process_event_batch_request: Option<ProcessEventBatchRequest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct HandlerCommand {
    #[prost(oneof = "handler_command::Command", tags = "1, 2")]
    pub command: Option<handler_command::Command>,
}

pub mod handler_command {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Command {
        #[prost(message, tag = "1")]
        KeyEventBatch(super::KeyEventBatch),
        #[prost(message, tag = "2")]
        ProcessEventBatch(super::ProcessEventBatch),
    }
}

impl HandlerCommand {
    pub fn key_event_batch(request: KeyEventBatchRequest) -> Self {
        Self {
            command: Some(handler_command::Command::KeyEventBatch(KeyEventBatch {
                key_event_batch_request: Some(request),
            })),
        }
    }

    pub fn process_event_batch(request: ProcessEventBatchRequest) -> Self {
        Self {
            command: Some(handler_command::Command::ProcessEventBatch(
                ProcessEventBatch {
                    process_event_batch_request: Some(request),
                },
            )),
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct AddKeyedEvent {
    #[prost(message, optional, tag = "1")]
    pub keyed_event: Option<KeyedEvent>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AddWatermark {}

#[derive(Clone, PartialEq, Message)]
pub struct Run {}

#[derive(Clone, PartialEq, Message)]
pub struct RunnerCommand {
    #[prost(oneof = "runner_command::Command", tags = "1, 2, 3")]
    pub command: Option<runner_command::Command>,
}

pub mod runner_command {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Command {
        #[prost(message, tag = "1")]
        AddKeyedEvent(super::AddKeyedEvent),
        #[prost(message, tag = "2")]
        AddWatermark(super::AddWatermark),
        #[prost(message, tag = "3")]
        Run(super::Run),
    }
}

impl RunnerCommand {
    pub fn add_keyed_event(event: KeyedEvent) -> Self {
        Self {
            command: Some(runner_command::Command::AddKeyedEvent(AddKeyedEvent {
                keyed_event: Some(event),
            })),
        }
    }

    pub fn add_watermark() -> Self {
        Self {
            command: Some(runner_command::Command::AddWatermark(AddWatermark {})),
        }
    }

    pub fn run() -> Self {
        Self {
            command: Some(runner_command::Command::Run(Run {})),
        }
    }
}
