//! Batch dispatch shared by both transports.
//!
//! The [`Dispatcher`] turns decoded batch requests into calls on a
//! [`ServerHandler`] and assembles the responses. Transports only deal with
//! framing and error mapping.

use std::sync::Arc;

use tracing::debug;

use super::{RequestContext, ServerHandler};
use crate::batch::SubjectBatch;
use crate::error::{Error, Result};
use crate::event::KeyedEvent;
use crate::protocol::messages::{self as pb, event::Event};
use crate::protocol::from_optional_timestamp;

/// Runs batch requests against a handler.
///
/// Cheap to clone; clones share the handler.
pub struct Dispatcher<H> {
    handler: Arc<H>,
}

impl<H: ServerHandler> Dispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    pub fn from_arc(handler: Arc<H>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run key extraction over every raw record.
    ///
    /// Results line up with the request's values.
    pub fn key_event_batch(
        &self,
        ctx: &RequestContext,
        request: pb::KeyEventBatchRequest,
    ) -> Result<pb::KeyEventBatchResponse> {
        debug!(records = request.values.len(), "KeyEventBatch");

        let mut results = Vec::with_capacity(request.values.len());
        for value in &request.values {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let events = self.handler.key_event(ctx, value)?;
            results.push(pb::KeyEventResult {
                events: events.into_iter().map(pb::KeyedEvent::from).collect(),
            });
        }
        Ok(pb::KeyEventBatchResponse { results })
    }

    /// Dispatch every event of a batch in arrival order and assemble the
    /// response.
    ///
    /// The first failing callback aborts the batch. Nothing from earlier
    /// events is returned in that case.
    pub async fn process_event_batch(
        &self,
        ctx: &RequestContext,
        request: pb::ProcessEventBatchRequest,
    ) -> Result<pb::ProcessEventBatchResponse> {
        debug!(
            events = request.events.len(),
            keys = request.key_states.len(),
            "ProcessEventBatch"
        );

        let watermark = from_optional_timestamp(request.watermark.as_ref())
            .ok_or_else(|| Error::bad_request("watermark out of range"))?;
        let ctx = ctx.with_watermark(watermark);
        let mut batch = SubjectBatch::new(request.key_states);

        for (idx, event) in request.events.into_iter().enumerate() {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match event.event {
                Some(Event::KeyedEvent(event)) => {
                    let event = KeyedEvent::try_from(event)?;
                    let subject = batch.subject_for(&event.key, event.timestamp);
                    self.handler.on_event(&ctx, subject, event).await?;
                }
                Some(Event::TimerExpired(timer)) => {
                    let timestamp = from_optional_timestamp(timer.timestamp.as_ref())
                        .ok_or_else(|| Error::bad_request("timer timestamp out of range"))?;
                    let subject = batch.subject_for(&timer.key, timestamp);
                    self.handler.on_timer_expired(&ctx, subject, timestamp).await?;
                }
                None => {
                    return Err(Error::bad_request(format!("event {idx} has no payload")));
                }
            }
        }

        batch.response()
    }
}

impl<H> Clone for Dispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{scalar, IntWidth, ScalarMapCodec};
    use crate::handler::{BoxFuture, OperatorHandler};
    use crate::operator::Operator;
    use crate::protocol::messages::state_mutation::Mutation;
    use crate::protocol::to_timestamp;
    use crate::state::MapSpec;
    use crate::subject::Subject;
    use chrono::{DateTime, Duration, Utc};

    /// Counts events per key in a map state and fails on a `fail` payload.
    struct Counter {
        counts: MapSpec<String, i64, ScalarMapCodec<String, i64>>,
    }

    impl Counter {
        fn new() -> Self {
            let mut op = Operator::new("counter");
            Self {
                counts: MapSpec::new(&mut op, "counts", ScalarMapCodec::new()),
            }
        }
    }

    impl OperatorHandler for Counter {
        fn on_event<'a>(
            &'a self,
            ctx: &'a RequestContext,
            subject: &'a mut Subject,
            event: KeyedEvent,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                if event.value == b"fail" {
                    return Err(Error::handler("refused"));
                }
                if event.value == b"cancel" {
                    ctx.cancellation_token().cancel();
                }
                let counts = self.counts.state_for(subject)?;
                let next = counts.get(&"count".to_string()).copied().unwrap_or(0) + 1;
                counts.set("count".to_string(), next);
                subject.add_sink_request("watermark", ctx.watermark().timestamp().to_string().into_bytes());
                Ok(())
            })
        }

        fn on_timer_expired<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            subject: &'a mut Subject,
            timer: DateTime<Utc>,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                subject.set_timer(timer + Duration::hours(1));
                Ok(())
            })
        }
    }

    impl ServerHandler for Counter {
        fn key_event(&self, _ctx: &RequestContext, record: &[u8]) -> Result<Vec<KeyedEvent>> {
            if record.is_empty() {
                return Err(Error::bad_request("empty record"));
            }
            Ok(vec![KeyedEvent::new(
                record.to_vec(),
                DateTime::<Utc>::UNIX_EPOCH,
                record.to_vec(),
            )])
        }
    }

    fn keyed(key: &str, value: &str) -> pb::Event {
        pb::Event {
            event: Some(Event::KeyedEvent(pb::KeyedEvent {
                key: key.as_bytes().to_vec(),
                timestamp: None,
                value: value.as_bytes().to_vec(),
            })),
        }
    }

    fn request(events: Vec<pb::Event>) -> pb::ProcessEventBatchRequest {
        pb::ProcessEventBatchRequest {
            events,
            key_states: Vec::new(),
            watermark: Some(to_timestamp(
                &(DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(30)),
            )),
        }
    }

    fn put_value(mutation: &pb::StateMutation) -> i64 {
        match &mutation.mutation {
            Some(Mutation::Put(put)) => scalar::decode(&put.value, IntWidth::W64).unwrap(),
            other => panic!("expected put, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_same_key_events_share_subject() {
        let dispatcher = Dispatcher::new(Counter::new());
        let response = dispatcher
            .process_event_batch(
                &RequestContext::new(),
                request(vec![keyed("k", "a"), keyed("other", "b"), keyed("k", "c")]),
            )
            .await
            .unwrap();

        assert_eq!(response.key_results.len(), 2);
        let k = &response.key_results[0];
        assert_eq!(k.key, b"k");
        assert_eq!(put_value(&k.state_mutation_namespaces[0].mutations[0]), 2);
        // watermark reached every callback
        assert!(response.sink_requests.iter().all(|r| r.value == b"30"));
    }

    #[tokio::test]
    async fn test_timer_expired() {
        let dispatcher = Dispatcher::new(Counter::new());
        let timer = pb::Event {
            event: Some(Event::TimerExpired(pb::TimerExpired {
                key: b"k".to_vec(),
                timestamp: Some(to_timestamp(&DateTime::<Utc>::UNIX_EPOCH)),
            })),
        };
        let response = dispatcher
            .process_event_batch(&RequestContext::new(), request(vec![timer]))
            .await
            .unwrap();

        assert_eq!(response.key_results[0].new_timers[0].seconds, 3600);
        assert!(response.key_results[0].state_mutation_namespaces.is_empty());
    }

    #[tokio::test]
    async fn test_callback_error_aborts_batch() {
        let dispatcher = Dispatcher::new(Counter::new());
        let err = dispatcher
            .process_event_batch(
                &RequestContext::new(),
                request(vec![keyed("k", "a"), keyed("k", "fail"), keyed("k", "b")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Handler(_)));
    }

    #[tokio::test]
    async fn test_missing_event_is_bad_request() {
        let dispatcher = Dispatcher::new(Counter::new());
        let err = dispatcher
            .process_event_batch(
                &RequestContext::new(),
                request(vec![pb::Event { event: None }]),
            )
            .await
            .unwrap_err();
        assert!(err.is_bad_request());
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let dispatcher = Dispatcher::new(Counter::new());
        let err = dispatcher
            .process_event_batch(
                &RequestContext::new(),
                request(vec![keyed("k", "cancel"), keyed("k", "a")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_key_event_batch() {
        let dispatcher = Dispatcher::new(Counter::new());
        let response = dispatcher
            .key_event_batch(
                &RequestContext::new(),
                pb::KeyEventBatchRequest {
                    values: vec![b"x".to_vec(), b"y".to_vec()],
                },
            )
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[1].events[0].key, b"y");
        assert!(response.results[1].events[0].timestamp.is_some());
    }

    #[test]
    fn test_key_event_batch_error_propagates() {
        let dispatcher = Dispatcher::new(Counter::new());
        let err = dispatcher
            .key_event_batch(
                &RequestContext::new(),
                pb::KeyEventBatchRequest {
                    values: vec![Vec::new()],
                },
            )
            .unwrap_err();
        assert!(err.is_bad_request());
    }
}
