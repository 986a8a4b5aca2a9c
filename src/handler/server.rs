//! Handler traits implemented by user code.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::RequestContext;
use crate::error::Result;
use crate::event::KeyedEvent;
use crate::subject::Subject;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callbacks of one keyed operator.
///
/// # Example
///
/// ```
/// use rxn_handler::codec::ScalarValueCodec;
/// use rxn_handler::event::KeyedEvent;
/// use rxn_handler::handler::{BoxFuture, OperatorHandler, RequestContext};
/// use rxn_handler::state::ValueSpec;
/// use rxn_handler::subject::Subject;
/// use rxn_handler::Result;
///
/// struct Total {
///     sum: ValueSpec<i64, ScalarValueCodec<i64>>,
/// }
///
/// impl OperatorHandler for Total {
///     fn on_event<'a>(
///         &'a self,
///         _ctx: &'a RequestContext,
///         subject: &'a mut Subject,
///         event: KeyedEvent,
///     ) -> BoxFuture<'a, Result<()>> {
///         Box::pin(async move {
///             let sum = self.sum.state_for(subject)?;
///             let next = sum.value() + event.value.len() as i64;
///             sum.set(next);
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait OperatorHandler: Send + Sync + 'static {
    /// Called when a new event arrives. The subject is scoped to the event's
    /// key: think of it as the user or product the event is about.
    fn on_event<'a>(
        &'a self,
        ctx: &'a RequestContext,
        subject: &'a mut Subject,
        event: KeyedEvent,
    ) -> BoxFuture<'a, Result<()>>;

    /// Called when a timer set with [`Subject::set_timer`] has been passed by
    /// the watermark. Timers fire at their time at the earliest, so later
    /// events have usually already arrived.
    fn on_timer_expired<'a>(
        &'a self,
        ctx: &'a RequestContext,
        subject: &'a mut Subject,
        timer: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<()>> {
        let _ = (ctx, subject, timer);
        Box::pin(async { Ok(()) })
    }
}

/// An operator that also knows how to key raw source records.
pub trait ServerHandler: OperatorHandler {
    /// Turn one raw record into zero or more keyed events.
    ///
    /// The RPC server calls this on tokio's blocking pool, so it may block.
    /// The pipe transport calls it inline between commands.
    fn key_event(&self, ctx: &RequestContext, record: &[u8]) -> Result<Vec<KeyedEvent>>;
}

impl<H: OperatorHandler> OperatorHandler for Arc<H> {
    fn on_event<'a>(
        &'a self,
        ctx: &'a RequestContext,
        subject: &'a mut Subject,
        event: KeyedEvent,
    ) -> BoxFuture<'a, Result<()>> {
        (**self).on_event(ctx, subject, event)
    }

    fn on_timer_expired<'a>(
        &'a self,
        ctx: &'a RequestContext,
        subject: &'a mut Subject,
        timer: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<()>> {
        (**self).on_timer_expired(ctx, subject, timer)
    }
}

impl<H: ServerHandler> ServerHandler for Arc<H> {
    fn key_event(&self, ctx: &RequestContext, record: &[u8]) -> Result<Vec<KeyedEvent>> {
        (**self).key_event(ctx, record)
    }
}

type KeyEventFn = Box<dyn Fn(&RequestContext, &[u8]) -> Result<Vec<KeyedEvent>> + Send + Sync>;

/// A source's key-extraction function paired with an operator.
pub struct SynthesizedHandler<H> {
    key_event: KeyEventFn,
    operator: H,
}

impl<H: OperatorHandler> SynthesizedHandler<H> {
    pub fn new<F>(key_event: F, operator: H) -> Self
    where
        F: Fn(&RequestContext, &[u8]) -> Result<Vec<KeyedEvent>> + Send + Sync + 'static,
    {
        Self {
            key_event: Box::new(key_event),
            operator,
        }
    }

    pub fn operator(&self) -> &H {
        &self.operator
    }
}

impl<H: OperatorHandler> OperatorHandler for SynthesizedHandler<H> {
    fn on_event<'a>(
        &'a self,
        ctx: &'a RequestContext,
        subject: &'a mut Subject,
        event: KeyedEvent,
    ) -> BoxFuture<'a, Result<()>> {
        self.operator.on_event(ctx, subject, event)
    }

    fn on_timer_expired<'a>(
        &'a self,
        ctx: &'a RequestContext,
        subject: &'a mut Subject,
        timer: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<()>> {
        self.operator.on_timer_expired(ctx, subject, timer)
    }
}

impl<H: OperatorHandler> ServerHandler for SynthesizedHandler<H> {
    fn key_event(&self, ctx: &RequestContext, record: &[u8]) -> Result<Vec<KeyedEvent>> {
        (self.key_event)(ctx, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Echo;

    impl OperatorHandler for Echo {
        fn on_event<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            subject: &'a mut Subject,
            event: KeyedEvent,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                subject.add_sink_request("echo", event.value);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_synthesized_delegates() {
        let handler = SynthesizedHandler::new(
            |_ctx: &RequestContext, record: &[u8]| {
                Ok(vec![KeyedEvent::new(
                    record.to_vec(),
                    DateTime::<Utc>::UNIX_EPOCH,
                    record.to_vec(),
                )])
            },
            Echo,
        );
        let ctx = RequestContext::new();

        let events = handler.key_event(&ctx, b"abc").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, b"abc");

        let mut subject = Subject::new(b"abc".to_vec(), DateTime::<Utc>::UNIX_EPOCH, HashMap::new());
        let event = events.into_iter().next().unwrap();
        handler.on_event(&ctx, &mut subject, event).await.unwrap();
        assert_eq!(subject.sink_requests()[0].value, b"abc");

        // default timer callback is a no-op
        handler
            .on_timer_expired(&ctx, &mut subject, DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap();
        assert!(subject.timers().is_empty());
    }
}
