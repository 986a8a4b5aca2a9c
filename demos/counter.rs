//! Counter handler - per-key event counting over the RPC transport.
//!
//! This example demonstrates:
//! - Declaring map and value states on an operator
//! - Keying raw `key:value` records with a synthesized handler
//! - Setting timers and emitting sink requests
//! - Serving the handler until Ctrl-C
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --example counter -- 127.0.0.1:8080
//! ```

use chrono::{DateTime, Duration, Utc};
use rxn_handler::codec::{ScalarMapCodec, ScalarValueCodec};
use rxn_handler::config::ServerConfig;
use rxn_handler::handler::{BoxFuture, OperatorHandler, RequestContext, SynthesizedHandler};
use rxn_handler::operator::Operator;
use rxn_handler::sink::Sink;
use rxn_handler::state::{MapSpec, ValueSpec};
use rxn_handler::transport::Server;
use rxn_handler::{Error, KeyedEvent, Result, Subject};
use tracing_subscriber::EnvFilter;

/// Counts events per value and reports totals when the key goes quiet.
struct CountOperator {
    by_value: MapSpec<String, i64, ScalarMapCodec<String, i64>>,
    last_seen: ValueSpec<DateTime<Utc>, ScalarValueCodec<DateTime<Utc>>>,
    totals: Sink,
}

impl CountOperator {
    fn new(op: &mut Operator) -> Self {
        Self {
            by_value: MapSpec::new(op, "by_value", ScalarMapCodec::new()),
            last_seen: ValueSpec::new(op, "last_seen", ScalarValueCodec::new()),
            totals: op.register_sink("totals"),
        }
    }
}

impl OperatorHandler for CountOperator {
    fn on_event<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        subject: &'a mut Subject,
        event: KeyedEvent,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let value = String::from_utf8_lossy(&event.value).into_owned();
            let counts = self.by_value.state_for(subject)?;
            let next = counts.get(&value).copied().unwrap_or(0) + 1;
            counts.set(value, next);

            self.last_seen.state_for(subject)?.set(event.timestamp);
            subject.set_timer(event.timestamp + Duration::minutes(5));
            Ok(())
        })
    }

    fn on_timer_expired<'a>(
        &'a self,
        ctx: &'a RequestContext,
        subject: &'a mut Subject,
        timer: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let last_seen = *self.last_seen.state_for(subject)?.value();
            if last_seen + Duration::minutes(5) > timer {
                return Ok(());
            }

            let counts = self.by_value.state_for(subject)?;
            let total: i64 = counts.all().map(|(_, n)| *n).sum();
            let key = String::from_utf8_lossy(subject.key()).into_owned();
            let line = format!("{key} {total} (watermark {})", ctx.watermark());
            self.totals.collect(subject, line.into_bytes());
            Ok(())
        })
    }
}

/// Records look like `key:value`.
fn key_record(_ctx: &RequestContext, record: &[u8]) -> Result<Vec<KeyedEvent>> {
    let text = std::str::from_utf8(record).map_err(|e| Error::bad_request(e.to_string()))?;
    let (key, value) = text
        .split_once(':')
        .ok_or_else(|| Error::bad_request(format!("record {text:?} has no key")))?;
    Ok(vec![KeyedEvent::new(key, Utc::now(), value)])
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut op = Operator::new("counter");
    let handler = SynthesizedHandler::new(key_record, CountOperator::new(&mut op));
    tracing::info!(states = ?op.state_specs(), sinks = ?op.sinks(), "Registered operator");

    let mut config = ServerConfig::default();
    if let Some(addr) = std::env::args().nth(1) {
        config = config.addr(addr);
    }

    let server = Server::bind(&config, handler).await?;
    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
