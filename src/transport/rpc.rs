//! Unary HTTP RPC transport.
//!
//! Serves the handler protocol with the Connect unary convention: one
//! `POST /handlerpb.Handler/<Method>` per operation, protobuf bodies with
//! content type `application/proto`, and a JSON `{"code", "message"}` body on
//! failure.
//!
//! | Failure                        | Code               | HTTP |
//! |--------------------------------|--------------------|------|
//! | bad request, undecodable body  | `invalid_argument` | 400  |
//! | wrong content type             | `invalid_argument` | 415  |
//! | request cancelled              | `canceled`         | 499  |
//! | `Connect-Timeout-Ms` elapsed   | `deadline_exceeded`| 504  |
//! | anything else                  | `unknown`          | 500  |

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prost::Message;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::handler::{Dispatcher, RequestContext, ServerHandler};

/// Path of the key-extraction RPC.
pub const KEY_EVENT_BATCH_PATH: &str = "/handlerpb.Handler/KeyEventBatch";

/// Path of the batch-processing RPC.
pub const PROCESS_EVENT_BATCH_PATH: &str = "/handlerpb.Handler/ProcessEventBatch";

/// Content type of protobuf request and response bodies.
pub const PROTO_CONTENT_TYPE: &str = "application/proto";

/// Header carrying the caller's deadline in milliseconds.
pub const TIMEOUT_HEADER: HeaderName = HeaderName::from_static("connect-timeout-ms");

/// Wire-level error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    InvalidArgument,
    Canceled,
    DeadlineExceeded,
    Unknown,
}

/// JSON body returned for a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: Code,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_error(err: &Error) -> (StatusCode, Self) {
        let (status, code) = match err {
            Error::BadRequest(_) | Error::Decode(_) => {
                (StatusCode::BAD_REQUEST, Code::InvalidArgument)
            }
            Error::Cancelled => (client_closed_request(), Code::Canceled),
            Error::DeadlineExceeded(_) => (StatusCode::GATEWAY_TIMEOUT, Code::DeadlineExceeded),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, Code::Unknown),
        };

        if status.is_server_error() {
            error!(error = %err, "Failed to handle RPC");
        } else {
            debug!(error = %err, "Rejected RPC");
        }

        (
            status,
            Self {
                code,
                message: err.to_string(),
            },
        )
    }
}

fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
}

fn error_response(err: &Error) -> Response {
    let (status, body) = ErrorResponse::from_error(err);
    (status, Json(body)).into_response()
}

fn proto_response(message: &impl Message) -> Response {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(PROTO_CONTENT_TYPE))],
        message.encode_to_vec(),
    )
        .into_response()
}

fn check_content_type(headers: &HeaderMap) -> std::result::Result<(), Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case(PROTO_CONTENT_TYPE) {
        return Ok(());
    }
    let body = ErrorResponse {
        code: Code::InvalidArgument,
        message: format!("unsupported content type {content_type:?}, expected {PROTO_CONTENT_TYPE}"),
    };
    Err((StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(body)).into_response())
}

/// Parse the Connect deadline header: 1 to 10 ASCII digits of milliseconds.
fn parse_timeout(headers: &HeaderMap) -> Result<Option<Duration>> {
    let Some(value) = headers.get(&TIMEOUT_HEADER) else {
        return Ok(None);
    };
    let text = value.to_str().unwrap_or_default();
    if text.is_empty() || text.len() > 10 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::bad_request(format!("invalid {TIMEOUT_HEADER} header {value:?}")));
    }
    let millis: u64 = text
        .parse()
        .map_err(|_| Error::bad_request(format!("invalid {TIMEOUT_HEADER} header {value:?}")))?;
    Ok(Some(Duration::from_millis(millis)))
}

/// Run a dispatch under the caller's deadline.
///
/// The context's token is cancelled when the request future is dropped
/// (client gone) or when the deadline passes.
async fn with_deadline<T, F>(
    ctx: &RequestContext,
    timeout: Option<Duration>,
    dispatch: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let _guard = ctx.cancellation_token().clone().drop_guard();
    let Some(timeout) = timeout else {
        return dispatch.await;
    };

    tokio::select! {
        result = dispatch => result,
        _ = tokio::time::sleep(timeout) => {
            ctx.cancellation_token().cancel();
            Err(Error::DeadlineExceeded(timeout))
        }
    }
}

fn decode_request<M: Message + Default>(
    headers: &HeaderMap,
    body: Bytes,
) -> std::result::Result<(M, Option<Duration>), Response> {
    check_content_type(headers)?;
    let timeout = parse_timeout(headers).map_err(|e| error_response(&e))?;
    let request = M::decode(body).map_err(|e| error_response(&Error::Decode(e)))?;
    Ok((request, timeout))
}

async fn key_event_batch<H: ServerHandler>(
    State(dispatcher): State<Dispatcher<H>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (request, timeout) = match decode_request(&headers, body) {
        Ok(decoded) => decoded,
        Err(rejection) => return rejection,
    };

    // key extraction is synchronous user code, keep it off the async workers
    let ctx = RequestContext::new();
    let blocking_ctx = ctx.clone();
    let dispatch = async move {
        match tokio::task::spawn_blocking(move || dispatcher.key_event_batch(&blocking_ctx, request))
            .await
        {
            Ok(result) => result,
            Err(e) => Err(Error::Internal(format!("key extraction task failed: {e}"))),
        }
    };

    match with_deadline(&ctx, timeout, dispatch).await {
        Ok(response) => proto_response(&response),
        Err(e) => error_response(&e),
    }
}

async fn process_event_batch<H: ServerHandler>(
    State(dispatcher): State<Dispatcher<H>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (request, timeout) = match decode_request(&headers, body) {
        Ok(decoded) => decoded,
        Err(rejection) => return rejection,
    };

    let ctx = RequestContext::new();
    match with_deadline(&ctx, timeout, dispatcher.process_event_batch(&ctx, request)).await {
        Ok(response) => proto_response(&response),
        Err(e) => error_response(&e),
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Build the RPC router for a handler.
pub fn router<H: ServerHandler>(dispatcher: Dispatcher<H>, config: &ServerConfig) -> Router {
    Router::new()
        .route(KEY_EVENT_BATCH_PATH, post(key_event_batch::<H>))
        .route(PROCESS_EVENT_BATCH_PATH, post(process_event_batch::<H>))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_message_size))
        .with_state(dispatcher)
}

/// An RPC server owning its listener and handler.
///
/// # Example
///
/// ```ignore
/// use rxn_handler::config::ServerConfig;
/// use rxn_handler::transport::Server;
///
/// let server = Server::bind(&ServerConfig::new().addr("127.0.0.1:8080"), handler).await?;
/// server.serve().await?;
/// ```
pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    /// Bind the configured address.
    pub async fn bind<H: ServerHandler>(config: &ServerConfig, handler: H) -> Result<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        Ok(Self::from_listener(listener, handler, config))
    }

    /// Serve on an already bound listener.
    pub fn from_listener<H: ServerHandler>(
        listener: TcpListener,
        handler: H,
        config: &ServerConfig,
    ) -> Self {
        Self {
            listener,
            router: router(Dispatcher::new(handler), config),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the listener fails.
    pub async fn serve(self) -> Result<()> {
        info!(addr = ?self.listener.local_addr().ok(), "Handler server listening");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Serve until `signal` resolves, then finish in-flight requests.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = ?self.listener.local_addr().ok(), "Handler server listening");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let (status, body) = ErrorResponse::from_error(&Error::bad_request("nope"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, Code::InvalidArgument);
        assert_eq!(body.message, "bad request: nope");

        let (status, body) = ErrorResponse::from_error(&Error::Cancelled);
        assert_eq!(status.as_u16(), 499);
        assert_eq!(body.code, Code::Canceled);

        let (status, body) =
            ErrorResponse::from_error(&Error::DeadlineExceeded(Duration::from_millis(10)));
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.code, Code::DeadlineExceeded);

        let (status, body) = ErrorResponse::from_error(&Error::Internal("x".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, Code::Unknown);
    }

    #[test]
    fn test_error_body_json() {
        let body = ErrorResponse {
            code: Code::InvalidArgument,
            message: "m".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"code":"invalid_argument","message":"m"}"#
        );
    }

    #[test]
    fn test_content_type_check() {
        let mut headers = HeaderMap::new();
        assert!(check_content_type(&headers).is_err());

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let rejection = check_content_type(&headers).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        for near_miss in ["application/protobuf", "application/proto-extra", "application/pro"] {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(near_miss));
            assert!(check_content_type(&headers).is_err(), "{near_miss}");
        }

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PROTO_CONTENT_TYPE));
        assert!(check_content_type(&headers).is_ok());
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/proto; charset=binary"),
        );
        assert!(check_content_type(&headers).is_ok());
    }

    #[test]
    fn test_parse_timeout() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_timeout(&headers).unwrap(), None);

        headers.insert(&TIMEOUT_HEADER, HeaderValue::from_static("250"));
        assert_eq!(parse_timeout(&headers).unwrap(), Some(Duration::from_millis(250)));

        for bad in ["", "-1", "1.5", "abc", "12345678901"] {
            headers.insert(&TIMEOUT_HEADER, HeaderValue::from_static(bad));
            assert!(parse_timeout(&headers).unwrap_err().is_bad_request(), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_deadline_cancels_context() {
        let ctx = RequestContext::new();
        let observer = ctx.clone();
        let err = with_deadline(&ctx, Some(Duration::from_millis(5)), async {
            std::future::pending::<Result<()>>().await
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::DeadlineExceeded(_)));
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_deadline_runs_to_completion() {
        let ctx = RequestContext::new();
        let value = with_deadline(&ctx, None, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
