//! HTTP front-end: accepts `POST /ingest`, enqueues a task, and races the
//! writer's reply against a soft-ack timer.
//!
//! Each connection is handled by exactly one `hyper` service future, one
//! cooperative task playing the role a dedicated per-connection strand
//! would in a thread-per-connection design. The `tokio::select!` below is
//! inherently serialised because both race participants (the writer's
//! reply arriving via the oneshot channel, and the timer) are awaited from
//! the same task; no second task can ever write a second response for this
//! connection.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use rand::Rng;
use tracing::{info, warn};

use crate::config::Settings;
use crate::model::{EnqueuedTask, ErrorBody, ErrorMsgBody, IngestBody, StatusBody};
use crate::queue::{ReplyHandle, TaskQueue};

pub struct IngressState {
    pub queue: Arc<TaskQueue>,
    pub write_timeout: Duration,
}

/// Generates a best-effort-unique correlation id: a random 64-bit value,
/// hex-encoded. Used internally to correlate log lines for a request; never
/// surfaced in a response body.
fn gen_request_id() -> String {
    let v: u64 = rand::thread_rng().gen();
    format!("{v:016x}")
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Content-Length", body.len())
        .header("Connection", "close")
        .body(Body::from(body))
        .expect("building a response from a valid status/body cannot fail")
}

async fn handle_ingest(state: Arc<IngressState>, req: Request<Body>) -> Response<Body> {
    let bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::to_string(&ErrorMsgBody {
                    error: "bad json",
                    msg: "failed to read request body".to_string(),
                })
                .unwrap(),
            );
        }
    };

    let body: IngestBody = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::to_string(&ErrorMsgBody {
                    error: "bad json",
                    msg: e.to_string(),
                })
                .unwrap(),
            );
        }
    };

    if let Err(detail) = body.validate() {
        return json_response(
            StatusCode::BAD_REQUEST,
            serde_json::to_string(&ErrorMsgBody { error: "bad json", msg: detail }).unwrap(),
        );
    }

    let request_id = gen_request_id();
    let (reply, reply_rx) = ReplyHandle::new();
    let task = EnqueuedTask::from_body(request_id, body, Some(reply));

    if !state.queue.try_push(task) {
        return json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::to_string(&ErrorBody { error: "queue full" }).unwrap(),
        );
    }

    tokio::select! {
        result = reply_rx => {
            match result {
                Ok((status, body)) => json_response(
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    body,
                ),
                // Sender dropped without resolving: the task was lost
                // (e.g. a worker crashed mid-insert). The client still
                // gets the optimistic soft-ack rather than an error.
                Err(_) => json_response(
                    StatusCode::ACCEPTED,
                    serde_json::to_string(&StatusBody { status: "accepted" }).unwrap(),
                ),
            }
        }
        _ = tokio::time::sleep(state.write_timeout) => {
            json_response(
                StatusCode::ACCEPTED,
                serde_json::to_string(&StatusBody { status: "accepted" }).unwrap(),
            )
        }
    }
}

async fn route(state: Arc<IngressState>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, "/ingest") => handle_ingest(state, req).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            serde_json::to_string(&ErrorBody { error: "not found" }).unwrap(),
        ),
    };
    Ok(response)
}

/// Binds and serves the ingest endpoint until `shutdown` resolves.
///
/// The listener is constructed (bound) as soon as this future is polled;
/// callers control accept ordering relative to the writer pool by choosing
/// when to `.await` it.
pub async fn run(
    settings: Arc<Settings>,
    queue: Arc<TaskQueue>,
    shutdown: tokio_util::sync::CancellationToken,
) -> Result<(), crate::errors::IngestError> {
    let addr: SocketAddr = settings
        .listen_addr()
        .parse()
        .map_err(|_| crate::errors::IngestError::InvalidListenAddress(settings.listen_addr()))?;

    let state = Arc::new(IngressState {
        queue,
        write_timeout: Duration::from_millis(settings.write_timeout_ms),
    });

    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| route(state.clone(), req)))
        }
    });

    let server = Server::try_bind(&addr)
        .map_err(|source| crate::errors::IngestError::ListenBindFailure {
            addr: addr.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, source),
        })?
        .serve(make_svc);
    info!(%addr, "HTTP ingress listening");

    let graceful = server.with_graceful_shutdown(async move {
        shutdown.cancelled().await;
    });

    if let Err(e) = graceful.await {
        warn!(error = %e, "HTTP ingress server error");
    }
    Ok(())
}
