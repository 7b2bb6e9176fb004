//! `/metrics` and `/healthz` HTTP server.
//!
//! A small standalone `hyper::Server` serving just these two routes,
//! independent of the main ingest listener so a scraper can reach it even
//! if ingest traffic is saturating the primary listener's accept loop.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server};
use prometheus::{Encoder, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Settings;
use crate::metrics;

async fn handle(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let metrics_text = metrics::gather_metrics();
            let mime = TextEncoder::new().format_type();
            Response::builder()
                .header("Content-Type", mime)
                .body(Body::from(metrics_text))
                .expect("building the /metrics response cannot fail")
        }
        (&Method::GET, "/healthz") => Response::new(Body::from("OK")),
        _ => Response::builder()
            .status(404)
            .body(Body::empty())
            .expect("building a 404 cannot fail"),
    };
    Ok(response)
}

pub async fn run(settings: Arc<Settings>, shutdown: CancellationToken) {
    let addr: SocketAddr = match settings.metrics_bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(error = %e, addr = %settings.metrics_bind, "invalid metrics_bind, skipping metrics server");
            return;
        }
    };

    let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(handle)) });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            warn!(error = %e, %addr, "failed to bind metrics server");
            return;
        }
    };

    info!(%addr, "metrics & health server listening");
    let graceful = server.with_graceful_shutdown(async move {
        shutdown.cancelled().await;
    });

    if let Err(e) = graceful.await {
        warn!(error = %e, "metrics server error");
    }
}
