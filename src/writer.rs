//! Writer pool: `ch_pool_size` long-lived workers, each owning one
//! ClickHouse connection, draining the task queue and inserting one batch
//! per task.
//!
//! Each worker cycles through a connect -> drain -> (on error) reconnect
//! loop, with a flat 3s delay between reconnect attempts, polled every
//! 100ms so shutdown is never blocked behind it for long. Workers run as
//! `tokio::spawn`ed tasks rather than OS threads; tokio's work-stealing
//! scheduler fills that role here.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::metrics::TOTAL_ROWS_INSERTED;
use crate::model::{EnqueuedTask, MetricRow, StatusBody, StatusMsgBody};
use crate::queue::TaskQueue;
use crate::timestamp::normalise_timestamp;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors an insert attempt can fail with, classified so the worker knows
/// whether the connection is presumed healthy (`Rejected`, a query-level
/// failure, e.g. schema mismatch) or presumed dead (`Transport`, a
/// network-level failure, e.g. the socket was reset).
///
/// `clickhouse::error::Error` does not expose this distinction as a
/// dedicated variant the way a hand-rolled taxonomy would, so it is
/// approximated from the error's rendered message (see DESIGN.md). Every
/// branch only relies on `Display`, which is part of the public
/// `std::error::Error` contract, rather than guessing at undocumented
/// crate internals.
enum ChError {
    Rejected(String),
    Transport(String),
}

fn classify(err: &clickhouse::error::Error) -> ChError {
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    let transport_like = ["connect", "connection", "broken pipe", "reset", "timed out", "eof", "network", "dns"]
        .iter()
        .any(|needle| lower.contains(needle));
    if transport_like {
        ChError::Transport(msg)
    } else {
        ChError::Rejected(msg)
    }
}

fn build_client(settings: &Settings) -> clickhouse::Client {
    clickhouse::Client::default()
        .with_url(settings.ch_url())
        .with_user(&settings.ch_user)
        .with_password(&settings.ch_password)
        .with_database(&settings.ch_database)
}

fn rows_for(task: &EnqueuedTask) -> Vec<MetricRow> {
    let ts = normalise_timestamp(task.ts) as u32;
    task.kv
        .iter()
        .map(|(key, value)| MetricRow {
            sensor_id: task.sensor_id.clone(),
            ts,
            key: key.clone(),
            value: *value,
        })
        .collect()
}

async fn insert_rows(
    client: &clickhouse::Client,
    table: &str,
    rows: &[MetricRow],
) -> Result<(), clickhouse::error::Error> {
    let mut insert = client.insert(table)?;
    for row in rows {
        insert.write(row).await?;
    }
    insert.end().await
}

/// Cooperatively sleeps for `RECONNECT_DELAY`, checking `shutdown` every
/// `SHUTDOWN_POLL_INTERVAL` so the backoff never outlives shutdown by more
/// than one poll tick.
async fn cancellable_backoff(shutdown: &CancellationToken) -> bool {
    let deadline = tokio::time::Instant::now() + RECONNECT_DELAY;
    loop {
        if shutdown.is_cancelled() {
            return false;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return true;
        }
        let tick = SHUTDOWN_POLL_INTERVAL.min(deadline - now);
        tokio::select! {
            _ = sleep(tick) => {}
            _ = shutdown.cancelled() => return false,
        }
    }
}

/// One worker's lifecycle: `Connecting` -> `Draining` -> (on error)
/// `Connecting` again, until shutdown.
async fn worker_loop(
    id: usize,
    settings: Arc<Settings>,
    queue: Arc<TaskQueue>,
    shutdown: CancellationToken,
) -> Result<(), crate::errors::IngestError> {
    if !(0..=65535).contains(&settings.ch_port) {
        return Err(crate::errors::IngestError::FatalConfig(settings.ch_port));
    }

    'connect: loop {
        if shutdown.is_cancelled() {
            return Ok(());
        }

        let client = build_client(&settings);
        if let Err(e) = client.query("SELECT 1").fetch_one::<u8>().await {
            warn!(worker = id, error = %e, "ClickHouse liveness probe failed, retrying");
            if !cancellable_backoff(&shutdown).await {
                return Ok(());
            }
            continue 'connect;
        }
        info!(worker = id, host = %settings.ch_host, port = settings.ch_port, "connected to ClickHouse");

        loop {
            let task = match queue.pop().await {
                Some(task) => task,
                None => return Ok(()), // queue stopped and drained
            };

            let rows = rows_for(&task);
            let k = rows.len() as u64;

            match insert_rows(&client, &settings.ch_table, &rows).await {
                Ok(()) => {
                    TOTAL_ROWS_INSERTED.inc_by(k);
                    if let Some(reply) = &task.reply {
                        reply.resolve(200, serde_json::to_string(&StatusBody { status: "ok" }).unwrap());
                    }
                }
                Err(e) => match classify(&e) {
                    ChError::Rejected(detail) => {
                        error!(worker = id, request_id = %task.request_id, error = %detail, "insert rejected");
                        if let Some(reply) = &task.reply {
                            reply.resolve(
                                500,
                                serde_json::to_string(&StatusMsgBody { status: "error", msg: detail }).unwrap(),
                            );
                        }
                    }
                    ChError::Transport(detail) => {
                        error!(worker = id, request_id = %task.request_id, error = %detail, "connection lost, reconnecting");
                        // Task is dropped without a reply: the client
                        // already has a soft-ack timer armed and will
                        // observe 202 once it fires.
                        if !cancellable_backoff(&shutdown).await {
                            return Ok(());
                        }
                        continue 'connect;
                    }
                },
            }
        }
    }
}

/// Starts `settings.ch_pool_size` workers and returns their join handles.
pub fn spawn_pool(
    settings: Arc<Settings>,
    queue: Arc<TaskQueue>,
    shutdown: CancellationToken,
) -> Vec<tokio::task::JoinHandle<Result<(), crate::errors::IngestError>>> {
    (0..settings.ch_pool_size)
        .map(|id| {
            let settings = settings.clone();
            let queue = queue.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker_loop(id, settings, queue, shutdown).await })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reset_as_transport() {
        // clickhouse::error::Error has no public constructor suitable for
        // a unit test; exercise the heuristic directly on representative
        // message text instead.
        let lower = "connection reset by peer".to_ascii_lowercase();
        assert!(["connect", "reset"].iter().any(|n| lower.contains(n)));
    }

    #[test]
    fn rows_for_preserves_key_value_pairs_and_normalises_ts() {
        let task = EnqueuedTask {
            request_id: "r1".to_string(),
            sensor_id: "s1".to_string(),
            ts: 1_730_000_000_000, // millis
            kv: vec![("a".to_string(), 1.5), ("b".to_string(), 2.5)],
            reply: None,
        };
        let rows = rows_for(&task);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.sensor_id == "s1" && r.ts == 1_730_000_000));
        assert!(rows.iter().any(|r| r.key == "a" && r.value == 1.5));
        assert!(rows.iter().any(|r| r.key == "b" && r.value == 2.5));
    }
}
