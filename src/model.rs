//! Wire and internal data types for the ingestion pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::queue::ReplyHandle;

/// `POST /ingest` request body.
///
/// `metrics` must be non-empty and every key unique, both are guaranteed
/// by construction from a JSON object, whose keys are already unique.
#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub sensor_id: String,
    pub ts: i64,
    pub metrics: std::collections::HashMap<String, f64>,
}

impl IngestBody {
    /// Validates the parsed body's required field constraints.
    ///
    /// Returns a human-readable detail string on the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.sensor_id.is_empty() {
            return Err("sensor_id must not be empty".to_string());
        }
        if self.metrics.is_empty() {
            return Err("metrics must not be empty".to_string());
        }
        if self.metrics.keys().any(|k| k.is_empty()) {
            return Err("metric keys must not be empty".to_string());
        }
        Ok(())
    }
}

/// A task transferred from the HTTP ingress to a writer, via the task queue.
///
/// Owned exclusively by whichever component currently holds it: created by
/// the ingress, handed to the queue, consumed by exactly one writer.
#[derive(Debug)]
pub struct EnqueuedTask {
    pub request_id: String,
    pub sensor_id: String,
    pub ts: i64,
    pub kv: Vec<(String, f64)>,
    pub reply: Option<Arc<ReplyHandle>>,
}

impl EnqueuedTask {
    pub fn from_body(request_id: String, body: IngestBody, reply: Option<Arc<ReplyHandle>>) -> Self {
        Self {
            request_id,
            sensor_id: body.sensor_id,
            ts: body.ts,
            kv: body.metrics.into_iter().collect(),
            reply,
        }
    }

    /// Number of rows this task will produce once flattened.
    pub fn row_count(&self) -> usize {
        self.kv.len()
    }
}

/// One flattened row as inserted into the `sensor_id`/`ts`/`key`/`value` table.
///
/// `ts` is stored as a ClickHouse `DateTime` (seconds since the epoch, UTC),
/// already normalised, never the raw wire value.
#[derive(Debug, Clone, Serialize, clickhouse::Row)]
pub struct MetricRow {
    pub sensor_id: String,
    pub ts: u32,
    pub key: String,
    pub value: f64,
}

/// Standard JSON response bodies served by the ingest endpoint.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusMsgBody {
    pub status: &'static str,
    pub msg: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorMsgBody {
    pub error: &'static str,
    pub msg: String,
}
