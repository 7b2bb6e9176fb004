//! Type-safe configuration loader using the `config` crate.
//!
//! Config is a JSON object (`server.json` by default, overridable with
//! `--config <path>`). Missing keys fall back to their defaults field by
//! field; a config file that fails to parse at all (missing file, bad JSON,
//! wrong field types) is treated as "no overrides" and every field falls
//! back to its default. That silent-fallback behaviour is deliberate,
//! chosen over the more common "bubble the parse error up" approach so a
//! bad config file degrades a deployment to defaults instead of crashing it
//! outright.

use config::{Config, File, FileFormat};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub http_threads: usize,
    pub ch_pool_size: usize,
    pub queue_capacity: usize,
    pub write_timeout_ms: u64,

    pub ch_host: String,
    pub ch_port: i64,
    pub ch_user: String,
    pub ch_password: String,
    pub ch_database: String,
    pub ch_table: String,

    /// Bind address for the `/metrics` and `/healthz` endpoints.
    pub metrics_bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            http_threads: 4,
            ch_pool_size: 4,
            queue_capacity: 100_000,
            write_timeout_ms: 200,

            ch_host: "127.0.0.1".to_string(),
            ch_port: 9000,
            ch_user: "default".to_string(),
            ch_password: String::new(),
            ch_database: "sensors".to_string(),
            ch_table: "metrics".to_string(),

            metrics_bind: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Settings {
    /// Loads configuration from `path`, falling back to defaults entirely
    /// on any failure (missing file, malformed JSON, wrong field types).
    pub fn load(path: &str) -> Self {
        let loaded = Config::builder()
            .add_source(File::new(path, FileFormat::Json).required(false))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<Settings>());

        match loaded {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(
                    path,
                    error = %err,
                    "config file missing or malformed, using defaults"
                );
                Settings::default()
            }
        }
    }

    /// HTTP listen address as `host:port`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// ClickHouse HTTP-interface base URL.
    pub fn ch_url(&self) -> String {
        format!("http://{}:{}", self.ch_host, self.ch_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load("/nonexistent/path/server.json");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_json_falls_back_to_defaults() {
        let mut f = tempfile_with_contents("not json at all {{{");
        let settings = Settings::load(f.path_str());
        assert_eq!(settings, Settings::default());
        f.cleanup();
    }

    #[test]
    fn partial_overrides_merge_with_defaults() {
        let mut f = tempfile_with_contents(r#"{"port": 9999, "ch_table": "custom"}"#);
        let settings = Settings::load(f.path_str());
        assert_eq!(settings.port, 9999);
        assert_eq!(settings.ch_table, "custom");
        assert_eq!(settings.host, Settings::default().host);
        f.cleanup();
    }

    struct TempFile {
        path: std::path::PathBuf,
    }

    impl TempFile {
        fn path_str(&self) -> &str {
            self.path.to_str().unwrap()
        }

        fn cleanup(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_with_contents(contents: &str) -> TempFile {
        let mut path = std::env::temp_dir();
        path.push(format!("sensor_ingest_config_test_{}.json", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        TempFile { path }
    }
}
