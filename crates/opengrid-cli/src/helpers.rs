//! Shared startup helpers: tracing, metrics exporter, store connection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::EnvFilter;

use opengrid_store::{JobBoard, RedisStore};

/// Histogram buckets for `job_latency_seconds`, in seconds.
const LATENCY_BUCKETS: [f64; 10] = [0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0];

/// How often and how long to retry the initial store connection before the
/// process gives up and lets the supervisor restart it.
const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; `default_level` applies otherwise.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Library crates only touch the `metrics` facade, so this is the single
/// place the exporter is configured.
pub fn install_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets_for_metric(
            Matcher::Full("job_latency_seconds".to_string()),
            &LATENCY_BUCKETS,
        )
        .context("invalid latency buckets")?
        .install()
        .context("failed to install the prometheus exporter")?;
    tracing::info!(port, "metrics exporter listening");
    Ok(())
}

/// Connect to the state store named by `REDIS_URL`, with a bounded retry.
///
/// Exhausting the retry window is fatal by design: the process exits so a
/// supervisor can restart it.
pub async fn connect_board() -> Result<JobBoard> {
    let url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

    let mut last_error = None;
    for attempt in 1..=CONNECT_ATTEMPTS {
        match RedisStore::connect(&url).await {
            Ok(store) => {
                tracing::info!(url = %url, "state store connected");
                return Ok(JobBoard::new(Arc::new(store)));
            }
            Err(err) => {
                tracing::warn!(attempt, error = %err, "state store connection failed");
                last_error = Some(err);
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
        }
    }
    Err(last_error.expect("at least one attempt ran"))
        .context(format!("could not reach the state store at {url}"))
}

/// Read an env var as `u32`, falling back to `default` when unset or empty.
pub fn env_u32(name: &str, default: u32) -> Result<u32> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<u32>()
            .with_context(|| format!("{name} must be an integer, got `{raw}`")),
        _ => Ok(default),
    }
}
