//! Wall-clock helpers.
//!
//! Every timestamp that crosses the store boundary is unix time: fractional
//! seconds (`f64`) for job submission stamps and latency math, whole seconds
//! (`i64`) for heartbeats.

use chrono::Utc;

/// Current wall-clock time as fractional unix seconds.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 * 1e-6
}

/// Current wall-clock time as whole unix seconds (heartbeat resolution).
pub fn unix_now_secs() -> i64 {
    Utc::now().timestamp()
}
