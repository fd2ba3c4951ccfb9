// Wall-clock helpers for the logging timestamp column
//
// Austin Shafer - 2020
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, truncated to fit `u32` (wraps after
/// ~49 days - fine for a log timestamp, not meant for long-lived deltas).
pub fn get_current_millis() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u32
}
