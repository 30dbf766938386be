//! Shared retry-ladder helpers for HTTP-backed backends.
//!
//! Each backend implements its own ladder (the failure classes and caps
//! differ) but all of them need jittered backoff and `Retry-After` parsing,
//! so those primitives live here once.

use std::time::Duration;

use rand::Rng;

/// Apply ±25% jitter to a base duration.
pub fn jitter(base: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range(0.75..=1.25);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

/// Parse a `Retry-After` header value (seconds) per the rate-limit ladder:
/// clamp to the `(0, 120]` band, falling back to 30s outside it.
pub fn parse_retry_after(raw: Option<&str>) -> Duration {
    let secs = raw.and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);
    if secs > 0.0 && secs <= 120.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::from_secs(30)
    }
}

/// Exponential backoff for the cold-start ladder: `10 * 2^(attempt-1)`,
/// clamped to 60s. `attempt` is 1-based.
pub fn cold_start_backoff(attempt: u32) -> Duration {
    let secs = 10.0 * 2f64.powi(attempt as i32 - 1);
    Duration::from_secs_f64(secs.min(60.0))
}

/// Fixed continuation-token resubmission delay.
pub fn continuation_delay() -> Duration {
    Duration::from_secs(10)
}

/// Gremlin status-based backoff: `2^attempt` seconds, `attempt` 0-based.
pub fn gremlin_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_zero_uses_default() {
        assert_eq!(parse_retry_after(Some("0")), Duration::from_secs(30));
    }

    #[test]
    fn retry_after_out_of_band_uses_default() {
        assert_eq!(parse_retry_after(Some("125")), Duration::from_secs(30));
    }

    #[test]
    fn retry_after_in_band_is_used_verbatim() {
        assert_eq!(parse_retry_after(Some("3")), Duration::from_secs(3));
        assert_eq!(parse_retry_after(Some("120")), Duration::from_secs(120));
    }

    #[test]
    fn retry_after_missing_uses_default() {
        assert_eq!(parse_retry_after(None), Duration::from_secs(30));
    }

    #[test]
    fn cold_start_backoff_grows_and_clamps() {
        assert_eq!(cold_start_backoff(1), Duration::from_secs(10));
        assert_eq!(cold_start_backoff(2), Duration::from_secs(20));
        assert_eq!(cold_start_backoff(3), Duration::from_secs(40));
        assert_eq!(cold_start_backoff(4), Duration::from_secs(60));
        assert_eq!(cold_start_backoff(10), Duration::from_secs(60));
    }

    #[test]
    fn gremlin_backoff_doubles() {
        assert_eq!(gremlin_backoff(0), Duration::from_secs(1));
        assert_eq!(gremlin_backoff(1), Duration::from_secs(2));
        assert_eq!(gremlin_backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn jitter_stays_within_band() {
        let base = Duration::from_secs(10);
        for _ in 0..50 {
            let jittered = jitter(base);
            assert!(jittered >= Duration::from_secs_f64(7.5));
            assert!(jittered <= Duration::from_secs_f64(12.5));
        }
    }
}
