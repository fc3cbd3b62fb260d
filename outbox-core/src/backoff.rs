//! Retry/backoff policy (C6). Pure functions, no I/O — `calculate_backoff` in the
//! corpus is tested the same way, as a free function independent of the processor.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::event::OutboxEvent;

/// `NextBackoff(retryCount) = base * 2^(max(retryCount, 1) - 1)`.
///
/// 0 retries -> base, 1 retry -> base, 2 retries -> 2*base, 3 retries -> 4*base, ...
pub fn next_backoff(retry_count: i32, base: Duration) -> Duration {
    let exponent = (retry_count.max(1) - 1).min(32) as u32;
    base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
}

/// `IsEligible(event, now)`: false once `retry_count >= max_retries`, or while still
/// within the backoff window since the last failed attempt.
pub fn is_eligible(event: &OutboxEvent, now: DateTime<Utc>, max_retries: i32, base: Duration) -> bool {
    if event.retry_count >= max_retries {
        return false;
    }
    match event.last_retry_at {
        Some(last) => {
            let wait = next_backoff(event.retry_count, base);
            let wait = chrono::Duration::from_std(wait)
                .unwrap_or_else(|_| chrono::Duration::milliseconds(i64::MAX));
            now >= last + wait
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn base() -> Duration {
        Duration::from_secs(1)
    }

    #[test]
    fn backoff_matches_documented_sequence() {
        assert_eq!(next_backoff(0, base()), Duration::from_secs(1));
        assert_eq!(next_backoff(1, base()), Duration::from_secs(1));
        assert_eq!(next_backoff(2, base()), Duration::from_secs(2));
        assert_eq!(next_backoff(3, base()), Duration::from_secs(4));
        assert_eq!(next_backoff(4, base()), Duration::from_secs(8));
    }

    #[test]
    fn backoff_monotonically_doubles_past_first_retry() {
        for k in 1..10 {
            let a = next_backoff(k, base());
            let b = next_backoff(k + 1, base());
            assert_eq!(b, a * 2, "NextBackoff({}) should be 2x NextBackoff({})", k + 1, k);
        }
    }

    fn sample_event(retry_count: i32, last_retry_at: Option<DateTime<Utc>>) -> OutboxEvent {
        OutboxEvent {
            id: Uuid::new_v4(),
            aggregate_type: "message".to_string(),
            aggregate_id: Uuid::new_v4(),
            payload: serde_json::json!({}),
            created_at: Utc::now(),
            processed_at: None,
            retry_count,
            last_retry_at,
            error_message: None,
        }
    }

    #[test]
    fn ineligible_once_max_retries_reached() {
        let event = sample_event(3, None);
        assert!(!is_eligible(&event, Utc::now(), 3, base()));
    }

    #[test]
    fn eligible_immediately_with_no_prior_attempt() {
        let event = sample_event(0, None);
        assert!(is_eligible(&event, Utc::now(), 3, base()));
    }

    #[test]
    fn ineligible_within_backoff_window() {
        let now = Utc::now();
        let event = sample_event(1, Some(now));
        assert!(!is_eligible(&event, now + chrono::Duration::milliseconds(500), 3, base()));
    }

    #[test]
    fn eligible_after_backoff_window_elapses() {
        let now = Utc::now();
        let event = sample_event(1, Some(now));
        assert!(is_eligible(&event, now + chrono::Duration::seconds(2), 3, base()));
    }
}
