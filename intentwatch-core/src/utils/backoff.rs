use std::time::Duration;

/// Returns the reconnect delay for the given attempt number.
///
/// Grows as `base * factor^attempt` and is capped at `max`. The result is
/// truncated to whole milliseconds.
pub fn reconnect_delay(base: Duration, factor: f64, attempt: u32, max: Duration) -> Duration {
    let max_ms = max.as_millis() as f64;
    let exponent = attempt.min(i32::MAX as u32) as i32;
    let delay_ms = base.as_millis() as f64 * factor.powi(exponent);
    if !delay_ms.is_finite() || delay_ms > max_ms {
        return max;
    }
    Duration::from_millis(delay_ms.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(attempt: u32) -> Duration {
        reconnect_delay(
            Duration::from_millis(1000),
            1.5,
            attempt,
            Duration::from_millis(30_000),
        )
    }

    #[test]
    fn test_reconnect_delay_calculation() {
        assert_eq!(delay(0), Duration::from_millis(1000));
        assert_eq!(delay(1), Duration::from_millis(1500));
        assert_eq!(delay(2), Duration::from_millis(2250));
        assert_eq!(delay(3), Duration::from_millis(3375));
        assert_eq!(delay(8), Duration::from_millis(25_628));
        // 1000 * 1.5^9 = 38443ms, capped
        assert_eq!(delay(9), Duration::from_millis(30_000));
        assert_eq!(delay(50), Duration::from_millis(30_000));
        assert_eq!(delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_reconnect_delay_matches_closed_form() {
        for attempt in 0..=50u32 {
            let expected = (1000.0 * 1.5f64.powi(attempt as i32)).min(30_000.0) as u64;
            assert_eq!(delay(attempt), Duration::from_millis(expected));
        }
    }
}
