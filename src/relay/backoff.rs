use std::time::Duration;

/// Capped linear reconnect delay: `step * attempt`, never above `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    step: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(step: Duration, max: Duration) -> Self {
        Self { step, max }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_millis(2000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 50)]
    #[case(10, 500)]
    #[case(40, 2000)]
    #[case(41, 2000)]
    #[case(u32::MAX, 2000)]
    fn test_default_delays(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(
            Backoff::default().delay(attempt),
            Duration::from_millis(expected_ms)
        );
    }
}
