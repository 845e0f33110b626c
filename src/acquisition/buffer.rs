//! Buffer sizing for continuous acquisition.

/// Sizes the continuous-mode buffer for a target measurement window.
///
/// The nominal sample count `rate * duration` gets a safety margin on top,
/// and the result never drops below the caller's minimum sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    margin_percent: u32,
}

impl BufferPolicy {
    /// Margin applied by [`BufferPolicy::default`].
    pub const DEFAULT_MARGIN_PERCENT: u32 = 15;

    /// Policy with `margin_percent` extra samples on top of the nominal count.
    pub fn new(margin_percent: u32) -> Self {
        Self { margin_percent }
    }

    /// Configured margin.
    pub fn margin_percent(&self) -> u32 {
        self.margin_percent
    }

    /// `ceil(rate * duration * (1 + margin))`.
    pub fn calculated(&self, sample_rate: f64, duration_secs: f64) -> usize {
        // Integer percent keeps 100 Hz * 2 s * 115% at exactly 230
        let scaled = sample_rate * duration_secs * f64::from(100 + self.margin_percent) / 100.0;
        scaled.ceil().max(0.0) as usize
    }

    /// Buffer size per channel, floored at `min_samples`.
    ///
    /// Without a measurement duration the minimum is used as-is.
    pub fn effective(&self, min_samples: usize, sample_rate: f64, duration_secs: Option<f64>) -> usize {
        match duration_secs {
            Some(duration) => self.calculated(sample_rate, duration).max(min_samples),
            None => min_samples,
        }
    }
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MARGIN_PERCENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_at_requested_samples() {
        let policy = BufferPolicy::default();
        assert_eq!(policy.calculated(100.0, 2.0), 230);
        assert_eq!(policy.effective(500, 100.0, Some(2.0)), 500);
    }

    #[test]
    fn test_margin_dominates_for_long_windows() {
        let policy = BufferPolicy::default();
        assert_eq!(policy.effective(500, 1000.0, Some(10.0)), 11_500);
    }

    #[test]
    fn test_fractional_counts_round_up() {
        let policy = BufferPolicy::default();
        // 3 * 0.5 * 1.15 = 1.725
        assert_eq!(policy.calculated(3.0, 0.5), 2);
    }

    #[test]
    fn test_no_duration_uses_minimum() {
        assert_eq!(BufferPolicy::default().effective(1000, 100.0, None), 1000);
    }

    #[test]
    fn test_zero_margin() {
        assert_eq!(BufferPolicy::new(0).calculated(100.0, 2.0), 200);
    }
}
