/// Simple moving average over close prices.
///
/// Returns `None` until at least `period` values are available.
#[derive(Debug, Clone, Copy)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period }
    }

    /// Average of the last `period` values (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }

    /// SMA at every index of `closes`. Entry `i` is `None` while `i + 1 < period`.
    pub fn rolling(&self, closes: &[f64]) -> Vec<Option<f64>> {
        (0..closes.len())
            .map(|i| self.compute(&closes[..=i]))
            .collect()
    }
}
