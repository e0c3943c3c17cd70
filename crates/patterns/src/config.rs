use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Classifier thresholds, optionally overridden from a TOML file.
///
/// Example `config/patterns.toml`:
/// ```toml
/// body_ratio = 0.3
/// lower_wick_ratio = 2.0
/// upper_shadow_ratio = 0.1
/// short_window = 20
/// long_window = 50
/// ```
/// Any omitted key keeps its default.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Largest body-to-range ratio a hammer may have.
    pub body_ratio: f64,
    /// Lower wick must be at least this multiple of the body.
    pub lower_wick_ratio: f64,
    /// Largest upper-shadow-to-range ratio a hammer may have.
    pub upper_shadow_ratio: f64,
    /// Fast SMA window for the downtrend filter.
    pub short_window: usize,
    /// Slow SMA window for the downtrend filter.
    pub long_window: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            body_ratio: 0.3,
            lower_wick_ratio: 2.0,
            upper_shadow_ratio: 0.1,
            short_window: 20,
            long_window: 50,
        }
    }
}

impl PatternConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
            panic!("Failed to read pattern config at '{path}': {e}")
        });
        Self::from_toml_str(&content).unwrap_or_else(|e| {
            panic!("Invalid pattern config at '{path}': {e}")
        })
    }

    fn validate(&self) -> Result<()> {
        if self.short_window == 0 || self.long_window == 0 {
            return Err(Error::Config("SMA windows must be >= 1".into()));
        }
        if self.short_window >= self.long_window {
            return Err(Error::Config(format!(
                "short_window ({}) must be below long_window ({})",
                self.short_window, self.long_window
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_defaults() {
        assert_eq!(PatternConfig::from_toml_str("").unwrap(), PatternConfig::default());
    }

    #[test]
    fn partial_override() {
        let cfg = PatternConfig::from_toml_str("body_ratio = 0.25\nlong_window = 60").unwrap();
        assert_eq!(cfg.body_ratio, 0.25);
        assert_eq!(cfg.long_window, 60);
        assert_eq!(cfg.short_window, 20);
    }

    #[test]
    fn inverted_windows_are_rejected() {
        let err = PatternConfig::from_toml_str("short_window = 50\nlong_window = 20");
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
