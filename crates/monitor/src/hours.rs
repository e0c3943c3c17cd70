use chrono::NaiveTime;

/// Daily wall-clock window in which volume monitoring is allowed.
///
/// Both bounds are inclusive. When `start > end` the window wraps midnight,
/// e.g. 23:30–05:00 for the US session seen from Korea.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl MarketHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(23, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(5, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}
