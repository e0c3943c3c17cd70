pub mod format;
pub mod hours;
pub mod monitor;
pub mod registry;
pub mod watch;

pub use hours::MarketHours;
pub use monitor::{normalize_symbol, Monitor, MonitorConfig, StartOutcome};
pub use registry::{Registration, WatchId, WatchInfo, WatchRegistry};
pub use watch::{VolumeWatch, WatchPhase, WatchState};
