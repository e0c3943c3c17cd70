pub mod classifier;
pub mod config;
pub mod indicators;
pub mod scan;

pub use classifier::PatternClassifier;
pub use config::PatternConfig;
pub use scan::{PatternDates, ScanReport, Scanner};
