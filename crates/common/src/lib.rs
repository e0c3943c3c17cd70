pub mod clock;
pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use provider::{BarProvider, Notifier, RankedSymbolSource};
pub use types::*;
