pub mod webull;
pub mod yahoo;

pub use webull::WebullRanking;
pub use yahoo::YahooClient;

/// Browser-like agent; both sites reject the default reqwest one.
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";
