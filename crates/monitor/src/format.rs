//! Volume formatting and the user-facing watch messages.

/// Compact volume: `1.50K`, `2.35M`, or the plain number below a thousand.
pub fn format_volume(volume: u64) -> String {
    if volume >= 1_000_000 {
        format!("{:.2}M", volume as f64 / 1_000_000.0)
    } else if volume >= 1_000 {
        format!("{:.2}K", volume as f64 / 1_000.0)
    } else {
        volume.to_string()
    }
}

pub(crate) fn started(symbol: &str, max_volume: u64) -> String {
    format!(
        "<b><i>{symbol}</i></b> max volume (last hour): <b><i>{}</i></b>\n\
         🟢 Volume monitoring started 🟢",
        format_volume(max_volume)
    )
}

pub(crate) fn duplicate(symbol: &str) -> String {
    format!("🔴 <b>{symbol}</b> is already being monitored. 🔴")
}

pub(crate) fn not_found(symbol: &str) -> String {
    format!("There is no symbol called {symbol}.")
}

pub(crate) fn fetch_failed(symbol: &str) -> String {
    format!("Could not fetch data for {symbol}. Please try again later.")
}

pub(crate) fn invalid_symbol() -> String {
    "Please enter a valid symbol. e.g. /monitor AAPL".to_string()
}

pub(crate) fn start_outside_hours() -> String {
    "This feature is only available during regular market hours.".to_string()
}

pub(crate) fn no_data(symbol: &str) -> String {
    format!("No data found for {symbol}.")
}

pub(crate) fn out_of_hours() -> String {
    "Outside regular market hours!\n🔴 Stopping all monitoring jobs 🔴".to_string()
}

pub(crate) fn collapsed(symbol: &str, volume: u64, ratio: f64) -> String {
    format!(
        "<b><i>{symbol}</i></b> current volume is <b><i>{}</i></b>,\n\
         at or below {:.0}% of the max volume!\n\
         🔴 Stopping this job 🔴",
        format_volume(volume),
        ratio * 100.0
    )
}

pub(crate) fn new_high(symbol: &str, volume: u64) -> String {
    format!(
        "<b><i>{symbol}</i></b>\n🔴 New max volume <b><i>{}</i></b> found! 🔴",
        format_volume(volume)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_volumes_are_plain() {
        assert_eq!(format_volume(0), "0");
        assert_eq!(format_volume(200), "200");
        assert_eq!(format_volume(999), "999");
    }

    #[test]
    fn thousands_and_millions() {
        assert_eq!(format_volume(1_000), "1.00K");
        assert_eq!(format_volume(250_000), "250.00K");
        assert_eq!(format_volume(1_000_000), "1.00M");
        assert_eq!(format_volume(2_345_678), "2.35M");
    }

    #[test]
    fn collapse_message_shows_ratio() {
        let text = collapsed("XYZ", 250_000, 0.3);
        assert!(text.contains("250.00K"));
        assert!(text.contains("30%"));
    }
}
