use chrono::{DateTime, Local, Utc};

/// This is the standard way of converting a moment to a day key in daytally.
/// Days are cut in the local timezone, since "today's work" follows the wall
/// clock of whoever is tracking it.
pub fn day_key(moment: DateTime<Utc>) -> String {
    moment
        .with_timezone(&Local)
        .date_naive()
        .format("%Y-%m-%d")
        .to_string()
}

/// Renders whole seconds as `HH:MM:SS`.
pub fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Renders a signed amount of seconds as `+HH:MM`/`-HH:MM`. Seconds are
/// dropped, matching what a manual-adjustment summary needs.
pub fn format_signed_hm(seconds: i64) -> String {
    let sign = if seconds >= 0 { '+' } else { '-' };
    let abs = seconds.abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

/// Local `HH:MM` for session boundaries.
pub fn format_local_hm(moment: DateTime<Utc>) -> String {
    moment.with_timezone(&Local).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::{format_hms, format_signed_hm};

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(65), "00:01:05");
        assert_eq!(format_hms(3 * 3600 + 25 * 60 + 7), "03:25:07");
        assert_eq!(format_hms(-5), "00:00:00");
    }

    #[test]
    fn signed_hm_formatting() {
        assert_eq!(format_signed_hm(600), "+00:10");
        assert_eq!(format_signed_hm(-3660), "-01:01");
        assert_eq!(format_signed_hm(0), "+00:00");
    }
}
