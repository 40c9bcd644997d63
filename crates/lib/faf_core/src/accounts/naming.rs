//! Login naming policy: pattern, change cooldown and reservation window.

use std::sync::LazyLock;

use chrono::{DateTime, Months, Utc};
use regex::Regex;

static USERNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{2,15}$").expect("username pattern is a valid regex")
});

/// A login starts with a letter and has 3–16 letters, digits, `_` or `-`.
pub fn is_valid_username(name: &str) -> bool {
    USERNAME_PATTERN.is_match(name)
}

/// Earliest change time that still reserves a login for its previous owner.
pub fn reservation_cutoff(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Days left before another voluntary login change is allowed, or `None`
/// if a change is allowed now.
///
/// A change on day `min_days` after the last one is still too early; day
/// `min_days + 1` is the first allowed.
pub fn days_until_change_allowed(
    last_change: DateTime<Utc>,
    now: DateTime<Utc>,
    min_days: i64,
) -> Option<i64> {
    let days_since = (now - last_change).num_days();
    (days_since <= min_days).then(|| min_days - days_since + 1)
}
