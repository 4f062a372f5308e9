use chrono::{Duration, NaiveDate};
use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current local calendar date.
///
/// Called on every recorded interaction. To avoid repeated timezone lookups
/// this is cached per-thread and refreshed at most once per second.
pub fn today() -> NaiveDate {
    thread_local! {
        static CACHE: Cell<Option<(u64, NaiveDate)>> = const { Cell::new(None) };
    }

    let now = now_ms();
    CACHE.with(|cache| {
        if let Some((at, date)) = cache.get() {
            if now.saturating_sub(at) < 1_000 {
                return date;
            }
        }

        let date = chrono::Local::now().date_naive();
        cache.set(Some((now, date)));
        date
    })
}

pub fn yesterday() -> NaiveDate {
    let today = today();
    today.checked_sub_signed(Duration::days(1)).unwrap_or(today)
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yesterday_precedes_today() {
        assert_eq!(yesterday().succ_opt(), Some(today()));
    }
}
