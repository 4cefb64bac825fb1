use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to get deterministic upload ordering.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, value: DateTime<Utc>) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard = value;
    }

    pub fn advance(&self, step: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

/// Millisecond RFC 3339 with a `Z` suffix, the same shape a JS `toISOString()` yields.
pub fn to_iso(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso_format_matches_js_shape() {
        let value = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(to_iso(value), "2026-03-04T05:06:07.000Z");
    }

    #[test]
    fn parse_iso_accepts_offsets_and_rejects_garbage() {
        let parsed = parse_iso("2026-03-04T07:06:07.000+02:00").unwrap();
        assert_eq!(to_iso(parsed), "2026-03-04T05:06:07.000Z");
        assert!(parse_iso("yesterday").is_none());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        clock.advance(Duration::seconds(90));
        assert_eq!(to_iso(clock.now()), "2026-01-01T00:01:30.000Z");
    }
}
