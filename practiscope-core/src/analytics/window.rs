//! Relative time windows over attempt creation time.
//!
//! A [`Period`] plus a reference instant yields an inclusive lower bound on
//! `created_at`. Wider periods always select a superset of narrower ones:
//! week ⊆ month ⊆ year ⊆ all.

use chrono::{DateTime, Duration, Months, Utc};

/// Time period token accepted by the stats endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Period {
    /// No lower bound
    #[default]
    All,
    /// Last 7 days
    Week,
    /// Last calendar month
    Month,
    /// Last 12 calendar months
    Year,
}

impl Period {
    /// Periods from narrowest to widest.
    pub const WIDENING: [Period; 4] = [Period::Week, Period::Month, Period::Year, Period::All];

    /// Parse a period token leniently.
    ///
    /// Unknown, blank or absent tokens mean all time rather than an error,
    /// matching how dashboards pass `period=` through unchanged.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("week") => Period::Week,
            Some("month") => Period::Month,
            Some("year") => Period::Year,
            _ => Period::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// Inclusive lower bound on `created_at`, or `None` for all time.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::All => None,
            Period::Week => Some(now - Duration::days(7)),
            Period::Month => Some(sub_months(now, 1)),
            Period::Year => Some(sub_months(now, 12)),
        }
    }

    /// Whether `ts` falls inside this period relative to `now`.
    #[cfg(test)]
    pub fn contains(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.cutoff(now).map_or(true, |cutoff| ts >= cutoff)
    }
}

fn sub_months(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(Period::parse(Some("week")), Period::Week);
        assert_eq!(Period::parse(Some(" Month ")), Period::Month);
        assert_eq!(Period::parse(Some("YEAR")), Period::Year);
        assert_eq!(Period::parse(Some("all")), Period::All);
        assert_eq!(Period::parse(Some("fortnight")), Period::All);
        assert_eq!(Period::parse(Some("")), Period::All);
        assert_eq!(Period::parse(None), Period::All);
    }

    #[test]
    fn test_cutoffs() {
        let now = now();
        assert_eq!(Period::All.cutoff(now), None);
        assert_eq!(
            Period::Week.cutoff(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 24, 12, 0, 0).unwrap())
        );
        // March 31 minus one month clamps to the end of February
        assert_eq!(
            Period::Month.cutoff(now),
            Some(Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap())
        );
        assert_eq!(
            Period::Year.cutoff(now),
            Some(Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let now = now();
        let cutoff = Period::Week.cutoff(now).unwrap();
        assert!(Period::Week.contains(cutoff, now));
        assert!(!Period::Week.contains(cutoff - Duration::seconds(1), now));
    }

    #[test]
    fn test_widening_is_monotonic() {
        let now = now();
        for days_ago in [0, 2, 6, 7, 8, 10, 27, 29, 31, 200, 364, 366, 1000] {
            let ts = now - Duration::days(days_ago);
            let inside: Vec<bool> = Period::WIDENING
                .iter()
                .map(|p| p.contains(ts, now))
                .collect();
            // Once a period contains ts, every wider period must too
            for pair in inside.windows(2) {
                assert!(!pair[0] || pair[1], "{} days ago breaks monotonicity", days_ago);
            }
            assert!(Period::All.contains(ts, now));
        }
    }
}
