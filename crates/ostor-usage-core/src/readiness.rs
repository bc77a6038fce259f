//! Readiness filter for usage objects
//!
//! Usage objects are cut periodically and the newest ones may still be
//! written to. The filter parses the UTC timestamp embedded in every object
//! name, takes the newest one as the reference point, and keeps only objects
//! strictly older than `newest - period`. Everything inside that trailing
//! guard window is left for a later run.
//!
//! Names without a parsable `YYYY-MM-DDTHH:MM:SS[.fff]Z` timestamp are skipped.
//! A name listed more than once is selected at most once, so no object is
//! ever fed into an aggregate twice.
//!
//! # Examples
//!
//! ```
//! use ostor_usage_core::readiness::ReadinessFilter;
//! use ostor_usage_core::types::ObjectName;
//!
//! let names = vec![
//!     ObjectName::new("usage-2024-01-01T00:00:00Z"),
//!     ObjectName::new("usage-2024-01-01T00:30:00Z"),
//!     ObjectName::new("usage-2024-01-01T02:00:00Z"),
//! ];
//!
//! let selection = ReadinessFilter::new(3600).select(&names);
//! assert_eq!(selection.ready.len(), 2);
//! ```

use crate::types::ObjectName;
use std::collections::HashSet;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{3})?Z")
        .expect("timestamp pattern is valid")
});

/// Extract the UTC timestamp embedded in a usage object name
///
/// The first `YYYY-MM-DDTHH:MM:SS[.fff]Z` substring is used. Returns `None`
/// when there is no such substring or it does not form a valid date.
///
/// # Examples
/// ```
/// use ostor_usage_core::readiness::parse_object_timestamp;
///
/// let ts = parse_object_timestamp("usage-2024-03-05T10:20:30.250Z-node1").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2024-03-05T10:20:30.250+00:00");
/// assert!(parse_object_timestamp("usage-latest").is_none());
/// ```
pub fn parse_object_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let found = TIMESTAMP_PATTERN.find(name)?.as_str();
    let format = if found.contains('.') {
        "%Y-%m-%dT%H:%M:%S%.3fZ"
    } else {
        "%Y-%m-%dT%H:%M:%SZ"
    };

    match NaiveDateTime::parse_from_str(found, format) {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            warn!("Failed to parse timestamp '{}' from object '{}': {}", found, name, e);
            None
        }
    }
}

/// Result of a readiness selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadySelection {
    /// Objects old enough to process, newest first
    pub ready: Vec<ObjectName>,
    /// Newest timestamp seen, if any name had one
    pub latest: Option<DateTime<Utc>>,
    /// Exclusive upper bound for ready timestamps
    pub cutoff: Option<DateTime<Utc>>,
    /// Names without a parsable timestamp
    pub skipped_no_timestamp: usize,
    /// Names inside the guard window
    pub skipped_fresh: usize,
    /// Repeated listings of a name already seen
    pub skipped_duplicate: usize,
}

impl ReadySelection {
    /// Whether no object is ready
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }
}

/// Selects usage objects that are older than the guard window
#[derive(Debug, Clone, Copy)]
pub struct ReadinessFilter {
    period_secs: u64,
    period: TimeDelta,
}

impl ReadinessFilter {
    /// Create a filter with a guard window of `period_secs` seconds
    pub fn new(period_secs: u64) -> Self {
        let period = i64::try_from(period_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            period_secs,
            period,
        }
    }

    /// Guard window length in seconds
    pub fn period_secs(&self) -> u64 {
        self.period_secs
    }

    /// Select the ready subset of `names`
    ///
    /// A name is ready when its timestamp is strictly less than
    /// `max(timestamps) - period`. With a period of zero only the objects at
    /// the newest timestamp are held back.
    pub fn select(&self, names: &[ObjectName]) -> ReadySelection {
        if names.is_empty() {
            return ReadySelection::default();
        }

        let mut parsed: Vec<(&ObjectName, DateTime<Utc>)> = Vec::with_capacity(names.len());
        let mut skipped_no_timestamp = 0;
        let mut skipped_duplicate = 0;
        let mut seen = HashSet::with_capacity(names.len());

        for name in names {
            if !seen.insert(name) {
                debug!("Skip '{}' (listed more than once)", name);
                skipped_duplicate += 1;
                continue;
            }
            match parse_object_timestamp(name.as_str()) {
                Some(ts) => parsed.push((name, ts)),
                None => {
                    debug!("Skip '{}' (no parsable timestamp)", name);
                    skipped_no_timestamp += 1;
                }
            }
        }

        let Some(latest) = parsed.iter().map(|(_, ts)| *ts).max() else {
            warn!("No parsable timestamps, skip all {} objects", names.len());
            return ReadySelection {
                skipped_no_timestamp,
                skipped_duplicate,
                ..ReadySelection::default()
            };
        };

        let cutoff = latest.checked_sub_signed(self.period);
        match cutoff {
            Some(cutoff) => info!(
                "Cutoff timestamp (UTC): {} (latest={}, period={}s)",
                cutoff.to_rfc3339(),
                latest.to_rfc3339(),
                self.period_secs
            ),
            None => warn!(
                "Period of {}s reaches before the earliest representable time, nothing is ready",
                self.period_secs
            ),
        }

        parsed.sort_by(|a, b| b.1.cmp(&a.1));

        let mut ready = Vec::new();
        let mut skipped_fresh = 0;
        for (name, ts) in parsed {
            match cutoff {
                Some(cutoff) if ts < cutoff => {
                    debug!("Include '{}' (ts={} < cutoff={})", name, ts, cutoff);
                    ready.push(name.clone());
                }
                _ => {
                    debug!("Skip '{}' (ts={} inside guard window)", name, ts);
                    skipped_fresh += 1;
                }
            }
        }

        info!(
            "Ready objects: {} of {} total (skipped {} no-ts, {} fresh, {} duplicate)",
            ready.len(),
            names.len(),
            skipped_no_timestamp,
            skipped_fresh,
            skipped_duplicate
        );

        ReadySelection {
            ready,
            latest: Some(latest),
            cutoff,
            skipped_no_timestamp,
            skipped_fresh,
            skipped_duplicate,
        }
    }
}

impl Default for ReadinessFilter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_USAGE_PERIOD_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::names;
    use chrono::TimeZone;

    #[test]
    fn test_parse_whole_seconds_and_millis() {
        let ts = parse_object_timestamp("usage-2024-01-01T01:02:03Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 1, 2, 3).unwrap());

        let ts = parse_object_timestamp("usage-2024-01-01T01:02:03.500Z").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse_object_timestamp("usage-no-time").is_none());
        assert!(parse_object_timestamp("usage-2024-13-45T01:02:03Z").is_none());
        // Six fractional digits are not part of the accepted format
        assert!(parse_object_timestamp("usage-2024-01-01T01:02:03.123456Z").is_none());
        assert!(parse_object_timestamp("usage-2024-01-01T01:02:03").is_none());
    }

    #[test]
    fn test_parse_uses_first_match() {
        let ts = parse_object_timestamp("a-2024-01-01T00:00:00Z-b-2025-01-01T00:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_select_strictly_before_cutoff() {
        let input = names(&[
            "usage-2024-01-01T00:00:00Z",
            "usage-2024-01-01T00:59:59Z",
            "usage-2024-01-01T01:00:00Z",
            "usage-2024-01-01T01:30:00Z",
            "usage-2024-01-01T02:00:00Z",
        ]);

        let selection = ReadinessFilter::new(3600).select(&input);

        assert_eq!(
            selection.ready,
            names(&["usage-2024-01-01T00:59:59Z", "usage-2024-01-01T00:00:00Z"])
        );
        assert_eq!(selection.skipped_fresh, 3);
        assert_eq!(
            selection.cutoff,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_select_two_objects_one_period_apart_is_empty() {
        let input = names(&["usage-2024-01-01T00:00:00Z", "usage-2024-01-01T01:00:00Z"]);
        let selection = ReadinessFilter::new(3600).select(&input);
        assert!(selection.is_empty());
        assert_eq!(selection.skipped_fresh, 2);
    }

    #[test]
    fn test_zero_period_holds_back_only_latest() {
        let input = names(&["usage-2024-01-01T00:00:00Z", "usage-2024-01-01T01:00:00Z"]);
        let selection = ReadinessFilter::new(0).select(&input);
        assert_eq!(selection.ready, names(&["usage-2024-01-01T00:00:00Z"]));

        let single = names(&["usage-2024-01-01T00:00:00Z"]);
        assert!(ReadinessFilter::new(0).select(&single).is_empty());
    }

    #[test]
    fn test_repeated_name_is_selected_once() {
        let input = names(&[
            "n/usage-2024-01-01T00:00:00Z",
            "n/usage-2024-01-01T03:00:00Z",
            "n/usage-2024-01-01T00:00:00Z",
            "garbage",
            "garbage",
        ]);
        let selection = ReadinessFilter::new(3600).select(&input);

        assert_eq!(selection.ready, names(&["n/usage-2024-01-01T00:00:00Z"]));
        assert_eq!(selection.skipped_duplicate, 2);
        assert_eq!(selection.skipped_no_timestamp, 1);
        assert_eq!(selection.skipped_fresh, 1);
    }

    #[test]
    fn test_counts_names_without_timestamp() {
        let input = names(&["garbage", "usage-2024-01-01T00:00:00Z", "usage-2024-01-01T03:00:00Z"]);
        let selection = ReadinessFilter::new(3600).select(&input);
        assert_eq!(selection.skipped_no_timestamp, 1);
        assert_eq!(selection.ready, names(&["usage-2024-01-01T00:00:00Z"]));
    }

    #[test]
    fn test_no_parsable_timestamps() {
        let input = names(&["a", "b"]);
        let selection = ReadinessFilter::new(3600).select(&input);
        assert!(selection.is_empty());
        assert_eq!(selection.latest, None);
        assert_eq!(selection.skipped_no_timestamp, 2);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(ReadinessFilter::new(3600).select(&[]), ReadySelection::default());
    }

    #[test]
    fn test_huge_period_selects_nothing() {
        let input = names(&["usage-2024-01-01T00:00:00Z", "usage-2024-06-01T00:00:00Z"]);
        let selection = ReadinessFilter::new(u64::MAX).select(&input);
        assert!(selection.is_empty());
        assert_eq!(selection.cutoff, None);
    }
}
