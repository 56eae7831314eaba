//! FHIR `date` / `dateTime` helpers

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// A parsed FHIR temporal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Temporal {
    /// Parse `YYYY-MM-DD` or a full dateTime.
    ///
    /// A dateTime without an offset is read as UTC.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.contains('T') {
            return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(Temporal::Date);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Temporal::DateTime(dt));
        }

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Temporal::DateTime(naive.and_utc().fixed_offset()))
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Temporal::Date(d) => *d,
            Temporal::DateTime(dt) => dt.date_naive(),
        }
    }

    pub fn is_date_only(&self) -> bool {
        matches!(self, Temporal::Date(_))
    }

    pub fn to_fhir_string(&self) -> String {
        match self {
            Temporal::Date(d) => d.format("%Y-%m-%d").to_string(),
            Temporal::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

/// Whether the time part of a dateTime string carries `Z` or a numeric offset.
pub fn has_timezone(raw: &str) -> bool {
    match raw.split_once('T') {
        Some((_, time)) => time.ends_with('Z') || time.contains('+') || time.contains('-'),
        None => false,
    }
}

/// Append `Z` to a dateTime that lacks a timezone marker. Dates are left alone.
pub fn with_utc_marker(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('T') && !has_timezone(trimmed) {
        format!("{trimmed}Z")
    } else {
        trimmed.to_string()
    }
}

pub fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
