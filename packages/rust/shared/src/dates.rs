//! Sale-date normalisation.
//!
//! Auction APIs report closing times in assorted ISO-8601 flavours. Everything
//! stored in a dataset is reduced to a UTC calendar date (`YYYY-MM-DD`).

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::types::Listing;

/// Output format for canonical dates.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp layouts carrying an explicit UTC offset. The `%#z` forms accept
/// hour-only offsets such as `+02`.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

/// Timestamp layouts without an offset; these are taken to be UTC already.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Normalise an ISO-8601-ish timestamp to a `YYYY-MM-DD` UTC date.
///
/// A trailing `Z` means UTC. Offsets are converted to UTC before the date is
/// taken, so `2024-03-01T01:30:00+02:00` becomes `2024-02-29`. When nothing
/// parses, the text before the first `T` is used if it is itself a valid date.
/// Never fails: unrecoverable input yields `None`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = match trimmed.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => trimmed.to_string(),
    };

    parse_utc_date(&candidate)
        .or_else(|| date_prefix(trimmed))
        .map(|date| date.format(DATE_FORMAT).to_string())
}

/// Pick the closing date of a listing.
///
/// Candidates in priority order: `extended_end_time`,
/// `auction.effective_end_time`, `last_updated`. The first present,
/// non-empty candidate wins and is normalised; a winner that is not a string
/// yields `None` without consulting the later fields.
pub fn pick_sold_date(listing: &Listing) -> Option<String> {
    let chosen = listing
        .truthy("extended_end_time")
        .or_else(|| listing.auction_field("effective_end_time"))
        .or_else(|| listing.truthy("last_updated"))?;

    chosen.as_str().and_then(normalize_date)
}

fn parse_utc_date(s: &str) -> Option<NaiveDate> {
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.naive_utc().date());
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Best-effort fallback: the portion before the first `T`, if well-formed.
fn date_prefix(s: &str) -> Option<NaiveDate> {
    let head = s.split_once('T').map_or(s, |(head, _)| head);
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}
