// src/cleaning.rs
//
// Normalization helpers for the raw appraisal dataset: unit-laden numbers,
// inconsistent date formats and addresses.

use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

/// Fallback formats, tried in order after a field's preferred format.
pub const DATE_FORMATS: &[&str] = &[
    "%b/%d/%Y", // May/05/2025
    "%B/%d/%Y", // September/05/2025
    "%Y-%m-%d", // 2025-05-05
    "%m/%d/%Y", // 05/05/2025
    "%d-%b-%y", // 05-May-25
];

pub const SUBJECT_DATE_FORMAT: &str = "%b/%d/%Y";
pub const CANDIDATE_DATE_FORMAT: &str = "%Y-%m-%d";
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Keys an appraisal may use for its candidate list, in lookup order.
const CANDIDATE_KEYS: &[&str] = &["properties", "candidates"];

const MISSING_MARKERS: &[&str] = &["", "n/a", "N/A"];

fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Converts a JSON value to a finite float.
///
/// Numbers pass through unchanged. Strings keep only ASCII digits and `.`
/// before parsing, so `"2,050 sqft"` becomes `2050.0`. Anything that cannot be
/// parsed, including null and other JSON types, is `0.0`.
pub fn clean_numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => clean_numeric_str(s),
        _ => 0.0,
    }
}

pub fn clean_numeric_str(raw: &str) -> f64 {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if digits.is_empty() {
        return 0.0;
    }

    match digits.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Parses a date trying `preferred` first, then every fallback format.
/// Whitespace anywhere in the input is ignored.
pub fn parse_date(raw: &str, preferred: &str) -> Option<NaiveDate> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if is_missing_marker(&compact) {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&compact, preferred) {
        return Some(date);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&compact, fmt).ok())
}

/// Normalizes a date value to ISO `YYYY-MM-DD`, or `None` when unparseable.
pub fn clean_date(value: &Value) -> Option<String> {
    let raw = value.as_str()?;
    parse_date(raw, ISO_DATE_FORMAT).map(|d| d.format(ISO_DATE_FORMAT).to_string())
}

pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_lowercase()
}

//------------------------------------------------------------------------------
// DATASET CLEANING
//------------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CleaningStats {
    pub appraisals: usize,
    pub candidates: usize,
    pub comps: usize,
    pub unparsed_dates: usize,
}

fn get_or_null<'a>(record: &'a Map<String, Value>, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&Value::Null)
}

fn set_numeric(record: &mut Map<String, Value>, target: &str, source: &str) {
    let cleaned = clean_numeric(get_or_null(record, source));
    record.insert(target.to_string(), Value::from(cleaned));
}

fn set_date(record: &mut Map<String, Value>, key: &str, stats: &mut CleaningStats) {
    let original = get_or_null(record, key).clone();
    let cleaned = clean_date(&original);
    if cleaned.is_none() && !original.is_null() {
        debug!("Unparseable date in field '{}': {}", key, original);
        stats.unparsed_dates += 1;
    }
    record.insert(
        key.to_string(),
        cleaned.map(Value::String).unwrap_or(Value::Null),
    );
}

fn set_coordinate(record: &mut Map<String, Value>, key: &str) {
    let Some(value) = record.get(key) else {
        return;
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let cleaned = parsed
        .filter(|v| v.is_finite())
        .map(Value::from)
        .unwrap_or(Value::Null);
    record.insert(key.to_string(), cleaned);
}

fn clean_subject(subject: &mut Map<String, Value>, stats: &mut CleaningStats) {
    set_numeric(subject, "gla", "gla");
    let lot_source = if subject.contains_key("lot_size_sf") {
        "lot_size_sf"
    } else {
        "lot_size"
    };
    set_numeric(subject, "lot_size", lot_source);
    let year_built = clean_numeric(get_or_null(subject, "year_built")) as i64;
    subject.insert("year_built".to_string(), Value::from(year_built));
    set_date(subject, "sale_date", stats);
}

fn clean_candidate(candidate: &mut Map<String, Value>, stats: &mut CleaningStats) {
    set_numeric(candidate, "gla", "gla");
    set_numeric(candidate, "lot_size_sf", "lot_size_sf");
    set_numeric(candidate, "close_price", "close_price");
    set_date(candidate, "close_date", stats);
    set_coordinate(candidate, "latitude");
    set_coordinate(candidate, "longitude");
}

fn clean_comp(comp: &mut Map<String, Value>, stats: &mut CleaningStats) {
    set_numeric(comp, "gla", "gla");
    set_numeric(comp, "lot_size", "lot_size");
    set_numeric(comp, "sale_price", "sale_price");
    set_date(comp, "sale_date", stats);
}

/// Cleans a raw `{"appraisals": [...]}` document in place.
///
/// Entries that are not JSON objects are left untouched.
pub fn clean_dataset(data: &mut Value) -> CleaningStats {
    let mut stats = CleaningStats::default();

    let Some(appraisals) = data.get_mut("appraisals").and_then(Value::as_array_mut) else {
        return stats;
    };

    for appraisal in appraisals.iter_mut().filter_map(Value::as_object_mut) {
        stats.appraisals += 1;

        if let Some(subject) = appraisal.get_mut("subject").and_then(Value::as_object_mut) {
            clean_subject(subject, &mut stats);
        }

        let candidate_key = CANDIDATE_KEYS
            .iter()
            .copied()
            .find(|key| appraisal.get(*key).is_some_and(Value::is_array));
        if let Some(candidates) = candidate_key
            .and_then(|key| appraisal.get_mut(key))
            .and_then(Value::as_array_mut)
        {
            for candidate in candidates.iter_mut().filter_map(Value::as_object_mut) {
                clean_candidate(candidate, &mut stats);
                stats.candidates += 1;
            }
        }

        if let Some(comps) = appraisal.get_mut("comps").and_then(Value::as_array_mut) {
            for comp in comps.iter_mut().filter_map(Value::as_object_mut) {
                clean_comp(comp, &mut stats);
                stats.comps += 1;
            }
        }
    }

    stats
}
