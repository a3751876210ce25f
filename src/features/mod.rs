// src/features/mod.rs
//
// Pairwise subject/candidate feature construction. Pure functions only; the
// model and web layers sit on top of this.

pub mod geo;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cleaning::{parse_date, CANDIDATE_DATE_FORMAT, SUBJECT_DATE_FORMAT};
use crate::config::{DAYS_PER_MONTH, DEFAULT_LOOKBACK_MONTHS, NUM_FEATURES};
use crate::models::{
    PropertyRecord, CANDIDATE_DATE_FIELDS, CANDIDATE_LOT_FIELDS, GLA_FIELDS, SUBJECT_DATE_FIELDS,
    SUBJECT_LOT_FIELDS,
};

pub use geo::geodesic_distance_miles;

/// Fixed-width numeric row fed to the scaler and classifier.
pub type FeatureRow = [f64; NUM_FEATURES];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("candidate is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unparseable date in {field}: {value}")]
    InvalidDate { field: &'static str, value: String },
}

/// Raw (unscaled) comparison of one candidate against the subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub gla_diff: f64,
    pub lot_diff: f64,
    pub month_diff: f64,
    pub distance: f64,
}

impl FeatureVector {
    /// Order matches `config::FEATURE_NAMES`.
    pub fn to_row(&self) -> FeatureRow {
        [self.gla_diff, self.lot_diff, self.month_diff, self.distance]
    }
}

/// Parses the first present date field. `Ok(None)` when the record has none.
fn optional_date(
    record: &PropertyRecord,
    fields: &[&str],
    preferred_format: &str,
    label: &'static str,
) -> Result<Option<NaiveDate>, FeatureError> {
    let Some(value) = record.field(fields) else {
        return Ok(None);
    };
    let raw = match value {
        Value::String(s) => s.as_str(),
        other => {
            return Err(FeatureError::InvalidDate {
                field: label,
                value: other.to_string(),
            });
        }
    };
    parse_date(raw, preferred_format)
        .map(Some)
        .ok_or_else(|| FeatureError::InvalidDate {
            field: label,
            value: raw.to_string(),
        })
}

fn required_coordinates(
    record: &PropertyRecord,
    label: &'static str,
) -> Result<(f64, f64), FeatureError> {
    match (record.latitude(), record.longitude()) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(FeatureError::MissingField(label)),
    }
}

/// Builds the feature vector for one subject/candidate pair.
///
/// Numeric fields degrade to 0.0 when missing or malformed. When either sale
/// date is absent, `month_diff` is `DEFAULT_LOOKBACK_MONTHS`. A date that is
/// present but unparseable, or missing coordinates, rejects the candidate.
pub fn build_features(
    subject: &PropertyRecord,
    candidate: &PropertyRecord,
) -> Result<FeatureVector, FeatureError> {
    let gla_diff = (subject.numeric(GLA_FIELDS) - candidate.numeric(GLA_FIELDS)).abs();
    let lot_diff =
        (subject.numeric(SUBJECT_LOT_FIELDS) - candidate.numeric(CANDIDATE_LOT_FIELDS)).abs();

    let effective_date = optional_date(
        subject,
        SUBJECT_DATE_FIELDS,
        SUBJECT_DATE_FORMAT,
        "subject effective_date",
    )?;
    let close_date = optional_date(
        candidate,
        CANDIDATE_DATE_FIELDS,
        CANDIDATE_DATE_FORMAT,
        "candidate close_date",
    )?;
    let month_diff = match (effective_date, close_date) {
        (Some(effective), Some(close)) => {
            ((effective - close).num_days().abs() / DAYS_PER_MONTH) as f64
        }
        _ => DEFAULT_LOOKBACK_MONTHS,
    };

    let (subject_lat, subject_lon) = required_coordinates(subject, "subject coordinates")?;
    let (candidate_lat, candidate_lon) =
        required_coordinates(candidate, "candidate coordinates")?;
    let distance =
        geodesic_distance_miles(subject_lat, subject_lon, candidate_lat, candidate_lon);

    Ok(FeatureVector {
        gla_diff,
        lot_diff,
        month_diff,
        distance,
    })
}

/// Candidates that produced features, keyed by their position in the input.
#[derive(Debug, Default)]
pub struct CandidateFeatures {
    pub accepted: Vec<(usize, FeatureVector)>,
    pub rejected: Vec<(usize, FeatureError)>,
}

/// Builds features for every candidate, setting aside the ones that fail.
pub fn extract_candidate_features(
    subject: &PropertyRecord,
    candidates: &[Value],
) -> CandidateFeatures {
    let mut out = CandidateFeatures::default();

    for (index, raw) in candidates.iter().enumerate() {
        let result = PropertyRecord::from_value(raw)
            .ok_or(FeatureError::NotAnObject)
            .and_then(|candidate| build_features(subject, &candidate));

        match result {
            Ok(features) => out.accepted.push((index, features)),
            Err(e) => out.rejected.push((index, e)),
        }
    }

    out
}
