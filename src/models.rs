// src/models.rs

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

use crate::cleaning::{clean_numeric, normalize_address};

//------------------------------------------------------------------------------
// FIELD SPELLINGS
//------------------------------------------------------------------------------
// Subject and candidate records name the same fields differently depending on
// the dataset revision, so every accessor takes a list of accepted spellings.

pub const GLA_FIELDS: &[&str] = &["gla"];
pub const SUBJECT_LOT_FIELDS: &[&str] = &["lot_size", "lot_size_sf"];
pub const CANDIDATE_LOT_FIELDS: &[&str] = &["lot_size_sf", "lot_size"];
pub const LATITUDE_FIELDS: &[&str] = &["latitude", "lat"];
pub const LONGITUDE_FIELDS: &[&str] = &["longitude", "lon", "lng"];
pub const SUBJECT_DATE_FIELDS: &[&str] = &["effective_date", "sale_date"];
pub const CANDIDATE_DATE_FIELDS: &[&str] = &["close_date", "sale_date"];
pub const ADDRESS_FIELDS: &[&str] = &["address"];

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------

/// Appraisal order identifier. Datasets carry it as either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AppraisalId(pub String);

impl<'de> Deserialize<'de> for AppraisalId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw {
            Value::String(s) => AppraisalId(s),
            Value::Null => AppraisalId(String::new()),
            other => AppraisalId(other.to_string()),
        })
    }
}

impl fmt::Display for AppraisalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------------------------------------------------------------------------
// PROPERTY RECORDS
//------------------------------------------------------------------------------

/// A subject, candidate or comp property as it appears in the dataset.
///
/// Records are free-form JSON objects; the typed accessors below are the only
/// place field-name inconsistencies are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyRecord(pub Map<String, Value>);

impl PropertyRecord {
    /// Returns `None` when the value is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|map| PropertyRecord(map.clone()))
    }

    /// First field among `names` that is present and not null.
    pub fn field(&self, names: &[&str]) -> Option<&Value> {
        names
            .iter()
            .filter_map(|name| self.0.get(*name))
            .find(|value| !value.is_null())
    }

    /// Numeric field cleaned of units and separators; 0.0 when missing.
    pub fn numeric(&self, names: &[&str]) -> f64 {
        self.field(names).map(clean_numeric).unwrap_or(0.0)
    }

    /// Field rendered as text. Numbers are formatted, other types are ignored.
    pub fn text(&self, names: &[&str]) -> Option<String> {
        match self.field(names)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Signed decimal-degree coordinate. Unlike `numeric`, the sign is kept.
    pub fn coordinate(&self, names: &[&str]) -> Option<f64> {
        let parsed = match self.field(names)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        parsed.is_finite().then_some(parsed)
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinate(LATITUDE_FIELDS)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinate(LONGITUDE_FIELDS)
    }

    /// Trimmed, lowercased address used for comp matching.
    pub fn normalized_address(&self) -> Option<String> {
        self.text(ADDRESS_FIELDS).map(|a| normalize_address(&a))
    }
}

//------------------------------------------------------------------------------
// APPRAISALS
//------------------------------------------------------------------------------

/// One appraisal: a subject, the candidate pool and the appraiser's chosen comps.
///
/// Candidates and comps stay raw JSON so a single malformed entry cannot make
/// the whole dataset unreadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appraisal {
    #[serde(rename = "orderID")]
    pub order_id: AppraisalId,
    pub subject: PropertyRecord,
    #[serde(rename = "properties", alias = "candidates", default)]
    pub candidates: Vec<Value>,
    #[serde(default)]
    pub comps: Vec<Value>,
}

impl Appraisal {
    /// Normalized addresses of the appraiser-selected comps.
    pub fn comp_addresses(&self) -> Vec<String> {
        self.comps
            .iter()
            .filter_map(PropertyRecord::from_value)
            .filter_map(|comp| comp.normalized_address())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub appraisals: Vec<Appraisal>,
}

impl Dataset {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse appraisal dataset")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        let dataset = Self::from_json_str(&raw)
            .with_context(|| format!("Invalid dataset in {}", path.display()))?;
        info!(
            "Loaded {} appraisals from {}",
            dataset.appraisals.len(),
            path.display()
        );
        Ok(dataset)
    }
}
