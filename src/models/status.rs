use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

use crate::models::{ErrorCodeTable, ErrorCount};

/// Scalar value of a status field that has no typed slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

const NUMERIC_FIELDS: &[&str] = &[
    "temp",
    "hum",
    "vbatIde",
    "vbatGprs",
    "vsol",
    "dur",
    "signal",
    "regDur",
    "gprsRegDur",
];

const TEXT_FIELDS: &[&str] = &["ver", "imsi", "errors"];

/// One parsed status submission from a station.
///
/// Known fields are typed; anything else the firmware sends lands in
/// `extra` so newer firmware keys survive a round trip through the store.
/// `extra` is kept as its own map so a firmware key can never shadow a
/// typed field when the record is read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StatusRecord {
    pub timestamp: DateTime<FixedOffset>,

    #[validate(length(min = 1))]
    pub station_id: String,

    #[serde(rename = "ver", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imsi: Option<String>,

    // Air temperature (°C) and relative humidity (%)
    #[serde(rename = "temp", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(rename = "hum", default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,

    // Battery voltage measured idle and during GPRS transmission (V)
    #[serde(rename = "vbatIde", default, skip_serializing_if = "Option::is_none")]
    pub vbat_idle: Option<f64>,

    #[serde(rename = "vbatGprs", default, skip_serializing_if = "Option::is_none")]
    pub vbat_gprs: Option<f64>,

    #[serde(rename = "vsol", default, skip_serializing_if = "Option::is_none")]
    pub solar_voltage: Option<f64>,

    // Modem timings (s) and signal quality
    #[serde(rename = "dur", default, skip_serializing_if = "Option::is_none")]
    pub send_duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<f64>,

    #[serde(rename = "regDur", default, skip_serializing_if = "Option::is_none")]
    pub reg_duration: Option<f64>,

    #[serde(rename = "gprsRegDur", default, skip_serializing_if = "Option::is_none")]
    pub gprs_reg_duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_counts: Vec<ErrorCount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vbat_rate: Option<f64>,

    /// Unknown keys, plus known numeric keys whose value did not parse
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
}

impl StatusRecord {
    pub fn new(station_id: &str, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            timestamp,
            station_id: station_id.to_string(),
            version: None,
            imsi: None,
            temperature: None,
            humidity: None,
            vbat_idle: None,
            vbat_gprs: None,
            solar_voltage: None,
            send_duration: None,
            signal: None,
            reg_duration: None,
            gprs_reg_duration: None,
            errors: None,
            error_counts: Vec::new(),
            vbat_rate: None,
            extra: BTreeMap::new(),
        }
    }

    /// Build a record from the scalar mapping produced by the line parser
    pub fn from_fields<I>(station_id: &str, timestamp: DateTime<FixedOffset>, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let mut record = Self::new(station_id, timestamp);
        for (key, value) in fields {
            record.set_field(&key, value);
        }

        record.error_counts = match record.errors.as_deref() {
            Some(errors) if !errors.trim().is_empty() => {
                ErrorCodeTable::for_version(record.version.as_deref()).parse(errors)
            }
            _ => Vec::new(),
        };

        record
    }

    pub fn set_field(&mut self, key: &str, value: FieldValue) {
        if NUMERIC_FIELDS.contains(&key) {
            match value.as_f64() {
                Some(v) => {
                    if let Some(slot) = self.numeric_slot(key) {
                        // Stations report "nan" for a failed sensor read
                        *slot = v.is_finite().then_some(v);
                    }
                }
                None => {
                    tracing::debug!("Keeping non-numeric '{}={}' as extra field", key, value);
                    self.extra.insert(key.to_string(), value);
                }
            }
            return;
        }

        if TEXT_FIELDS.contains(&key) {
            let text = Some(value.to_string());
            match key {
                "ver" => self.version = text,
                "imsi" => self.imsi = text,
                _ => self.errors = text,
            }
            return;
        }

        self.extra.insert(key.to_string(), value);
    }

    fn numeric_slot(&mut self, key: &str) -> Option<&mut Option<f64>> {
        match key {
            "temp" => Some(&mut self.temperature),
            "hum" => Some(&mut self.humidity),
            "vbatIde" => Some(&mut self.vbat_idle),
            "vbatGprs" => Some(&mut self.vbat_gprs),
            "vsol" => Some(&mut self.solar_voltage),
            "dur" => Some(&mut self.send_duration),
            "signal" => Some(&mut self.signal),
            "regDur" => Some(&mut self.reg_duration),
            "gprsRegDur" => Some(&mut self.gprs_reg_duration),
            _ => None,
        }
    }

    /// Look a field up by its wire name
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        let number = |v: Option<f64>| v.map(FieldValue::Number);
        let text = |v: &Option<String>| v.as_ref().map(|s| FieldValue::Text(s.clone()));

        let typed = match key {
            "temp" => number(self.temperature),
            "hum" => number(self.humidity),
            "vbatIde" => number(self.vbat_idle),
            "vbatGprs" => number(self.vbat_gprs),
            "vsol" => number(self.solar_voltage),
            "dur" => number(self.send_duration),
            "signal" => number(self.signal),
            "regDur" => number(self.reg_duration),
            "gprsRegDur" => number(self.gprs_reg_duration),
            "vbat_rate" => number(self.vbat_rate),
            "ver" => text(&self.version),
            "imsi" => text(&self.imsi),
            "errors" => text(&self.errors),
            _ => None,
        };
        typed.or_else(|| self.extra.get(key).cloned())
    }

    pub fn numeric_field(&self, key: &str) -> Option<f64> {
        self.field(key)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite())
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}
