use crate::error::{ProcessingError, Result};
use crate::models::FieldValue;
use crate::utils::constants::{
    ARRAY_KEYS, ARRAY_SEPARATOR, KEY_LEN, KEY_LOG_FIRST, KEY_LOG_LAST, KEY_VALUE_SEPARATOR,
    KEY_WIND_AVG, KEY_WIND_DIR, PAIR_SEPARATOR, REQUIRED_SERIES_KEYS,
};
use std::collections::BTreeMap;

/// Result of decoding one telemetry line
#[derive(Debug, Default)]
pub struct ParsedLine {
    /// Scalar `key=value` pairs, array keys removed
    pub fields: BTreeMap<String, FieldValue>,
    /// Integer arrays decoded from array keys
    pub arrays: BTreeMap<String, Vec<i64>>,
    /// Pairs that were skipped, kept for reporting
    pub warnings: Vec<ProcessingError>,
    /// Array keys that were present on the line before decoding
    present_array_keys: Vec<String>,
}

/// Compressed wind log carried by a line: `len` samples logged between
/// `logFirst` and `logLast` seconds after local midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct WindLog {
    pub log_first: i64,
    pub log_last: i64,
    pub len: i64,
    pub speeds: Vec<i64>,
    pub directions: Vec<i64>,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.arrays.is_empty()
    }

    fn has_key(&self, key: &str) -> bool {
        self.fields.contains_key(key) || self.present_array_keys.iter().any(|k| k == key)
    }

    /// Required series keys absent from the line
    pub fn missing_series_keys(&self) -> Vec<String> {
        REQUIRED_SERIES_KEYS
            .iter()
            .filter(|key| !self.has_key(key))
            .map(|key| key.to_string())
            .collect()
    }

    /// Extract the wind log, removing its header keys from the scalar
    /// mapping. Header keys stay in place when the log is incomplete.
    pub fn take_wind_log(&mut self) -> Result<WindLog> {
        let missing = self.missing_series_keys();
        if !missing.is_empty() {
            return Err(ProcessingError::MissingFields { missing });
        }

        let log_first = self.header_value(KEY_LOG_FIRST)?;
        let log_last = self.header_value(KEY_LOG_LAST)?;
        let len = self.header_value(KEY_LEN)?;

        for key in [KEY_LOG_FIRST, KEY_LOG_LAST, KEY_LEN] {
            self.fields.remove(key);
        }

        Ok(WindLog {
            log_first,
            log_last,
            len,
            speeds: self.arrays.get(KEY_WIND_AVG).cloned().unwrap_or_default(),
            directions: self.arrays.get(KEY_WIND_DIR).cloned().unwrap_or_default(),
        })
    }

    fn header_value(&self, key: &str) -> Result<i64> {
        let value = self
            .fields
            .get(key)
            .ok_or_else(|| ProcessingError::MissingFields {
                missing: vec![key.to_string()],
            })?;

        match value {
            FieldValue::Number(n) => Ok(*n as i64),
            FieldValue::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                ProcessingError::InvalidFormat(format!("Invalid {}: '{}'", key, s))
            }),
        }
    }
}

pub struct LineParser {
    array_keys: Vec<String>,
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            array_keys: ARRAY_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn with_array_keys(array_keys: &[&str]) -> Self {
        Self {
            array_keys: array_keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Decode a `;`-separated line of `key=value` pairs.
    ///
    /// Malformed pairs are skipped (and recorded in `warnings`), never
    /// fatal to the rest of the line.
    pub fn parse(&self, line: &str) -> ParsedLine {
        let mut parsed = ParsedLine::default();

        for part in line.split(PAIR_SEPARATOR) {
            if part.trim().is_empty() {
                continue;
            }

            match self.parse_pair(part) {
                Ok((key, value)) => {
                    parsed.fields.insert(key, FieldValue::Text(value));
                }
                Err(e) => {
                    tracing::warn!("Skipping pair in line '{}': {}", line, e);
                    parsed.warnings.push(e);
                }
            }
        }

        for key in &self.array_keys {
            if let Some(value) = parsed.fields.remove(key) {
                parsed.arrays.insert(key.clone(), decode_array(&value));
                parsed.present_array_keys.push(key.clone());
            }
        }

        parsed
    }

    fn parse_pair(&self, part: &str) -> Result<(String, String)> {
        if !part.contains(KEY_VALUE_SEPARATOR) {
            return Err(ProcessingError::MalformedLine {
                part: part.to_string(),
                reason: "missing '='".to_string(),
            });
        }

        let pieces: Vec<&str> = part.split(KEY_VALUE_SEPARATOR).collect();
        if pieces.len() != 2 {
            return Err(ProcessingError::MalformedLine {
                part: part.to_string(),
                reason: format!("expected 2 parts, found {}", pieces.len()),
            });
        }

        Ok((pieces[0].trim().to_string(), pieces[1].trim().to_string()))
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a comma-separated integer array. Tokens that are not an optional
/// sign followed by digits are dropped; a value that is already numeric
/// becomes a one-element array.
pub fn decode_array(value: &FieldValue) -> Vec<i64> {
    match value {
        FieldValue::Number(n) => vec![*n as i64],
        FieldValue::Text(s) => s
            .split(ARRAY_SEPARATOR)
            .filter_map(|token| {
                let token = token.trim();
                let digits = token.strip_prefix(&['-', '+'][..]).unwrap_or(token);
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                token.parse::<i64>().ok()
            })
            .collect(),
    }
}
