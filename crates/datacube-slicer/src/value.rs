//! Values stored on datacube axes and in index tree nodes.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SliceError};

/// Formats tried, in order, when reading a timestamp from text.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
    "%Y%m%d%H%M%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// A single coordinate value on an axis.
///
/// Values have a total order so that value tuples can key sorted
/// containers. Variants order before one another in declaration order;
/// floats compare with [`f64::total_cmp`].
#[derive(Debug, Clone)]
pub enum AxisValue {
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Timedelta(Duration),
    Str(String),
}

impl AxisValue {
    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the stored type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Timestamp(_) => "timestamp",
            Self::Timedelta(_) => "timedelta",
            Self::Str(_) => "str",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::Timestamp(_) => 2,
            Self::Timedelta(_) => 3,
            Self::Str(_) => 4,
        }
    }

    /// Read a value out of JSON/YAML input.
    ///
    /// Integers stay integers, other numbers become floats, and strings stay
    /// strings; typing against an axis happens later in `AxisKind::parse`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(SliceError::invalid_value(format!("unsupported number {n}")))
                }
            }
            serde_json::Value::String(s) => Ok(Self::Str(s.clone())),
            other => Err(SliceError::invalid_value(format!(
                "expected a number or string, got {other}"
            ))),
        }
    }

    /// JSON representation used when encoding trees.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::Timestamp(_) | Self::Str(_) => serde_json::Value::String(self.to_string()),
            Self::Timedelta(d) => serde_json::Value::from(duration_seconds(d)),
        }
    }
}

impl PartialEq for AxisValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AxisValue {}

impl PartialOrd for AxisValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AxisValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Timedelta(a), Self::Timedelta(b)) => a.cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for AxisValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Timestamp(v) => v.hash(state),
            Self::Timedelta(v) => v.hash(state),
            Self::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S")),
            Self::Timedelta(d) => write!(f, "{}s", duration_seconds(d)),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Values are written and read through their JSON form, so request files
/// can use plain numbers and strings in either JSON or YAML.
impl Serialize for AxisValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AxisValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl From<i64> for AxisValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AxisValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for AxisValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AxisValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AxisValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<NaiveDateTime> for AxisValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Duration> for AxisValue {
    fn from(v: Duration) -> Self {
        Self::Timedelta(v)
    }
}

/// Parse a timestamp written in one of the common ISO-like layouts.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(ts) = date.and_hms_opt(0, 0, 0) {
                return Ok(ts);
            }
        }
    }
    Err(SliceError::invalid_value(format!(
        "cannot parse '{text}' as a timestamp"
    )))
}

/// Seconds since the Unix epoch.
pub fn timestamp_seconds(ts: &NaiveDateTime) -> f64 {
    ts.and_utc().timestamp_millis() as f64 / 1000.0
}

pub fn timestamp_from_seconds(seconds: f64) -> Result<NaiveDateTime> {
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| SliceError::invalid_value(format!("timestamp {seconds} out of range")))
}

pub fn duration_seconds(d: &Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

pub fn duration_from_seconds(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order_across_variants() {
        let mut values = vec![
            AxisValue::Str("a".into()),
            AxisValue::Float(2.5),
            AxisValue::Int(3),
            AxisValue::Float(-1.0),
        ];
        values.sort();
        assert_eq!(values[0], AxisValue::Int(3));
        assert_eq!(values[1], AxisValue::Float(-1.0));
        assert_eq!(values[2], AxisValue::Float(2.5));
        assert_eq!(values[3], AxisValue::Str("a".into()));
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2017, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2017-01-01T12:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("20170101T120000").unwrap(), expected);
        assert_eq!(parse_timestamp("2017-01-01 12:00:00").unwrap(), expected);
        assert!(parse_timestamp("not a date").is_err());
    }

    #[test]
    fn test_timestamp_seconds_roundtrip() {
        let ts = parse_timestamp("2000-01-01T06:00:00").unwrap();
        let secs = timestamp_seconds(&ts);
        assert_eq!(timestamp_from_seconds(secs).unwrap(), ts);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            AxisValue::from_json(&serde_json::json!(4)).unwrap(),
            AxisValue::Int(4)
        );
        assert_eq!(
            AxisValue::from_json(&serde_json::json!(0.5)).unwrap(),
            AxisValue::Float(0.5)
        );
        assert!(AxisValue::from_json(&serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let values: Vec<AxisValue> = serde_yaml::from_str("[1, 2.5, od]").unwrap();
        assert_eq!(
            values,
            vec![AxisValue::Int(1), AxisValue::Float(2.5), AxisValue::from("od")]
        );
    }
}
