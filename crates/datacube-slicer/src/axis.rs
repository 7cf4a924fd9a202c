//! Datacube axes and their transformation pipelines.
//!
//! An [`Axis`] is one logical dimension. Index discovery on an axis runs in
//! two stages, both driven by the attached transformations in attachment
//! order:
//!
//! 1. `find_indexes` turns the backend's natural values into the values the
//!    request is expressed in (type changes, merged timestamps, grid lines).
//! 2. `find_indices_between` selects the values falling inside a float
//!    interval. Each transformation wraps the search of the ones attached
//!    after it, which lets a cyclic axis split one request into several
//!    canonical sub-intervals.

use serde::{Deserialize, Serialize};

use crate::datacube::Datacube;
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::transform::{AxisTransformation, CyclicTransform, Transformation};
use crate::value::{
    duration_from_seconds, duration_seconds, parse_timestamp, timestamp_from_seconds,
    timestamp_seconds, AxisValue,
};

/// Default comparison tolerance for ordered axes.
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

/// How a polytope wants discrete values matched on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Only values inside the interval.
    #[default]
    Strict,
    /// Values inside the interval plus one neighbour on each side.
    Nearest,
    /// Same window as `Nearest`, kept separate for callers interpolating
    /// between the surrounding points.
    Surrounding,
}

impl SearchMethod {
    pub fn pads(&self) -> bool {
        !matches!(self, Self::Strict)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Nearest => "nearest",
            Self::Surrounding => "surrounding",
        }
    }
}

/// Comparable representation of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Int,
    Float,
    Timestamp,
    Timedelta,
    Unsliceable,
}

impl AxisKind {
    /// Infer the kind from the first declared value of an axis.
    pub fn infer(values: &[AxisValue]) -> Self {
        match values.first() {
            Some(AxisValue::Int(_)) => Self::Int,
            Some(AxisValue::Float(_)) | None => Self::Float,
            Some(AxisValue::Timestamp(_)) => Self::Timestamp,
            Some(AxisValue::Timedelta(_)) => Self::Timedelta,
            Some(AxisValue::Str(_)) => Self::Unsliceable,
        }
    }

    pub fn default_tolerance(&self) -> f64 {
        match self {
            Self::Unsliceable => 0.0,
            _ => DEFAULT_TOLERANCE,
        }
    }

    /// Whether values on this axis may be rounded and compared within tolerance.
    pub fn can_round(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Convert a user-supplied value to this axis' representation.
    pub fn parse(&self, value: &AxisValue) -> Result<AxisValue> {
        match (self, value) {
            (Self::Int | Self::Float, AxisValue::Int(_) | AxisValue::Float(_)) => Ok(value.clone()),
            (Self::Int | Self::Float, AxisValue::Str(s)) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    Ok(AxisValue::Int(i))
                } else {
                    s.trim()
                        .parse::<f64>()
                        .map(AxisValue::Float)
                        .map_err(|_| SliceError::invalid_value(format!("'{s}' is not numeric")))
                }
            }
            (Self::Timestamp, AxisValue::Timestamp(_)) => Ok(value.clone()),
            (Self::Timestamp, AxisValue::Str(s)) => parse_timestamp(s).map(AxisValue::Timestamp),
            (Self::Timedelta, AxisValue::Timedelta(_)) => Ok(value.clone()),
            (Self::Timedelta, AxisValue::Str(s)) => parse_duration(s).map(AxisValue::Timedelta),
            (Self::Timedelta, AxisValue::Int(_) | AxisValue::Float(_)) => {
                let seconds = value.as_f64().unwrap_or_default();
                Ok(AxisValue::Timedelta(duration_from_seconds(seconds)))
            }
            (Self::Unsliceable, AxisValue::Str(_)) => Ok(value.clone()),
            (Self::Unsliceable, other) => Ok(AxisValue::Str(other.to_string())),
            (kind, other) => Err(SliceError::invalid_value(format!(
                "cannot use {} value {other} on a {kind:?} axis",
                other.type_name()
            ))),
        }
    }

    pub fn to_float(&self, value: &AxisValue) -> Result<f64> {
        match value {
            AxisValue::Int(v) => Ok(*v as f64),
            AxisValue::Float(v) => Ok(*v),
            AxisValue::Timestamp(ts) => Ok(timestamp_seconds(ts)),
            AxisValue::Timedelta(d) => Ok(duration_seconds(d)),
            AxisValue::Str(s) => match self {
                Self::Unsliceable => Err(SliceError::invalid_value(format!(
                    "'{s}' has no float representation"
                ))),
                _ => self.parse(value).and_then(|v| self.to_float(&v)),
            },
        }
    }

    pub fn from_float(&self, value: f64) -> Result<AxisValue> {
        match self {
            Self::Int => Ok(AxisValue::Int(value.round() as i64)),
            Self::Float => Ok(AxisValue::Float(value)),
            Self::Timestamp => timestamp_from_seconds(value).map(AxisValue::Timestamp),
            Self::Timedelta => Ok(AxisValue::Timedelta(duration_from_seconds(value))),
            Self::Unsliceable => Err(SliceError::invalid_value(
                "unsliceable axes have no float representation",
            )),
        }
    }
}

/// Parse durations such as `6h`, `30m`, `45s`, `2d` or `HH:MM:SS`.
pub fn parse_duration(text: &str) -> Result<chrono::Duration> {
    let text = text.trim();
    let invalid = || SliceError::invalid_value(format!("cannot parse '{text}' as a duration"));

    if text.contains(':') {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let mut seconds = 0.0;
        for part in parts {
            seconds = seconds * 60.0 + part.parse::<f64>().map_err(|_| invalid())?;
        }
        return Ok(duration_from_seconds(seconds));
    }

    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    let scale = match unit {
        "" | "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        "d" => 86400.0,
        _ => return Err(invalid()),
    };
    Ok(duration_from_seconds(number * scale))
}

/// Feature flags set while transformations are attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisFlags {
    pub is_cyclic: bool,
    pub has_mapper: bool,
    pub is_merged: bool,
    pub has_type_change: bool,
    pub reorder: bool,
}

/// One logical dimension of a datacube.
#[derive(Debug, Clone)]
pub struct Axis {
    name: String,
    kind: AxisKind,
    tol: f64,
    flags: AxisFlags,
    transformations: Vec<Transformation>,
}

impl Axis {
    pub fn new(name: impl Into<String>, kind: AxisKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tol: kind.default_tolerance(),
            flags: AxisFlags::default(),
            transformations: Vec::new(),
        }
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    pub fn flags(&self) -> &AxisFlags {
        &self.flags
    }

    pub fn can_round(&self) -> bool {
        self.kind.can_round()
    }

    pub fn is_unsliceable(&self) -> bool {
        self.kind == AxisKind::Unsliceable
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    /// The cyclic transformation attached to this axis, if any.
    pub fn cyclic(&self) -> Option<&CyclicTransform> {
        self.transformations.iter().find_map(|t| match t {
            Transformation::Cyclic(c) => Some(c),
            _ => None,
        })
    }

    /// Attach a transformation, ignoring exact duplicates.
    pub fn attach(&mut self, transformation: Transformation) {
        if self.transformations.contains(&transformation) {
            return;
        }
        match &transformation {
            Transformation::Cyclic(_) => self.flags.is_cyclic = true,
            Transformation::Mapper(_) => self.flags.has_mapper = true,
            Transformation::Merge(_) => self.flags.is_merged = true,
            Transformation::TypeChange(_) => self.flags.has_type_change = true,
            Transformation::Reverse(_) => self.flags.reorder = true,
        }
        self.transformations.push(transformation);
    }

    pub fn parse(&self, value: &AxisValue) -> Result<AxisValue> {
        self.kind.parse(value)
    }

    pub fn to_float(&self, value: &AxisValue) -> Result<f64> {
        self.kind.to_float(value)
    }

    pub fn from_float(&self, value: f64) -> Result<AxisValue> {
        self.kind.from_float(value)
    }

    /// Number of decimals kept when rounding values discovered on this axis.
    pub fn decimals(&self) -> i32 {
        if self.tol > 0.0 {
            (-self.tol.log10()).round() as i32
        } else {
            12
        }
    }

    /// Round a float to this axis' tolerance.
    pub fn round(&self, value: f64) -> f64 {
        round_to(value, self.decimals())
    }

    // ========================================================================
    // Index discovery
    // ========================================================================

    /// All values available on this axis below `path`, in request space.
    pub fn find_indexes<D: Datacube + ?Sized>(
        &self,
        path: &DatacubePath,
        datacube: &D,
    ) -> Result<Vec<AxisValue>> {
        let mut indexes = if self.flags.has_mapper || self.flags.is_merged {
            Vec::new()
        } else {
            datacube.natural_indexes(self, path)?
        };
        for transformation in &self.transformations {
            indexes =
                transformation.find_modified_indexes(indexes, path, datacube.axes(), self)?;
        }
        Ok(indexes)
    }

    /// Values of `indexes` lying in `[low, up]`, honouring the transformation chain.
    pub fn find_indices_between(
        &self,
        indexes: &[AxisValue],
        low: f64,
        up: f64,
        method: SearchMethod,
    ) -> Result<Vec<AxisValue>> {
        self.search_from(0, indexes, low, up, method)
    }

    fn search_from(
        &self,
        depth: usize,
        indexes: &[AxisValue],
        low: f64,
        up: f64,
        method: SearchMethod,
    ) -> Result<Vec<AxisValue>> {
        match self.transformations.get(depth) {
            None => self.find_standard_indices_between(indexes, low, up, method),
            Some(transformation) => {
                let inner = |lo: f64, hi: f64| self.search_from(depth + 1, indexes, lo, hi, method);
                transformation.find_indices_between(self, indexes, low, up, method, &inner)
            }
        }
    }

    /// Plain interval search over monotonic values.
    ///
    /// Works for ascending and descending storage order. Padding methods
    /// widen the window by one position on each side.
    pub fn find_standard_indices_between(
        &self,
        indexes: &[AxisValue],
        low: f64,
        up: f64,
        method: SearchMethod,
    ) -> Result<Vec<AxisValue>> {
        let floats = indexes
            .iter()
            .map(|v| self.to_float(v))
            .collect::<Result<Vec<f64>>>()?;
        let (start, end) = window(&floats, low, up, method);
        Ok(indexes[start..end].to_vec())
    }

    /// Split a float interval into canonical sub-intervals.
    pub fn remap(&self, low: f64, up: f64) -> Vec<(f64, f64)> {
        match self.cyclic() {
            Some(cyclic) => cyclic.remap(self, low, up),
            None => vec![(low, up)],
        }
    }

    /// Rewrite one node's entry of a leaf path back into storage space.
    pub fn unmap_path_key(
        &self,
        key_value_path: &mut DatacubePath,
        leaf_path: &mut DatacubePath,
        unwanted_path: &mut DatacubePath,
    ) -> Result<()> {
        for transformation in &self.transformations {
            transformation.unmap_path_key(key_value_path, leaf_path, unwanted_path, self)?;
        }
        Ok(())
    }
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// Start and end positions of the values within `[low, up]`.
fn window(values: &[f64], low: f64, up: f64, method: SearchMethod) -> (usize, usize) {
    let descending = values.len() > 1 && values[0] > values[values.len() - 1];
    let (mut start, mut end) = if descending {
        (
            values.partition_point(|v| *v > up),
            values.partition_point(|v| *v >= low),
        )
    } else {
        (
            values.partition_point(|v| *v < low),
            values.partition_point(|v| *v <= up),
        )
    };
    if method.pads() {
        start = start.saturating_sub(1);
        end = (end + 1).min(values.len());
    }
    (start, end.max(start))
}
