//! Cyclic (wrap-around) axes such as longitude.

use crate::axis::{Axis, SearchMethod};
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::value::AxisValue;

use super::{AxisTransformation, InnerSearch};

/// Wraps an axis onto the canonical range `[lower, upper)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicTransform {
    axis_name: String,
    lower: f64,
    upper: f64,
}

impl CyclicTransform {
    pub fn new(axis_name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        let axis_name = axis_name.into();
        if !(lower.is_finite() && upper.is_finite() && upper > lower) {
            return Err(SliceError::invalid_config(format!(
                "cyclic range [{lower}, {upper}] on {axis_name} must be finite and increasing"
            )));
        }
        Ok(Self {
            axis_name,
            lower,
            upper,
        })
    }

    pub fn from_range(axis_name: &str, range: &[f64]) -> Result<Self> {
        match range {
            [lower, upper] => Self::new(axis_name, *lower, *upper),
            _ => Err(SliceError::invalid_config(format!(
                "cyclic range on {axis_name} needs exactly two bounds, got {}",
                range.len()
            ))),
        }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Translate an interval by whole periods so its lower end lands in range.
    pub fn remap_range(&self, axis: &Axis, low: f64, up: f64) -> (f64, f64) {
        let width = self.width();
        if low < self.lower {
            let loops = ((self.lower - low - axis.tol()) / width).trunc();
            let shift = (loops + 1.0) * width;
            (low + shift, up + shift)
        } else if low >= self.upper {
            let loops = ((low - self.upper) / width).trunc();
            let shift = (loops + 1.0) * width;
            (low - shift, up - shift)
        } else {
            (low, up)
        }
    }

    /// Canonical representative of a single value.
    pub fn remap_value(&self, axis: &Axis, value: f64) -> f64 {
        self.remap_range(axis, value, value).0
    }

    /// Fold a value into the half-open range `[lower, upper)`.
    ///
    /// Values within tolerance of `upper` are the seam and fold to `lower`.
    pub fn canonical_value(&self, axis: &Axis, value: f64) -> f64 {
        let (tol, width) = (axis.tol(), self.width());
        let mut folded = self.lower + (value - self.lower).rem_euclid(width);
        if folded >= self.upper - tol {
            folded -= width;
        }
        if (folded - self.lower).abs() <= tol {
            folded = self.lower;
        }
        folded
    }

    /// Break `[low, up]` into consecutive pieces, each at most one period wide.
    ///
    /// Infinite bounds are replaced by the canonical range. Zero-width pieces
    /// at the ends are kept; callers skip them.
    pub fn to_intervals(&self, low: f64, up: f64) -> Vec<(f64, f64)> {
        let low = if low == f64::NEG_INFINITY { self.lower } else { low };
        let up = if up == f64::INFINITY { self.upper } else { up };
        let width = self.width();

        let first_upper = if low < self.upper {
            let loops = ((self.upper - low) / width).trunc();
            up.min(self.upper - loops * width)
        } else {
            let mut candidate = (self.upper + width).min(up);
            while candidate < low {
                candidate = (candidate + width).min(up);
            }
            candidate
        };

        let mut intervals = vec![(low, first_upper)];
        let mut current = first_upper;
        while current < up {
            let next = up.min(current + width);
            intervals.push((current, next));
            current = next;
        }
        intervals.push((current, up));
        intervals
    }

    /// Canonical search intervals, each padded by the axis tolerance, paired
    /// with the offset that maps values found in them back to request space.
    pub fn remap_with_offsets(&self, axis: &Axis, low: f64, up: f64) -> Vec<((f64, f64), f64)> {
        let tol = axis.tol();
        let in_range = |v: f64| self.lower - tol <= v && v <= self.upper + tol;

        if (low - up).abs() <= 2.0 * tol {
            let remapped = self.canonical_value(axis, low);
            return vec![((remapped - tol, remapped + tol), low - remapped)];
        }
        if in_range(low) && in_range(up) {
            return vec![((low, up), 0.0)];
        }

        self.to_intervals(low, up)
            .into_iter()
            .filter(|(a, b)| (a - b).abs() > 0.0)
            .map(|(a, b)| {
                let (lo, hi) = self.remap_range(axis, a, b);
                let offset = a - lo;
                if hi < lo {
                    ((hi - tol, lo + tol), offset)
                } else {
                    ((lo - tol, hi + tol), offset)
                }
            })
            .collect()
    }

    /// Canonical search intervals for `[low, up]`.
    pub fn remap(&self, axis: &Axis, low: f64, up: f64) -> Vec<(f64, f64)> {
        self.remap_with_offsets(axis, low, up)
            .into_iter()
            .map(|(range, _)| range)
            .collect()
    }

    /// Offset between a (padded) request interval and its canonical image.
    pub fn offset(&self, axis: &Axis, low: f64, up: f64) -> f64 {
        let tol = axis.tol();
        let (unpadded_low, unpadded_up) = (low + 1.5 * tol, up - 1.5 * tol);
        let (remapped_low, _) = self.remap_range(axis, unpadded_low, unpadded_up);
        unpadded_low - remapped_low
    }

    /// Neighbours across the seam for padded searches.
    fn seam_neighbours(
        &self,
        axis: &Axis,
        indexes: &[AxisValue],
        lo: f64,
        hi: f64,
    ) -> Result<Vec<f64>> {
        let mut floats = indexes
            .iter()
            .map(|v| axis.to_float(v))
            .collect::<Result<Vec<f64>>>()?;
        floats.sort_by(f64::total_cmp);
        let (Some(&min), Some(&max)) = (floats.first(), floats.last()) else {
            return Ok(Vec::new());
        };
        let (tol, width) = (axis.tol(), self.width());

        let mut neighbours = Vec::new();
        if lo <= min + tol {
            if let Some(prev) = floats.iter().rev().find(|v| **v - width < lo - tol) {
                neighbours.push(prev - width);
            }
        }
        if hi >= max - tol {
            if let Some(next) = floats.iter().find(|v| **v + width > hi + tol) {
                neighbours.push(next + width);
            }
        }
        Ok(neighbours)
    }
}

impl AxisTransformation for CyclicTransform {
    fn axes_final(&self) -> Vec<String> {
        vec![self.axis_name.clone()]
    }

    fn find_indices_between(
        &self,
        axis: &Axis,
        indexes: &[AxisValue],
        low: f64,
        up: f64,
        method: SearchMethod,
        inner: &InnerSearch<'_>,
    ) -> Result<Vec<AxisValue>> {
        let mut found = Vec::new();
        for ((lo, hi), offset) in self.remap_with_offsets(axis, low, up) {
            for value in inner(lo, hi)? {
                found.push(axis.round(axis.to_float(&value)? + offset));
            }
            if method.pads() {
                for neighbour in self.seam_neighbours(axis, indexes, lo, hi)? {
                    found.push(axis.round(neighbour + offset));
                }
            }
        }

        found.sort_by(f64::total_cmp);
        found.dedup_by(|a, b| (*a - *b).abs() <= 2.0 * axis.tol());
        found.into_iter().map(|v| axis.from_float(v)).collect()
    }

    fn unmap_path_key(
        &self,
        key_value_path: &mut DatacubePath,
        _leaf_path: &mut DatacubePath,
        _unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<()> {
        let Some(values) = key_value_path.get(axis.name()) else {
            return Ok(());
        };
        let remapped = values
            .iter()
            .map(|v| {
                let x = axis.to_float(v)?;
                axis.from_float(axis.round(self.canonical_value(axis, x)))
            })
            .collect::<Result<Vec<_>>>()?;
        key_value_path.insert(axis.name(), remapped);
        Ok(())
    }
}
