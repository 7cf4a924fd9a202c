//! Unstructured grids given as an explicit point list.
//!
//! Points are grouped by latitude so the grid can be browsed like the
//! structured ones. Flat indexes keep the order of the original list; the
//! lookup from coordinates back to an index goes through a [`PointIndex`].

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, SliceError};

use super::{line_index, GridMapper, GRID_TOLERANCE};

const GRID: &str = "irregular";

/// Lookup from a grid coordinate to its position in the point list.
pub trait PointIndex: Send + Sync + fmt::Debug {
    fn lookup(&self, first: f64, second: f64) -> Option<usize>;
}

/// Exact lookup on coordinates quantized to the grid tolerance.
#[derive(Debug, Clone, Default)]
pub struct ExactPointIndex {
    positions: HashMap<(i64, i64), usize>,
}

impl ExactPointIndex {
    pub fn new(points: &[(f64, f64)]) -> Self {
        let mut positions = HashMap::with_capacity(points.len());
        for (i, (first, second)) in points.iter().enumerate() {
            positions.entry(quantize(*first, *second)).or_insert(i);
        }
        Self { positions }
    }
}

fn quantize(first: f64, second: f64) -> (i64, i64) {
    let scale = 1.0 / GRID_TOLERANCE;
    ((first * scale).round() as i64, (second * scale).round() as i64)
}

impl PointIndex for ExactPointIndex {
    fn lookup(&self, first: f64, second: f64) -> Option<usize> {
        self.positions.get(&quantize(first, second)).copied()
    }
}

#[derive(Debug)]
pub struct IrregularGrid {
    latitudes: Vec<f64>,
    lines: Vec<Vec<f64>>,
    index: Box<dyn PointIndex>,
    len: usize,
}

impl IrregularGrid {
    /// Build from `[first, second]` coordinate pairs in storage order.
    pub fn from_points(points: &[Vec<f64>]) -> Result<Self> {
        let pairs = points
            .iter()
            .map(|p| match p.as_slice() {
                [first, second] => Ok((*first, *second)),
                _ => Err(SliceError::invalid_config(format!(
                    "irregular grid points need two coordinates, got {p:?}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        let index = ExactPointIndex::new(&pairs);
        Self::with_index(&pairs, Box::new(index))
    }

    pub fn with_index(points: &[(f64, f64)], index: Box<dyn PointIndex>) -> Result<Self> {
        if points.is_empty() {
            return Err(SliceError::unsupported_grid("irregular grid has no points"));
        }
        if points.iter().any(|(a, b)| !a.is_finite() || !b.is_finite()) {
            return Err(SliceError::invalid_config(
                "irregular grid coordinates must be finite",
            ));
        }

        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut latitudes: Vec<f64> = Vec::new();
        let mut lines: Vec<Vec<f64>> = Vec::new();
        for (first, second) in sorted {
            match latitudes.last() {
                Some(last) if (first - last).abs() <= GRID_TOLERANCE => {
                    if let Some(line) = lines.last_mut() {
                        if line.last().map_or(true, |l| (second - l).abs() > GRID_TOLERANCE) {
                            line.push(second);
                        }
                    }
                }
                _ => {
                    latitudes.push(first);
                    lines.push(vec![second]);
                }
            }
        }

        Ok(Self {
            latitudes,
            lines,
            index,
            len: points.len(),
        })
    }
}

impl GridMapper for IrregularGrid {
    fn first_axis_vals(&self) -> &[f64] {
        &self.latitudes
    }

    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>> {
        let line = line_index(&self.latitudes, first_val, GRID)?;
        Ok(self.lines[line].clone())
    }

    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize> {
        self.index.lookup(first_val, second_val).ok_or_else(|| {
            SliceError::invalid_value(format!(
                "({first_val}, {second_val}) is not a point of the {GRID} grid"
            ))
        })
    }

    fn point_count(&self) -> usize {
        self.len
    }
}
