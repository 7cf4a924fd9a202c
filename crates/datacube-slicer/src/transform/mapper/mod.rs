//! Grid mappers: one flat "values" axis exposed as two grid axes.
//!
//! A mapper replaces a backend's flat point axis with a latitude-like first
//! axis and a longitude-like second axis. The enumeration order of
//! `first_axis_vals()` / `second_axis_vals(lat)` must match the flat storage
//! order, so `unmap(lat, lon)` of the k-th enumerated pair is exactly `k`.
//! Nested HEALPix is the exception: its `unmap` permutes that order.

mod healpix;
mod irregular;
mod local_regular;
mod nested;
mod octahedral;
mod reduced_ll;
mod regular;

pub use healpix::HealpixGrid;
pub use irregular::{ExactPointIndex, IrregularGrid, PointIndex};
pub use local_regular::LocalRegularGrid;
pub use nested::NestedHealpixGrid;
pub use octahedral::OctahedralGrid;
pub use reduced_ll::ReducedLatLonGrid;
pub use regular::RegularGrid;

use std::fmt;
use std::sync::Arc;

use crate::axis::Axis;
use crate::config::{MapperOptions, Resolution};
use crate::datacube::DatacubeAxes;
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::tree::{NodeId, TensorIndexTree};
use crate::value::AxisValue;

use super::AxisTransformation;

/// Tolerance used when matching grid coordinates.
pub const GRID_TOLERANCE: f64 = 1e-8;

/// Analytic (or table-driven) description of a structured grid.
pub trait GridMapper: Send + Sync + fmt::Debug {
    /// Latitude lines in storage order.
    fn first_axis_vals(&self) -> &[f64];

    /// Longitudes on the latitude line `first_val`, in storage order.
    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>>;

    /// Flat storage index of a grid point.
    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize>;

    /// Total number of grid points.
    fn point_count(&self) -> usize;
}

/// Position of `target` in a monotonic coordinate list, within `tol`.
pub fn find_index(values: &[f64], target: f64, tol: f64) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let descending = values.len() > 1 && values[0] > values[values.len() - 1];
    let pos = if descending {
        values.partition_point(|v| *v > target)
    } else {
        values.partition_point(|v| *v < target)
    };
    [pos.checked_sub(1), Some(pos)]
        .into_iter()
        .flatten()
        .filter(|i| *i < values.len())
        .find(|i| (values[*i] - target).abs() <= tol)
}

/// Per-line point counts with their cumulative offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct RingIndex {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl RingIndex {
    pub fn new(counts: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(counts.len());
        let mut total = 0;
        for count in &counts {
            offsets.push(total);
            total += count;
        }
        Self { counts, offsets }
    }

    pub fn count(&self, ring: usize) -> usize {
        self.counts[ring]
    }

    /// Flat index of the first point on `ring`.
    pub fn offset(&self, ring: usize) -> usize {
        self.offsets[ring]
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        match (self.offsets.last(), self.counts.last()) {
            (Some(offset), Some(count)) => offset + count,
            _ => 0,
        }
    }
}

/// Locate a latitude line or fail with a descriptive error.
pub(crate) fn line_index(lines: &[f64], value: f64, grid: &str) -> Result<usize> {
    find_index(lines, value, GRID_TOLERANCE).ok_or_else(|| {
        SliceError::invalid_value(format!("{value} is not a latitude line of the {grid} grid"))
    })
}

/// Index of an evenly spaced longitude within a line of `count` points.
pub(crate) fn even_index(value: f64, start: f64, spacing: f64, count: usize, grid: &str) -> Result<usize> {
    let position = (value - start) / spacing;
    let idx = position.round();
    if idx >= 0.0 && (idx as usize) < count && (position - idx).abs() * spacing <= GRID_TOLERANCE {
        Ok(idx as usize)
    } else {
        Err(SliceError::invalid_value(format!(
            "{value} is not a longitude of the {grid} grid"
        )))
    }
}

/// The mapper transformation attached to both grid axes.
#[derive(Debug, Clone)]
pub struct MapperTransform {
    old_axis: String,
    axes: Vec<String>,
    options: MapperOptions,
    mapper: Arc<dyn GridMapper>,
}

impl PartialEq for MapperTransform {
    fn eq(&self, other: &Self) -> bool {
        self.old_axis == other.old_axis && self.axes == other.axes && self.options == other.options
    }
}

impl MapperTransform {
    pub fn from_options(old_axis: &str, options: &MapperOptions) -> Result<Self> {
        if options.axes.len() != 2 {
            return Err(SliceError::invalid_config(format!(
                "mapper on {old_axis} needs exactly two axes, got {:?}",
                options.axes
            )));
        }
        let mapper = build_mapper(options)?;
        Ok(Self {
            old_axis: old_axis.to_string(),
            axes: options.axes.clone(),
            options: options.clone(),
            mapper,
        })
    }

    /// Use a caller-provided grid description.
    pub fn with_mapper(
        old_axis: &str,
        axes: [&str; 2],
        options: MapperOptions,
        mapper: Arc<dyn GridMapper>,
    ) -> Self {
        Self {
            old_axis: old_axis.to_string(),
            axes: axes.iter().map(|a| a.to_string()).collect(),
            options,
            mapper,
        }
    }

    pub fn mapper(&self) -> &dyn GridMapper {
        self.mapper.as_ref()
    }

    pub fn old_axis(&self) -> &str {
        &self.old_axis
    }

    pub fn md5_hash(&self) -> Option<&str> {
        self.options.md5_hash.as_deref()
    }

    /// Axes on which many matched values may share one tree node.
    pub fn compressed_grid_axes(&self) -> Vec<String> {
        vec![self.axes[1].clone()]
    }

    fn first_axis(&self) -> &str {
        &self.axes[0]
    }

    fn second_axis(&self) -> &str {
        &self.axes[1]
    }

    fn unmap_values(&self, first: &[AxisValue], second: &[AxisValue]) -> Result<Vec<AxisValue>> {
        let mut indexes = Vec::with_capacity(first.len() * second.len());
        for lat in first {
            let lat = as_coordinate(lat)?;
            for lon in second {
                let idx = self.mapper.unmap(lat, as_coordinate(lon)?)?;
                indexes.push(AxisValue::Int(idx as i64));
            }
        }
        Ok(indexes)
    }
}

fn as_coordinate(value: &AxisValue) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| SliceError::invalid_value(format!("grid coordinate {value} is not numeric")))
}

fn build_mapper(options: &MapperOptions) -> Result<Arc<dyn GridMapper>> {
    let single = || match &options.resolution {
        Resolution::Single(n) => Ok(*n),
        Resolution::Pair(_) => Err(SliceError::invalid_config(format!(
            "{} grids take a single resolution",
            options.grid_type
        ))),
    };
    let reversed = |axis: &str, default: bool| {
        options
            .axis_reversed
            .as_ref()
            .and_then(|map| map.get(axis).copied())
            .unwrap_or(default)
    };

    let mapper: Arc<dyn GridMapper> = match options.grid_type.as_str() {
        "octahedral" => Arc::new(OctahedralGrid::new(single()?)?),
        "healpix" => Arc::new(HealpixGrid::new(single()?)?),
        "healpix_nested" => Arc::new(NestedHealpixGrid::new(single()?)?),
        "regular" => Arc::new(RegularGrid::new(single()?)?),
        "reduced_ll" => {
            let counts = options.lon_counts.clone().ok_or_else(|| {
                SliceError::invalid_config("reduced_ll grids need lon_counts per latitude")
            })?;
            Arc::new(ReducedLatLonGrid::new(counts)?)
        }
        "local_regular" => {
            let local = options.local.as_deref().ok_or_else(|| {
                SliceError::invalid_config("local_regular grids need local bounds")
            })?;
            let (first_res, second_res) = match &options.resolution {
                Resolution::Single(n) => (*n, *n),
                Resolution::Pair(pair) => match pair.as_slice() {
                    [a, b] => (*a, *b),
                    _ => {
                        return Err(SliceError::invalid_config(
                            "local_regular resolution pair needs two values",
                        ))
                    }
                },
            };
            Arc::new(LocalRegularGrid::new(
                local,
                first_res,
                second_res,
                reversed(&options.axes[0], false),
            )?)
        }
        "irregular" => {
            let points = options.points.as_deref().ok_or_else(|| {
                SliceError::invalid_config("irregular grids need an explicit point list")
            })?;
            Arc::new(IrregularGrid::from_points(points)?)
        }
        other => {
            return Err(SliceError::unsupported_grid(format!(
                "unknown grid type '{other}'"
            )))
        }
    };
    Ok(mapper)
}

impl AxisTransformation for MapperTransform {
    fn axes_final(&self) -> Vec<String> {
        self.axes.clone()
    }

    fn unwanted_axes(&self) -> Vec<String> {
        vec![self.first_axis().to_string()]
    }

    fn change_val_type(&self, _axis_name: &str, _values: Vec<AxisValue>) -> Result<Vec<AxisValue>> {
        Ok(vec![AxisValue::Float(0.0)])
    }

    fn find_modified_indexes(
        &self,
        indexes: Vec<AxisValue>,
        path: &DatacubePath,
        _axes: &DatacubeAxes,
        axis: &Axis,
    ) -> Result<Vec<AxisValue>> {
        if axis.name() == self.first_axis() {
            return Ok(self
                .mapper
                .first_axis_vals()
                .iter()
                .map(|v| AxisValue::Float(*v))
                .collect());
        }
        if axis.name() == self.second_axis() {
            let first = path.first(self.first_axis()).ok_or_else(|| {
                SliceError::invalid_value(format!(
                    "{} needs a {} value in the path",
                    self.second_axis(),
                    self.first_axis()
                ))
            })?;
            let lons = self.mapper.second_axis_vals(as_coordinate(first)?)?;
            return Ok(lons.into_iter().map(AxisValue::Float).collect());
        }
        Ok(indexes)
    }

    fn unmap_path_key(
        &self,
        key_value_path: &mut DatacubePath,
        leaf_path: &mut DatacubePath,
        unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<()> {
        if axis.name() == self.first_axis() {
            if let Some(values) = key_value_path.get(axis.name()) {
                unwanted_path.insert(axis.name(), values.to_vec());
            }
        } else if axis.name() == self.second_axis() {
            let first: Vec<AxisValue> =
                unwanted_path.first(self.first_axis()).cloned().into_iter().collect();
            let second = key_value_path.remove(axis.name()).unwrap_or_default();
            let indexes = self.unmap_values(&first, &second)?;
            leaf_path.remove(self.first_axis());
            key_value_path.insert(self.old_axis.clone(), indexes);
        }
        Ok(())
    }

    fn unmap_tree_node(
        &self,
        tree: &mut TensorIndexTree,
        node: NodeId,
        unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<NodeId> {
        if axis.name() == self.first_axis() {
            unwanted_path.insert(axis.name(), tree.values(node).to_vec());
            return Ok(node);
        }
        if axis.name() == self.second_axis() {
            let first = unwanted_path.get(self.first_axis()).unwrap_or_default().to_vec();
            let indexes = self.unmap_values(&first, tree.values(node))?;
            return Ok(tree.hide_non_index_nodes(node, indexes));
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_index_both_orders() {
        let ascending = [0.0, 0.5, 1.0, 1.5];
        assert_eq!(find_index(&ascending, 1.0 + 1e-10, GRID_TOLERANCE), Some(2));
        assert_eq!(find_index(&ascending, 0.75, GRID_TOLERANCE), None);

        let descending = [1.5, 1.0, 0.5, 0.0];
        assert_eq!(find_index(&descending, 1.0 - 1e-10, GRID_TOLERANCE), Some(1));
        assert_eq!(find_index(&descending, 0.0, GRID_TOLERANCE), Some(3));
    }

    #[test]
    fn test_ring_index_offsets() {
        let rings = RingIndex::new(vec![20, 24, 24, 20]);
        assert_eq!(rings.offset(0), 0);
        assert_eq!(rings.offset(2), 44);
        assert_eq!(rings.total(), 88);
    }

    #[test]
    fn test_unknown_grid_type() {
        let options = MapperOptions {
            grid_type: "lambert".to_string(),
            resolution: Resolution::Single(10),
            axes: vec!["latitude".into(), "longitude".into()],
            ..MapperOptions::default()
        };
        let err = MapperTransform::from_options("values", &options).unwrap_err();
        assert!(matches!(err, SliceError::UnsupportedGrid(_)));
    }

    #[test]
    fn test_mapper_needs_two_axes() {
        let options = MapperOptions {
            grid_type: "regular".to_string(),
            resolution: Resolution::Single(2),
            axes: vec!["latitude".into()],
            ..MapperOptions::default()
        };
        assert!(MapperTransform::from_options("values", &options).is_err());
    }

    #[test]
    fn test_nested_healpix_from_options() {
        let options = MapperOptions {
            grid_type: "healpix_nested".to_string(),
            resolution: Resolution::Single(4),
            axes: vec!["latitude".into(), "longitude".into()],
            ..MapperOptions::default()
        };
        let transform = MapperTransform::from_options("values", &options).unwrap();
        let mapper = transform.mapper();
        assert_eq!(mapper.point_count(), 192);
        let pole = mapper.first_axis_vals()[0];
        assert_eq!(mapper.unmap(pole, 45.0).unwrap(), 15);

        let options = MapperOptions {
            resolution: Resolution::Single(3),
            ..options
        };
        assert!(matches!(
            MapperTransform::from_options("values", &options),
            Err(SliceError::UnsupportedGrid(_))
        ));
    }
}
