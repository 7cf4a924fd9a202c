//! In-memory labelled array backend.

use tracing::{debug, warn};

use crate::config::SliceOptions;
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::tree::{NodeId, TensorIndexTree};
use crate::value::AxisValue;

use super::{Datacube, DatacubeAxes};

/// A dense row-major array with coordinate labels per dimension.
///
/// Scalar coordinates are extra axes with a single value that do not
/// contribute to the array shape. Numeric labels are matched to the nearest
/// coordinate, other labels exactly.
#[derive(Debug, Clone)]
pub struct ArrayDatacube {
    axes: DatacubeAxes,
    dims: Vec<(String, Vec<AxisValue>)>,
    scalars: Vec<(String, AxisValue)>,
    data: Vec<f64>,
    strides: Vec<usize>,
}

impl ArrayDatacube {
    pub fn new(
        dims: Vec<(String, Vec<AxisValue>)>,
        scalars: Vec<(String, AxisValue)>,
        data: Vec<f64>,
        options: &SliceOptions,
    ) -> Result<Self> {
        let expected: usize = dims.iter().map(|(_, coords)| coords.len()).product();
        if data.len() != expected {
            return Err(SliceError::backend(format!(
                "array has {} values but its coordinates describe {expected}",
                data.len()
            )));
        }

        let mut strides = vec![1; dims.len()];
        for i in (0..dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * dims[i + 1].1.len();
        }

        let declared = dims
            .iter()
            .cloned()
            .chain(scalars.iter().map(|(name, value)| (name.clone(), vec![value.clone()])))
            .collect();
        let axes = DatacubeAxes::build(declared, options)?;

        Ok(Self {
            axes,
            dims,
            scalars,
            data,
            strides,
        })
    }

    pub fn dims(&self) -> &[(String, Vec<AxisValue>)] {
        &self.dims
    }

    fn resolve(
        &self,
        tree: &mut TensorIndexTree,
        node: NodeId,
        mut leaf_path: DatacubePath,
        depth: usize,
        unwanted: &mut DatacubePath,
        incomplete: &mut Vec<NodeId>,
    ) -> Result<()> {
        let name = tree.axis_name(node).to_string();
        let mut key_value = DatacubePath::new();
        key_value.insert(name.clone(), tree.values(node).to_vec());
        if let Some(axis) = self.axes.get(&name) {
            axis.unmap_path_key(&mut key_value, &mut leaf_path, unwanted)?;
        }
        leaf_path.extend(&key_value);

        let children = tree.children(node).to_vec();
        if !children.is_empty() {
            for child in children {
                self.resolve(tree, child, leaf_path.clone(), depth + 1, unwanted, incomplete)?;
            }
        } else if depth == self.axes.len() {
            let result = self.select(&leaf_path)?;
            tree.set_result(node, result);
        } else {
            incomplete.push(node);
        }
        Ok(())
    }

    /// Values at every combination of the coordinates in `path`.
    fn select(&self, path: &DatacubePath) -> Result<Vec<f64>> {
        for (name, scalar) in &self.scalars {
            if let Some(values) = path.get(name) {
                if let Some(other) = values.iter().find(|v| v.to_string() != scalar.to_string()) {
                    return Err(SliceError::index_not_found(name, other.to_string(), other.type_name()));
                }
            }
        }

        let mut offsets = vec![0usize];
        for ((name, coords), stride) in self.dims.iter().zip(&self.strides) {
            let values = path
                .get(name)
                .ok_or_else(|| SliceError::backend(format!("path has no value for {name}")))?;
            let mut next = Vec::with_capacity(offsets.len() * values.len());
            for offset in &offsets {
                for value in values {
                    next.push(offset + locate(name, coords, value)? * stride);
                }
            }
            offsets = next;
        }
        Ok(offsets.into_iter().map(|o| self.data[o]).collect())
    }
}

/// Position of `value` among `coords`: exact match first, then the nearest
/// numeric coordinate.
fn locate(name: &str, coords: &[AxisValue], value: &AxisValue) -> Result<usize> {
    if let Some(pos) = coords.iter().position(|c| c == value) {
        return Ok(pos);
    }
    let not_found = || SliceError::index_not_found(name, value.to_string(), value.type_name());
    let target = value.as_f64().ok_or_else(not_found)?;
    coords
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.as_f64().map(|x| (i, (x - target).abs())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .ok_or_else(not_found)
}

impl Datacube for ArrayDatacube {
    fn axes(&self) -> &DatacubeAxes {
        &self.axes
    }

    fn get(&self, tree: &mut TensorIndexTree) -> Result<()> {
        let mut unwanted = DatacubePath::new();
        let mut incomplete = Vec::new();
        for child in tree.children(tree.root()).to_vec() {
            self.resolve(tree, child, DatacubePath::new(), 1, &mut unwanted, &mut incomplete)?;
        }
        if !incomplete.is_empty() {
            warn!(count = incomplete.len(), "Dropping leaves that do not reach every axis");
        }
        for leaf in incomplete {
            if tree.contains(leaf) {
                tree.remove_branch(leaf);
            }
        }
        debug!(leaves = tree.leaves().len(), "Resolved tree against array");
        Ok(())
    }
}
