//! A synthetic datacube of integer axes whose values are flat offsets.

use tracing::debug;

use crate::axis::{Axis, SearchMethod};
use crate::config::SliceOptions;
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::tree::TensorIndexTree;
use crate::value::AxisValue;

use super::{Datacube, DatacubeAxes};

/// Datacube with integer axes `0..size`. The value at a point is its
/// row-major offset, which makes extraction results easy to check.
#[derive(Debug, Clone)]
pub struct MockDatacube {
    axes: DatacubeAxes,
    dimensions: Vec<(String, usize)>,
    strides: Vec<usize>,
}

impl MockDatacube {
    pub fn new(dimensions: &[(&str, usize)]) -> Result<Self> {
        let dimensions = dimensions
            .iter()
            .map(|(name, size)| (name.to_string(), *size))
            .collect();
        Self::with_options(dimensions, &SliceOptions::default())
    }

    /// Mock with axis options, e.g. compressed axes.
    pub fn with_options(dimensions: Vec<(String, usize)>, options: &SliceOptions) -> Result<Self> {
        let declared = dimensions
            .iter()
            .map(|(name, size)| {
                let values = (0..*size as i64).map(AxisValue::Int).collect();
                (name.clone(), values)
            })
            .collect();
        let axes = DatacubeAxes::build(declared, options)?;

        let mut strides = vec![1; dimensions.len()];
        for i in (0..dimensions.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * dimensions[i + 1].1;
        }

        Ok(Self {
            axes,
            dimensions,
            strides,
        })
    }

    fn size(&self, name: &str) -> Result<usize> {
        self.dimensions
            .iter()
            .find(|(dim, _)| dim == name)
            .map(|(_, size)| *size)
            .ok_or_else(|| SliceError::AxisNotFound(name.to_string()))
    }

    /// Flat offsets of every point addressed by a complete path.
    fn offsets(&self, path: &DatacubePath) -> Result<Vec<f64>> {
        let mut offsets = vec![0usize];
        for ((name, _), stride) in self.dimensions.iter().zip(&self.strides) {
            let values = path
                .get(name)
                .ok_or_else(|| SliceError::backend(format!("path has no value for {name}")))?;
            let mut next = Vec::with_capacity(offsets.len() * values.len());
            for offset in &offsets {
                for value in values {
                    let position = value.as_f64().ok_or_else(|| {
                        SliceError::invalid_value(format!("{value} is not an index of {name}"))
                    })?;
                    next.push(offset + position as usize * stride);
                }
            }
            offsets = next;
        }
        Ok(offsets.into_iter().map(|o| o as f64).collect())
    }
}

impl Datacube for MockDatacube {
    fn axes(&self) -> &DatacubeAxes {
        &self.axes
    }

    fn get(&self, tree: &mut TensorIndexTree) -> Result<()> {
        let mut incomplete = Vec::new();
        for (leaf, path) in tree.leaf_paths() {
            if path.len() == self.dimensions.len() {
                let result = self.offsets(&path)?;
                tree.set_result(leaf, result);
            } else {
                incomplete.push(leaf);
            }
        }
        if !incomplete.is_empty() {
            debug!(count = incomplete.len(), "Pruning incomplete leaves");
        }
        for leaf in incomplete {
            tree.remove_branch(leaf);
        }
        Ok(())
    }

    fn get_indices(
        &self,
        _path: &DatacubePath,
        axis: &Axis,
        lower: f64,
        upper: f64,
        _method: SearchMethod,
    ) -> Result<Vec<AxisValue>> {
        let size = self.size(axis.name())? as i64;
        if lower == upper && lower == lower.ceil() {
            let index = lower as i64;
            return Ok(if (0..size).contains(&index) {
                vec![AxisValue::Int(index)]
            } else {
                Vec::new()
            });
        }
        let start = lower.ceil().max(0.0) as i64;
        let end = (upper.floor() as i64).saturating_add(1).min(size);
        Ok((start..end).map(AxisValue::Int).collect())
    }

    fn has_index(&self, _path: &DatacubePath, _axis: &Axis, _value: &AxisValue) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeAxis;

    #[test]
    fn test_indices_within_bounds() {
        let mock = MockDatacube::new(&[("x", 10), ("y", 5)]).unwrap();
        let y = mock.axis("y").unwrap().clone();
        let path = DatacubePath::new();

        let found = mock
            .get_indices(&path, &y, 2.5, 40.0, SearchMethod::Strict)
            .unwrap();
        assert_eq!(found, vec![AxisValue::Int(3), AxisValue::Int(4)]);

        let found = mock
            .get_indices(&path, &y, 2.0, 2.0, SearchMethod::Strict)
            .unwrap();
        assert_eq!(found, vec![AxisValue::Int(2)]);

        let found = mock
            .get_indices(&path, &y, f64::NEG_INFINITY, f64::INFINITY, SearchMethod::Strict)
            .unwrap();
        assert_eq!(found.len(), 5);

        assert!(mock
            .get_indices(&path, &y, 7.0, 7.0, SearchMethod::Strict)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_get_fills_offsets_and_prunes() {
        let mock = MockDatacube::new(&[("x", 10), ("y", 5)]).unwrap();
        let mut tree = TensorIndexTree::new();
        let root = tree.root();
        let x = tree.create_child(root, NodeAxis::named("x"), vec![AxisValue::Int(2)]);
        let y = tree.create_child(
            x,
            NodeAxis::named("y"),
            vec![AxisValue::Int(1), AxisValue::Int(3)],
        );
        let partial = tree.create_child(root, NodeAxis::named("x"), vec![AxisValue::Int(4)]);

        mock.get(&mut tree).unwrap();
        assert_eq!(tree.result(y), &[11.0, 13.0]);
        assert!(!tree.contains(partial));
        assert_eq!(tree.leaves(), vec![y]);
    }
}
