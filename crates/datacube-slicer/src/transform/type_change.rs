//! Coercion of string-valued axes to integers.

use crate::axis::Axis;
use crate::datacube::DatacubeAxes;
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::tree::{NodeId, TensorIndexTree};
use crate::value::AxisValue;

use super::AxisTransformation;

/// Target representation of a type change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Int,
}

/// Exposes a string axis (e.g. GRIB step `"0"`, `"6"`) as integers.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeChangeTransform {
    axis_name: String,
    target: TargetType,
}

impl TypeChangeTransform {
    pub fn new(axis_name: &str, target: &str) -> Result<Self> {
        let target = match target {
            "int" => TargetType::Int,
            other => {
                return Err(SliceError::invalid_config(format!(
                    "unsupported type change '{other}' on {axis_name}"
                )))
            }
        };
        Ok(Self {
            axis_name: axis_name.to_string(),
            target,
        })
    }

    pub fn target(&self) -> TargetType {
        self.target
    }

    fn transform_type(&self, value: &AxisValue) -> Result<AxisValue> {
        match (self.target, value) {
            (TargetType::Int, AxisValue::Int(_)) => Ok(value.clone()),
            (TargetType::Int, AxisValue::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(AxisValue::Int)
                .map_err(|_| {
                    SliceError::invalid_value(format!("'{s}' on {} is not an integer", self.axis_name))
                }),
            (TargetType::Int, AxisValue::Float(f)) if f.fract() == 0.0 => Ok(AxisValue::Int(*f as i64)),
            (_, other) => Err(SliceError::invalid_value(format!(
                "cannot convert {other} on {} to int",
                self.axis_name
            ))),
        }
    }

    /// Stored representation of request values.
    pub fn make_str(&self, values: &[AxisValue]) -> Vec<AxisValue> {
        values.iter().map(|v| AxisValue::Str(v.to_string())).collect()
    }
}

impl AxisTransformation for TypeChangeTransform {
    fn axes_final(&self) -> Vec<String> {
        vec![self.axis_name.clone()]
    }

    fn change_val_type(&self, _axis_name: &str, values: Vec<AxisValue>) -> Result<Vec<AxisValue>> {
        let mut changed = values
            .iter()
            .map(|v| self.transform_type(v))
            .collect::<Result<Vec<_>>>()?;
        changed.sort();
        Ok(changed)
    }

    fn find_modified_indexes(
        &self,
        indexes: Vec<AxisValue>,
        _path: &DatacubePath,
        _axes: &DatacubeAxes,
        axis: &Axis,
    ) -> Result<Vec<AxisValue>> {
        if axis.name() != self.axis_name {
            return Ok(indexes);
        }
        self.change_val_type(axis.name(), indexes)
    }

    fn unmap_path_key(
        &self,
        key_value_path: &mut DatacubePath,
        _leaf_path: &mut DatacubePath,
        _unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<()> {
        if axis.name() != self.axis_name {
            return Ok(());
        }
        if let Some(values) = key_value_path.get(axis.name()) {
            let stored = self.make_str(values);
            key_value_path.insert(axis.name(), stored);
        }
        Ok(())
    }

    fn unmap_tree_node(
        &self,
        tree: &mut TensorIndexTree,
        node: NodeId,
        _unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<NodeId> {
        if axis.name() == self.axis_name {
            let stored = self.make_str(tree.values(node));
            tree.set_values(node, stored);
        }
        Ok(node)
    }
}
