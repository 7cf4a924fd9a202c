//! Merging of a date axis and a time axis into one timestamp axis.

use tracing::debug;

use crate::axis::Axis;
use crate::datacube::DatacubeAxes;
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::tree::{NodeId, TensorIndexTree};
use crate::value::{parse_timestamp, AxisValue};

use super::AxisTransformation;

/// Layout used when a merged timestamp is split back into its parts.
const MERGED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Combines `first_axis` and `second_axis` into timestamps on `first_axis`.
///
/// A merged value is the text `first + linkers.0 + second + linkers.1`
/// read as a timestamp. The second axis is blocked and never materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeTransform {
    first_axis: String,
    second_axis: String,
    linkers: (String, String),
}

impl MergeTransform {
    pub fn new(first_axis: &str, second_axis: &str, linkers: &[String]) -> Result<Self> {
        if second_axis.is_empty() {
            return Err(SliceError::invalid_config(format!(
                "merge on {first_axis} needs an other_axis"
            )));
        }
        if linkers.len() > 2 {
            return Err(SliceError::invalid_config(format!(
                "merge on {first_axis} takes at most two linkers"
            )));
        }
        let linker = |i: usize| linkers.get(i).cloned().unwrap_or_default();
        Ok(Self {
            first_axis: first_axis.to_string(),
            second_axis: second_axis.to_string(),
            linkers: (linker(0), linker(1)),
        })
    }

    pub fn second_axis(&self) -> &str {
        &self.second_axis
    }

    /// Every combination of the two axes' values, as sorted timestamps.
    pub fn merged_values(
        &self,
        first_values: &[AxisValue],
        second_values: &[AxisValue],
    ) -> Result<Vec<AxisValue>> {
        let mut merged = Vec::with_capacity(first_values.len() * second_values.len());
        for first in first_values {
            for second in second_values {
                let text = format!("{first}{}{second}{}", self.linkers.0, self.linkers.1);
                merged.push(AxisValue::Timestamp(parse_timestamp(&text)?));
            }
        }
        merged.sort();
        debug!(
            first_axis = %self.first_axis,
            second_axis = %self.second_axis,
            count = merged.len(),
            "Merged axis values"
        );
        Ok(merged)
    }

    /// Split merged timestamps back into first-axis and second-axis strings.
    pub fn unmerge(&self, merged: &[AxisValue]) -> Result<(Vec<AxisValue>, Vec<AxisValue>)> {
        let mut firsts = Vec::with_capacity(merged.len());
        let mut seconds = Vec::with_capacity(merged.len());
        for value in merged {
            let AxisValue::Timestamp(ts) = value else {
                return Err(SliceError::invalid_value(format!(
                    "cannot unmerge non-timestamp value {value} on {}",
                    self.first_axis
                )));
            };
            let text = ts.format(MERGED_FORMAT).to_string();
            let (first, second) = self.split(&text)?;
            firsts.push(AxisValue::Str(first));
            seconds.push(AxisValue::Str(second));
        }
        Ok((firsts, seconds))
    }

    fn split(&self, text: &str) -> Result<(String, String)> {
        let (first_linker, second_linker) = (&self.linkers.0, &self.linkers.1);
        let idx = if first_linker.is_empty() {
            None
        } else {
            text.find(first_linker.as_str())
        }
        .ok_or_else(|| {
            SliceError::invalid_value(format!(
                "linker '{first_linker}' not found in merged value {text}"
            ))
        })?;

        let rest = &text[idx + first_linker.len()..];
        let second = if !second_linker.is_empty() && rest.len() >= second_linker.len() {
            &rest[..rest.len() - second_linker.len()]
        } else {
            rest
        };
        Ok((text[..idx].replace('-', ""), second.replace(':', "")))
    }
}

impl AxisTransformation for MergeTransform {
    fn axes_final(&self) -> Vec<String> {
        vec![self.first_axis.clone()]
    }

    fn blocked_axes(&self) -> Vec<String> {
        vec![self.second_axis.clone()]
    }

    fn change_val_type(&self, _axis_name: &str, values: Vec<AxisValue>) -> Result<Vec<AxisValue>> {
        values
            .into_iter()
            .map(|v| match v {
                AxisValue::Timestamp(_) => Ok(v),
                other => parse_timestamp(&other.to_string()).map(AxisValue::Timestamp),
            })
            .collect()
    }

    fn find_modified_indexes(
        &self,
        indexes: Vec<AxisValue>,
        _path: &DatacubePath,
        axes: &DatacubeAxes,
        axis: &Axis,
    ) -> Result<Vec<AxisValue>> {
        if axis.name() != self.first_axis {
            return Ok(indexes);
        }
        let first = axes.raw_values(&self.first_axis)?;
        let second = axes.raw_values(&self.second_axis)?;
        self.merged_values(&first, &second)
    }

    fn unmap_path_key(
        &self,
        key_value_path: &mut DatacubePath,
        _leaf_path: &mut DatacubePath,
        _unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<()> {
        if axis.name() != self.first_axis {
            return Ok(());
        }
        let Some(values) = key_value_path.remove(axis.name()) else {
            return Ok(());
        };
        let (firsts, seconds) = self.unmerge(&values)?;
        key_value_path.insert(self.first_axis.clone(), firsts);
        key_value_path.insert(self.second_axis.clone(), seconds);
        Ok(())
    }

    fn unmap_tree_node(
        &self,
        tree: &mut TensorIndexTree,
        node: NodeId,
        _unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<NodeId> {
        if axis.name() != self.first_axis {
            return Ok(node);
        }
        let values = tree.values(node).to_vec();
        let (firsts, seconds) = self.unmerge(&values)?;
        tree.set_values(node, firsts);
        Ok(tree.add_node_layer_after(node, &self.second_axis, seconds))
    }
}
