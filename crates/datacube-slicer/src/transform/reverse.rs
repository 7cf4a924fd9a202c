//! Axes stored in descending order.

use crate::axis::Axis;
use crate::datacube::DatacubeAxes;
use crate::error::Result;
use crate::path::DatacubePath;
use crate::value::AxisValue;

use super::AxisTransformation;

/// Marks an axis whose storage runs high-to-low while requests run low-to-high.
///
/// Discovered values are presented in ascending order so interval searches
/// and tree ordering work as for any other axis; backends still look values
/// up by label, so no unmapping is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseTransform {
    axis_name: String,
    is_reverse: bool,
}

impl ReverseTransform {
    pub fn new(axis_name: &str, is_reverse: bool) -> Self {
        Self {
            axis_name: axis_name.to_string(),
            is_reverse,
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.is_reverse
    }
}

impl AxisTransformation for ReverseTransform {
    fn axes_final(&self) -> Vec<String> {
        vec![self.axis_name.clone()]
    }

    fn find_modified_indexes(
        &self,
        mut indexes: Vec<AxisValue>,
        _path: &DatacubePath,
        _axes: &DatacubeAxes,
        axis: &Axis,
    ) -> Result<Vec<AxisValue>> {
        if self.is_reverse && axis.name() == self.axis_name {
            indexes.sort();
        }
        Ok(indexes)
    }
}
