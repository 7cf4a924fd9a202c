//! Datacube backends and the axis table they share.

mod array;
mod mock;

pub use array::ArrayDatacube;
pub use mock::MockDatacube;

use tracing::{debug, warn};

use crate::axis::{Axis, AxisKind, SearchMethod};
use crate::combinatorics::validate_axes;
use crate::config::SliceOptions;
use crate::error::{Result, SliceError};
use crate::path::DatacubePath;
use crate::transform::{AxisTransformation, Transformation};
use crate::tree::{NodeId, TensorIndexTree};
use crate::value::AxisValue;

/// A source of gridded data the engine can slice.
///
/// Backends provide their axis table and leaf resolution; index discovery
/// has default implementations driven by the axes' transformations.
pub trait Datacube: Send + Sync {
    /// The axes of this datacube, in slicing order.
    fn axes(&self) -> &DatacubeAxes;

    /// Fill the results of a finished tree, pruning leaves that cannot be
    /// resolved.
    fn get(&self, tree: &mut TensorIndexTree) -> Result<()>;

    fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes().get(name)
    }

    /// Axes on which one node may hold many values.
    fn compressed_axes(&self) -> &[String] {
        self.axes().compressed()
    }

    /// Values the backend stores for `axis` below `path`.
    fn natural_indexes(&self, axis: &Axis, _path: &DatacubePath) -> Result<Vec<AxisValue>> {
        self.axes().raw_values(axis.name())
    }

    /// Drop path entries this datacube does not know.
    fn fit_path(&self, path: &DatacubePath) -> DatacubePath {
        let mut fitted = path.clone();
        fitted.retain(|name| self.axes().knows(name));
        fitted
    }

    /// Discrete values of `axis` within `[lower, upper]` below `path`.
    fn get_indices(
        &self,
        path: &DatacubePath,
        axis: &Axis,
        lower: f64,
        upper: f64,
        method: SearchMethod,
    ) -> Result<Vec<AxisValue>> {
        let path = self.fit_path(path);
        let indexes = axis.find_indexes(&path, self)?;
        let found = axis.find_indices_between(&indexes, lower, upper, method)?;
        debug!(
            axis = %axis.name(),
            lower,
            upper,
            method = method.as_str(),
            count = found.len(),
            "Found indices"
        );
        Ok(found)
    }

    /// Whether `value` exists on `axis` below `path`.
    fn has_index(&self, path: &DatacubePath, axis: &Axis, value: &AxisValue) -> Result<bool> {
        let path = self.fit_path(path);
        Ok(axis.find_indexes(&path, self)?.contains(value))
    }

    /// Check that `input_axes` covers every axis exactly once.
    fn validate(&self, input_axes: &[String]) -> Result<()> {
        validate_axes(&self.axes().names(), input_axes)
    }

    /// Rewrite a tree in place into storage keys: merged axes are split
    /// back into their parts, type changes undone and grid axes collapsed
    /// into flat indexes on the node above them.
    fn unmap_tree(&self, tree: &mut TensorIndexTree) -> Result<()> {
        let mut unwanted = DatacubePath::new();
        unmap_node(self.axes(), tree, tree.root(), &mut unwanted)
    }
}

fn unmap_node(
    axes: &DatacubeAxes,
    tree: &mut TensorIndexTree,
    node: NodeId,
    unwanted: &mut DatacubePath,
) -> Result<()> {
    let had_children = !tree.children(node).is_empty();
    let mut current = node;
    if !tree.is_root(node) {
        if let Some(axis) = axes.get(tree.axis_name(node)) {
            for transformation in axis.transformations() {
                current = transformation.unmap_tree_node(tree, current, unwanted, axis)?;
            }
        }
    }
    if had_children {
        for child in tree.children(current).to_vec() {
            unmap_node(axes, tree, child, unwanted)?;
        }
    }
    Ok(())
}

// ============================================================================
// Axis table
// ============================================================================

/// Axes of a datacube built from backend-declared values and axis options.
#[derive(Debug, Clone, Default)]
pub struct DatacubeAxes {
    axes: Vec<Axis>,
    raw: Vec<(String, Vec<AxisValue>)>,
    compressed: Vec<String>,
    coupled: Vec<Vec<String>>,
    blocked: Vec<String>,
}

impl DatacubeAxes {
    /// Build the axis table for backend axes `declared` (name and stored
    /// values, in storage order).
    pub fn build(declared: Vec<(String, Vec<AxisValue>)>, options: &SliceOptions) -> Result<Self> {
        options.validate().map_err(SliceError::invalid_config)?;

        let mut table = Self {
            compressed: options.compressed_axes_config.clone(),
            ..Self::default()
        };

        let mut configured = Vec::with_capacity(options.axis_config.len());
        for config in &options.axis_config {
            let transformations = config
                .transformations
                .iter()
                .map(|t| Transformation::from_config(&config.axis_name, t))
                .collect::<Result<Vec<_>>>()?;
            for transformation in &transformations {
                table.blocked.extend(transformation.blocked_axes());
            }
            configured.push((config.axis_name.clone(), transformations));
        }

        for (name, values) in declared {
            let values = restrict_to_pre_path(&name, values, options)?;
            let transformations = configured
                .iter()
                .find(|(axis_name, _)| *axis_name == name)
                .map(|(_, t)| t.clone());
            match transformations {
                Some(transformations) => {
                    for transformation in transformations {
                        table.add_transformation_axes(transformation, &values)?;
                    }
                }
                None if table.blocked.contains(&name) => {}
                None => table.add_standard_axis(&name, &values),
            }
            table.raw.push((name, values));
        }

        // Options on axes that only exist as the output of another
        // transformation, e.g. a cyclic longitude produced by a grid mapper.
        for (name, transformations) in configured {
            if table.raw.iter().any(|(raw_name, _)| *raw_name == name) {
                continue;
            }
            if table.get(&name).is_none() {
                warn!(axis = %name, "Options given for an axis the datacube does not have");
                continue;
            }
            for transformation in transformations {
                table.add_transformation_axes(transformation, &[])?;
            }
        }

        debug!(
            axes = ?table.names(),
            compressed = ?table.compressed,
            "Built datacube axes"
        );
        Ok(table)
    }

    fn add_standard_axis(&mut self, name: &str, values: &[AxisValue]) {
        if self.get(name).is_none() {
            self.axes.push(Axis::new(name, AxisKind::infer(values)));
        }
    }

    fn add_transformation_axes(&mut self, transformation: Transformation, values: &[AxisValue]) -> Result<()> {
        let final_axes = transformation.axes_final();

        if matches!(transformation, Transformation::Merge(_)) {
            self.compressed.retain(|name| !final_axes.contains(name));
        }
        if final_axes.len() > 1 {
            if let Some(last) = final_axes.last() {
                self.compressed
                    .retain(|name| name == last || !final_axes.contains(name));
            }
            self.coupled.push(final_axes.clone());
        }

        for name in &final_axes {
            match self.axes.iter().position(|axis| axis.name() == name) {
                Some(pos) => self.axes[pos].attach(transformation.clone()),
                None => {
                    let changed = transformation.change_val_type(name, values.to_vec())?;
                    let mut axis = Axis::new(name.as_str(), AxisKind::infer(&changed));
                    axis.attach(transformation.clone());
                    self.axes.push(axis);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|axis| axis.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Axis> {
        self.axes.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.axes.iter().map(|axis| axis.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// The last axis in slicing order.
    pub fn last(&self) -> Option<&Axis> {
        self.axes.last()
    }

    pub fn compressed(&self) -> &[String] {
        &self.compressed
    }

    /// Groups of axes created together by one transformation.
    pub fn coupled(&self) -> &[Vec<String>] {
        &self.coupled
    }

    /// Whether `name` is an axis or a stored backend dimension.
    pub fn knows(&self, name: &str) -> bool {
        self.get(name).is_some() || self.raw.iter().any(|(raw, _)| raw == name)
    }

    /// Values the backend declared for a stored dimension.
    pub fn raw_values(&self, name: &str) -> Result<Vec<AxisValue>> {
        self.raw
            .iter()
            .find(|(raw, _)| raw == name)
            .map(|(_, values)| values.clone())
            .ok_or_else(|| SliceError::backend(format!("no stored values for axis {name}")))
    }
}

fn restrict_to_pre_path(name: &str, values: Vec<AxisValue>, options: &SliceOptions) -> Result<Vec<AxisValue>> {
    let Some(fixed) = options.pre_path.get(name) else {
        return Ok(values);
    };
    let wanted = match fixed {
        serde_json::Value::Array(items) => items.iter().map(AxisValue::from_json).collect::<Result<Vec<_>>>()?,
        other => vec![AxisValue::from_json(other)?],
    };
    let wanted: Vec<String> = wanted.iter().map(|v| v.to_string()).collect();
    let kept: Vec<AxisValue> = values
        .into_iter()
        .filter(|v| wanted.contains(&v.to_string()))
        .collect();
    if kept.is_empty() {
        return Err(SliceError::invalid_config(format!(
            "pre_path for {name} matches none of the stored values"
        )));
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AxisConfig, MapperOptions, Resolution, TransformationConfig};

    fn ints(values: &[i64]) -> Vec<AxisValue> {
        values.iter().map(|v| AxisValue::Int(*v)).collect()
    }

    fn strs(values: &[&str]) -> Vec<AxisValue> {
        values.iter().map(|v| AxisValue::from(*v)).collect()
    }

    fn option(axis_name: &str, transformations: Vec<TransformationConfig>) -> AxisConfig {
        AxisConfig {
            axis_name: axis_name.to_string(),
            transformations,
        }
    }

    #[test]
    fn test_mapper_axes_take_source_position() {
        let options = SliceOptions {
            axis_config: vec![
                option(
                    "values",
                    vec![TransformationConfig::Mapper(MapperOptions {
                        grid_type: "regular".to_string(),
                        resolution: Resolution::Single(2),
                        axes: vec!["latitude".into(), "longitude".into()],
                        ..MapperOptions::default()
                    })],
                ),
                option(
                    "longitude",
                    vec![TransformationConfig::Cyclic {
                        range: vec![0.0, 360.0],
                    }],
                ),
            ],
            compressed_axes_config: vec!["latitude".into(), "longitude".into(), "step".into()],
            ..SliceOptions::default()
        };
        let declared = vec![
            ("step".to_string(), ints(&[0, 6])),
            ("values".to_string(), ints(&(0..32).collect::<Vec<_>>())),
            ("level".to_string(), ints(&[1])),
        ];
        let axes = DatacubeAxes::build(declared, &options).unwrap();

        assert_eq!(axes.names(), vec!["step", "latitude", "longitude", "level"]);
        assert_eq!(axes.compressed(), &["longitude".to_string(), "step".to_string()]);
        assert_eq!(axes.coupled().len(), 1);

        let longitude = axes.get("longitude").unwrap();
        assert!(longitude.flags().has_mapper && longitude.flags().is_cyclic);
        assert_eq!(longitude.kind(), AxisKind::Float);
        assert!(axes.knows("values"));
        assert!(axes.get("values").is_none());
    }

    #[test]
    fn test_merge_blocks_partner_axis() {
        let options = SliceOptions {
            axis_config: vec![option(
                "date",
                vec![TransformationConfig::Merge {
                    other_axis: "time".to_string(),
                    linkers: vec!["T".to_string(), "00".to_string()],
                }],
            )],
            compressed_axes_config: vec!["date".into(), "time".into()],
            ..SliceOptions::default()
        };
        let declared = vec![
            ("time".to_string(), strs(&["0000", "1200"])),
            ("date".to_string(), strs(&["20000101"])),
        ];
        let axes = DatacubeAxes::build(declared, &options).unwrap();
        assert_eq!(axes.names(), vec!["date"]);
        assert_eq!(axes.get("date").unwrap().kind(), AxisKind::Timestamp);
        assert_eq!(axes.compressed(), &["time".to_string()]);
        assert_eq!(axes.raw_values("time").unwrap().len(), 2);
    }

    #[test]
    fn test_type_change_and_inference() {
        let options = SliceOptions {
            axis_config: vec![option(
                "step",
                vec![TransformationConfig::TypeChange {
                    target: "int".to_string(),
                }],
            )],
            ..SliceOptions::default()
        };
        let declared = vec![
            ("param".to_string(), strs(&["t", "u"])),
            ("step".to_string(), strs(&["0", "12"])),
            ("level".to_string(), vec![AxisValue::Float(0.5)]),
        ];
        let axes = DatacubeAxes::build(declared, &options).unwrap();
        assert!(axes.get("param").unwrap().is_unsliceable());
        assert_eq!(axes.get("step").unwrap().kind(), AxisKind::Int);
        assert_eq!(axes.get("level").unwrap().kind(), AxisKind::Float);
    }

    #[test]
    fn test_pre_path_restricts_values() {
        let mut options = SliceOptions::default();
        options
            .pre_path
            .insert("class".to_string(), serde_json::json!("od"));
        let declared = vec![("class".to_string(), strs(&["od", "rd"]))];
        let axes = DatacubeAxes::build(declared.clone(), &options).unwrap();
        assert_eq!(axes.raw_values("class").unwrap(), strs(&["od"]));

        options
            .pre_path
            .insert("class".to_string(), serde_json::json!("ea"));
        assert!(DatacubeAxes::build(declared, &options).is_err());
    }
}
