//! Axis transformations.
//!
//! A transformation rewrites how an axis converts between the values a
//! request is written in and the values a backend stores. Every kind
//! implements [`AxisTransformation`]; the default methods are the identity
//! so each kind only overrides the stages it changes.

mod cyclic;
pub mod mapper;
mod merge;
mod reverse;
mod type_change;

pub use cyclic::CyclicTransform;
pub use mapper::MapperTransform;
pub use merge::MergeTransform;
pub use reverse::ReverseTransform;
pub use type_change::TypeChangeTransform;

use crate::axis::{Axis, SearchMethod};
use crate::config::TransformationConfig;
use crate::datacube::DatacubeAxes;
use crate::error::Result;
use crate::path::DatacubePath;
use crate::tree::{NodeId, TensorIndexTree};
use crate::value::AxisValue;

/// Search callback handed to a transformation by the axis it is attached to.
pub type InnerSearch<'a> = dyn Fn(f64, f64) -> Result<Vec<AxisValue>> + 'a;

/// Behaviour shared by all axis transformations.
pub trait AxisTransformation {
    /// Physical axes created by this transformation.
    fn axes_final(&self) -> Vec<String>;

    /// Axes superseded by this transformation; they are never materialized.
    fn blocked_axes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Axes that are stripped from leaf paths before a backend lookup.
    fn unwanted_axes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Convert the declared values of `axis_name` to their request-space type.
    fn change_val_type(&self, _axis_name: &str, values: Vec<AxisValue>) -> Result<Vec<AxisValue>> {
        Ok(values)
    }

    fn find_modified_indexes(
        &self,
        indexes: Vec<AxisValue>,
        _path: &DatacubePath,
        _axes: &DatacubeAxes,
        _axis: &Axis,
    ) -> Result<Vec<AxisValue>> {
        Ok(indexes)
    }

    /// Select values inside `[low, up]`, delegating to `inner` for the plain search.
    fn find_indices_between(
        &self,
        _axis: &Axis,
        _indexes: &[AxisValue],
        low: f64,
        up: f64,
        _method: SearchMethod,
        inner: &InnerSearch<'_>,
    ) -> Result<Vec<AxisValue>> {
        inner(low, up)
    }

    fn unmap_path_key(
        &self,
        _key_value_path: &mut DatacubePath,
        _leaf_path: &mut DatacubePath,
        _unwanted_path: &mut DatacubePath,
        _axis: &Axis,
    ) -> Result<()> {
        Ok(())
    }

    /// Rewrite a tree node into storage keys. Returns the node the walk
    /// should continue from.
    fn unmap_tree_node(
        &self,
        _tree: &mut TensorIndexTree,
        node: NodeId,
        _unwanted_path: &mut DatacubePath,
        _axis: &Axis,
    ) -> Result<NodeId> {
        Ok(node)
    }
}

/// A transformation attached to an axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    Cyclic(CyclicTransform),
    Merge(MergeTransform),
    TypeChange(TypeChangeTransform),
    Reverse(ReverseTransform),
    Mapper(MapperTransform),
}

impl Transformation {
    /// Build the transformation described by `config` for the source axis `name`.
    pub fn from_config(name: &str, config: &TransformationConfig) -> Result<Self> {
        Ok(match config {
            TransformationConfig::Cyclic { range } => {
                Self::Cyclic(CyclicTransform::from_range(name, range)?)
            }
            TransformationConfig::Merge {
                other_axis,
                linkers,
            } => Self::Merge(MergeTransform::new(name, other_axis, linkers)?),
            TransformationConfig::TypeChange { target } => {
                Self::TypeChange(TypeChangeTransform::new(name, target)?)
            }
            TransformationConfig::Reverse { is_reverse } => {
                Self::Reverse(ReverseTransform::new(name, *is_reverse))
            }
            TransformationConfig::Mapper(options) => {
                Self::Mapper(MapperTransform::from_options(name, options)?)
            }
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Cyclic(_) => "cyclic",
            Self::Merge(_) => "merge",
            Self::TypeChange(_) => "type_change",
            Self::Reverse(_) => "reverse",
            Self::Mapper(_) => "mapper",
        }
    }

    fn inner(&self) -> &dyn AxisTransformation {
        match self {
            Self::Cyclic(t) => t,
            Self::Merge(t) => t,
            Self::TypeChange(t) => t,
            Self::Reverse(t) => t,
            Self::Mapper(t) => t,
        }
    }
}

impl AxisTransformation for Transformation {
    fn axes_final(&self) -> Vec<String> {
        self.inner().axes_final()
    }

    fn blocked_axes(&self) -> Vec<String> {
        self.inner().blocked_axes()
    }

    fn unwanted_axes(&self) -> Vec<String> {
        self.inner().unwanted_axes()
    }

    fn change_val_type(&self, axis_name: &str, values: Vec<AxisValue>) -> Result<Vec<AxisValue>> {
        self.inner().change_val_type(axis_name, values)
    }

    fn find_modified_indexes(
        &self,
        indexes: Vec<AxisValue>,
        path: &DatacubePath,
        axes: &DatacubeAxes,
        axis: &Axis,
    ) -> Result<Vec<AxisValue>> {
        self.inner()
            .find_modified_indexes(indexes, path, axes, axis)
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
        self.inner()
            .find_indices_between(axis, indexes, low, up, method, inner)
    }

    fn unmap_path_key(
        &self,
        key_value_path: &mut DatacubePath,
        leaf_path: &mut DatacubePath,
        unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<()> {
        self.inner()
            .unmap_path_key(key_value_path, leaf_path, unwanted_path, axis)
    }

    fn unmap_tree_node(
        &self,
        tree: &mut TensorIndexTree,
        node: NodeId,
        unwanted_path: &mut DatacubePath,
        axis: &Axis,
    ) -> Result<NodeId> {
        self.inner().unmap_tree_node(tree, node, unwanted_path, axis)
    }
}
