//! The hull slicing engine.
//!
//! Walks the datacube axes in order, intersecting every polytope with the
//! hyperplane at each discovered grid value and recording the values in a
//! [`TensorIndexTree`].

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::axis::{Axis, SearchMethod};
use crate::combinatorics::{find_polytope_combinations, group};
use crate::config::EngineConfig;
use crate::datacube::Datacube;
use crate::error::{Result, SliceError};
use crate::hull;
use crate::path::DatacubePath;
use crate::shapes::ConvexPolytope;
use crate::tree::{NodeAxis, NodeId, TensorIndexTree};
use crate::value::AxisValue;

type Polytopes = Vec<Arc<ConvexPolytope>>;

/// Memoised lookups of one extraction.
///
/// Keys carry the value of the first coupled axis on the path, since that is
/// the only part of the path grid axes depend on.
#[derive(Debug, Default)]
struct SliceCache {
    enabled: bool,
    values_between: HashMap<(Option<AxisValue>, String, u64, u64, SearchMethod), Vec<AxisValue>>,
    has_index: HashMap<(Option<AxisValue>, String, AxisValue), bool>,
    remapped: HashMap<(String, AxisValue), AxisValue>,
}

impl SliceCache {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }
}

/// Builds index trees from convex polytopes.
#[derive(Debug, Clone, Default)]
pub struct HullSlicer {
    config: EngineConfig,
}

impl HullSlicer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the index tree of `polytopes` over `datacube`.
    ///
    /// Leaves carry no results yet; pass the tree to [`Datacube::get`].
    pub fn extract<D: Datacube + ?Sized>(
        &self,
        datacube: &D,
        polytopes: Vec<ConvexPolytope>,
    ) -> Result<TensorIndexTree> {
        let polytope_count = polytopes.len();
        let compressed = find_compressed_axes(datacube, &polytopes);
        let polytopes = normalize_polytopes(datacube, polytopes)?;

        let (groups, input_axes) = group(polytopes);
        datacube.validate(&input_axes)?;
        let combinations = find_polytope_combinations(&groups);
        debug!(
            groups = groups.len(),
            combinations = combinations.len(),
            compressed = ?compressed,
            "Grouped polytopes"
        );

        let sub_trees: Vec<TensorIndexTree> = if self.config.parallel {
            combinations
                .into_par_iter()
                .map(|polys| self.slice_tree(datacube, polys, &compressed))
                .collect::<Result<_>>()?
        } else {
            combinations
                .into_iter()
                .map(|polys| self.slice_tree(datacube, polys, &compressed))
                .collect::<Result<_>>()?
        };

        let mut tree = TensorIndexTree::new();
        for sub_tree in &sub_trees {
            tree.merge(sub_tree);
        }
        info!(
            polytopes = polytope_count,
            combinations = sub_trees.len(),
            leaves = tree.leaves().len(),
            "Extracted index tree"
        );
        Ok(tree)
    }

    /// Slice one combination of polytopes into its own tree.
    fn slice_tree<D: Datacube + ?Sized>(
        &self,
        datacube: &D,
        polytopes: Polytopes,
        compressed: &[String],
    ) -> Result<TensorIndexTree> {
        let mut cache = SliceCache::new(self.config.cache_indices);
        let mut tree = TensorIndexTree::new();
        let mut frontier = vec![(tree.root(), polytopes)];

        for axis in datacube.axes().iter() {
            let mut next = Vec::new();
            for (node, polys) in frontier {
                if !tree.contains(node) {
                    continue;
                }
                self.build_branch(datacube, axis, &mut tree, node, polys, compressed, &mut cache, &mut next)?;
            }
            frontier = next;
        }
        Ok(tree)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_branch<D: Datacube + ?Sized>(
        &self,
        datacube: &D,
        axis: &Axis,
        tree: &mut TensorIndexTree,
        node: NodeId,
        polytopes: Polytopes,
        compressed: &[String],
        cache: &mut SliceCache,
        next: &mut Vec<(NodeId, Polytopes)>,
    ) -> Result<()> {
        let (on_axis, carried): (Polytopes, Polytopes) =
            polytopes.into_iter().partition(|p| p.spans(axis.name()));
        trace!(
            axis = %axis.name(),
            node = node.index(),
            polytopes = on_axis.len(),
            "Building branch"
        );
        if on_axis.is_empty() {
            tree.remove_branch(node);
            return Ok(());
        }

        let path = tree.flatten(node);
        let is_compressed = compressed.iter().any(|c| c == axis.name());

        if axis.is_unsliceable() {
            self.build_unsliceable_children(
                datacube, axis, tree, node, &path, &on_axis, &carried, is_compressed, cache, next,
            )?;
        } else if is_compressed {
            let mut child: Option<NodeId> = None;
            let mut slices = Vec::new();
            for polytope in &on_axis {
                let values = self.find_values_between(datacube, axis, &path, polytope, cache)?;
                let Some(first) = values.first() else {
                    continue;
                };
                if let Some(sliced) =
                    hull::slice(polytope, axis.name(), axis.to_float(first)?, self.config.hull_tolerance)?
                {
                    slices.push(Arc::new(sliced));
                }
                for value in &values {
                    let remapped = remap_value(axis, value, cache)?;
                    match child {
                        Some(id) => tree.add_value(id, remapped),
                        None => {
                            child = Some(tree.create_child(node, NodeAxis::from_axis(axis), vec![remapped]))
                        }
                    }
                }
            }
            if let Some(child) = child {
                let mut polys = carried;
                polys.extend(slices);
                next.push((child, polys));
            }
        } else {
            // Children reused by a later polytope collect that polytope's slice too.
            let mut created: HashMap<NodeId, usize> = HashMap::new();
            for polytope in &on_axis {
                let values = self.find_values_between(datacube, axis, &path, polytope, cache)?;
                for value in &values {
                    let sliced = hull::slice(
                        polytope,
                        axis.name(),
                        axis.to_float(value)?,
                        self.config.hull_tolerance,
                    )?;
                    let remapped = remap_value(axis, value, cache)?;
                    let child = tree.create_child(node, NodeAxis::from_axis(axis), vec![remapped]);
                    match created.get(&child) {
                        Some(&pos) => next[pos].1.extend(sliced.map(Arc::new)),
                        None => {
                            let mut polys = carried.clone();
                            polys.extend(sliced.map(Arc::new));
                            created.insert(child, next.len());
                            next.push((child, polys));
                        }
                    }
                }
            }
        }

        if tree.children(node).is_empty() {
            tree.remove_branch(node);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_unsliceable_children<D: Datacube + ?Sized>(
        &self,
        datacube: &D,
        axis: &Axis,
        tree: &mut TensorIndexTree,
        node: NodeId,
        path: &DatacubePath,
        on_axis: &[Arc<ConvexPolytope>],
        carried: &Polytopes,
        is_compressed: bool,
        cache: &mut SliceCache,
        next: &mut Vec<(NodeId, Polytopes)>,
    ) -> Result<()> {
        let (coupled, query_path) = coupled_path(datacube, path);
        let mut grouped: Option<NodeId> = None;

        for polytope in on_axis {
            if !polytope.is_flat() {
                return Err(SliceError::unsliceable(axis.name()));
            }
            let value = polytope.points()[0][0].clone();

            let key = (coupled.clone(), axis.name().to_string(), value.clone());
            let found = match cache.has_index.get(&key) {
                Some(found) if cache.enabled => *found,
                _ => {
                    let found = datacube.has_index(&query_path, axis, &value)?;
                    if cache.enabled {
                        cache.has_index.insert(key, found);
                    }
                    found
                }
            };
            if !found {
                return Err(SliceError::index_not_found(
                    axis.name(),
                    value.to_string(),
                    value.type_name(),
                ));
            }

            match grouped {
                Some(child) if is_compressed => tree.add_value(child, value),
                _ => {
                    let child = tree.create_child(node, NodeAxis::from_axis(axis), vec![value]);
                    if is_compressed {
                        grouped = Some(child);
                    }
                    if !next.iter().any(|(id, _)| *id == child) {
                        next.push((child, carried.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Discrete values of `axis` within the polytope's extents, widened by
    /// the axis tolerance.
    fn find_values_between<D: Datacube + ?Sized>(
        &self,
        datacube: &D,
        axis: &Axis,
        path: &DatacubePath,
        polytope: &ConvexPolytope,
        cache: &mut SliceCache,
    ) -> Result<Vec<AxisValue>> {
        let (lower, upper) = polytope.extents(axis.name())?;
        let lower = lower - axis.tol();
        let upper = upper + axis.tol();
        let method = polytope.method();

        let (coupled, query_path) = coupled_path(datacube, path);
        let key = (
            coupled,
            axis.name().to_string(),
            lower.to_bits(),
            upper.to_bits(),
            method,
        );
        if cache.enabled {
            if let Some(values) = cache.values_between.get(&key) {
                return Ok(values.clone());
            }
        }
        let values = datacube.get_indices(&query_path, axis, lower, upper, method)?;
        if cache.enabled {
            cache.values_between.insert(key, values.clone());
        }
        Ok(values)
    }
}

/// The value of the first coupled axis on `path`, and the path to query
/// with: only that axis when it is present, the full path otherwise.
fn coupled_path<D: Datacube + ?Sized>(
    datacube: &D,
    path: &DatacubePath,
) -> (Option<AxisValue>, DatacubePath) {
    let first = datacube
        .axes()
        .coupled()
        .first()
        .and_then(|group| group.first());
    match first.and_then(|name| path.get(name).map(|values| (name, values))) {
        Some((name, values)) => {
            let mut query = DatacubePath::new();
            query.insert(name.clone(), values.to_vec());
            (values.first().cloned(), query)
        }
        None => (None, path.clone()),
    }
}

/// Canonical value stored in the tree: cyclic values are folded into the
/// half-open axis range and rounding axes are rounded to their tolerance.
fn remap_value(axis: &Axis, value: &AxisValue, cache: &mut SliceCache) -> Result<AxisValue> {
    let key = (axis.name().to_string(), value.clone());
    if cache.enabled {
        if let Some(remapped) = cache.remapped.get(&key) {
            return Ok(remapped.clone());
        }
    }

    let remapped = if let Some(cyclic) = axis.cyclic() {
        let canonical = cyclic.canonical_value(axis, axis.to_float(value)?);
        let canonical = if axis.can_round() {
            axis.round(canonical)
        } else {
            canonical
        };
        axis.from_float(canonical)?
    } else {
        match value {
            AxisValue::Float(x) if axis.can_round() => AxisValue::Float(axis.round(*x)),
            _ => value.clone(),
        }
    };

    if cache.enabled {
        cache.remapped.insert(key, remapped.clone());
    }
    Ok(remapped)
}

/// Axes on which one node may hold many values.
///
/// An axis qualifies when an orthogonal polytope spans it and the datacube
/// allows compressing it. The last datacube axis always qualifies. Axes
/// spanned by a polytope inside a union never do.
pub fn find_compressed_axes<D: Datacube + ?Sized>(
    datacube: &D,
    polytopes: &[ConvexPolytope],
) -> Vec<String> {
    let allowed = datacube.compressed_axes();
    let mut compressed: Vec<String> = Vec::new();
    for polytope in polytopes.iter().filter(|p| p.is_orthogonal()) {
        for axis in polytope.axes() {
            if allowed.contains(axis) && !compressed.contains(axis) {
                compressed.push(axis.clone());
            }
        }
    }
    if let Some(last) = datacube.axes().last() {
        if !compressed.iter().any(|c| c == last.name()) {
            compressed.push(last.name().to_string());
        }
    }
    for polytope in polytopes.iter().filter(|p| p.is_in_union()) {
        compressed.retain(|c| !polytope.spans(c));
    }
    compressed
}

/// Convert polytope coordinates to axis floats and drop duplicate points.
///
/// Unsliceable axes keep their values; a polytope with extent on one of
/// them is rejected here.
fn normalize_polytopes<D: Datacube + ?Sized>(
    datacube: &D,
    polytopes: Vec<ConvexPolytope>,
) -> Result<Vec<ConvexPolytope>> {
    polytopes
        .into_iter()
        .map(|mut polytope| {
            if let [name] = polytope.axes() {
                if let Some(axis) = datacube.axis(name).filter(|a| a.is_unsliceable()) {
                    if !polytope.is_flat() {
                        return Err(SliceError::unsliceable(name));
                    }
                    let value = axis.parse(&polytope.points()[0][0])?;
                    return Ok(polytope.with_points(vec![name.clone()], vec![vec![value]]));
                }
            }
            if let Some(axis) = polytope
                .axes()
                .iter()
                .filter_map(|name| datacube.axis(name))
                .find(|axis| axis.is_unsliceable())
            {
                return Err(SliceError::unsliceable(axis.name()));
            }

            let axes: Vec<Option<Axis>> = polytope
                .axes()
                .iter()
                .map(|name| datacube.axis(name).cloned())
                .collect();
            polytope.normalize(|idx, value| match &axes[idx] {
                Some(axis) => match value {
                    AxisValue::Float(x) if x.is_infinite() => Ok(Some(*x)),
                    _ => axis.to_float(&axis.parse(value)?).map(Some),
                },
                None => Ok(None),
            })?;
            Ok(polytope)
        })
        .collect()
}
