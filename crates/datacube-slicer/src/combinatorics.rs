//! Grouping of polytopes by the axes they span and request validation.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Result, SliceError};
use crate::shapes::ConvexPolytope;

/// One choice within a group.
///
/// Orthogonal polytopes outside any union share a single batch and are
/// sliced together; every other polytope is a choice of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupMember {
    Batch(Vec<Arc<ConvexPolytope>>),
    Single(Arc<ConvexPolytope>),
}

impl GroupMember {
    pub fn polytopes(&self) -> &[Arc<ConvexPolytope>] {
        match self {
            Self::Batch(polytopes) => polytopes,
            Self::Single(polytope) => std::slice::from_ref(polytope),
        }
    }
}

/// Polytopes sharing one sorted axis set.
#[derive(Debug, Clone, PartialEq)]
pub struct PolytopeGroup {
    pub axes: Vec<String>,
    pub members: Vec<GroupMember>,
}

/// Group polytopes by their axis sets, in order of first appearance.
///
/// Also returns the concatenated axes of every group, which is what a
/// datacube validates the request against.
pub fn group(polytopes: Vec<ConvexPolytope>) -> (Vec<PolytopeGroup>, Vec<String>) {
    let mut groups: Vec<PolytopeGroup> = Vec::new();
    for polytope in polytopes {
        let mut axes = polytope.axes().to_vec();
        axes.sort();

        let idx = match groups.iter().position(|g| g.axes == axes) {
            Some(idx) => idx,
            None => {
                groups.push(PolytopeGroup {
                    axes,
                    members: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let members = &mut groups[idx].members;

        let batchable = polytope.is_orthogonal() && !polytope.is_in_union();
        let polytope = Arc::new(polytope);
        if !batchable {
            members.push(GroupMember::Single(polytope));
            continue;
        }
        match members.iter_mut().find_map(|m| match m {
            GroupMember::Batch(batch) => Some(batch),
            GroupMember::Single(_) => None,
        }) {
            Some(batch) => batch.push(polytope),
            None => members.insert(0, GroupMember::Batch(vec![polytope])),
        }
    }

    let input_axes = groups.iter().flat_map(|g| g.axes.iter().cloned()).collect();
    (groups, input_axes)
}

/// Every way of picking one member from each group.
pub fn tensor_product(groups: &[PolytopeGroup]) -> Vec<Vec<GroupMember>> {
    let mut combinations: Vec<Vec<GroupMember>> = vec![Vec::new()];
    for group in groups {
        let mut next = Vec::with_capacity(combinations.len() * group.members.len());
        for combination in &combinations {
            for member in &group.members {
                let mut extended = combination.clone();
                extended.push(member.clone());
                next.push(extended);
            }
        }
        combinations = next;
    }
    combinations
}

/// The polytopes of each combination, flattened.
pub fn find_polytope_combinations(groups: &[PolytopeGroup]) -> Vec<Vec<Arc<ConvexPolytope>>> {
    tensor_product(groups)
        .into_iter()
        .map(|combination| {
            combination
                .iter()
                .flat_map(|member| member.polytopes().iter().cloned())
                .collect()
        })
        .collect()
}

/// Check that `test_axes` names each of `actual_axes` exactly once.
pub fn validate_axes(actual_axes: &[String], test_axes: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for axis in test_axes {
        if !seen.insert(axis.as_str()) {
            return Err(SliceError::AxisOverdefined(axis.clone()));
        }
    }

    if let Some(missing) = actual_axes.iter().find(|a| !seen.contains(a.as_str())) {
        return Err(SliceError::AxisUnderdefined(missing.clone()));
    }

    let actual: HashSet<&str> = actual_axes.iter().map(String::as_str).collect();
    if let Some(extra) = test_axes.iter().find(|a| !actual.contains(a.as_str())) {
        return Err(SliceError::AxisNotFound(extra.clone()));
    }
    Ok(())
}
