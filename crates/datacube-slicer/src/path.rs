//! Ordered axis-to-values mapping used to address a position in the datacube.

use crate::value::AxisValue;

/// An insertion-ordered map from axis name to the values selected on it.
///
/// Paths are short (one entry per datacube axis) so a vector with linear
/// lookup keeps ordering without pulling in an ordered-map crate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatacubePath {
    entries: Vec<(String, Vec<AxisValue>)>,
}

impl DatacubePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, axis: &str) -> Option<&[AxisValue]> {
        self.entries
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, values)| values.as_slice())
    }

    /// First value stored for an axis.
    pub fn first(&self, axis: &str) -> Option<&AxisValue> {
        self.get(axis).and_then(|values| values.first())
    }

    pub fn contains(&self, axis: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == axis)
    }

    /// Insert or replace the values of an axis, keeping its original position.
    pub fn insert(&mut self, axis: impl Into<String>, values: Vec<AxisValue>) {
        let axis = axis.into();
        match self.entries.iter_mut().find(|(name, _)| *name == axis) {
            Some(entry) => entry.1 = values,
            None => self.entries.push((axis, values)),
        }
    }

    pub fn remove(&mut self, axis: &str) -> Option<Vec<AxisValue>> {
        let pos = self.entries.iter().position(|(name, _)| name == axis)?;
        Some(self.entries.remove(pos).1)
    }

    /// Copy every entry of `other` into this path.
    pub fn extend(&mut self, other: &DatacubePath) {
        for (axis, values) in &other.entries {
            self.insert(axis.clone(), values.clone());
        }
    }

    /// Keep only the entries whose axis satisfies the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|(name, _)| keep(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AxisValue])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn axes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(name, values)| {
                let values = values.iter().map(AxisValue::to_json).collect();
                (name.clone(), serde_json::Value::Array(values))
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<AxisValue>)> for DatacubePath {
    fn from_iter<I: IntoIterator<Item = (S, Vec<AxisValue>)>>(iter: I) -> Self {
        let mut path = Self::new();
        for (axis, values) in iter {
            path.insert(axis, values);
        }
        path
    }
}
