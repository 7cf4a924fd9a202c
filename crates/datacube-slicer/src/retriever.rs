//! Request-level facade over an engine and a datacube.

use std::time::Instant;

use tracing::info;

use crate::config::EngineConfig;
use crate::datacube::Datacube;
use crate::engine::HullSlicer;
use crate::error::{Result, SliceError};
use crate::request::Request;
use crate::shapes::ConvexPolytope;
use crate::tree::TensorIndexTree;

/// Slices requests against one datacube and resolves the results.
#[derive(Debug)]
pub struct Retriever<D: Datacube> {
    datacube: D,
    engine: HullSlicer,
}

impl<D: Datacube> Retriever<D> {
    pub fn new(datacube: D, config: EngineConfig) -> Result<Self> {
        config.validate().map_err(SliceError::invalid_config)?;
        Ok(Self {
            datacube,
            engine: HullSlicer::new(config),
        })
    }

    pub fn datacube(&self) -> &D {
        &self.datacube
    }

    /// Index tree of `polytopes` without fetching any values.
    pub fn slice(&self, polytopes: Vec<ConvexPolytope>) -> Result<TensorIndexTree> {
        self.engine.extract(&self.datacube, polytopes)
    }

    /// Extract the request and fill the leaves with datacube values.
    pub fn retrieve(&self, request: &Request) -> Result<TensorIndexTree> {
        let start = Instant::now();
        let mut tree = self.slice(request.polytopes()?)?;
        self.datacube.get(&mut tree)?;
        info!(
            shapes = request.shapes().len(),
            leaves = tree.leaves().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved request"
        );
        Ok(tree)
    }

    /// Copy of `tree` rewritten into the keys the storage uses.
    pub fn storage_tree(&self, tree: &TensorIndexTree) -> Result<TensorIndexTree> {
        let mut storage = tree.clone();
        self.datacube.unmap_tree(&mut storage)?;
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::SearchMethod;
    use crate::datacube::MockDatacube;
    use crate::shapes::Shape;
    use crate::value::AxisValue;

    #[test]
    fn test_invalid_engine_config() {
        let mock = MockDatacube::new(&[("x", 2)]).unwrap();
        let config = EngineConfig {
            hull_tolerance: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(Retriever::new(mock, config), Err(SliceError::InvalidConfig(_))));
    }

    #[test]
    fn test_retrieve_fills_offsets() {
        let mock = MockDatacube::new(&[("x", 4), ("y", 5)]).unwrap();
        let retriever = Retriever::new(mock, EngineConfig::default()).unwrap();
        let request = Request::new(vec![
            Shape::Select {
                axis: "x".to_string(),
                values: vec![AxisValue::Int(2)],
                method: SearchMethod::Strict,
            },
            Shape::Span {
                axis: "y".to_string(),
                lower: AxisValue::Int(1),
                upper: AxisValue::Int(3),
                method: SearchMethod::Strict,
            },
        ])
        .unwrap();

        let tree = retriever.retrieve(&request).unwrap();
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(tree.result(leaves[0]), &[11.0, 12.0, 13.0]);
    }
}
