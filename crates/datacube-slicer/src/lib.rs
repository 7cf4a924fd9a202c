//! Convex-polytope slicing of gridded datacubes.
//!
//! A request is a set of shapes over named axes. The engine expands them into
//! convex polytopes, walks the datacube axes in order and intersects the
//! polytopes with a hyperplane at every discrete grid value, producing a
//! [`TensorIndexTree`] that a backend then resolves into values.
//!
//! Axes may carry transformations (cyclic wraparound, merged axes, type
//! changes, reversal and grid mappers for spherical grids) that translate
//! between request coordinates and storage coordinates.

pub mod axis;
pub mod combinatorics;
pub mod config;
pub mod datacube;
pub mod engine;
pub mod error;
pub mod hull;
pub mod path;
pub mod request;
pub mod retriever;
pub mod shapes;
pub mod transform;
pub mod tree;
pub mod value;

pub use axis::{Axis, AxisKind, SearchMethod};
pub use config::{AxisConfig, EngineConfig, SliceOptions, TransformationConfig};
pub use datacube::{ArrayDatacube, Datacube, DatacubeAxes, MockDatacube};
pub use engine::HullSlicer;
pub use error::{Result, SliceError};
pub use path::DatacubePath;
pub use request::Request;
pub use retriever::Retriever;
pub use shapes::{ConvexPolytope, Shape};
pub use tree::{NodeAxis, NodeId, TensorIndexTree};
pub use value::AxisValue;
