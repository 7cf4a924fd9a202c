//! Request geometry: convex polytopes and the shapes that produce them.
//!
//! Every [`Shape`] expands into one or more [`ConvexPolytope`]s over its axes.
//! Shapes are serde-tagged by `shape` so requests can be written in YAML or
//! JSON.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::axis::SearchMethod;
use crate::error::{Result, SliceError};
use crate::value::AxisValue;

/// Number of segments of the polygon circumscribing a disk.
const DISK_SEGMENTS: usize = 12;

/// Dihedral angle of a regular icosahedron, in degrees.
const ICOSAHEDRON_DIHEDRAL: f64 = 138.19;

// ============================================================================
// Convex polytope
// ============================================================================

/// An ordered point set over a tuple of axes, the unit the engine slices.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolytope {
    axes: Vec<String>,
    points: Vec<Vec<AxisValue>>,
    method: SearchMethod,
    orthogonal: bool,
    in_union: bool,
}

impl ConvexPolytope {
    pub fn new(axes: Vec<String>, points: Vec<Vec<AxisValue>>) -> Result<Self> {
        if axes.is_empty() {
            return Err(SliceError::invalid_shape("a polytope needs at least one axis"));
        }
        if points.is_empty() {
            return Err(SliceError::invalid_shape(format!(
                "polytope over {axes:?} has no points"
            )));
        }
        if let Some(point) = points.iter().find(|p| p.len() != axes.len()) {
            return Err(SliceError::invalid_shape(format!(
                "point {point:?} does not match axes {axes:?}"
            )));
        }
        Ok(Self {
            axes,
            points,
            method: SearchMethod::Strict,
            orthogonal: false,
            in_union: false,
        })
    }

    /// Polytope over float coordinates.
    pub fn from_coordinates(axes: Vec<String>, points: Vec<Vec<f64>>) -> Result<Self> {
        let points = points
            .into_iter()
            .map(|p| p.into_iter().map(AxisValue::Float).collect())
            .collect();
        Self::new(axes, points)
    }

    pub fn with_method(mut self, method: SearchMethod) -> Self {
        self.method = method;
        self
    }

    /// Mark this polytope as an axis-aligned box.
    pub fn orthogonal(mut self) -> Self {
        self.orthogonal = true;
        self
    }

    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    pub fn points(&self) -> &[Vec<AxisValue>] {
        &self.points
    }

    pub fn method(&self) -> SearchMethod {
        self.method
    }

    pub fn is_orthogonal(&self) -> bool {
        self.orthogonal
    }

    pub fn is_in_union(&self) -> bool {
        self.in_union
    }

    pub(crate) fn mark_in_union(&mut self) {
        self.in_union = true;
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    pub fn axis_index(&self, axis: &str) -> Option<usize> {
        self.axes.iter().position(|a| a == axis)
    }

    pub fn spans(&self, axis: &str) -> bool {
        self.axis_index(axis).is_some()
    }

    /// One axis and a single distinct point.
    pub fn is_flat(&self) -> bool {
        self.axes.len() == 1 && self.points.iter().all(|p| p == &self.points[0])
    }

    /// Same axes and flags with new points.
    pub(crate) fn with_points(&self, axes: Vec<String>, points: Vec<Vec<AxisValue>>) -> Self {
        Self {
            axes,
            points,
            method: self.method,
            orthogonal: self.orthogonal,
            in_union: self.in_union,
        }
    }

    /// Float coordinates of every point.
    pub fn coordinates(&self) -> Result<Vec<Vec<f64>>> {
        self.points
            .iter()
            .map(|point| point.iter().map(numeric).collect())
            .collect()
    }

    /// Lowest and highest coordinate of the polytope along `axis`.
    pub fn extents(&self, axis: &str) -> Result<(f64, f64)> {
        let idx = self
            .axis_index(axis)
            .ok_or_else(|| SliceError::AxisNotFound(axis.to_string()))?;
        let mut lower = f64::INFINITY;
        let mut upper = f64::NEG_INFINITY;
        for point in &self.points {
            let x = numeric(&point[idx])?;
            lower = lower.min(x);
            upper = upper.max(x);
        }
        Ok((lower, upper))
    }

    /// Replace the points with their float form on the leading sliceable
    /// axes and drop exact duplicates.
    pub(crate) fn normalize(&mut self, convert: impl Fn(usize, &AxisValue) -> Result<Option<f64>>) -> Result<()> {
        'axes: for idx in 0..self.axes.len() {
            for point in self.points.iter_mut() {
                match convert(idx, &point[idx])? {
                    Some(x) => point[idx] = AxisValue::Float(x),
                    None => break 'axes,
                }
            }
        }
        let mut unique: Vec<Vec<AxisValue>> = Vec::with_capacity(self.points.len());
        for point in self.points.drain(..) {
            if !unique.contains(&point) {
                unique.push(point);
            }
        }
        self.points = unique;
        Ok(())
    }
}

fn numeric(value: &AxisValue) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| SliceError::invalid_shape(format!("coordinate {value} is not numeric")))
}

// ============================================================================
// Shapes
// ============================================================================

/// User-facing geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    /// Discrete values on one axis. The only shape usable on unsliceable axes.
    Select {
        axis: String,
        values: Vec<AxisValue>,
        #[serde(default)]
        method: SearchMethod,
    },
    /// Closed range on one axis.
    Span {
        axis: String,
        lower: AxisValue,
        upper: AxisValue,
        #[serde(default)]
        method: SearchMethod,
    },
    /// Every value of an axis.
    All { axis: String },
    /// Individual coordinate tuples.
    Point {
        axes: Vec<String>,
        values: Vec<Vec<AxisValue>>,
        #[serde(default)]
        method: SearchMethod,
    },
    /// Axis-aligned box given by two opposite corners.
    Box {
        axes: Vec<String>,
        lower_corner: Vec<AxisValue>,
        upper_corner: Vec<AxisValue>,
        #[serde(default)]
        method: SearchMethod,
    },
    /// Ellipse in two axes.
    Disk {
        axes: Vec<String>,
        centre: Vec<f64>,
        radius: Vec<f64>,
    },
    /// Ellipsoid in three axes.
    Ellipsoid {
        axes: Vec<String>,
        centre: Vec<f64>,
        radius: Vec<f64>,
    },
    /// Simple polygon in two axes given by its exterior points.
    Polygon {
        axes: Vec<String>,
        points: Vec<Vec<f64>>,
    },
    /// A shape swept along a straight line.
    PathSegment {
        axes: Vec<String>,
        #[serde(rename = "swept")]
        shape: std::boxed::Box<Shape>,
        start: Vec<f64>,
        end: Vec<f64>,
    },
    /// A shape swept along a polyline.
    Path {
        axes: Vec<String>,
        #[serde(rename = "swept")]
        shape: std::boxed::Box<Shape>,
        points: Vec<Vec<f64>>,
        #[serde(default)]
        closed: bool,
    },
    /// Union of shapes over the same axes.
    Union { axes: Vec<String>, shapes: Vec<Shape> },
}

impl Shape {
    pub fn axes(&self) -> Vec<String> {
        match self {
            Self::Select { axis, .. } | Self::Span { axis, .. } | Self::All { axis } => {
                vec![axis.clone()]
            }
            Self::Point { axes, .. }
            | Self::Box { axes, .. }
            | Self::Disk { axes, .. }
            | Self::Ellipsoid { axes, .. }
            | Self::Polygon { axes, .. }
            | Self::PathSegment { axes, .. }
            | Self::Path { axes, .. }
            | Self::Union { axes, .. } => axes.clone(),
        }
    }

    /// Expand the shape into convex polytopes.
    pub fn polytopes(&self) -> Result<Vec<ConvexPolytope>> {
        match self {
            Self::Select {
                axis,
                values,
                method,
            } => values
                .iter()
                .map(|v| {
                    ConvexPolytope::new(vec![axis.clone()], vec![vec![v.clone()]])
                        .map(|p| p.with_method(*method).orthogonal())
                })
                .collect(),
            Self::Span {
                axis,
                lower,
                upper,
                method,
            } => Ok(vec![ConvexPolytope::new(
                vec![axis.clone()],
                vec![vec![lower.clone()], vec![upper.clone()]],
            )?
            .with_method(*method)
            .orthogonal()]),
            Self::All { axis } => Ok(vec![ConvexPolytope::from_coordinates(
                vec![axis.clone()],
                vec![vec![f64::NEG_INFINITY], vec![f64::INFINITY]],
            )?
            .orthogonal()]),
            Self::Point {
                axes,
                values,
                method,
            } => values
                .iter()
                .map(|point| {
                    ConvexPolytope::new(axes.clone(), vec![point.clone()])
                        .map(|p| p.with_method(*method))
                })
                .collect(),
            Self::Box {
                axes,
                lower_corner,
                upper_corner,
                method,
            } => Ok(vec![box_polytope(axes, lower_corner, upper_corner)?.with_method(*method)]),
            Self::Disk {
                axes,
                centre,
                radius,
            } => Ok(vec![disk_polytope(axes, centre, radius)?]),
            Self::Ellipsoid {
                axes,
                centre,
                radius,
            } => Ok(vec![ellipsoid_polytope(axes, centre, radius)?]),
            Self::Polygon { axes, points } => polygon_polytopes(axes, points),
            Self::PathSegment {
                axes,
                shape,
                start,
                end,
            } => sweep(axes, shape, start, end),
            Self::Path {
                axes,
                shape,
                points,
                closed,
            } => {
                let mut segments = Vec::new();
                for pair in points.windows(2) {
                    segments.push(Self::PathSegment {
                        axes: axes.clone(),
                        shape: shape.clone(),
                        start: pair[0].clone(),
                        end: pair[1].clone(),
                    });
                }
                if *closed && points.len() > 1 {
                    segments.push(Self::PathSegment {
                        axes: axes.clone(),
                        shape: shape.clone(),
                        start: points[points.len() - 1].clone(),
                        end: points[0].clone(),
                    });
                }
                Self::Union {
                    axes: axes.clone(),
                    shapes: segments,
                }
                .polytopes()
            }
            Self::Union { axes, shapes } => {
                let mut polytopes = Vec::new();
                for shape in shapes {
                    if shape.axes() != *axes {
                        return Err(SliceError::invalid_shape(format!(
                            "union over {axes:?} contains a shape over {:?}",
                            shape.axes()
                        )));
                    }
                    polytopes.extend(shape.polytopes()?);
                }
                for polytope in polytopes.iter_mut() {
                    polytope.mark_in_union();
                }
                Ok(polytopes)
            }
        }
    }
}

fn check_len(what: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(SliceError::invalid_shape(format!(
            "{what} has {len} coordinates, expected {expected}"
        )));
    }
    Ok(())
}

fn box_polytope(axes: &[String], lower: &[AxisValue], upper: &[AxisValue]) -> Result<ConvexPolytope> {
    let dimension = axes.len();
    check_len("box lower corner", lower.len(), dimension)?;
    check_len("box upper corner", upper.len(), dimension)?;

    // Vertex i takes the upper coordinate on every axis whose bit is set in i.
    let vertices = (0..1usize << dimension)
        .map(|i| {
            (0..dimension)
                .map(|d| {
                    if i >> d & 1 == 1 {
                        upper[d].clone()
                    } else {
                        lower[d].clone()
                    }
                })
                .collect()
        })
        .collect();
    Ok(ConvexPolytope::new(axes.to_vec(), vertices)?.orthogonal())
}

fn disk_polytope(axes: &[String], centre: &[f64], radius: &[f64]) -> Result<ConvexPolytope> {
    check_len("disk axes", axes.len(), 2)?;
    check_len("disk centre", centre.len(), 2)?;
    check_len("disk radius", radius.len(), 2)?;

    // Circumscribe the circle so the polygon never cuts off grid points.
    let expanded = 1.0 / (PI / DISK_SEGMENTS as f64).cos();
    let points = (0..DISK_SEGMENTS)
        .map(|i| {
            let angle = 2.0 * PI / DISK_SEGMENTS as f64 * i as f64;
            vec![
                centre[0] + angle.cos() * expanded * radius[0],
                centre[1] + angle.sin() * expanded * radius[1],
            ]
        })
        .collect();
    ConvexPolytope::from_coordinates(axes.to_vec(), points)
}

fn ellipsoid_polytope(axes: &[String], centre: &[f64], radius: &[f64]) -> Result<ConvexPolytope> {
    check_len("ellipsoid axes", axes.len(), 3)?;
    check_len("ellipsoid centre", centre.len(), 3)?;
    check_len("ellipsoid radius", radius.len(), 3)?;

    let theta = ICOSAHEDRON_DIHEDRAL / 180.0 * PI;
    let coeff = (2.0 / (theta / 2.0).tan()) * (PI / 3.0).tan();
    let golden = (1.0 + 5f64.sqrt()) / 2.0;
    let (a, b) = (coeff / 2.0, coeff * golden / 2.0);

    let vertices = [
        [0.0, a, b],
        [0.0, a, -b],
        [0.0, -a, b],
        [0.0, -a, -b],
        [a, b, 0.0],
        [a, -b, 0.0],
        [-a, b, 0.0],
        [-a, -b, 0.0],
        [b, 0.0, a],
        [b, 0.0, -a],
        [-b, 0.0, a],
        [-b, 0.0, -a],
    ];
    let points = vertices
        .iter()
        .map(|v| (0..3).map(|d| centre[d] + v[d] * radius[d]).collect())
        .collect();
    ConvexPolytope::from_coordinates(axes.to_vec(), points)
}

fn polygon_polytopes(axes: &[String], points: &[Vec<f64>]) -> Result<Vec<ConvexPolytope>> {
    check_len("polygon axes", axes.len(), 2)?;
    let mut vertices = Vec::with_capacity(points.len());
    for point in points {
        check_len("polygon point", point.len(), 2)?;
        vertices.push([point[0], point[1]]);
    }

    let triangles = earclip(&vertices);
    if triangles.is_empty() {
        return Ok(vec![ConvexPolytope::from_coordinates(axes.to_vec(), points.to_vec())?]);
    }
    triangles
        .into_iter()
        .map(|t| ConvexPolytope::from_coordinates(axes.to_vec(), t.iter().map(|p| p.to_vec()).collect()))
        .collect()
}

fn sweep(axes: &[String], shape: &Shape, start: &[f64], end: &[f64]) -> Result<Vec<ConvexPolytope>> {
    if shape.axes() != axes {
        return Err(SliceError::invalid_shape(format!(
            "swept shape is over {:?}, path is over {axes:?}",
            shape.axes()
        )));
    }
    check_len("path start", start.len(), axes.len())?;
    check_len("path end", end.len(), axes.len())?;

    // Start and end copies of every point; interior points are removed when
    // the polytope is sliced.
    shape
        .polytopes()?
        .into_iter()
        .map(|polytope| {
            let mut points = Vec::with_capacity(2 * polytope.points().len());
            for point in polytope.coordinates()? {
                points.push(point.iter().zip(start).map(|(p, s)| p + s).collect());
                points.push(point.iter().zip(end).map(|(p, e)| p + e).collect());
            }
            ConvexPolytope::from_coordinates(axes.to_vec(), points)
        })
        .collect()
}

// ============================================================================
// Ear clipping
// ============================================================================

type Point2 = [f64; 2];

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn inside_triangle(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Triangulate a simple polygon. Returns no triangles for degenerate input.
fn earclip(polygon: &[Point2]) -> Vec<[Point2; 3]> {
    let mut ring: Vec<Point2> = Vec::with_capacity(polygon.len());
    for p in polygon {
        if ring.last() != Some(p) {
            ring.push(*p);
        }
    }
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return Vec::new();
    }

    let area: f64 = (0..ring.len())
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
            a[0] * b[1] - b[0] * a[1]
        })
        .sum();
    if area == 0.0 {
        return Vec::new();
    }
    if area < 0.0 {
        ring.reverse();
    }

    let mut triangles = Vec::with_capacity(ring.len() - 2);
    while ring.len() > 3 {
        let n = ring.len();
        let ear = (0..n).find(|&i| {
            let (prev, curr, next) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
            if cross(prev, curr, next) <= 0.0 {
                return false;
            }
            ring.iter().all(|p| {
                *p == prev || *p == curr || *p == next || !inside_triangle(*p, prev, curr, next)
            })
        });
        let Some(i) = ear else {
            break;
        };
        triangles.push([ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]]);
        ring.remove(i);
    }
    if ring.len() == 3 && cross(ring[0], ring[1], ring[2]) != 0.0 {
        triangles.push([ring[0], ring[1], ring[2]]);
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_box_vertices() {
        let shape = Shape::Box {
            axes: axes(&["x", "y"]),
            lower_corner: vec![AxisValue::Int(3), AxisValue::Int(3)],
            upper_corner: vec![AxisValue::Int(6), AxisValue::Int(6)],
            method: SearchMethod::Strict,
        };
        let polytopes = shape.polytopes().unwrap();
        assert_eq!(polytopes.len(), 1);
        let polytope = &polytopes[0];
        assert!(polytope.is_orthogonal());
        assert_eq!(polytope.points().len(), 4);
        assert_eq!(polytope.extents("y").unwrap(), (3.0, 6.0));
    }

    #[test]
    fn test_box_corner_mismatch() {
        let shape = Shape::Box {
            axes: axes(&["x", "y"]),
            lower_corner: vec![AxisValue::Int(0)],
            upper_corner: vec![AxisValue::Int(1), AxisValue::Int(1)],
            method: SearchMethod::Strict,
        };
        assert!(matches!(shape.polytopes(), Err(SliceError::InvalidShape(_))));
    }

    #[test]
    fn test_disk_circumscribes_ellipse() {
        let shape = Shape::Disk {
            axes: axes(&["lat", "lon"]),
            centre: vec![0.0, 0.0],
            radius: vec![1.0, 2.0],
        };
        let polytope = &shape.polytopes().unwrap()[0];
        assert_eq!(polytope.points().len(), DISK_SEGMENTS);
        let (lo, hi) = polytope.extents("lon").unwrap();
        assert!(lo < -2.0 && hi > 2.0);
        assert!(!polytope.is_orthogonal());
    }

    #[test]
    fn test_ellipsoid_contains_unit_sphere_extent() {
        let shape = Shape::Ellipsoid {
            axes: axes(&["x", "y", "z"]),
            centre: vec![0.0, 0.0, 0.0],
            radius: vec![1.0, 1.0, 1.0],
        };
        let polytope = &shape.polytopes().unwrap()[0];
        assert_eq!(polytope.points().len(), 12);
        let (lo, hi) = polytope.extents("z").unwrap();
        assert!(lo <= -1.0 && hi >= 1.0);
    }

    #[test]
    fn test_polygon_triangulation() {
        let square = Shape::Polygon {
            axes: axes(&["lat", "lon"]),
            points: vec![vec![0.0, 0.0], vec![2.0, 0.0], vec![2.0, 2.0], vec![0.0, 2.0]],
        };
        assert_eq!(square.polytopes().unwrap().len(), 2);

        // L-shaped, clockwise.
        let l_shape = Shape::Polygon {
            axes: axes(&["lat", "lon"]),
            points: vec![
                vec![0.0, 0.0],
                vec![0.0, 2.0],
                vec![1.0, 2.0],
                vec![1.0, 1.0],
                vec![2.0, 1.0],
                vec![2.0, 0.0],
            ],
        };
        assert_eq!(l_shape.polytopes().unwrap().len(), 4);

        let line = Shape::Polygon {
            axes: axes(&["lat", "lon"]),
            points: vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]],
        };
        assert_eq!(line.polytopes().unwrap().len(), 1);
    }

    #[test]
    fn test_path_is_union_of_segments() {
        let shape = Shape::Path {
            axes: axes(&["x", "y"]),
            shape: std::boxed::Box::new(Shape::Box {
                axes: axes(&["x", "y"]),
                lower_corner: vec![AxisValue::Float(-0.5), AxisValue::Float(-0.5)],
                upper_corner: vec![AxisValue::Float(0.5), AxisValue::Float(0.5)],
                method: SearchMethod::Strict,
            }),
            points: vec![vec![0.0, 0.0], vec![5.0, 0.0], vec![5.0, 5.0]],
            closed: false,
        };
        let polytopes = shape.polytopes().unwrap();
        assert_eq!(polytopes.len(), 2);
        assert!(polytopes.iter().all(|p| p.is_in_union() && p.points().len() == 8));
        assert_eq!(polytopes[1].extents("y").unwrap(), (-0.5, 5.5));
    }

    #[test]
    fn test_select_and_all() {
        let select = Shape::Select {
            axis: "step".to_string(),
            values: vec![AxisValue::Int(0), AxisValue::Int(6)],
            method: SearchMethod::Strict,
        };
        let polytopes = select.polytopes().unwrap();
        assert_eq!(polytopes.len(), 2);
        assert!(polytopes.iter().all(|p| p.is_flat() && p.is_orthogonal()));

        let all = Shape::All {
            axis: "level".to_string(),
        };
        let polytope = &all.polytopes().unwrap()[0];
        assert!(!polytope.is_flat());
        assert_eq!(polytope.extents("level").unwrap(), (f64::NEG_INFINITY, f64::INFINITY));
    }

    #[test]
    fn test_shapes_from_yaml() {
        let shapes: Vec<Shape> = serde_yaml::from_str(
            r#"
- shape: select
  axis: param
  values: ["167", t]
- shape: box
  axes: [latitude, longitude]
  lower_corner: [0, 0]
  upper_corner: [10, 20]
  method: surrounding
- shape: union
  axes: [x]
  shapes:
    - {shape: span, axis: x, lower: 0, upper: 1}
    - {shape: span, axis: x, lower: 3, upper: 4}
"#,
        )
        .unwrap();
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[1].polytopes().unwrap()[0].method(), SearchMethod::Surrounding);
        assert!(shapes[2].polytopes().unwrap().iter().all(|p| p.is_in_union()));
    }

    #[test]
    fn test_path_segment_yaml_round_trip() {
        let shape: Shape = serde_yaml::from_str(
            r#"
shape: path_segment
axes: [x, y]
swept:
  shape: box
  axes: [x, y]
  lower_corner: [-1, -1]
  upper_corner: [1, 1]
start: [0, 0]
end: [4, 0]
"#,
        )
        .unwrap();
        assert!(matches!(&shape, Shape::PathSegment { shape: swept, .. } if matches!(**swept, Shape::Box { .. })));

        let yaml = serde_yaml::to_string(&shape).unwrap();
        assert!(yaml.contains("swept:"));
        let reloaded: Shape = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded, shape);
        assert_eq!(reloaded.polytopes().unwrap()[0].extents("x").unwrap(), (-1.0, 5.0));
    }
}
