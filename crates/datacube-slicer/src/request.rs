//! A request: the shapes a client asks for.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SliceError};
use crate::shapes::{ConvexPolytope, Shape};

/// Shapes over disjoint axis sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Shape>", into = "Vec<Shape>")]
pub struct Request {
    shapes: Vec<Shape>,
}

impl Request {
    /// Build a request, rejecting two shapes that define the same axis.
    pub fn new(shapes: Vec<Shape>) -> Result<Self> {
        let mut seen: Vec<String> = Vec::new();
        for shape in &shapes {
            for axis in shape.axes() {
                if seen.contains(&axis) {
                    return Err(SliceError::AxisOverdefined(axis));
                }
                seen.push(axis);
            }
        }
        Ok(Self { shapes })
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Axes named by the request, in shape order.
    pub fn axes(&self) -> Vec<String> {
        self.shapes.iter().flat_map(|s| s.axes()).collect()
    }

    pub fn polytopes(&self) -> Result<Vec<ConvexPolytope>> {
        let mut polytopes = Vec::new();
        for shape in &self.shapes {
            polytopes.extend(shape.polytopes()?);
        }
        Ok(polytopes)
    }
}

impl TryFrom<Vec<Shape>> for Request {
    type Error = SliceError;

    fn try_from(shapes: Vec<Shape>) -> Result<Self> {
        Self::new(shapes)
    }
}

impl From<Request> for Vec<Shape> {
    fn from(request: Request) -> Self {
        request.shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::SearchMethod;
    use crate::value::AxisValue;

    fn select(axis: &str, values: &[i64]) -> Shape {
        Shape::Select {
            axis: axis.to_string(),
            values: values.iter().map(|v| AxisValue::Int(*v)).collect(),
            method: SearchMethod::Strict,
        }
    }

    #[test]
    fn test_duplicate_axis_is_overdefined() {
        let err = Request::new(vec![select("step", &[0]), select("step", &[6])]).unwrap_err();
        assert_eq!(err, SliceError::AxisOverdefined("step".to_string()));
    }

    #[test]
    fn test_polytopes_flatten_shapes() {
        let request = Request::new(vec![
            select("step", &[0, 6, 12]),
            Shape::All {
                axis: "level".to_string(),
            },
        ])
        .unwrap();
        assert_eq!(request.axes(), vec!["step", "level"]);
        assert_eq!(request.polytopes().unwrap().len(), 4);
    }

    #[test]
    fn test_request_from_yaml() {
        let request: Request = serde_yaml::from_str(
            r#"
- {shape: select, axis: step, values: [0]}
- {shape: all, axis: level}
"#,
        )
        .unwrap();
        assert_eq!(request.shapes().len(), 2);

        let duplicate: std::result::Result<Request, _> = serde_yaml::from_str(
            r#"
- {shape: all, axis: level}
- {shape: all, axis: level}
"#,
        );
        assert!(duplicate.is_err());
    }
}
