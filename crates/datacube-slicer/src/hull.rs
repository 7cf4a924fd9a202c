//! Hyperplane slicing of convex polytopes and convex hull vertex reduction.

use nalgebra::DMatrix;
use tracing::warn;

use crate::error::Result;
use crate::shapes::ConvexPolytope;
use crate::value::AxisValue;

/// Intersect `polytope` with the hyperplane `axis = value`.
///
/// Returns the lower-dimensional polytope over the remaining axes, or `None`
/// when nothing of the polytope is left to slice. Values within `tolerance`
/// of the extents snap onto them; padded search methods snap from any
/// distance so neighbouring grid values keep the boundary cross-section.
pub fn slice(
    polytope: &ConvexPolytope,
    axis: &str,
    value: f64,
    tolerance: f64,
) -> Result<Option<ConvexPolytope>> {
    let Some(idx) = polytope.axis_index(axis) else {
        return Ok(None);
    };
    if polytope.dimension() == 1 {
        return Ok(None);
    }

    let (lower, upper) = polytope.extents(axis)?;
    let slack = tolerance * (upper - lower).max(1.0);
    let value = if value < lower {
        if value < lower - slack && !polytope.method().pads() {
            return Ok(None);
        }
        lower
    } else if value > upper {
        if value > upper + slack && !polytope.method().pads() {
            return Ok(None);
        }
        upper
    } else {
        value
    };

    let points = polytope.coordinates()?;
    let above: Vec<&Vec<f64>> = points.iter().filter(|p| p[idx] >= value).collect();
    let below: Vec<&Vec<f64>> = points.iter().filter(|p| p[idx] <= value).collect();

    // Every above/below pair spans the plane; their intersections include
    // interior points that the hull reduction removes.
    let mut intersects: Vec<Vec<f64>> = Vec::new();
    for a in &above {
        for b in &below {
            let point: Vec<f64> = if a[idx] == b[idx] {
                (*b).clone()
            } else {
                let t = (value - b[idx]) / (a[idx] - b[idx]);
                a.iter().zip(b.iter()).map(|(x, y)| y + (x - y) * t).collect()
            };
            let reduced: Vec<f64> = point
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, x)| x)
                .collect();
            if !intersects.contains(&reduced) {
                intersects.push(reduced);
            }
        }
    }
    if intersects.is_empty() {
        return Ok(None);
    }

    let axes: Vec<String> = polytope
        .axes()
        .iter()
        .filter(|a| a.as_str() != axis)
        .cloned()
        .collect();
    let vertices = if intersects.len() < axes.len() + 1 {
        intersects
    } else {
        reduce(intersects, tolerance)
    };
    let points = vertices
        .into_iter()
        .map(|p| p.into_iter().map(AxisValue::Float).collect())
        .collect();
    Ok(Some(polytope.with_points(axes, points)))
}

/// Vertices of the convex hull of `points`, in input order where possible.
pub fn reduce(mut points: Vec<Vec<f64>>, tolerance: f64) -> Vec<Vec<f64>> {
    dedup(&mut points);
    let dimension = points.first().map_or(0, Vec::len);
    if points.len() <= dimension + 1 {
        return points;
    }
    match dimension {
        0 => points,
        1 => {
            let lowest = points.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
            let highest = points.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
            if lowest == highest {
                vec![vec![lowest]]
            } else {
                vec![vec![lowest], vec![highest]]
            }
        }
        2 => monotone_chain(points),
        _ => extreme_points(points, tolerance),
    }
}

fn dedup(points: &mut Vec<Vec<f64>>) {
    let mut unique: Vec<Vec<f64>> = Vec::with_capacity(points.len());
    for point in points.drain(..) {
        if !unique.contains(&point) {
            unique.push(point);
        }
    }
    *points = unique;
}

fn cross(o: &[f64], a: &[f64], b: &[f64]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Andrew's monotone chain. Collinear points are dropped.
fn monotone_chain(mut points: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    points.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));

    let mut lower: Vec<Vec<f64>> = Vec::new();
    for p in &points {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p.clone());
    }
    let mut upper: Vec<Vec<f64>> = Vec::new();
    for p in points.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p.clone());
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Keep the points that are not convex combinations of the others.
///
/// Coordinates are scaled into the unit cube first so the feasibility
/// tolerance means the same thing on every axis.
fn extreme_points(points: Vec<Vec<f64>>, tolerance: f64) -> Vec<Vec<f64>> {
    let dimension = points[0].len();
    let mut scaled = points.clone();
    for d in 0..dimension {
        let lowest = points.iter().map(|p| p[d]).fold(f64::INFINITY, f64::min);
        let highest = points.iter().map(|p| p[d]).fold(f64::NEG_INFINITY, f64::max);
        let width = highest - lowest;
        for point in scaled.iter_mut() {
            point[d] = if width > 0.0 { (point[d] - lowest) / width } else { 0.0 };
        }
    }

    let mut keep = Vec::with_capacity(points.len());
    for (j, target) in scaled.iter().enumerate() {
        let others: Vec<&Vec<f64>> = scaled
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != j)
            .map(|(_, p)| p)
            .collect();
        match is_convex_combination(target, &others, tolerance) {
            Some(inside) => keep.push(!inside),
            None => {
                warn!(
                    point = j,
                    dimension, "Hull reduction did not converge, keeping point"
                );
                keep.push(true);
            }
        }
    }

    points
        .into_iter()
        .zip(keep)
        .filter_map(|(point, keep)| keep.then_some(point))
        .collect()
}

/// Phase-one simplex on `sum(l_i * p_i) = target, sum(l_i) = 1, l >= 0`.
///
/// Returns `None` if the iteration limit is reached.
fn is_convex_combination(target: &[f64], others: &[&Vec<f64>], tolerance: f64) -> Option<bool> {
    let m = target.len() + 1;
    let n = others.len();
    let rhs = n + m;

    // Constraint rows, one artificial variable per row, objective last.
    let mut tableau = DMatrix::<f64>::zeros(m + 1, n + m + 1);
    for row in 0..m {
        let b = if row < target.len() { target[row] } else { 1.0 };
        let sign = if b < 0.0 { -1.0 } else { 1.0 };
        for (col, point) in others.iter().enumerate() {
            let a = if row < target.len() { point[row] } else { 1.0 };
            tableau[(row, col)] = sign * a;
        }
        tableau[(row, n + row)] = 1.0;
        tableau[(row, rhs)] = sign * b;
    }
    for col in 0..n {
        let total: f64 = (0..m).map(|row| tableau[(row, col)]).sum();
        tableau[(m, col)] = -total;
    }
    tableau[(m, rhs)] = -(0..m).map(|row| tableau[(row, rhs)]).sum::<f64>();

    let mut basis: Vec<usize> = (n..n + m).collect();
    let limit = 50 * (m + n);
    for _ in 0..limit {
        // Bland's rule: lowest entering index, then lowest leaving basis index.
        let Some(entering) = (0..n + m).find(|&col| tableau[(m, col)] < -tolerance) else {
            return Some(-tableau[(m, rhs)] <= tolerance);
        };

        let mut leaving: Option<(usize, f64)> = None;
        for row in 0..m {
            let coeff = tableau[(row, entering)];
            if coeff <= tolerance {
                continue;
            }
            let ratio = tableau[(row, rhs)] / coeff;
            leaving = match leaving {
                Some((best, best_ratio))
                    if ratio > best_ratio + tolerance
                        || ((ratio - best_ratio).abs() <= tolerance && basis[row] > basis[best]) =>
                {
                    Some((best, best_ratio))
                }
                _ => Some((row, ratio)),
            };
        }
        // Phase one is bounded below by zero.
        let (pivot_row, _) = leaving?;
        pivot(&mut tableau, pivot_row, entering);
        basis[pivot_row] = entering;
    }
    None
}

fn pivot(tableau: &mut DMatrix<f64>, row: usize, col: usize) {
    let value = tableau[(row, col)];
    let cols = tableau.ncols();
    for j in 0..cols {
        tableau[(row, j)] /= value;
    }
    for i in 0..tableau.nrows() {
        if i == row {
            continue;
        }
        let factor = tableau[(i, col)];
        if factor == 0.0 {
            continue;
        }
        for j in 0..cols {
            let delta = factor * tableau[(row, j)];
            tableau[(i, j)] -= delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn polytope(axes: &[&str], points: Vec<Vec<f64>>) -> ConvexPolytope {
        ConvexPolytope::from_coordinates(axes.iter().map(|a| a.to_string()).collect(), points).unwrap()
    }

    fn sorted(mut points: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        points.sort_by(|a, b| a.partial_cmp(b).unwrap());
        points
    }

    #[test]
    fn test_slice_square() {
        let square = polytope(
            &["x", "y"],
            vec![vec![0.0, 0.0], vec![2.0, 0.0], vec![0.0, 4.0], vec![2.0, 4.0]],
        );
        let sliced = slice(&square, "x", 1.0, TOL).unwrap().unwrap();
        assert_eq!(sliced.axes(), &["y".to_string()]);
        assert_eq!(sliced.extents("y").unwrap(), (0.0, 4.0));
        assert_eq!(sliced.points().len(), 2);
    }

    #[test]
    fn test_slice_triangle_narrows() {
        let triangle = polytope(&["x", "y"], vec![vec![0.0, 0.0], vec![4.0, 0.0], vec![0.0, 4.0]]);
        let sliced = slice(&triangle, "x", 3.0, TOL).unwrap().unwrap();
        let (lo, hi) = sliced.extents("y").unwrap();
        assert_eq!(lo, 0.0);
        assert!((hi - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_slice_outside_and_on_edge() {
        let square = polytope(&["x", "y"], vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
        assert!(slice(&square, "x", 2.0, TOL).unwrap().is_none());
        assert!(slice(&square, "x", 1.0 + 1e-12, TOL).unwrap().is_some());

        let line = polytope(&["x"], vec![vec![0.0], vec![1.0]]);
        assert!(slice(&line, "x", 0.5, TOL).unwrap().is_none());
    }

    #[test]
    fn test_padded_slice_snaps_to_boundary() {
        let point = polytope(&["x", "y"], vec![vec![1.2, 3.4]])
            .with_method(crate::axis::SearchMethod::Nearest);
        let sliced = slice(&point, "x", 1.0, TOL).unwrap().unwrap();
        assert_eq!(sliced.coordinates().unwrap(), vec![vec![3.4]]);
    }

    #[test]
    fn test_reduce_2d_drops_interior_and_collinear() {
        let reduced = reduce(
            vec![
                vec![0.0, 0.0],
                vec![1.0, 1.0],
                vec![2.0, 0.0],
                vec![1.0, 0.0],
                vec![2.0, 2.0],
                vec![0.0, 2.0],
            ],
            TOL,
        );
        assert_eq!(
            sorted(reduced),
            vec![vec![0.0, 0.0], vec![0.0, 2.0], vec![2.0, 0.0], vec![2.0, 2.0]]
        );
    }

    #[test]
    fn test_reduce_3d_cube_with_centre() {
        let mut points = Vec::new();
        for i in 0..8 {
            points.push(vec![(i & 1) as f64, (i >> 1 & 1) as f64, (i >> 2 & 1) as f64 * 10.0]);
        }
        points.push(vec![0.5, 0.5, 5.0]);
        points.push(vec![0.5, 0.0, 0.0]);
        let reduced = reduce(points, TOL);
        assert_eq!(reduced.len(), 8);
        assert!(!reduced.contains(&vec![0.5, 0.5, 5.0]));
    }

    #[test]
    fn test_reduce_1d() {
        let reduced = reduce(vec![vec![3.0], vec![1.0], vec![2.0]], TOL);
        assert_eq!(reduced, vec![vec![1.0], vec![3.0]]);
    }
}
