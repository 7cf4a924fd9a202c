//! Global regular latitude/longitude grids.

use crate::error::{Result, SliceError};

use super::{even_index, line_index, GridMapper};

const GRID: &str = "regular";

/// Regular grid with spacing `90 / N` degrees: `2N` latitudes from the
/// north pole down and `4N` longitudes from 0 on every line.
#[derive(Debug, Clone)]
pub struct RegularGrid {
    resolution: usize,
    increment: f64,
    latitudes: Vec<f64>,
}

impl RegularGrid {
    pub fn new(resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(SliceError::unsupported_grid(
                "regular grid resolution must be positive",
            ));
        }
        let increment = 90.0 / resolution as f64;
        let latitudes = (0..2 * resolution)
            .map(|i| 90.0 - i as f64 * increment)
            .collect();
        Ok(Self {
            resolution,
            increment,
            latitudes,
        })
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    fn line_len(&self) -> usize {
        4 * self.resolution
    }
}

impl GridMapper for RegularGrid {
    fn first_axis_vals(&self) -> &[f64] {
        &self.latitudes
    }

    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>> {
        line_index(&self.latitudes, first_val, GRID)?;
        Ok((0..self.line_len())
            .map(|i| i as f64 * self.increment)
            .collect())
    }

    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize> {
        let line = line_index(&self.latitudes, first_val, GRID)?;
        let idx = even_index(second_val, 0.0, self.increment, self.line_len(), GRID)?;
        Ok(line * self.line_len() + idx)
    }

    fn point_count(&self) -> usize {
        self.latitudes.len() * self.line_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_values() {
        let grid = RegularGrid::new(2).unwrap();
        assert_eq!(grid.first_axis_vals(), &[90.0, 45.0, 0.0, -45.0]);
        assert_eq!(
            grid.second_axis_vals(45.0).unwrap(),
            vec![0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0]
        );
    }

    #[test]
    fn test_unmap() {
        let grid = RegularGrid::new(2).unwrap();
        assert_eq!(grid.unmap(90.0, 0.0).unwrap(), 0);
        assert_eq!(grid.unmap(0.0, 90.0).unwrap(), 18);
        assert_eq!(grid.point_count(), 32);
        assert!(grid.unmap(10.0, 0.0).is_err());
        assert!(grid.unmap(0.0, 10.0).is_err());
    }
}
