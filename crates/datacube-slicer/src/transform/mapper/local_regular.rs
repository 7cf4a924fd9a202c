//! Regular grids over a limited area.

use crate::error::{Result, SliceError};

use super::{even_index, line_index, GridMapper};

const GRID: &str = "local_regular";

/// Regular grid covering `[first_min, first_max] x [second_min, second_max]`
/// with both bounds included on each axis.
#[derive(Debug, Clone)]
pub struct LocalRegularGrid {
    second_min: f64,
    second_increment: f64,
    second_resolution: usize,
    latitudes: Vec<f64>,
}

impl LocalRegularGrid {
    /// `local` holds `[first_min, first_max, second_min, second_max]`.
    pub fn new(
        local: &[f64],
        first_resolution: usize,
        second_resolution: usize,
        first_reversed: bool,
    ) -> Result<Self> {
        let [first_min, first_max, second_min, second_max] = local else {
            return Err(SliceError::invalid_config(format!(
                "local_regular bounds need four values, got {}",
                local.len()
            )));
        };
        if first_resolution == 0 || second_resolution == 0 {
            return Err(SliceError::unsupported_grid(
                "local_regular resolutions must be positive",
            ));
        }
        if first_max <= first_min || second_max <= second_min {
            return Err(SliceError::invalid_config(format!(
                "local_regular bounds {local:?} are empty"
            )));
        }

        let first_increment = (first_max - first_min) / first_resolution as f64;
        let latitudes = (0..=first_resolution)
            .map(|i| {
                let step = i as f64 * first_increment;
                if first_reversed {
                    first_max - step
                } else {
                    first_min + step
                }
            })
            .collect();
        Ok(Self {
            second_min: *second_min,
            second_increment: (second_max - second_min) / second_resolution as f64,
            second_resolution,
            latitudes,
        })
    }

    fn line_len(&self) -> usize {
        self.second_resolution + 1
    }
}

impl GridMapper for LocalRegularGrid {
    fn first_axis_vals(&self) -> &[f64] {
        &self.latitudes
    }

    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>> {
        line_index(&self.latitudes, first_val, GRID)?;
        Ok((0..self.line_len())
            .map(|i| self.second_min + i as f64 * self.second_increment)
            .collect())
    }

    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize> {
        let line = line_index(&self.latitudes, first_val, GRID)?;
        let idx = even_index(
            second_val,
            self.second_min,
            self.second_increment,
            self.line_len(),
            GRID,
        )?;
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
    fn test_bounds_are_inclusive() {
        let grid = LocalRegularGrid::new(&[-40.0, 40.0, -20.0, 60.0], 80, 80, false).unwrap();
        let lats = grid.first_axis_vals();
        assert_eq!(lats.len(), 81);
        assert_eq!(lats[0], -40.0);
        assert_eq!(lats[80], 40.0);
        let lons = grid.second_axis_vals(0.0).unwrap();
        assert_eq!(lons.len(), 81);
        assert_eq!(lons[80], 60.0);
    }

    #[test]
    fn test_reversed_first_axis() {
        let grid = LocalRegularGrid::new(&[0.0, 10.0, 0.0, 4.0], 2, 4, true).unwrap();
        assert_eq!(grid.first_axis_vals(), &[10.0, 5.0, 0.0]);
        assert_eq!(grid.unmap(5.0, 3.0).unwrap(), 8);
        assert_eq!(grid.point_count(), 15);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(LocalRegularGrid::new(&[0.0, 10.0, 0.0], 2, 2, false).is_err());
        assert!(LocalRegularGrid::new(&[10.0, 0.0, 0.0, 1.0], 2, 2, false).is_err());
        assert!(LocalRegularGrid::new(&[0.0, 10.0, 0.0, 1.0], 0, 2, false).is_err());
    }
}
