//! Reduced latitude/longitude grids: evenly spaced latitudes from the south
//! pole north, each with its own number of evenly spaced longitudes.

use crate::error::{Result, SliceError};

use super::{even_index, line_index, GridMapper, RingIndex};

const GRID: &str = "reduced_ll";

#[derive(Debug, Clone)]
pub struct ReducedLatLonGrid {
    latitudes: Vec<f64>,
    rings: RingIndex,
}

impl ReducedLatLonGrid {
    /// `lon_counts[i]` is the number of longitudes on latitude line `i`.
    pub fn new(lon_counts: Vec<usize>) -> Result<Self> {
        if lon_counts.len() < 2 {
            return Err(SliceError::unsupported_grid(
                "reduced_ll grids need at least two latitude lines",
            ));
        }
        if lon_counts.contains(&0) {
            return Err(SliceError::invalid_config(
                "reduced_ll latitude lines need at least one longitude",
            ));
        }
        let spacing = 180.0 / (lon_counts.len() - 1) as f64;
        let latitudes = (0..lon_counts.len())
            .map(|i| -90.0 + i as f64 * spacing)
            .collect();
        Ok(Self {
            latitudes,
            rings: RingIndex::new(lon_counts),
        })
    }

    fn spacing(&self, line: usize) -> f64 {
        360.0 / self.rings.count(line) as f64
    }
}

impl GridMapper for ReducedLatLonGrid {
    fn first_axis_vals(&self) -> &[f64] {
        &self.latitudes
    }

    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>> {
        let line = line_index(&self.latitudes, first_val, GRID)?;
        let spacing = self.spacing(line);
        Ok((0..self.rings.count(line))
            .map(|i| i as f64 * spacing)
            .collect())
    }

    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize> {
        let line = line_index(&self.latitudes, first_val, GRID)?;
        let idx = even_index(
            second_val,
            0.0,
            self.spacing(line),
            self.rings.count(line),
            GRID,
        )?;
        Ok(self.rings.offset(line) + idx)
    }

    fn point_count(&self) -> usize {
        self.rings.total()
    }
}
