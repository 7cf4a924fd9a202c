//! HEALPix ring-ordered grids.

use crate::error::{Result, SliceError};

use super::{even_index, line_index, GridMapper, RingIndex};

const GRID: &str = "healpix";

/// HEALPix grid with `N = resolution`: `4N - 1` rings from north to south
/// and `12 N^2` points.
#[derive(Debug, Clone)]
pub struct HealpixGrid {
    resolution: usize,
    latitudes: Vec<f64>,
    rings: RingIndex,
}

impl HealpixGrid {
    pub fn new(resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(SliceError::unsupported_grid(
                "healpix resolution must be positive",
            ));
        }
        let ring_count = 4 * resolution - 1;
        let counts = (0..ring_count).map(|i| ring_points(resolution, i)).collect();
        Ok(Self {
            resolution,
            latitudes: ring_latitudes(resolution),
            rings: RingIndex::new(counts),
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// First longitude and spacing on ring `i`.
    fn ring_start(&self, i: usize) -> (f64, f64) {
        let n = self.resolution;
        let step = 360.0 / self.rings.count(i) as f64;
        let shifted = i < n || i > 3 * n - 1 || (i + n) % 2 != 0;
        (if shifted { step / 2.0 } else { 0.0 }, step)
    }
}

fn ring_latitudes(n: usize) -> Vec<f64> {
    let nf = n as f64;
    let mut latitudes = vec![0.0; 4 * n - 1];
    for i in 1..2 * n {
        let z = if i < n {
            let fi = i as f64;
            1.0 - fi * fi / (3.0 * nf * nf)
        } else {
            (4.0 * nf - 2.0 * i as f64) / (3.0 * nf)
        };
        let lat = 90.0 - z.acos().to_degrees();
        latitudes[i - 1] = lat;
        latitudes[4 * n - 1 - i] = -lat;
    }
    latitudes[2 * n - 1] = 0.0;
    latitudes
}

fn ring_points(n: usize, i: usize) -> usize {
    if i < n {
        4 * (i + 1)
    } else if i < 3 * n {
        4 * n
    } else {
        ring_points(n, 4 * n - 2 - i)
    }
}

impl GridMapper for HealpixGrid {
    fn first_axis_vals(&self) -> &[f64] {
        &self.latitudes
    }

    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>> {
        let ring = line_index(&self.latitudes, first_val, GRID)?;
        let (start, step) = self.ring_start(ring);
        Ok((0..self.rings.count(ring))
            .map(|k| start + k as f64 * step)
            .collect())
    }

    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize> {
        let ring = line_index(&self.latitudes, first_val, GRID)?;
        let (start, step) = self.ring_start(ring);
        let idx = even_index(second_val, start, step, self.rings.count(ring), GRID)?;
        Ok(self.rings.offset(ring) + idx)
    }

    fn point_count(&self) -> usize {
        self.rings.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_layout() {
        let grid = HealpixGrid::new(4).unwrap();
        let lats = grid.first_axis_vals();
        assert_eq!(lats.len(), 15);
        assert_eq!(lats[7], 0.0);
        assert!(lats.windows(2).all(|w| w[0] > w[1]));
        assert!((lats[0] + lats[14]).abs() < 1e-12);
        assert_eq!(grid.point_count(), 12 * 16);
    }

    #[test]
    fn test_polar_ring_is_shifted() {
        let grid = HealpixGrid::new(4).unwrap();
        let lat = grid.first_axis_vals()[0];
        let lons = grid.second_axis_vals(lat).unwrap();
        assert_eq!(lons, vec![45.0, 135.0, 225.0, 315.0]);
    }

    #[test]
    fn test_unmap_follows_enumeration() {
        let grid = HealpixGrid::new(6).unwrap();
        let mut expected = 0;
        for lat in grid.first_axis_vals().to_vec() {
            for lon in grid.second_axis_vals(lat).unwrap() {
                assert_eq!(grid.unmap(lat, lon).unwrap(), expected);
                expected += 1;
            }
        }
        assert_eq!(expected, 12 * 36);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        assert!(HealpixGrid::new(0).is_err());
    }
}
