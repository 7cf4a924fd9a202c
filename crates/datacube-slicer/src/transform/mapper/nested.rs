//! HEALPix grids stored in nested order.
//!
//! The rings and longitudes are those of [`HealpixGrid`]; only the flat
//! storage index differs. Each of the 12 base faces holds `N^2` points laid
//! out along a Z-order curve, so `N` must be a power of two.

use crate::error::{Result, SliceError};

use super::{GridMapper, HealpixGrid};

/// Base-face longitude offsets, in units of `N` ring positions.
const FACE_LONGITUDE: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

#[derive(Debug, Clone)]
pub struct NestedHealpixGrid {
    rings: HealpixGrid,
    nside: i64,
    order: u32,
}

impl NestedHealpixGrid {
    pub fn new(resolution: usize) -> Result<Self> {
        if !resolution.is_power_of_two() {
            return Err(SliceError::unsupported_grid(format!(
                "nested healpix resolution must be a power of two, got {resolution}"
            )));
        }
        Ok(Self {
            rings: HealpixGrid::new(resolution)?,
            nside: resolution as i64,
            order: resolution.trailing_zeros(),
        })
    }

    pub fn resolution(&self) -> usize {
        self.rings.resolution()
    }

    /// Convert a ring-ordered index into the nested index of the same point.
    pub fn ring_to_nested(&self, ring_index: usize) -> usize {
        let (nside, order) = (self.nside, self.order);
        let npix = 12 * nside * nside;
        let ncap = 2 * nside * (nside - 1);
        let idx = ring_index as i64;

        if idx < ncap {
            let ring = (1 + isqrt(2 * idx + 1)) >> 1;
            let phi = 1 + idx - 2 * ring * (ring - 1);
            let face = div_03(phi - 1, ring);
            return self.to_nested(face, ring, ring, phi, 0);
        }

        if idx >= npix - ncap {
            let ring_from_south = (1 + isqrt(2 * npix - 2 * idx - 1)) >> 1;
            let phi = 1 + idx + 2 * ring_from_south * (ring_from_south - 1) + 4 * ring_from_south - npix;
            let ring = 4 * nside - ring_from_south;
            let face = div_03(phi - 1, ring_from_south) + 8;
            return self.to_nested(face, ring, ring_from_south, phi, 0);
        }

        let ip = idx - ncap;
        let tmp = ip >> (order + 2);
        let phi = ip - tmp * 4 * nside + 1;
        let ring = tmp + nside;

        let ifm = 1 + ((phi - 1 - ((1 + tmp) >> 1)) >> order);
        let ifp = 1 + ((phi - 1 - ((1 - tmp + 2 * nside) >> 1)) >> order);
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        self.to_nested(face, ring, nside, phi, (ring + nside) & 1)
    }

    fn to_nested(&self, face: i64, ring: i64, ring_points: i64, phi: i64, shift: i64) -> usize {
        let (nside, order) = (self.nside, self.order);
        let r = ((2 + (face >> 2)) << order) - ring - 1;
        let mut p = 2 * phi - FACE_LONGITUDE[face as usize] * ring_points - shift - 1;
        if p >= 2 * nside {
            p -= 8 * nside;
        }
        let x = (r + p) >> 1;
        let y = (r - p) >> 1;
        ((face << (2 * order)) as u64 | spread_bits(x as u64) | (spread_bits(y as u64) << 1)) as usize
    }
}

fn isqrt(value: i64) -> i64 {
    (value as f64 + 0.5).sqrt() as i64
}

/// `a / b` for `0 <= a < 4b`.
fn div_03(a: i64, b: i64) -> i64 {
    let t = i64::from(a >= 2 * b);
    let a = a - t * 2 * b;
    2 * t + i64::from(a >= b)
}

/// Interleave the low 32 bits of `value` with zeros.
fn spread_bits(value: u64) -> u64 {
    let mut b = value & 0x0000_0000_FFFF_FFFF;
    b = (b ^ (b << 16)) & 0x0000_FFFF_0000_FFFF;
    b = (b ^ (b << 8)) & 0x00FF_00FF_00FF_00FF;
    b = (b ^ (b << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    b = (b ^ (b << 2)) & 0x3333_3333_3333_3333;
    (b ^ (b << 1)) & 0x5555_5555_5555_5555
}

impl GridMapper for NestedHealpixGrid {
    fn first_axis_vals(&self) -> &[f64] {
        self.rings.first_axis_vals()
    }

    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>> {
        self.rings.second_axis_vals(first_val)
    }

    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize> {
        let ring_index = self.rings.unmap(first_val, second_val)?;
        Ok(self.ring_to_nested(ring_index))
    }

    fn point_count(&self) -> usize {
        self.rings.point_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_indexes(grid: &NestedHealpixGrid) -> Vec<usize> {
        let mut indexes = Vec::new();
        for lat in grid.first_axis_vals().to_vec() {
            for lon in grid.second_axis_vals(lat).unwrap() {
                indexes.push(grid.unmap(lat, lon).unwrap());
            }
        }
        indexes
    }

    #[test]
    fn test_every_point_has_a_distinct_nested_index() {
        for n in [1, 2, 4, 8, 16] {
            let grid = NestedHealpixGrid::new(n).unwrap();
            let mut indexes = nested_indexes(&grid);
            indexes.sort_unstable();
            let expected: Vec<usize> = (0..12 * n * n).collect();
            assert_eq!(indexes, expected, "nside {n}");
        }
    }

    #[test]
    fn test_single_pixel_faces_keep_ring_order() {
        let grid = NestedHealpixGrid::new(1).unwrap();
        assert_eq!(nested_indexes(&grid), (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_polar_pixels_sit_in_face_corners() {
        let grid = NestedHealpixGrid::new(2).unwrap();
        let lats = grid.first_axis_vals().to_vec();

        let north: Vec<usize> = [45.0, 135.0, 225.0, 315.0]
            .iter()
            .map(|lon| grid.unmap(lats[0], *lon).unwrap())
            .collect();
        assert_eq!(north, vec![3, 7, 11, 15]);

        let south = lats[lats.len() - 1];
        assert_eq!(grid.unmap(south, 45.0).unwrap(), 32);
        assert_eq!(grid.unmap(south, 315.0).unwrap(), 44);
    }

    #[test]
    fn test_resolution_must_be_power_of_two() {
        assert!(matches!(
            NestedHealpixGrid::new(6),
            Err(SliceError::UnsupportedGrid(_))
        ));
        assert!(NestedHealpixGrid::new(0).is_err());
    }
}
