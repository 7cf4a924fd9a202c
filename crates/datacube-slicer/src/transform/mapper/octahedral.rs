//! Octahedral reduced Gaussian grids (ECMWF "O" grids).
//!
//! Latitudes are the roots of the Legendre polynomial of degree `2N`,
//! found by Newton iteration from tabulated Bessel-zero first guesses.
//! Ring `i` (counted from the pole) carries `20 + 4i` equally spaced
//! longitudes starting at 0.

use std::f64::consts::PI;

use crate::error::{Result, SliceError};

use super::{even_index, line_index, GridMapper, RingIndex};

/// First zeros of the Bessel function J0.
const BESSEL_ZEROS: [f64; 50] = [
    2.4048255577, 5.5200781103, 8.6537279129, 11.7915344391, 14.9309177086, 18.0710639679,
    21.2116366299, 24.3524715308, 27.4934791320, 30.6346064684, 33.7758202136, 36.9170983537,
    40.0584257646, 43.1997917132, 46.3411883717, 49.4826098974, 52.6240518411, 55.7655107550,
    58.9069839261, 62.0484691902, 65.1899648002, 68.3314693299, 71.4729816036, 74.6145006437,
    77.7560256304, 80.8975558711, 84.0390907769, 87.1806298436, 90.3221726372, 93.4637187819,
    96.6052679510, 99.7468198587, 102.8883742542, 106.0299309165, 109.1714896498,
    112.3130502805, 115.4546126537, 118.5961766309, 121.7377420880, 124.8793089132,
    128.0208770059, 131.1624462752, 134.3040166383, 137.4455880203, 140.5871603528,
    143.7287335737, 146.8703076258, 150.0118824570, 153.1534580192, 156.2950342685,
];

const NEWTON_PRECISION: f64 = 1.0e-14;
const MAX_NEWTON_ITERATIONS: usize = 100;

const GRID: &str = "octahedral";

#[derive(Debug, Clone)]
pub struct OctahedralGrid {
    resolution: usize,
    latitudes: Vec<f64>,
    rings: RingIndex,
}

impl OctahedralGrid {
    pub fn new(resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(SliceError::unsupported_grid(
                "octahedral resolution must be positive",
            ));
        }
        let latitudes = gaussian_latitudes(resolution);
        let counts = (0..2 * resolution)
            .map(|i| ring_points(resolution, i))
            .collect();
        Ok(Self {
            resolution,
            latitudes,
            rings: RingIndex::new(counts),
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }
}

/// Points on ring `i`, mirrored about the equator.
fn ring_points(resolution: usize, i: usize) -> usize {
    let from_pole = if i < resolution { i } else { 2 * resolution - 1 - i };
    20 + 4 * from_pole
}

/// Bessel-zero first guesses for the first `n` Gaussian latitudes.
fn first_guesses(n: usize) -> Vec<f64> {
    let mut guesses = Vec::with_capacity(n);
    for i in 0..n {
        let guess = match BESSEL_ZEROS.get(i) {
            Some(zero) => *zero,
            None => guesses[i - 1] + PI,
        };
        guesses.push(guess);
    }
    guesses
}

/// Northern-to-southern Gaussian latitudes (degrees) for resolution `n`.
pub fn gaussian_latitudes(n: usize) -> Vec<f64> {
    let nval = 2 * n;
    let convval = 1.0 - (2.0 / PI) * (2.0 / PI) * 0.25;
    let denom = ((nval as f64 + 0.5) * (nval as f64 + 0.5) + convval).sqrt();
    let guesses = first_guesses(n);

    let mut latitudes = vec![0.0; nval];
    for (j, guess) in guesses.iter().enumerate() {
        let mut root = (guess / denom).cos();
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (mut mem2, mut mem1, mut legfonc) = (1.0, root, root);
            for legi in 0..nval {
                let legi = legi as f64;
                legfonc = ((2.0 * (legi + 1.0) - 1.0) * root * mem1 - legi * mem2) / (legi + 1.0);
                mem2 = mem1;
                mem1 = legfonc;
            }
            let conv = legfonc / ((nval as f64 * (mem2 - root * legfonc)) / (1.0 - root * root));
            root -= conv;
            if conv.abs() < NEWTON_PRECISION {
                break;
            }
        }
        latitudes[j] = root.asin().to_degrees();
        latitudes[nval - 1 - j] = -latitudes[j];
    }
    latitudes
}

impl GridMapper for OctahedralGrid {
    fn first_axis_vals(&self) -> &[f64] {
        &self.latitudes
    }

    fn second_axis_vals(&self, first_val: f64) -> Result<Vec<f64>> {
        let ring = line_index(&self.latitudes, first_val, GRID)?;
        let count = self.rings.count(ring);
        let spacing = 360.0 / count as f64;
        Ok((0..count).map(|i| i as f64 * spacing).collect())
    }

    fn unmap(&self, first_val: f64, second_val: f64) -> Result<usize> {
        let ring = line_index(&self.latitudes, first_val, GRID)?;
        let count = self.rings.count(ring);
        let idx = even_index(second_val, 0.0, 360.0 / count as f64, count, GRID)?;
        Ok(self.rings.offset(ring) + idx)
    }

    fn point_count(&self) -> usize {
        self.rings.total()
    }
}
