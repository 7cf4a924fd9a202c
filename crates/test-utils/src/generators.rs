//! Generators for synthetic coordinates and gridded values.
//!
//! These generators create predictable, verifiable patterns so tests can
//! check which grid points an extraction selected from the values alone.

/// Values from `start` advancing by `step` while not past `stop`.
///
/// Each value is computed from its index so long runs do not accumulate
/// rounding error.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step == 0.0 || (stop - start) / step < 0.0 {
        return Vec::new();
    }
    let count = ((stop - start) / step + 1e-9).floor() as usize + 1;
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Longitudes of a regular global grid, `0 <= lon < 360`.
pub fn regular_longitudes(resolution: f64) -> Vec<f64> {
    let mut lons = arange(0.0, 360.0, resolution);
    lons.retain(|lon| *lon < 360.0);
    lons
}

/// Row-major offsets of an array with the given shape: the value at every
/// position is its own flat index.
///
/// # Example
///
/// ```
/// use test_utils::offset_pattern;
///
/// let data = offset_pattern(&[2, 3]);
/// assert_eq!(data, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
/// ```
pub fn offset_pattern(shape: &[usize]) -> Vec<f64> {
    let size: usize = shape.iter().product();
    (0..size).map(|i| i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arange_directions() {
        assert_eq!(arange(0.0, 1.0, 0.25).len(), 5);
        assert_eq!(arange(1.0, 0.0, -0.5), vec![1.0, 0.5, 0.0]);
        assert!(arange(0.0, 1.0, -0.5).is_empty());
    }

    #[test]
    fn test_regular_longitudes() {
        let lons = regular_longitudes(0.5);
        assert_eq!(lons.len(), 720);
        assert_eq!(lons[0], 0.0);
        assert_eq!(*lons.last().unwrap(), 359.5);
    }

    #[test]
    fn test_offset_pattern_size() {
        assert_eq!(offset_pattern(&[2, 3, 4]).len(), 24);
        assert!(offset_pattern(&[3, 0]).is_empty());
    }
}
