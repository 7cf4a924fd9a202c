//! Common fixtures for slicing tests.
//!
//! Axis option documents that several test suites share.

/// Axis option documents.
pub mod options {
    /// Cyclic longitude over `[0, 360)`.
    pub const CYCLIC_LONGITUDE_YAML: &str = r#"
axis_config:
  - axis_name: longitude
    transformations:
      - name: cyclic
        range: [0, 360]
"#;

    /// Date and time merged into one timestamp axis.
    pub const MERGED_DATE_TIME_YAML: &str = r#"
axis_config:
  - axis_name: date
    transformations:
      - name: merge
        other_axis: time
        linkers: ["T", "00"]
"#;

    /// A regular grid mapper on a flat `values` axis with cyclic longitude.
    pub const REGULAR_GRID_YAML: &str = r#"
axis_config:
  - axis_name: values
    transformations:
      - name: mapper
        type: regular
        resolution: 2
        axes: [latitude, longitude]
  - axis_name: longitude
    transformations:
      - name: cyclic
        range: [0, 360]
compressed_axes_config: [longitude]
"#;

    /// A flat `values` axis holding an octahedral N32 grid.
    pub const OCTAHEDRAL_N32_YAML: &str = r#"
axis_config:
  - axis_name: values
    transformations:
      - name: mapper
        type: octahedral
        resolution: 32
        axes: [latitude, longitude]
  - axis_name: longitude
    transformations:
      - name: cyclic
        range: [0, 360]
compressed_axes_config: [longitude, latitude]
"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_documents_mention_axes() {
        assert!(options::CYCLIC_LONGITUDE_YAML.contains("longitude"));
        assert!(options::MERGED_DATE_TIME_YAML.contains("other_axis: time"));
        assert!(options::REGULAR_GRID_YAML.contains("type: regular"));
        assert!(options::OCTAHEDRAL_N32_YAML.contains("resolution: 32"));
    }
}
