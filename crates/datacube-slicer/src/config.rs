//! Configuration for axis options and the extraction engine.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SliceError};

// ============================================================================
// Axis options
// ============================================================================

/// Per-request datacube options: axis transformations, compressible axes and
/// a fixed path prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceOptions {
    pub axis_config: Vec<AxisConfig>,

    /// Axes the backend allows to be compressed.
    pub compressed_axes_config: Vec<String>,

    /// Axis values fixed before extraction; the datacube only offers these.
    pub pre_path: BTreeMap<String, serde_json::Value>,
}

/// Transformations attached to one source axis, in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub axis_name: String,
    #[serde(default)]
    pub transformations: Vec<TransformationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum TransformationConfig {
    Cyclic {
        range: Vec<f64>,
    },
    Mapper(MapperOptions),
    Reverse {
        #[serde(default)]
        is_reverse: bool,
    },
    TypeChange {
        #[serde(rename = "type", default = "default_target_type")]
        target: String,
    },
    Merge {
        other_axis: String,
        #[serde(default)]
        linkers: Vec<String>,
    },
}

fn default_target_type() -> String {
    "int".to_string()
}

/// Grid description for a mapper transformation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapperOptions {
    #[serde(rename = "type")]
    pub grid_type: String,

    #[serde(default)]
    pub resolution: Resolution,

    /// Names of the first (latitude-like) and second (longitude-like) axes.
    pub axes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,

    /// `[first_min, first_max, second_min, second_max]` of a local grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_reversed: Option<BTreeMap<String, bool>>,

    /// Explicit `[first, second]` coordinates of an irregular grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Vec<f64>>>,

    /// Longitudes per latitude line of a reduced lat/lon grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon_counts: Option<Vec<usize>>,
}

/// Grid resolution, either one number or one per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resolution {
    Single(usize),
    Pair(Vec<usize>),
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Single(0)
    }
}

impl SliceOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load options from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SliceError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;
        let options = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text)?,
            other => {
                return Err(SliceError::invalid_config(format!(
                    "unsupported options file extension {other:?}"
                )))
            }
        };
        options.validate().map_err(SliceError::invalid_config)?;
        Ok(options)
    }

    /// Transformations configured for `axis_name`.
    pub fn transformations_for(&self, axis_name: &str) -> &[TransformationConfig] {
        self.axis_config
            .iter()
            .find(|config| config.axis_name == axis_name)
            .map(|config| config.transformations.as_slice())
            .unwrap_or_default()
    }

    /// Validate the options.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = Vec::new();
        for config in &self.axis_config {
            if config.axis_name.is_empty() {
                return Err("axis_config entries need an axis_name".to_string());
            }
            if seen.contains(&config.axis_name.as_str()) {
                return Err(format!("axis {} is configured twice", config.axis_name));
            }
            seen.push(config.axis_name.as_str());

            for transformation in &config.transformations {
                transformation.validate(&config.axis_name)?;
            }
        }
        Ok(())
    }
}

impl TransformationConfig {
    fn validate(&self, axis_name: &str) -> std::result::Result<(), String> {
        match self {
            Self::Cyclic { range } => {
                if range.len() != 2 || range[0] >= range[1] {
                    return Err(format!(
                        "cyclic range on {axis_name} must be two increasing bounds"
                    ));
                }
            }
            Self::Mapper(options) => {
                if options.axes.len() != 2 {
                    return Err(format!("mapper on {axis_name} must name two axes"));
                }
                if options.grid_type.is_empty() {
                    return Err(format!("mapper on {axis_name} needs a grid type"));
                }
            }
            Self::Merge { other_axis, linkers } => {
                if other_axis.is_empty() {
                    return Err(format!("merge on {axis_name} needs an other_axis"));
                }
                if linkers.len() > 2 {
                    return Err(format!("merge on {axis_name} takes at most two linkers"));
                }
            }
            Self::TypeChange { target } => {
                if target != "int" {
                    return Err(format!(
                        "type_change on {axis_name} does not support type {target}"
                    ));
                }
            }
            Self::Reverse { .. } => {}
        }
        Ok(())
    }
}

// ============================================================================
// Engine settings
// ============================================================================

/// Settings for the extraction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extract independent polytope combinations on the rayon pool.
    pub parallel: bool,

    /// Feasibility tolerance used when reducing hull vertices.
    pub hull_tolerance: f64,

    /// Memoise index discovery within one extraction.
    pub cache_indices: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            hull_tolerance: 1e-9,
            cache_indices: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SLICER_PARALLEL") {
            config.parallel = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("SLICER_HULL_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                config.hull_tolerance = tol;
            }
        }

        if let Ok(val) = std::env::var("SLICER_CACHE_INDICES") {
            config.cache_indices = parse_flag(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.hull_tolerance.is_finite() && self.hull_tolerance > 0.0) {
            return Err("hull_tolerance must be a positive number".to_string());
        }
        if self.hull_tolerance >= 1.0 {
            return Err("hull_tolerance must be < 1".to_string());
        }
        Ok(())
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS_YAML: &str = r#"
axis_config:
  - axis_name: values
    transformations:
      - name: mapper
        type: octahedral
        resolution: 1280
        axes: [latitude, longitude]
  - axis_name: longitude
    transformations:
      - name: cyclic
        range: [0, 360]
  - axis_name: date
    transformations:
      - name: merge
        other_axis: time
        linkers: ["T", "00"]
  - axis_name: step
    transformations:
      - name: type_change
        type: int
compressed_axes_config: [longitude, latitude, levtype]
pre_path:
  class: od
"#;

    #[test]
    fn test_options_from_yaml() {
        let options = SliceOptions::from_yaml_str(OPTIONS_YAML).unwrap();
        assert_eq!(options.axis_config.len(), 4);
        assert_eq!(options.compressed_axes_config.len(), 3);
        assert_eq!(options.pre_path["class"], serde_json::json!("od"));

        match &options.transformations_for("values")[0] {
            TransformationConfig::Mapper(mapper) => {
                assert_eq!(mapper.grid_type, "octahedral");
                assert_eq!(mapper.resolution, Resolution::Single(1280));
            }
            other => panic!("unexpected transformation {other:?}"),
        }
        assert_eq!(
            options.transformations_for("longitude"),
            &[TransformationConfig::Cyclic {
                range: vec![0.0, 360.0]
            }]
        );
        assert!(options.transformations_for("level").is_empty());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_from_json() {
        let options = SliceOptions::from_json_str(
            r#"{"axis_config": [{"axis_name": "level", "transformations": [{"name": "reverse", "is_reverse": true}]}]}"#,
        )
        .unwrap();
        assert_eq!(
            options.transformations_for("level"),
            &[TransformationConfig::Reverse { is_reverse: true }]
        );
        assert!(options.compressed_axes_config.is_empty());
    }

    #[test]
    fn test_pair_resolution() {
        let options: MapperOptions = serde_yaml::from_str(
            "type: local_regular\nresolution: [80, 40]\naxes: [latitude, longitude]\nlocal: [-40, 40, -20, 60]",
        )
        .unwrap();
        assert_eq!(options.resolution, Resolution::Pair(vec![80, 40]));
        assert_eq!(options.local, Some(vec![-40.0, 40.0, -20.0, 60.0]));
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let mut options = SliceOptions::default();
        options.axis_config.push(AxisConfig {
            axis_name: "longitude".to_string(),
            transformations: vec![TransformationConfig::Cyclic {
                range: vec![360.0, 0.0],
            }],
        });
        assert!(options.validate().is_err());

        let options = SliceOptions {
            axis_config: vec![
                AxisConfig {
                    axis_name: "a".to_string(),
                    transformations: vec![],
                },
                AxisConfig {
                    axis_name: "a".to_string(),
                    transformations: vec![],
                },
            ],
            ..SliceOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_unknown_transformation_rejected() {
        let result = SliceOptions::from_yaml_str(
            "axis_config:\n  - axis_name: x\n    transformations:\n      - name: shear\n",
        );
        assert!(matches!(result, Err(SliceError::InvalidConfig(_))));
    }

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert!(!config.parallel);
        assert!(config.cache_indices);
        assert!(config.validate().is_ok());

        let config = EngineConfig {
            hull_tolerance: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
