//! Request documents: a datacube description, its axis options and the
//! shapes to extract.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use datacube_slicer::{ArrayDatacube, AxisValue, EngineConfig, MockDatacube, Request, SliceOptions};

/// Top-level document read by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceDocument {
    pub datacube: DatacubeSpec,

    #[serde(default)]
    pub options: SliceOptions,

    /// Engine settings; environment variables are used when absent.
    #[serde(default)]
    pub engine: Option<EngineConfig>,

    pub shapes: Request,
}

/// The datacube a document is evaluated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatacubeSpec {
    /// Integer axes `0..size` whose values are row-major offsets.
    Mock { dimensions: Vec<MockDimension> },

    /// Labelled coordinates over an in-memory array.
    Array {
        dims: Vec<ArrayDimension>,
        #[serde(default)]
        scalars: BTreeMap<String, AxisValue>,
        /// Row-major values; the flat offset of every point when absent.
        #[serde(default)]
        data: Option<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockDimension {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayDimension {
    pub name: String,
    #[serde(default)]
    pub values: Option<Vec<AxisValue>>,
    #[serde(default)]
    pub range: Option<CoordinateRange>,
}

/// `start, start + step, ...` up to and including `stop`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoordinateRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl CoordinateRange {
    fn values(&self) -> Result<Vec<AxisValue>> {
        if self.step == 0.0 || (self.stop - self.start) / self.step < 0.0 {
            bail!(
                "range {}..{} never advances with step {}",
                self.start,
                self.stop,
                self.step
            );
        }
        let count = ((self.stop - self.start) / self.step + 1e-9).floor() as usize + 1;
        Ok((0..count)
            .map(|i| AxisValue::Float(self.start + self.step * i as f64))
            .collect())
    }
}

impl ArrayDimension {
    fn coordinates(&self) -> Result<Vec<AxisValue>> {
        match (&self.values, &self.range) {
            (Some(values), None) => Ok(values.clone()),
            (None, Some(range)) => range.values(),
            _ => bail!("dimension {} needs exactly one of values or range", self.name),
        }
    }
}

/// A datacube built from a document.
pub enum LoadedDatacube {
    Mock(MockDatacube),
    Array(ArrayDatacube),
}

impl SliceDocument {
    /// Load a `.json`, `.yaml` or `.yml` document.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let document = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("Invalid JSON document {}", path.display()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
                .with_context(|| format!("Invalid YAML document {}", path.display()))?,
            other => bail!("Unsupported document extension {other:?}"),
        };
        Ok(document)
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_else(EngineConfig::from_env)
    }

    pub fn build_datacube(&self) -> Result<LoadedDatacube> {
        match &self.datacube {
            DatacubeSpec::Mock { dimensions } => {
                let dimensions = dimensions.iter().map(|d| (d.name.clone(), d.size)).collect();
                let datacube = MockDatacube::with_options(dimensions, &self.options)
                    .context("Failed to build mock datacube")?;
                Ok(LoadedDatacube::Mock(datacube))
            }
            DatacubeSpec::Array {
                dims,
                scalars,
                data,
            } => {
                let dims = dims
                    .iter()
                    .map(|d| Ok((d.name.clone(), d.coordinates()?)))
                    .collect::<Result<Vec<_>>>()?;
                let size: usize = dims.iter().map(|(_, coords)| coords.len()).product();
                let data = data
                    .clone()
                    .unwrap_or_else(|| (0..size).map(|i| i as f64).collect());
                let scalars = scalars
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                let datacube = ArrayDatacube::new(dims, scalars, data, &self.options)
                    .context("Failed to build array datacube")?;
                Ok(LoadedDatacube::Array(datacube))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::temp_file_with;

    const DOCUMENT: &str = r#"
datacube:
  kind: array
  dims:
    - name: level
      values: [1000, 850, 500]
    - name: longitude
      range: {start: 0, stop: 330, step: 30}
options:
  axis_config:
    - axis_name: longitude
      transformations:
        - name: cyclic
          range: [0, 360]
shapes:
  - shape: select
    axis: level
    values: [850]
  - shape: span
    axis: longitude
    lower: -30
    upper: 30
"#;

    #[test]
    fn test_load_yaml_document() {
        let file = temp_file_with(".yaml", DOCUMENT);
        let document = SliceDocument::from_file(file.path()).unwrap();

        assert_eq!(document.shapes.shapes().len(), 2);
        assert_eq!(document.options.axis_config.len(), 1);
        match document.build_datacube().unwrap() {
            LoadedDatacube::Array(cube) => {
                assert_eq!(cube.dims()[1].1.len(), 12);
            }
            LoadedDatacube::Mock(_) => panic!("expected an array datacube"),
        }
    }

    #[test]
    fn test_dimension_needs_one_source() {
        let dim = ArrayDimension {
            name: "x".to_string(),
            values: None,
            range: None,
        };
        assert!(dim.coordinates().is_err());

        let range = CoordinateRange {
            start: 0.0,
            stop: 1.0,
            step: -1.0,
        };
        assert!(range.values().is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = temp_file_with(".txt", DOCUMENT);
        assert!(SliceDocument::from_file(file.path()).is_err());
    }
}
