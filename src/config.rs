use crate::error::{PipelineError, Result};
use crate::geo::BoundingBox;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn default_output_format() -> String {
    "GTiff".to_string()
}

fn default_nodata_value() -> f64 {
    -9999.0
}

/// Immutable processing intent for one pipeline run, loaded from JSON or
/// assembled from CLI flags. The pipeline consumes it read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input_file: String,
    #[serde(default)]
    pub output_file: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub target_crs: Option<String>,
    #[serde(default)]
    pub clip_bounds: Option<BoundingBox>,
    #[serde(default)]
    pub apply_nodata_mask: bool,
    #[serde(default = "default_nodata_value")]
    pub nodata_value: f64,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_file: String::new(),
            output_file: String::new(),
            output_format: default_output_format(),
            target_crs: None,
            clip_bounds: None,
            apply_nodata_mask: false,
            nodata_value: default_nodata_value(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load one config from a JSON file holding either a single object or an
    /// array of objects selected by `index`.
    pub fn from_json_file<P: AsRef<Path>>(path: P, index: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PipelineError::Config(format!("cannot open config file {}: {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_reader(BufReader::new(file))?;

        let entry = match &value {
            Value::Array(entries) => entries.get(index).ok_or_else(|| {
                PipelineError::Config(format!(
                    "config index {} out of range; file has {} entries",
                    index,
                    entries.len()
                ))
            })?,
            _ if index == 0 => &value,
            _ => {
                return Err(PipelineError::Config(format!(
                    "config index {} given but file holds a single object",
                    index
                )))
            }
        };

        Ok(serde_json::from_value(entry.clone())?)
    }

    /// Load every config entry from a JSON file (single object counts as one).
    pub fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PipelineError::Config(format!("cannot open config file {}: {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_reader(BufReader::new(file))?;

        match value {
            Value::Array(entries) => entries
                .into_iter()
                .map(|e| Ok(serde_json::from_value(e)?))
                .collect(),
            other => Ok(vec![serde_json::from_value(other)?]),
        }
    }

    /// Reject malformed intent before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.input_file.is_empty() {
            return Err(PipelineError::Config("input file path is required".to_string()));
        }
        if self.output_file.is_empty() {
            return Err(PipelineError::Config("output file path is required".to_string()));
        }
        if !Path::new(&self.input_file).exists() {
            return Err(PipelineError::Config(format!(
                "input file does not exist: {}",
                self.input_file
            )));
        }
        if let Some(bounds) = &self.clip_bounds {
            if !bounds.is_well_formed() {
                return Err(PipelineError::Config(
                    "invalid clip bounds: min values must be less than max values".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether any step of the transform chain is configured.
    pub fn has_transforms(&self) -> bool {
        self.target_crs.is_some() || self.clip_bounds.is_some() || self.apply_nodata_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_json(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_single_object() {
        let dir = TempDir::new().unwrap();
        let path = write_json(
            &dir,
            "single.json",
            r#"{
                "input_file": "in.tif",
                "output_file": "out.tif",
                "target_crs": "EPSG:3857",
                "clip_bounds": {"min_x": 10.0, "min_y": 10.0, "max_x": 40.0, "max_y": 40.0},
                "apply_nodata_mask": true,
                "nodata_value": -1.0
            }"#,
        );

        let config = Config::from_json_file(&path, 0).unwrap();
        assert_eq!(config.input_file, "in.tif");
        assert_eq!(config.output_format, "GTiff");
        assert_eq!(config.target_crs.as_deref(), Some("EPSG:3857"));
        assert_eq!(config.clip_bounds.unwrap().max_x, 40.0);
        assert!(config.apply_nodata_mask);
        assert_eq!(config.nodata_value, -1.0);
        assert!(config.has_transforms());
    }

    #[test]
    fn test_parse_array_with_index() {
        let dir = TempDir::new().unwrap();
        let path = write_json(
            &dir,
            "batch.json",
            r#"[
                {"input_file": "a.tif", "output_file": "a_out.tif"},
                {"input_file": "b.tif", "output_file": "b_out.tif"}
            ]"#,
        );

        let second = Config::from_json_file(&path, 1).unwrap();
        assert_eq!(second.input_file, "b.tif");
        assert!(!second.has_transforms());

        assert!(Config::from_json_file(&path, 2).is_err());
        assert_eq!(Config::load_all(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_index_into_single_object_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_json(&dir, "one.json", r#"{"input_file": "a", "output_file": "b"}"#);
        assert!(Config::from_json_file(&path, 1).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bounds_and_paths() {
        let dir = TempDir::new().unwrap();
        let input = write_json(&dir, "input.tif", "");

        let mut config = Config {
            input_file: input.to_string_lossy().into_owned(),
            output_file: "out.tif".to_string(),
            ..Config::default()
        };
        config.validate().unwrap();

        config.clip_bounds = Some(BoundingBox::new(40.0, 10.0, 10.0, 40.0));
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        config.clip_bounds = None;
        config.input_file = "/no/such/file.tif".to_string();
        assert!(config.validate().is_err());

        config.input_file = String::new();
        assert!(config.validate().is_err());
    }
}
