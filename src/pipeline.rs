use crate::config::Config;
use crate::dataset::RasterHandle;
use crate::error::{PipelineError, Result};
use crate::transform::TransformChain;
use log::{debug, error, info};
use std::path::Path;

/// Pipeline progress. `Failed` is absorbing: any stage error lands here and
/// the run aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    Loaded,
    Cleaned,
    Transformed,
    Saved,
    Failed,
}

/// Drives load -> clean -> transform -> save over one config.
///
/// Owns at most two live handles at a time: the input and the accumulating
/// working dataset. Once any transform has run, the working handle is the
/// authoritative dataset. Errors never cross `run()`; callers get a success
/// flag and `last_error()`.
pub struct Pipeline {
    config: Config,
    chain: TransformChain,
    input: Option<RasterHandle>,
    working: Option<RasterHandle>,
    stage: Stage,
    last_error: Option<String>,
}

impl Pipeline {
    /// Validates the config up front; a malformed config never reaches I/O.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            chain: TransformChain::new()?,
            input: None,
            working: None,
            stage: Stage::Created,
            last_error: None,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run all stages in order, stopping at the first failure.
    pub fn run(&mut self) -> bool {
        info!("Starting raster processing pipeline");
        let start = std::time::Instant::now();

        let stages: [(&str, fn(&mut Self) -> Result<()>); 4] = [
            ("load", Self::load),
            ("clean", Self::clean),
            ("transform", Self::transform),
            ("save", Self::save),
        ];
        for (name, stage_fn) in stages {
            if let Err(e) = stage_fn(self) {
                self.fail(name, e);
                return false;
            }
        }

        info!("Pipeline completed in {:?}", start.elapsed());
        true
    }

    /// Open the input dataset. `Created -> Loaded`.
    pub fn load(&mut self) -> Result<()> {
        self.require_stage(Stage::Created, "load")?;
        info!("Loading input dataset: {}", self.config.input_file);

        let path = Path::new(&self.config.input_file);
        if !path.is_file() {
            return Err(PipelineError::Open(format!(
                "input path is not a regular file: {}",
                self.config.input_file
            )));
        }

        let handle = RasterHandle::open(path)?;
        if self.config.verbose {
            log_dataset_info(&handle, "Input dataset");
        }
        self.input = Some(handle);
        self.stage = Stage::Loaded;
        Ok(())
    }

    /// Structural validation only; pixel data is untouched. `Loaded -> Cleaned`.
    pub fn clean(&mut self) -> Result<()> {
        self.require_stage(Stage::Loaded, "clean")?;
        info!("Validating input dataset");

        let input = self
            .input
            .as_ref()
            .ok_or_else(|| PipelineError::State("no input dataset loaded".to_string()))?;

        if input.band_count() == 0 {
            return Err(PipelineError::State("dataset has no raster bands".to_string()));
        }
        if input.width() == 0 || input.height() == 0 {
            return Err(PipelineError::State(format!(
                "dataset has invalid dimensions: {}x{}",
                input.width(),
                input.height()
            )));
        }

        if self.config.verbose {
            for band in 1..=input.band_count() {
                if let Some(nodata) = input.no_data_value(band) {
                    info!("Band {} nodata value: {}", band, nodata);
                }
            }
        }

        self.stage = Stage::Cleaned;
        Ok(())
    }

    /// Produce the working dataset. With no transforms configured this is a
    /// verbatim copy, so `save()` always has a working dataset to write.
    /// `Cleaned -> Transformed`.
    pub fn transform(&mut self) -> Result<()> {
        self.require_stage(Stage::Cleaned, "transform")?;

        let input = self
            .input
            .as_ref()
            .ok_or_else(|| PipelineError::State("no input dataset loaded".to_string()))?;

        let working = if self.config.has_transforms() {
            info!("Transforming dataset");
            self.chain.transform(input, &self.config)?
        } else {
            info!("No transformations configured, copying input dataset");
            self.chain.duplicate(input)?
        };

        if self.config.verbose {
            log_dataset_info(&working, "Working dataset");
        }
        self.working = Some(working);
        self.stage = Stage::Transformed;
        Ok(())
    }

    /// Write the working dataset to the configured output. `Transformed -> Saved`.
    pub fn save(&mut self) -> Result<()> {
        self.require_stage(Stage::Transformed, "save")?;
        info!("Saving output dataset: {}", self.config.output_file);

        let working = self
            .working
            .as_ref()
            .ok_or_else(|| PipelineError::State("no working dataset to save".to_string()))?;

        let output_path = Path::new(&self.config.output_file);
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!("Created output directory: {}", parent.display());
            }
        }
        if output_path.exists() {
            info!(
                "Output file already exists and will be overwritten: {}",
                self.config.output_file
            );
        }

        let mut output = RasterHandle::create(
            output_path,
            &self.config.output_format,
            working.width(),
            working.height(),
            working.band_count(),
            working.band_type(),
        )?;

        if let Some(gt) = working.geo_transform() {
            output.set_geo_transform(&gt)?;
        }
        let projection = working.projection();
        if !projection.is_empty() {
            output.set_projection(&projection)?;
        }

        for band in 1..=working.band_count() {
            let data = working.read_band(band)?;
            output.write_band(band, &data)?;
            output.set_no_data_value(band, working.no_data_value(band))?;
        }

        // Force a flush to disk
        output.close();

        self.stage = Stage::Saved;
        info!("Output saved to {}", self.config.output_file);
        Ok(())
    }

    fn require_stage(&self, expected: Stage, operation: &str) -> Result<()> {
        if self.stage != expected {
            return Err(PipelineError::State(format!(
                "{} requires stage {:?}, pipeline is in {:?}",
                operation, expected, self.stage
            )));
        }
        Ok(())
    }

    fn fail(&mut self, stage_name: &str, e: PipelineError) {
        let message = format!("{} stage failed: {}", stage_name, e);
        error!("{}", message);
        self.last_error = Some(message);
        self.stage = Stage::Failed;
    }
}

fn log_dataset_info(handle: &RasterHandle, label: &str) {
    info!(
        "{}: {}x{}, {} bands, {:?}",
        label,
        handle.width(),
        handle.height(),
        handle.band_count(),
        handle.band_type()
    );
    if let Some(b) = handle.bounds() {
        info!(
            "{} bounds: [{}, {}, {}, {}]",
            label, b.min_x, b.min_y, b.max_x, b.max_y
        );
    }
    let projection = handle.projection();
    if !projection.is_empty() {
        let shown: String = projection.chars().take(97).collect();
        if shown.len() < projection.len() {
            debug!("{} projection: {}...", label, shown);
        } else {
            debug!("{} projection: {}", label, shown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{BoundingBox, GeoTransform};
    use gdal::raster::GdalDataType;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_input(dir: &TempDir, with_nan: bool) -> PathBuf {
        let path = dir.path().join("input.tif");
        let mut handle =
            RasterHandle::create(&path, "GTiff", 100, 100, 1, GdalDataType::Float64).unwrap();
        handle
            .set_geo_transform(&GeoTransform::from_array([0.0, 1.0, 0.0, 100.0, 0.0, -1.0]))
            .unwrap();
        let mut data: Vec<f64> = (0..100 * 100).map(|i| i as f64).collect();
        if with_nan {
            data[42] = f64::NAN;
        }
        handle.write_band(1, &data).unwrap();
        handle.close();
        path
    }

    fn base_config(dir: &TempDir, input: &Path) -> Config {
        Config {
            input_file: input.to_string_lossy().into_owned(),
            output_file: dir.path().join("output.tif").to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    #[test]
    fn test_run_pass_through_copies_input() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, false);
        let config = base_config(&dir, &input);
        let output_file = config.output_file.clone();

        let mut pipeline = Pipeline::new(config).unwrap();
        assert_eq!(pipeline.stage(), Stage::Created);
        assert!(pipeline.run());
        assert_eq!(pipeline.stage(), Stage::Saved);
        assert!(pipeline.last_error().is_none());

        let output = RasterHandle::open(&output_file).unwrap();
        let original = RasterHandle::open(&input).unwrap();
        assert_eq!(output.width(), 100);
        assert_eq!(output.height(), 100);
        assert_eq!(output.geo_transform(), original.geo_transform());
        assert_eq!(output.read_band(1).unwrap(), original.read_band(1).unwrap());
        assert_eq!(output.no_data_value(1), None);
    }

    #[test]
    fn test_run_clip_scenario() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, false);
        let mut config = base_config(&dir, &input);
        config.clip_bounds = Some(BoundingBox::new(10.0, 10.0, 40.0, 40.0));
        let output_file = config.output_file.clone();

        let mut pipeline = Pipeline::new(config).unwrap();
        assert!(pipeline.run());

        let output = RasterHandle::open(&output_file).unwrap();
        assert_eq!(output.width(), 30);
        assert_eq!(output.height(), 30);
        let gt = output.geo_transform().unwrap();
        assert_eq!((gt.origin_x, gt.origin_y), (10.0, 40.0));
        let data = output.read_band(1).unwrap();
        assert_eq!(data[0], (60 * 100 + 10) as f64);
    }

    #[test]
    fn test_run_nodata_mask_scenario() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, true);
        let mut config = base_config(&dir, &input);
        config.apply_nodata_mask = true;
        config.nodata_value = -9999.0;
        let output_file = config.output_file.clone();

        let mut pipeline = Pipeline::new(config).unwrap();
        assert!(pipeline.run());

        let output = RasterHandle::open(&output_file).unwrap();
        let data = output.read_band(1).unwrap();
        assert_eq!(data[42], -9999.0);
        assert_eq!(data[43], 43.0);
        assert_eq!(output.no_data_value(1), Some(-9999.0));
    }

    #[test]
    fn test_missing_input_fails_at_load() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, false);
        let mut config = base_config(&dir, &input);
        let mut pipeline = Pipeline::new(config.clone()).unwrap();
        // Config validation passed; the file disappears before load runs
        std::fs::remove_file(&input).unwrap();
        assert!(!pipeline.run());
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(pipeline.last_error().unwrap().contains("load"));

        // And a config pointing nowhere never constructs a pipeline
        config.input_file = "/no/such/input.tif".to_string();
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_disjoint_clip_bounds_fail_at_transform() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, false);
        let mut config = base_config(&dir, &input);
        config.clip_bounds = Some(BoundingBox::new(500.0, 500.0, 600.0, 600.0));

        let mut pipeline = Pipeline::new(config).unwrap();
        assert!(!pipeline.run());
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(pipeline.last_error().unwrap().contains("transform"));
    }

    #[test]
    fn test_stages_enforce_order() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, false);
        let config = base_config(&dir, &input);

        let mut pipeline = Pipeline::new(config).unwrap();
        assert!(matches!(pipeline.clean(), Err(PipelineError::State(_))));
        assert!(matches!(pipeline.save(), Err(PipelineError::State(_))));

        pipeline.load().unwrap();
        assert_eq!(pipeline.stage(), Stage::Loaded);
        assert!(matches!(pipeline.load(), Err(PipelineError::State(_))));
        pipeline.clean().unwrap();
        pipeline.transform().unwrap();
        pipeline.save().unwrap();
        assert_eq!(pipeline.stage(), Stage::Saved);
    }

    #[test]
    fn test_save_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, false);
        let mut config = base_config(&dir, &input);
        config.output_file = dir
            .path()
            .join("nested/deeper/output.tif")
            .to_string_lossy()
            .into_owned();
        let output_file = config.output_file.clone();

        let mut pipeline = Pipeline::new(config).unwrap();
        assert!(pipeline.run());
        assert!(Path::new(&output_file).is_file());
    }
}
