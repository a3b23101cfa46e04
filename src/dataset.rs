use crate::error::{PipelineError, Result};
use crate::geo::{BoundingBox, GeoTransform};
use gdal::raster::{Buffer, GdalDataType};
use gdal::{Dataset, DriverManager};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Once;

static ENGINE_INIT: Once = Once::new();

/// One-time, process-wide raster driver registration. Idempotent; every
/// open/create path goes through here so no caller has to care about order.
fn ensure_engine_initialized() {
    ENGINE_INIT.call_once(|| {
        DriverManager::register_all();
        debug!("Registered GDAL drivers");
    });
}

/// Exclusive, move-only handle to one open raster dataset.
///
/// A closed handle stays safe to use: dimensions report zero, metadata
/// reads come back empty, and `close()` may be called any number of times.
/// The underlying resource is released on drop on every exit path.
#[derive(Debug)]
pub struct RasterHandle {
    ds: Option<Dataset>,
    path: PathBuf,
}

impl RasterHandle {
    /// Open an existing dataset read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ensure_engine_initialized();
        let path = path.as_ref();
        let ds = Dataset::open(path)
            .map_err(|e| PipelineError::Open(format!("{}: {}", path.display(), e)))?;
        debug!("Opened dataset: {}", path.display());
        Ok(Self {
            ds: Some(ds),
            path: path.to_path_buf(),
        })
    }

    /// Create a new dataset with the requested geometry and band type.
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: &str,
        width: usize,
        height: usize,
        band_count: usize,
        band_type: GdalDataType,
    ) -> Result<Self> {
        ensure_engine_initialized();
        let path = path.as_ref();
        let driver = DriverManager::get_driver_by_name(format)
            .map_err(|e| PipelineError::Create(format!("unknown format '{}': {}", format, e)))?;

        let ds = match band_type {
            GdalDataType::UInt8 => driver.create_with_band_type::<u8, _>(path, width, height, band_count),
            GdalDataType::UInt16 => driver.create_with_band_type::<u16, _>(path, width, height, band_count),
            GdalDataType::Int16 => driver.create_with_band_type::<i16, _>(path, width, height, band_count),
            GdalDataType::UInt32 => driver.create_with_band_type::<u32, _>(path, width, height, band_count),
            GdalDataType::Int32 => driver.create_with_band_type::<i32, _>(path, width, height, band_count),
            GdalDataType::Float32 => driver.create_with_band_type::<f32, _>(path, width, height, band_count),
            _ => driver.create_with_band_type::<f64, _>(path, width, height, band_count),
        }
        .map_err(|e| PipelineError::Create(format!("{}: {}", path.display(), e)))?;

        debug!(
            "Created dataset: {} ({}x{}, {} bands, {:?})",
            path.display(),
            width,
            height,
            band_count,
            band_type
        );
        Ok(Self {
            ds: Some(ds),
            path: path.to_path_buf(),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.ds.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> usize {
        self.ds.as_ref().map_or(0, |ds| ds.raster_size().0)
    }

    pub fn height(&self) -> usize {
        self.ds.as_ref().map_or(0, |ds| ds.raster_size().1)
    }

    pub fn band_count(&self) -> usize {
        self.ds.as_ref().map_or(0, |ds| ds.raster_count())
    }

    /// Numeric type of the first band; rasters with mixed band types are not
    /// handled specially, matching the engine's create contract.
    pub fn band_type(&self) -> GdalDataType {
        self.ds
            .as_ref()
            .and_then(|ds| ds.rasterband(1).ok())
            .map_or(GdalDataType::Float64, |b| b.band_type())
    }

    pub fn geo_transform(&self) -> Option<GeoTransform> {
        self.ds
            .as_ref()
            .and_then(|ds| ds.geo_transform().ok())
            .map(GeoTransform::from_array)
    }

    pub fn set_geo_transform(&mut self, gt: &GeoTransform) -> Result<()> {
        if let Some(ds) = self.ds.as_mut() {
            ds.set_geo_transform(&gt.to_array())?;
        }
        Ok(())
    }

    /// Projection as an opaque WKT string; empty when unset or closed.
    pub fn projection(&self) -> String {
        self.ds.as_ref().map_or_else(String::new, |ds| ds.projection())
    }

    pub fn set_projection(&mut self, projection: &str) -> Result<()> {
        if let Some(ds) = self.ds.as_mut() {
            ds.set_projection(projection)?;
        }
        Ok(())
    }

    /// Per-band nodata. `None` means no nodata configured; a present 0.0 is a
    /// legitimate nodata value and is never treated as absent.
    pub fn no_data_value(&self, band: usize) -> Option<f64> {
        self.ds
            .as_ref()
            .and_then(|ds| ds.rasterband(band).ok())
            .and_then(|b| b.no_data_value())
    }

    pub fn set_no_data_value(&mut self, band: usize, value: Option<f64>) -> Result<()> {
        if let Some(ds) = self.ds.as_mut() {
            let mut rb = ds.rasterband(band)?;
            rb.set_no_data_value(value)?;
        }
        Ok(())
    }

    /// Extent derived from the geotransform and raster size.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.geo_transform()
            .map(|gt| gt.bounds(self.width(), self.height()))
    }

    /// Read a rectangular window of one band as dense row-major `f64`.
    pub fn read_band_window(
        &self,
        band: usize,
        x_off: usize,
        y_off: usize,
        x_size: usize,
        y_size: usize,
    ) -> Result<Vec<f64>> {
        let ds = self.require_open()?;
        self.check_window(band, x_off, y_off, x_size, y_size)?;

        let rb = ds.rasterband(band)?;
        let buffer = rb.read_as::<f64>(
            (x_off as isize, y_off as isize),
            (x_size, y_size),
            (x_size, y_size),
            None,
        )?;
        Ok(buffer.into_iter().collect())
    }

    /// Read one whole band.
    pub fn read_band(&self, band: usize) -> Result<Vec<f64>> {
        self.read_band_window(band, 0, 0, self.width(), self.height())
    }

    /// Write a rectangular window of one band from dense row-major `f64`.
    pub fn write_band_window(
        &mut self,
        band: usize,
        data: &[f64],
        x_off: usize,
        y_off: usize,
        x_size: usize,
        y_size: usize,
    ) -> Result<()> {
        if data.len() != x_size * y_size {
            return Err(PipelineError::SizeMismatch {
                expected: x_size * y_size,
                actual: data.len(),
            });
        }
        self.require_open()?;
        self.check_window(band, x_off, y_off, x_size, y_size)?;

        let ds = self.require_open_mut()?;
        let mut rb = ds.rasterband(band)?;
        let mut buffer = Buffer::new((x_size, y_size), data.to_vec());
        rb.write(
            (x_off as isize, y_off as isize),
            (x_size, y_size),
            &mut buffer,
        )?;
        Ok(())
    }

    /// Write one whole band.
    pub fn write_band(&mut self, band: usize, data: &[f64]) -> Result<()> {
        let (w, h) = (self.width(), self.height());
        self.write_band_window(band, data, 0, 0, w, h)
    }

    /// Release the underlying dataset, flushing pending writes. Idempotent.
    pub fn close(&mut self) {
        if let Some(ds) = self.ds.take() {
            drop(ds);
            debug!("Closed dataset: {}", self.path.display());
        }
    }

    pub(crate) fn gdal(&self) -> Result<&Dataset> {
        self.require_open()
    }

    fn require_open(&self) -> Result<&Dataset> {
        self.ds
            .as_ref()
            .ok_or_else(|| PipelineError::BandIo(format!("dataset is closed: {}", self.path.display())))
    }

    fn require_open_mut(&mut self) -> Result<&mut Dataset> {
        let path = &self.path;
        self.ds
            .as_mut()
            .ok_or_else(|| PipelineError::BandIo(format!("dataset is closed: {}", path.display())))
    }

    fn check_window(
        &self,
        band: usize,
        x_off: usize,
        y_off: usize,
        x_size: usize,
        y_size: usize,
    ) -> Result<()> {
        if band == 0 || band > self.band_count() {
            return Err(PipelineError::BandIo(format!(
                "band index {} out of range (1..={})",
                band,
                self.band_count()
            )));
        }
        if x_size == 0
            || y_size == 0
            || x_off + x_size > self.width()
            || y_off + y_size > self.height()
        {
            return Err(PipelineError::BandIo(format!(
                "window ({},{} {}x{}) outside raster {}x{}",
                x_off,
                y_off,
                x_size,
                y_size,
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }
}
