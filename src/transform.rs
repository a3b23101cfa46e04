use crate::config::Config;
use crate::crs;
use crate::dataset::RasterHandle;
use crate::error::{PipelineError, Result};
use crate::geo::{BoundingBox, GeoTransform};
use crate::temp::Workspace;
use crate::warp;
use log::{debug, info};

/// Pixel values outside this range are treated as invalid by the nodata mask.
const SANITY_LIMIT: f64 = 1e10;

/// A rectangular pixel window inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x_off: usize,
    pub y_off: usize,
    pub x_size: usize,
    pub y_size: usize,
}

/// Convert geographic bounds into a pixel window under the given
/// geotransform.
///
/// Row indices grow downward while geographic Y grows upward, hence the
/// origin-minus-Y arithmetic for row offsets. Bounds partially outside the
/// raster are clamped to a non-empty window; bounds with no overlap at all
/// fail.
pub fn clip_window(
    gt: &GeoTransform,
    width: usize,
    height: usize,
    bounds: &BoundingBox,
) -> Result<PixelWindow> {
    let pixel_width = gt.pixel_width;
    let pixel_height = gt.pixel_height.abs();
    if pixel_width <= 0.0 || pixel_height <= 0.0 {
        return Err(PipelineError::Clip(format!(
            "degenerate pixel size {}x{}",
            pixel_width, pixel_height
        )));
    }

    let x_off = ((bounds.min_x - gt.origin_x) / pixel_width).floor() as i64;
    let y_off = ((gt.origin_y - bounds.max_y) / pixel_height).floor() as i64;
    let x_max = ((bounds.max_x - gt.origin_x) / pixel_width).floor() as i64;
    let y_max = ((gt.origin_y - bounds.min_y) / pixel_height).floor() as i64;

    let (w, h) = (width as i64, height as i64);
    if x_max <= 0 || y_max <= 0 || x_off >= w || y_off >= h {
        return Err(PipelineError::Clip(format!(
            "bounds [{}, {}, {}, {}] do not intersect the raster extent",
            bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
        )));
    }

    // Sizes come from the unclamped offsets; clamping the offsets into the
    // raster afterwards grows a window that overhangs the left/top edge.
    let x_size = x_max - x_off;
    let y_size = y_max - y_off;

    let x_off = x_off.clamp(0, w - 1);
    let y_off = y_off.clamp(0, h - 1);
    let x_size = x_size.clamp(1, w - x_off);
    let y_size = y_size.clamp(1, h - y_off);

    Ok(PixelWindow {
        x_off: x_off as usize,
        y_off: y_off as usize,
        x_size: x_size as usize,
        y_size: y_size as usize,
    })
}

/// Composes the configured transformations into one new dataset.
///
/// Fixed order: reprojection, then clipping, then nodata masking. Clip
/// bounds are expressed in the target CRS, so clipping has to follow
/// reprojection; masking is a pixel-value cleanup applied last so resampling
/// cannot undo it. Every intermediate dataset lives in the workspace and is
/// removed when the chain drops.
pub struct TransformChain {
    workspace: Workspace,
}

impl TransformChain {
    pub fn new() -> Result<Self> {
        Ok(Self {
            workspace: Workspace::new()?,
        })
    }

    /// Use a caller-provided workspace, letting tests control scratch paths.
    pub fn with_workspace(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// Full copy of `input`: geometry, metadata, every band, per-band nodata.
    pub fn duplicate(&self, input: &RasterHandle) -> Result<RasterHandle> {
        let mut output = RasterHandle::create(
            self.workspace.scratch_path("copy"),
            "GTiff",
            input.width(),
            input.height(),
            input.band_count(),
            input.band_type(),
        )?;
        copy_metadata(input, &mut output)?;

        for band in 1..=input.band_count() {
            let data = input.read_band(band)?;
            output.write_band(band, &data)?;
            output.set_no_data_value(band, input.no_data_value(band))?;
        }
        Ok(output)
    }

    /// Warp `input` into `target_crs`. The engine proposes the destination
    /// geometry and resamples (nearest-neighbour).
    pub fn reproject(&self, input: &RasterHandle, target_crs: &str) -> Result<RasterHandle> {
        let src_wkt = input.projection();
        if src_wkt.is_empty() {
            return Err(PipelineError::Reprojection(
                "input dataset has no projection".to_string(),
            ));
        }
        let dst_wkt = crs::to_wkt(target_crs)
            .map_err(|e| PipelineError::Reprojection(e.to_string()))?;

        let suggestion = warp::suggested_output(input.gdal()?, &src_wkt, &dst_wkt)?;

        let mut output = RasterHandle::create(
            self.workspace.scratch_path("reproject"),
            "GTiff",
            suggestion.width,
            suggestion.height,
            input.band_count(),
            input.band_type(),
        )?;
        output.set_geo_transform(&suggestion.geo_transform)?;
        output.set_projection(&dst_wkt)?;

        warp::warp(input.gdal()?, output.gdal()?, input.band_count())?;
        Ok(output)
    }

    /// Cut the pixel window covering `bounds` out of `input`, verbatim (no
    /// resampling), shifting the geotransform origin by the window offset.
    pub fn clip(&self, input: &RasterHandle, bounds: &BoundingBox) -> Result<RasterHandle> {
        let gt = input
            .geo_transform()
            .ok_or_else(|| PipelineError::Clip("input dataset has no geotransform".to_string()))?;
        let window = clip_window(&gt, input.width(), input.height(), bounds)?;
        debug!(
            "Clip window: offset=({},{}), size={}x{}",
            window.x_off, window.y_off, window.x_size, window.y_size
        );

        let mut output = RasterHandle::create(
            self.workspace.scratch_path("clip"),
            "GTiff",
            window.x_size,
            window.y_size,
            input.band_count(),
            input.band_type(),
        )?;
        output.set_geo_transform(&gt.with_pixel_offset(window.x_off, window.y_off))?;
        let projection = input.projection();
        if !projection.is_empty() {
            output.set_projection(&projection)?;
        }

        for band in 1..=input.band_count() {
            let data = input.read_band_window(
                band,
                window.x_off,
                window.y_off,
                window.x_size,
                window.y_size,
            )?;
            output.write_band(band, &data)?;
            output.set_no_data_value(band, input.no_data_value(band))?;
        }
        Ok(output)
    }

    /// Replace NaN, infinite, and out-of-range pixels with `nodata_value`
    /// and record it as each band's nodata.
    pub fn apply_nodata_mask(&self, input: &RasterHandle, nodata_value: f64) -> Result<RasterHandle> {
        let mut output = RasterHandle::create(
            self.workspace.scratch_path("mask"),
            "GTiff",
            input.width(),
            input.height(),
            input.band_count(),
            input.band_type(),
        )?;
        copy_metadata(input, &mut output)?;

        for band in 1..=input.band_count() {
            let mut data = input.read_band(band)?;
            for pixel in &mut data {
                if pixel.is_nan() || pixel.is_infinite() || *pixel < -SANITY_LIMIT || *pixel > SANITY_LIMIT
                {
                    *pixel = nodata_value;
                }
            }
            output.write_band(band, &data)?;
            output.set_no_data_value(band, Some(nodata_value))?;
        }
        Ok(output)
    }

    /// Multiply every valid pixel by `factor`. A non-positive or identity
    /// factor is a caller error, not a silent no-op.
    pub fn scale(&self, input: &RasterHandle, factor: f64) -> Result<RasterHandle> {
        if factor <= 0.0 || factor == 1.0 {
            return Err(PipelineError::InvalidScaleFactor(factor));
        }

        let mut output = RasterHandle::create(
            self.workspace.scratch_path("scale"),
            "GTiff",
            input.width(),
            input.height(),
            input.band_count(),
            input.band_type(),
        )?;
        copy_metadata(input, &mut output)?;

        for band in 1..=input.band_count() {
            let nodata = input.no_data_value(band);
            let mut data = input.read_band(band)?;
            for pixel in &mut data {
                let is_nodata = nodata.is_some_and(|nd| *pixel == nd);
                if !is_nodata && !pixel.is_nan() {
                    *pixel *= factor;
                }
            }
            output.write_band(band, &data)?;
            output.set_no_data_value(band, nodata)?;
        }
        Ok(output)
    }

    /// Run the configured chain over a working copy of `input`. The input is
    /// never mutated; the first failing step aborts the chain and its
    /// intermediates are abandoned to the workspace.
    pub fn transform(&self, input: &RasterHandle, config: &Config) -> Result<RasterHandle> {
        let mut current = self.duplicate(input)?;

        if let Some(target_crs) = &config.target_crs {
            info!("Reprojecting to {}", target_crs);
            current = self.reproject(&current, target_crs)?;
        }

        if let Some(bounds) = &config.clip_bounds {
            info!(
                "Clipping to bounds [{}, {}, {}, {}]",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            );
            current = self.clip(&current, bounds)?;
        }

        if config.apply_nodata_mask {
            info!("Applying nodata mask with value {}", config.nodata_value);
            current = self.apply_nodata_mask(&current, config.nodata_value)?;
        }

        Ok(current)
    }
}

fn copy_metadata(source: &RasterHandle, target: &mut RasterHandle) -> Result<()> {
    if let Some(gt) = source.geo_transform() {
        target.set_geo_transform(&gt)?;
    }
    let projection = source.projection();
    if !projection.is_empty() {
        target.set_projection(&projection)?;
    }
    Ok(())
}
