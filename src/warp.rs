//! Thin layer over the raster engine's warp primitives. The safe `gdal`
//! wrapper does not expose the suggested-output computation or the chunked
//! warp loop, so this module drops to `gdal-sys` for those two calls.

use crate::error::{PipelineError, Result};
use crate::geo::GeoTransform;
use gdal::Dataset;
use gdal_sys::{CPLErr, GDALResampleAlg};
use log::debug;
use std::ffi::{c_int, CString};
use std::ptr::null_mut;

/// Destination geometry proposed by the engine: the minimal axis-aligned
/// raster covering the reprojected source extent.
#[derive(Debug, Clone, Copy)]
pub struct SuggestedOutput {
    pub geo_transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

struct ImgProjTransformer {
    arg: *mut std::ffi::c_void,
}

impl ImgProjTransformer {
    /// Transformer between a source dataset and a destination described only
    /// by its WKT (destination dataset not created yet).
    fn to_wkt(src: &Dataset, src_wkt: &str, dst_wkt: &str) -> Result<Self> {
        let src_wkt = CString::new(src_wkt)
            .map_err(|e| PipelineError::Reprojection(format!("bad source WKT: {}", e)))?;
        let dst_wkt = CString::new(dst_wkt)
            .map_err(|e| PipelineError::Reprojection(format!("bad target WKT: {}", e)))?;
        let arg = unsafe {
            gdal_sys::GDALCreateGenImgProjTransformer(
                src.c_dataset(),
                src_wkt.as_ptr(),
                null_mut(),
                dst_wkt.as_ptr(),
                0,
                0.0,
                1,
            )
        };
        if arg.is_null() {
            return Err(PipelineError::Reprojection(
                "failed to create coordinate transformer".to_string(),
            ));
        }
        Ok(Self { arg })
    }

    /// Transformer between two georeferenced datasets.
    fn between(src: &Dataset, dst: &Dataset) -> Result<Self> {
        let arg = unsafe {
            gdal_sys::GDALCreateGenImgProjTransformer(
                src.c_dataset(),
                null_mut(),
                dst.c_dataset(),
                null_mut(),
                0,
                0.0,
                1,
            )
        };
        if arg.is_null() {
            return Err(PipelineError::Reprojection(
                "failed to create coordinate transformer".to_string(),
            ));
        }
        Ok(Self { arg })
    }
}

impl Drop for ImgProjTransformer {
    fn drop(&mut self) {
        unsafe { gdal_sys::GDALDestroyGenImgProjTransformer(self.arg) }
    }
}

/// Ask the engine for the destination raster geometry of a warp from the
/// source dataset (in `src_wkt`) into `dst_wkt`.
pub fn suggested_output(src: &Dataset, src_wkt: &str, dst_wkt: &str) -> Result<SuggestedOutput> {
    let transformer = ImgProjTransformer::to_wkt(src, src_wkt, dst_wkt)?;

    let mut gt = [0f64; 6];
    let mut pixels: c_int = 0;
    let mut lines: c_int = 0;
    let rv = unsafe {
        gdal_sys::GDALSuggestedWarpOutput(
            src.c_dataset(),
            Some(gdal_sys::GDALGenImgProjTransform),
            transformer.arg,
            gt.as_mut_ptr(),
            &mut pixels,
            &mut lines,
        )
    };
    if rv != CPLErr::CE_None || pixels <= 0 || lines <= 0 {
        return Err(PipelineError::Reprojection(
            "failed to determine destination raster geometry".to_string(),
        ));
    }

    let out = SuggestedOutput {
        geo_transform: GeoTransform::from_array(gt),
        width: pixels as usize,
        height: lines as usize,
    };
    debug!("Suggested warp output: {}x{}", out.width, out.height);
    Ok(out)
}

/// Warp all bands of `src` into `dst` with nearest-neighbour resampling.
/// `dst` must already carry its projection and geotransform.
pub fn warp(src: &Dataset, dst: &Dataset, band_count: usize) -> Result<()> {
    let (dst_width, dst_height) = dst.raster_size();
    let transformer = ImgProjTransformer::between(src, dst)?;

    unsafe {
        let options = gdal_sys::GDALCreateWarpOptions();
        (*options).hSrcDS = src.c_dataset();
        (*options).hDstDS = dst.c_dataset();
        (*options).nBandCount = band_count as c_int;
        (*options).panSrcBands =
            gdal_sys::CPLMalloc(std::mem::size_of::<c_int>() * band_count).cast::<c_int>();
        (*options).panDstBands =
            gdal_sys::CPLMalloc(std::mem::size_of::<c_int>() * band_count).cast::<c_int>();
        for i in 0..band_count {
            (*options).panSrcBands.add(i).write(i as c_int + 1);
            (*options).panDstBands.add(i).write(i as c_int + 1);
        }
        (*options).pfnTransformer = Some(gdal_sys::GDALGenImgProjTransform);
        (*options).pTransformerArg = transformer.arg;
        (*options).eResampleAlg = GDALResampleAlg::GRA_NearestNeighbour;

        let operation = gdal_sys::GDALCreateWarpOperation(options);
        if operation.is_null() {
            gdal_sys::GDALDestroyWarpOptions(options);
            return Err(PipelineError::Reprojection(
                "failed to initialize warp operation".to_string(),
            ));
        }

        let rv = gdal_sys::GDALChunkAndWarpImage(
            operation,
            0,
            0,
            dst_width as c_int,
            dst_height as c_int,
        );
        gdal_sys::GDALDestroyWarpOperation(operation);
        // pTransformerArg is owned by `transformer`, not the options struct
        (*options).pTransformerArg = null_mut();
        gdal_sys::GDALDestroyWarpOptions(options);

        if rv != CPLErr::CE_None {
            return Err(PipelineError::Reprojection("warp execution failed".to_string()));
        }
    }

    debug!("Warped {} bands into {}x{}", band_count, dst_width, dst_height);
    Ok(())
}
