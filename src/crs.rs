use crate::error::{PipelineError, Result};
use crate::geo::BoundingBox;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use log::debug;

/// Parse a user-supplied CRS string ("EPSG:4326", WKT, PROJ, ...) into a
/// spatial reference with x/y axis order.
pub fn parse(definition: &str) -> Result<SpatialRef> {
    let mut srs = SpatialRef::from_definition(definition)
        .map_err(|e| PipelineError::Crs(format!("cannot parse '{}': {}", definition, e)))?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// Canonical WKT form of a user-supplied CRS string.
pub fn to_wkt(definition: &str) -> Result<String> {
    let srs = parse(definition)?;
    srs.to_wkt()
        .map_err(|e| PipelineError::Crs(format!("cannot export '{}' to WKT: {}", definition, e)))
}

/// Build a coordinate transformation between two parsed references.
pub fn create_transform(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform> {
    CoordTransform::new(source, target)
        .map_err(|e| PipelineError::Crs(format!("cannot create coordinate transform: {}", e)))
}

/// Transform a single point.
pub fn transform_point(transform: &CoordTransform, x: f64, y: f64) -> Result<(f64, f64)> {
    let mut xs = [x];
    let mut ys = [y];
    let mut zs = [0.0];
    transform
        .transform_coords(&mut xs, &mut ys, &mut zs)
        .map_err(|e| PipelineError::Crs(format!("point transform failed: {}", e)))?;
    Ok((xs[0], ys[0]))
}

/// Transform a bounding box by reprojecting its two defining corners and
/// re-normalizing min/max, since axis order may flip or invert.
pub fn transform_bounds(
    bounds: &BoundingBox,
    source_crs: &str,
    target_crs: &str,
) -> Result<BoundingBox> {
    let source = parse(source_crs)?;
    let target = parse(target_crs)?;
    let transform = create_transform(&source, &target)?;

    let (x1, y1) = transform_point(&transform, bounds.min_x, bounds.min_y)?;
    let (x2, y2) = transform_point(&transform, bounds.max_x, bounds.max_y)?;

    let out = BoundingBox::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2));
    debug!(
        "Transformed bounds [{}, {}, {}, {}] -> [{}, {}, {}, {}]",
        bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y,
        out.min_x, out.min_y, out.max_x, out.max_y
    );
    Ok(out)
}
