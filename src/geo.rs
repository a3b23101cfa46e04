use serde::Deserialize;

/// Axis-aligned extent in the coordinate units of some CRS.
///
/// Well-formedness (`min < max` on both axes) is checked once at
/// configuration time; transform code assumes it holds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.min_x < self.max_x && self.min_y < self.max_y
    }
}

/// Affine mapping from pixel (col, row) to geographic (x, y):
///
/// ```text
/// x = origin_x + col * pixel_width  + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `pixel_height` is negative for north-up rasters. A dataset with no
/// geotransform is represented as `Option::None` by callers, not as an
/// all-zero (degenerate) transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// GDAL coefficient order: [originX, pixelWidth, rowRot, originY, colRot, pixelHeight].
    pub fn from_array(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Map a pixel coordinate to the geographic position of its top-left corner.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Shift the origin by a pixel offset, as when cutting a sub-window.
    pub fn with_pixel_offset(&self, x_off: usize, y_off: usize) -> Self {
        let mut out = *self;
        out.origin_x += x_off as f64 * self.pixel_width;
        out.origin_y += y_off as f64 * self.pixel_height;
        out
    }

    /// Geographic extent of a raster of the given size under this transform.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let max_x = self.origin_x + width as f64 * self.pixel_width;
        let min_y = self.origin_y + height as f64 * self.pixel_height;
        BoundingBox {
            min_x: self.origin_x,
            min_y,
            max_x,
            max_y: self.origin_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_well_formed() {
        assert!(BoundingBox::new(0.0, 0.0, 10.0, 10.0).is_well_formed());
        assert!(!BoundingBox::new(10.0, 0.0, 0.0, 10.0).is_well_formed());
        assert!(!BoundingBox::new(0.0, 5.0, 10.0, 5.0).is_well_formed());
    }

    #[test]
    fn test_geotransform_roundtrip() {
        let gt = GeoTransform::from_array([0.0, 1.0, 0.0, 100.0, 0.0, -1.0]);
        assert_eq!(gt.to_array(), [0.0, 1.0, 0.0, 100.0, 0.0, -1.0]);
    }

    #[test]
    fn test_apply_north_up() {
        let gt = GeoTransform::from_array([0.0, 1.0, 0.0, 100.0, 0.0, -1.0]);
        assert_eq!(gt.apply(0.0, 0.0), (0.0, 100.0));
        assert_eq!(gt.apply(10.0, 10.0), (10.0, 90.0));
    }

    #[test]
    fn test_bounds_negative_pixel_height() {
        let gt = GeoTransform::from_array([0.0, 1.0, 0.0, 100.0, 0.0, -1.0]);
        let b = gt.bounds(100, 100);
        assert_eq!(b.min_x, 0.0);
        assert_eq!(b.max_x, 100.0);
        assert_eq!(b.min_y, 0.0);
        assert_eq!(b.max_y, 100.0);
        assert!(b.is_well_formed());
    }

    #[test]
    fn test_pixel_offset_shifts_origin() {
        let gt = GeoTransform::from_array([0.0, 1.0, 0.0, 100.0, 0.0, -1.0]);
        let shifted = gt.with_pixel_offset(10, 60);
        assert_eq!(shifted.origin_x, 10.0);
        assert_eq!(shifted.origin_y, 40.0);
        assert_eq!(shifted.pixel_width, 1.0);
    }
}
