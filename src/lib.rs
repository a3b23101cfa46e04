// Library exports for testing and reuse

pub mod cli;
pub mod config;
pub mod crs;
pub mod dataset;
pub mod error;
pub mod geo;
pub mod pipeline;
pub mod temp;
pub mod transform;
pub mod warp;

// Re-export commonly used types
pub use config::Config;
pub use dataset::RasterHandle;
pub use error::{PipelineError, Result};
pub use geo::{BoundingBox, GeoTransform};
pub use pipeline::{Pipeline, Stage};
pub use transform::TransformChain;
