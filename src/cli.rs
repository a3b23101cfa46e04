use crate::config::Config;
use crate::error::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "raster-pipeline")]
#[command(about = "Reproject, clip, and mask raster datasets from a declarative config")]
#[command(version)]
pub struct Args {
    /// Input raster path
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<String>,

    /// Output raster path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Output format driver (default: GTiff)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Target coordinate reference system (e.g. EPSG:3857)
    #[arg(long, value_name = "CRS")]
    pub target_crs: Option<String>,

    /// JSON configuration file (overrides direct flags)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Index into a JSON config array (default: 0)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub job: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the processing config: from the JSON file when given, otherwise
    /// from the direct flags. The verbose flag applies either way.
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path, self.job)?,
            None => Config {
                input_file: self.input.unwrap_or_default(),
                output_file: self.output.unwrap_or_default(),
                output_format: self.format.unwrap_or_else(|| "GTiff".to_string()),
                target_crs: self.target_crs,
                ..Config::default()
            },
        };
        if self.verbose {
            config.verbose = true;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_flags_build_config() {
        let args = Args::parse_from([
            "raster-pipeline",
            "-i",
            "in.tif",
            "-o",
            "out.tif",
            "--target-crs",
            "EPSG:3857",
            "-v",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.input_file, "in.tif");
        assert_eq!(config.output_file, "out.tif");
        assert_eq!(config.output_format, "GTiff");
        assert_eq!(config.target_crs.as_deref(), Some("EPSG:3857"));
        assert!(config.verbose);
    }

    #[test]
    fn test_config_file_wins_over_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"input_file": "json.tif", "output_file": "json_out.tif"}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "raster-pipeline",
            "-i",
            "flag.tif",
            "-c",
            path.to_str().unwrap(),
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.input_file, "json.tif");
    }
}
