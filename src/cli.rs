//! Command Line Interface (CLI) arguments.

use crate::resample::BucketOrigin;

use clap::Parser;
use std::path::PathBuf;

/// flowmap command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// Model run folder holding config/*.gpkg and outputs/troute/troute_*.nc. When set, the
    /// combined endpoint serves this run instead of the staged files
    #[arg(env = "FLOWMAP_RUN_DIR")]
    pub run_dir: Option<PathBuf>,
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "FLOWMAP_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "FLOWMAP_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "FLOWMAP_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/flowmap/certs/cert.pem",
        env = "FLOWMAP_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/flowmap/certs/key.pem",
        env = "FLOWMAP_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "FLOWMAP_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Directory holding input files, including the staged uploaded.gpkg and uploaded.nc
    #[arg(long, default_value = "uploads", env = "FLOWMAP_DATA_DIR")]
    pub data_dir: PathBuf,
    /// GeoPackage feature layer holding the river network
    #[arg(long, default_value = "flowpaths", env = "FLOWMAP_LAYER")]
    pub layer: String,
    /// Column of the feature layer holding reach identifiers
    #[arg(long, default_value = "id", env = "FLOWMAP_ID_COLUMN")]
    pub id_column: String,
    /// Name of the NetCDF time dimension and coordinate
    #[arg(long, default_value = "time", env = "FLOWMAP_TIME_DIMENSION")]
    pub time_dimension: String,
    /// Name of the NetCDF reach dimension and identifier coordinate
    #[arg(long, default_value = "feature_id", env = "FLOWMAP_REACH_DIMENSION")]
    pub reach_dimension: String,
    /// Anchoring of resample buckets
    #[arg(long, value_enum, default_value_t = BucketOrigin::StartDay, env = "FLOWMAP_RESAMPLE_ORIGIN")]
    pub resample_origin: BucketOrigin,
    /// Reject combined responses whose geometry and time series identifiers differ
    #[arg(long, default_value_t = false, env = "FLOWMAP_STRICT_IDS")]
    pub strict_ids: bool,
    /// Whether to use Rayon for execution of CPU-bound tasks.
    #[arg(long, default_value_t = false, env = "FLOWMAP_USE_RAYON")]
    pub use_rayon: bool,
    /// Maximum number of extractions to run concurrently. Defaults to the number of CPUs minus
    /// one
    #[arg(long, env = "FLOWMAP_THREAD_LIMIT")]
    pub thread_limit: Option<usize>,
    /// Memory limit in bytes for input files being processed concurrently
    #[arg(long, env = "FLOWMAP_MEMORY_LIMIT")]
    pub memory_limit: Option<usize>,
    /// Whether to cache responses keyed by input file content
    #[arg(long, default_value_t = false, env = "FLOWMAP_USE_CACHE")]
    pub use_cache: bool,
    /// Maximum number of cached responses
    #[arg(long, default_value_t = 16, env = "FLOWMAP_CACHE_SIZE")]
    pub cache_size: usize,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
