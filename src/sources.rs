//! Input file location.
//!
//! Files are served from a data directory. A geometry/time series pair is either staged there
//! under fixed names, or taken from a model run folder given at startup.

use crate::error::FlowmapError;
use crate::models::SourceNames;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use strum_macros::Display;
use tracing::debug;

/// File name of the staged GeoPackage.
pub const STAGED_GEOPACKAGE: &str = "uploaded.gpkg";

/// File name of the staged NetCDF file.
pub const STAGED_NETCDF: &str = "uploaded.nc";

/// Kinds of input file.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum FileKind {
    GeoPackage,
    NetCDF,
}

impl FileKind {
    /// Accepted file name extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::GeoPackage => "gpkg",
            Self::NetCDF => "nc",
        }
    }
}

/// Resolve a client supplied file name inside `data_dir`.
///
/// The name must be a single path component with the extension of `kind`.
pub fn resolve_file(data_dir: &Path, filename: &str, kind: FileKind) -> Result<PathBuf, FlowmapError> {
    let invalid = || FlowmapError::InvalidFileName {
        filename: filename.to_string(),
    };
    if filename.is_empty()
        || filename.contains(['/', '\\'])
        || filename.contains("..")
        || filename.starts_with('.')
    {
        return Err(invalid());
    }
    let path = Path::new(filename);
    match path.extension().and_then(|extension| extension.to_str()) {
        Some(extension) if extension.eq_ignore_ascii_case(kind.extension()) => (),
        _ => return Err(invalid()),
    }
    let path = data_dir.join(path);
    if !path.is_file() {
        return Err(FlowmapError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(path)
}

/// A geometry file and its matching time series file.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceFiles {
    pub geopackage: PathBuf,
    pub netcdf: PathBuf,
}

impl SourceFiles {
    /// The staged pair in `data_dir`.
    pub fn staged(data_dir: &Path) -> Result<Self, FlowmapError> {
        let files = Self {
            geopackage: data_dir.join(STAGED_GEOPACKAGE),
            netcdf: data_dir.join(STAGED_NETCDF),
        };
        for path in [&files.geopackage, &files.netcdf] {
            if !path.is_file() {
                return Err(FlowmapError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        }
        Ok(files)
    }

    /// The pair produced by a model run.
    ///
    /// The GeoPackage is the first `config/*.gpkg` by name. The time series is the most recently
    /// modified `outputs/troute/troute_*.nc`.
    pub fn from_run(run_dir: &Path) -> Result<Self, FlowmapError> {
        let config_dir = run_dir.join("config");
        let mut geopackages = list_files(&config_dir, |name| name.ends_with(".gpkg"))?;
        geopackages.sort();
        let geopackage = geopackages
            .into_iter()
            .next()
            .ok_or_else(|| FlowmapError::FileNotFound {
                path: config_dir.join("*.gpkg").display().to_string(),
            })?;

        let output_dir = run_dir.join("outputs").join("troute");
        let mut outputs = list_files(&output_dir, |name| {
            name.starts_with("troute_") && name.ends_with(".nc")
        })?
        .into_iter()
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|metadata| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect::<Vec<_>>();
        outputs.sort();
        let netcdf = outputs
            .pop()
            .map(|(_, path)| path)
            .ok_or_else(|| FlowmapError::FileNotFound {
                path: output_dir.join("troute_*.nc").display().to_string(),
            })?;

        debug!(geopackage = %geopackage.display(), netcdf = %netcdf.display(), "Located run files");
        Ok(Self { geopackage, netcdf })
    }

    /// File names, for reporting.
    pub fn names(&self) -> SourceNames {
        let name = |path: &Path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        SourceNames {
            geopackage: name(&self.geopackage),
            netcdf: name(&self.netcdf),
        }
    }
}

/// Where the combined endpoint finds its input pair.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceLocation {
    /// Staged files in the data directory
    Staged(PathBuf),
    /// A model run folder
    Run(PathBuf),
}

impl SourceLocation {
    /// Locate the current pair.
    pub fn locate(&self) -> Result<SourceFiles, FlowmapError> {
        match self {
            Self::Staged(data_dir) => SourceFiles::staged(data_dir),
            Self::Run(run_dir) => SourceFiles::from_run(run_dir),
        }
    }

    /// Whether files were found from a run folder given at startup.
    pub fn auto_loaded(&self) -> bool {
        matches!(self, Self::Run(_))
    }
}

fn list_files(dir: &Path, matches: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, FlowmapError> {
    if !dir.is_dir() {
        return Err(FlowmapError::FileNotFound {
            path: dir.display().to_string(),
        });
    }
    let mut files = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let selected = path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, &matches);
        if selected {
            files.push(path);
        }
    }
    Ok(files)
}
