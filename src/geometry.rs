//! Feature layer summaries.

use crate::dataset::ReachId;
use crate::error::FlowmapError;
use crate::models::GeometrySummary;
use crate::projection::{Crs, Reproject};
use crate::sort::{duplicate_ids, sort_permutation};

use rayon::prelude::*;
use tracing::{debug, instrument, warn};

/// One feature of a layer: its identifier and every vertex of its geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Feature {
    pub id: ReachId,
    pub coordinates: Vec<[f64; 2]>,
}

/// Features of one layer and the CRS of their coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureLayer {
    pub name: String,
    /// `None` when the layer does not declare a CRS
    pub crs: Option<Crs>,
    pub features: Vec<Feature>,
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }
}

impl Envelope {
    /// Grow the envelope to include a point. Non-finite points are ignored.
    pub fn expand(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Smallest envelope holding both envelopes.
    pub fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Whether no point has been included.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    /// `[min_x, min_y, max_x, max_y]`, or NaN throughout when empty.
    pub fn bounds(&self) -> [f64; 4] {
        if self.is_empty() {
            [f64::NAN; 4]
        } else {
            [self.min_x, self.min_y, self.max_x, self.max_y]
        }
    }
}

/// Summarise a layer: EPSG:4326 bounds and sorted identifiers.
///
/// Coordinates are re-projected when the layer declares a CRS other than EPSG:4326. A layer
/// without a CRS is used as stored.
#[instrument(skip_all, fields(layer = %layer.name, features = layer.features.len()))]
pub fn extract_geometry(layer: &FeatureLayer) -> Result<GeometrySummary, FlowmapError> {
    let reprojector: Option<Box<dyn Reproject>> = match &layer.crs {
        Some(crs) if !crs.is_wgs84() => {
            debug!(%crs, "Re-projecting to EPSG:4326");
            Some(crs.reprojector()?)
        }
        _ => None,
    };

    let envelope = layer
        .features
        .par_iter()
        .map(|feature| {
            let mut envelope = Envelope::default();
            for [x, y] in &feature.coordinates {
                match &reprojector {
                    Some(reprojector) => {
                        let (lon, lat) = reprojector.to_wgs84(*x, *y);
                        envelope.expand(lon, lat);
                    }
                    None => envelope.expand(*x, *y),
                }
            }
            envelope
        })
        .reduce(Envelope::default, Envelope::union);

    let ids: Vec<ReachId> = layer.features.iter().map(|feature| feature.id).collect();
    let (feature_ids, _) = sort_permutation(&ids);
    let duplicates = duplicate_ids(&feature_ids);
    if !duplicates.is_empty() {
        warn!(
            count = duplicates.len(),
            first = duplicates[0],
            "Duplicate feature identifiers in layer"
        );
    }

    Ok(GeometrySummary {
        bounds: envelope.bounds(),
        count: feature_ids.len(),
        feature_ids,
    })
}
