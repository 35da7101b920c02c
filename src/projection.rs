//! Coordinate reference systems and re-projection to EPSG:4326.
//!
//! Only the inverse projections used by hydrofabric and web map layers are provided. Output is
//! `(longitude, latitude)` in degrees.

use crate::error::FlowmapError;

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

/// A coordinate reference system identified by authority and code, e.g. `EPSG:5070`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Crs {
    authority: String,
    code: i64,
}

impl Crs {
    /// Returns a CRS from an authority name and code.
    pub fn new(authority: &str, code: i64) -> Self {
        Self {
            authority: authority.to_uppercase(),
            code,
        }
    }

    /// Returns an EPSG CRS.
    pub fn epsg(code: i64) -> Self {
        Self::new("EPSG", code)
    }

    /// Whether coordinates are already longitude/latitude on WGS84.
    pub fn is_wgs84(&self) -> bool {
        self.authority == "EPSG" && self.code == 4326
    }

    /// Returns a transform from this CRS to EPSG:4326.
    pub fn reprojector(&self) -> Result<Box<dyn Reproject>, FlowmapError> {
        if self.authority != "EPSG" {
            return Err(FlowmapError::UnsupportedCrs {
                crs: self.to_string(),
            });
        }
        match self.code {
            // NAD83 differs from WGS84 by about a metre.
            4326 | 4269 => Ok(Box::new(Geographic)),
            3857 | 900913 => Ok(Box::new(WebMercator)),
            5070 | 6350 => Ok(Box::new(AlbersEqualArea::conus(Ellipsoid::GRS80))),
            5069 => Ok(Box::new(AlbersEqualArea::conus(Ellipsoid::CLARKE_1866))),
            _ => Err(FlowmapError::UnsupportedCrs {
                crs: self.to_string(),
            }),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

/// Transform from projected coordinates to longitude/latitude degrees.
pub trait Reproject: Send + Sync {
    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64);
}

/// Geographic coordinates, passed through.
#[derive(Clone, Copy, Debug)]
pub struct Geographic;

impl Reproject for Geographic {
    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }
}

/// Spherical Web Mercator.
#[derive(Clone, Copy, Debug)]
pub struct WebMercator;

impl WebMercator {
    const RADIUS: f64 = 6_378_137.0;
}

impl Reproject for WebMercator {
    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / Self::RADIUS).to_degrees();
        let lat = (2.0 * (y / Self::RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
        (lon, lat)
    }
}

/// Reference ellipsoid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis in metres
    pub a: f64,
    /// Inverse flattening
    pub inverse_flattening: f64,
}

impl Ellipsoid {
    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        inverse_flattening: 298.257_222_101,
    };

    pub const CLARKE_1866: Ellipsoid = Ellipsoid {
        a: 6_378_206.4,
        inverse_flattening: 294.978_698_213_898,
    };

    fn eccentricity_squared(&self) -> f64 {
        let f = 1.0 / self.inverse_flattening;
        2.0 * f - f * f
    }
}

/// Albers Equal Area conic on an ellipsoid (Snyder, Map Projections: A Working Manual, 14).
#[derive(Clone, Copy, Debug)]
pub struct AlbersEqualArea {
    a: f64,
    e: f64,
    e2: f64,
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

impl AlbersEqualArea {
    /// Returns the projection for the given standard parallels and origin, in degrees.
    pub fn new(ellipsoid: Ellipsoid, lat1: f64, lat2: f64, lat0: f64, lon0: f64) -> Self {
        let a = ellipsoid.a;
        let e2 = ellipsoid.eccentricity_squared();
        let e = e2.sqrt();
        let m = |phi: f64| phi.cos() / (1.0 - e2 * phi.sin().powi(2)).sqrt();
        let (phi1, phi2, phi0) = (lat1.to_radians(), lat2.to_radians(), lat0.to_radians());
        let (m1, m2) = (m(phi1), m(phi2));
        let (q0, q1, q2) = (q(e, e2, phi0), q(e, e2, phi1), q(e, e2, phi2));
        let n = if (lat1 - lat2).abs() < f64::EPSILON {
            phi1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        let c = m1 * m1 + n * q1;
        let rho0 = a * (c - n * q0).sqrt() / n;
        Self {
            a,
            e,
            e2,
            lon0: lon0.to_radians(),
            n,
            c,
            rho0,
        }
    }

    /// CONUS Albers: standard parallels 29.5 and 45.5, origin 23N 96W.
    pub fn conus(ellipsoid: Ellipsoid) -> Self {
        Self::new(ellipsoid, 29.5, 45.5, 23.0, -96.0)
    }

    /// Project longitude/latitude degrees to metres.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let q = q(self.e, self.e2, lat.to_radians());
        let rho = self.a * (self.c - self.n * q).sqrt() / self.n;
        let theta = self.n * (lon.to_radians() - self.lon0);
        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }
}

impl Reproject for AlbersEqualArea {
    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        let dy = self.rho0 - y;
        let rho = (x * x + dy * dy).sqrt();
        let theta = if self.n < 0.0 {
            (-x).atan2(-dy)
        } else {
            x.atan2(dy)
        };
        let q = (self.c - (rho * self.n / self.a).powi(2)) / self.n;

        let limit = 1.0 - (1.0 - self.e2) / (2.0 * self.e) * ((1.0 - self.e) / (1.0 + self.e)).ln();
        let phi = if (q.abs() - limit.abs()).abs() < 1e-12 {
            FRAC_PI_2.copysign(q)
        } else {
            let mut phi = (q / 2.0).clamp(-1.0, 1.0).asin();
            for _ in 0..15 {
                let sin = phi.sin();
                let one_minus = 1.0 - self.e2 * sin * sin;
                let delta = one_minus * one_minus / (2.0 * phi.cos())
                    * (q / (1.0 - self.e2) - sin / one_minus
                        + 1.0 / (2.0 * self.e)
                            * ((1.0 - self.e * sin) / (1.0 + self.e * sin)).ln());
                phi += delta;
                if delta.abs() < 1e-12 {
                    break;
                }
            }
            phi
        };
        let mut lon = self.lon0 + theta / self.n;
        if lon > PI {
            lon -= 2.0 * PI;
        } else if lon < -PI {
            lon += 2.0 * PI;
        }
        (lon.to_degrees(), phi.to_degrees())
    }
}

fn q(e: f64, e2: f64, phi: f64) -> f64 {
    let sin = phi.sin();
    (1.0 - e2)
        * (sin / (1.0 - e2 * sin * sin)
            - 1.0 / (2.0 * e) * ((1.0 - e * sin) / (1.0 + e * sin)).ln())
}
