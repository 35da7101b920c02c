use crate::dataset::{ReachId, TimeSeriesDataset};

use ndarray::array;
use rusqlite::{params, Connection};
use std::path::Path;
use time::{Duration, OffsetDateTime};

/// `n` hourly timestamps starting at `start`.
pub(crate) fn hourly(start: OffsetDateTime, n: usize) -> Vec<OffsetDateTime> {
    (0..n)
        .map(|hour| start + Duration::hours(hour as i64))
        .collect()
}

/// Three hours of two reaches, with flow stored reach-major and velocity time-major.
pub(crate) fn mixed_layout_dataset() -> TimeSeriesDataset {
    let mut dataset = TimeSeriesDataset::new();
    dataset
        .add_time_coordinate(
            "time",
            hourly(time::macros::datetime!(2023-01-01 0:00 UTC), 3),
        )
        .unwrap();
    dataset
        .add_id_coordinate("feature_id", vec![102, 101])
        .unwrap();
    dataset
        .add_variable(
            "flow",
            vec!["feature_id".to_string(), "time".to_string()],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn(),
        )
        .unwrap();
    dataset
        .add_variable(
            "velocity",
            vec!["time".to_string(), "feature_id".to_string()],
            array![[10.0, 40.0], [20.0, 50.0], [30.0, 60.0]].into_dyn(),
        )
        .unwrap();
    dataset
}

/// Little-endian WKB point.
pub(crate) fn wkb_point(x: f64, y: f64) -> Vec<u8> {
    let mut wkb = vec![1];
    wkb.extend_from_slice(&1_u32.to_le_bytes());
    wkb.extend_from_slice(&x.to_le_bytes());
    wkb.extend_from_slice(&y.to_le_bytes());
    wkb
}

/// Little-endian WKB line string.
pub(crate) fn wkb_linestring(points: &[[f64; 2]]) -> Vec<u8> {
    let mut wkb = vec![1];
    wkb.extend_from_slice(&2_u32.to_le_bytes());
    wkb.extend_from_slice(&(points.len() as u32).to_le_bytes());
    for [x, y] in points {
        wkb.extend_from_slice(&x.to_le_bytes());
        wkb.extend_from_slice(&y.to_le_bytes());
    }
    wkb
}

/// Wrap WKB in a GeoPackage binary header with a zeroed envelope of the given code.
pub(crate) fn gpkg_blob(wkb: &[u8], envelope_code: u8) -> Vec<u8> {
    let envelope_len = match envelope_code {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        _ => panic!("invalid envelope code {envelope_code}"),
    };
    let mut blob = b"GP".to_vec();
    blob.push(0);
    blob.push(0x01 | (envelope_code << 1));
    blob.extend_from_slice(&4326_i32.to_le_bytes());
    blob.extend(std::iter::repeat(0).take(envelope_len));
    blob.extend_from_slice(wkb);
    blob
}

/// Identifier stored for a fixture feature.
pub(crate) enum FixtureId {
    Integer(i64),
    Text(String),
}

/// A feature row written by [write_geopackage].
pub(crate) struct FixtureFeature {
    pub id: FixtureId,
    pub line: Option<Vec<[f64; 2]>>,
}

impl FixtureFeature {
    /// Integer identifier with a line string geometry.
    pub fn line(id: ReachId, points: &[[f64; 2]]) -> Self {
        Self {
            id: FixtureId::Integer(id),
            line: Some(points.to_vec()),
        }
    }

    /// Text identifier with an optional line string geometry.
    pub fn text(id: &str, points: Option<&[[f64; 2]]>) -> Self {
        Self {
            id: FixtureId::Text(id.to_string()),
            line: points.map(|points| points.to_vec()),
        }
    }
}

/// Write a minimal GeoPackage holding one feature layer.
///
/// `srs_id` is either an EPSG code or -1 for an undefined CRS.
pub(crate) fn write_geopackage(
    path: &Path,
    layer: &str,
    srs_id: i64,
    features: &[FixtureFeature],
) {
    let connection = Connection::open(path).unwrap();
    connection
        .execute_batch(
            "CREATE TABLE gpkg_spatial_ref_sys (
                srs_name TEXT NOT NULL,
                srs_id INTEGER PRIMARY KEY,
                organization TEXT NOT NULL,
                organization_coordsys_id INTEGER NOT NULL,
                definition TEXT NOT NULL
            );
            CREATE TABLE gpkg_contents (
                table_name TEXT PRIMARY KEY,
                data_type TEXT NOT NULL,
                identifier TEXT
            );
            CREATE TABLE gpkg_geometry_columns (
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL,
                srs_id INTEGER NOT NULL
            );",
        )
        .unwrap();
    let organization = if srs_id < 0 { "NONE" } else { "EPSG" };
    connection
        .execute(
            "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, ?3, ?4, 'undefined')",
            params![format!("{organization}:{srs_id}"), srs_id, organization, srs_id],
        )
        .unwrap();
    connection
        .execute(
            "INSERT INTO gpkg_contents VALUES (?1, 'features', ?1)",
            params![layer],
        )
        .unwrap();
    connection
        .execute(
            "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', 'LINESTRING', ?2)",
            params![layer, srs_id],
        )
        .unwrap();
    connection
        .execute_batch(&format!(
            "CREATE TABLE \"{layer}\" (fid INTEGER PRIMARY KEY AUTOINCREMENT, id, geom BLOB)"
        ))
        .unwrap();

    let mut statement = connection
        .prepare(&format!("INSERT INTO \"{layer}\" (id, geom) VALUES (?1, ?2)"))
        .unwrap();
    for feature in features {
        let geometry = feature
            .line
            .as_ref()
            .map(|points| gpkg_blob(&wkb_linestring(points), 0));
        match &feature.id {
            FixtureId::Integer(id) => statement.execute(params![id, geometry]),
            FixtureId::Text(id) => statement.execute(params![id, geometry]),
        }
        .unwrap();
    }
}

/// Write a small routing output: three hours, reaches `[102, 101]`, a reach-major `flow` and a
/// time-major `depth` with its first value missing.
#[cfg(feature = "netcdf")]
pub(crate) fn write_netcdf(path: &Path) {
    let mut file = netcdf::create(path).unwrap();
    file.add_dimension("time", 3).unwrap();
    file.add_dimension("feature_id", 2).unwrap();

    let mut time = file.add_variable::<f64>("time", &["time"]).unwrap();
    time.put_attribute("units", "hours since 2023-01-01 00:00:00")
        .unwrap();
    time.put_values(&[0.0, 1.0, 2.0], ..).unwrap();

    let mut ids = file
        .add_variable::<i64>("feature_id", &["feature_id"])
        .unwrap();
    ids.put_values(&[102_i64, 101], ..).unwrap();

    let mut flow = file
        .add_variable::<f64>("flow", &["feature_id", "time"])
        .unwrap();
    flow.put_attribute("units", "m3 s-1").unwrap();
    flow.put_values(&[1.0, 3.0, 5.0, 2.0, 4.0, 6.0], ..).unwrap();

    let mut depth = file
        .add_variable::<f64>("depth", &["time", "feature_id"])
        .unwrap();
    depth.put_attribute("_FillValue", -9999.0_f64).unwrap();
    depth
        .put_values(&[-9999.0, 1.0, 2.0, 0.5, 3.0, 4.0], ..)
        .unwrap();
}
