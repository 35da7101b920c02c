//! GeoPackage feature layer reader.
//!
//! A GeoPackage is an SQLite database. Feature tables are listed in `gpkg_contents`, their
//! geometry column and spatial reference in `gpkg_geometry_columns` and `gpkg_spatial_ref_sys`.
//! Geometries are stored as GeoPackage binary blobs: a short header, an optional envelope, then
//! well-known binary (WKB).

use crate::dataset::ReachId;
use crate::error::FlowmapError;
use crate::geometry::{Feature, FeatureLayer};
use crate::projection::Crs;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::{debug, instrument};

/// Read the identifiers and vertices of a feature layer.
///
/// # Arguments
///
/// * `path`: GeoPackage file
/// * `layer`: Feature table name
/// * `id_column`: Column holding integer-like feature identifiers
#[instrument(skip(path), fields(path = %path.display()))]
pub fn read_layer(path: &Path, layer: &str, id_column: &str) -> Result<FeatureLayer, FlowmapError> {
    if !path.is_file() {
        return Err(FlowmapError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let data_type: Option<String> = connection
        .query_row(
            "SELECT data_type FROM gpkg_contents WHERE table_name = ?1",
            params![layer],
            |row| row.get(0),
        )
        .optional()?;
    if data_type.as_deref() != Some("features") {
        return Err(FlowmapError::MissingLayer {
            layer: layer.to_string(),
        });
    }

    let (geometry_column, srs_id): (String, i64) = connection
        .query_row(
            "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
            params![layer],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| FlowmapError::MissingColumn {
            layer: layer.to_string(),
            column: "geometry".to_string(),
        })?;
    let crs = read_crs(&connection, srs_id)?;
    debug!(%geometry_column, srs_id, ?crs, "Found feature table");

    let columns = table_columns(&connection, layer)?;
    for column in [id_column, geometry_column.as_str()] {
        if !columns.iter().any(|name| name == column) {
            return Err(FlowmapError::MissingColumn {
                layer: layer.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut statement = connection.prepare(&format!(
        "SELECT {}, {} FROM {}",
        quote_identifier(id_column),
        quote_identifier(&geometry_column),
        quote_identifier(layer)
    ))?;
    let mut rows = statement.query([])?;
    let mut features = vec![];
    while let Some(row) = rows.next()? {
        let id = identifier_from_value(row.get_ref(0)?)?;
        let mut coordinates = vec![];
        match row.get_ref(1)? {
            ValueRef::Blob(blob) => blob_coordinates(blob, &mut coordinates)?,
            ValueRef::Null => (),
            _ => {
                return Err(FlowmapError::InvalidGeometry {
                    reason: format!("geometry of feature {id} is not a blob"),
                })
            }
        }
        features.push(Feature { id, coordinates });
    }
    debug!(features = features.len(), "Read feature table");

    Ok(FeatureLayer {
        name: layer.to_string(),
        crs,
        features,
    })
}

/// Look up the CRS of a spatial reference system id.
///
/// The reserved ids 0 (undefined geographic) and -1 (undefined Cartesian) have no CRS.
fn read_crs(connection: &Connection, srs_id: i64) -> Result<Option<Crs>, FlowmapError> {
    if srs_id <= 0 {
        return Ok(None);
    }
    let definition: Option<(String, i64)> = connection
        .query_row(
            "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            params![srs_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(match definition {
        Some((organization, code)) if !organization.eq_ignore_ascii_case("none") => {
            Some(Crs::new(&organization, code))
        }
        _ => None,
    })
}

fn table_columns(connection: &Connection, table: &str) -> Result<Vec<String>, FlowmapError> {
    let mut statement =
        connection.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let columns = statement
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Convert a stored identifier to a [ReachId].
///
/// Integers are used as stored. Reals must be integral. Text must be an integer, optionally
/// behind a non-numeric prefix such as `wb-`.
pub fn identifier_from_value(value: ValueRef<'_>) -> Result<ReachId, FlowmapError> {
    match value {
        ValueRef::Integer(id) => Ok(id),
        ValueRef::Real(id) if id.fract() == 0.0 && id.abs() < 9.0e15 => Ok(id as ReachId),
        ValueRef::Real(id) => Err(FlowmapError::InvalidIdentifier {
            value: id.to_string(),
        }),
        ValueRef::Text(text) => identifier_from_text(&String::from_utf8_lossy(text)),
        ValueRef::Null => Err(FlowmapError::InvalidIdentifier {
            value: "NULL".to_string(),
        }),
        ValueRef::Blob(_) => Err(FlowmapError::InvalidIdentifier {
            value: "BLOB".to_string(),
        }),
    }
}

/// Parse an integer identifier, allowing a non-numeric prefix (`wb-123` is 123).
pub fn identifier_from_text(text: &str) -> Result<ReachId, FlowmapError> {
    let invalid = || FlowmapError::InvalidIdentifier {
        value: text.to_string(),
    };
    let trimmed = text.trim();
    if let Ok(id) = trimmed.parse::<ReachId>() {
        return Ok(id);
    }
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(index, _)| index)
        .ok_or_else(invalid)?;
    let prefix = &trimmed[..digits_start];
    if prefix.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    trimmed[digits_start..].parse().map_err(|_| invalid())
}

/// Cursor over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FlowmapError> {
        if self.remaining() < len {
            return Err(invalid_geometry("unexpected end of geometry"));
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, FlowmapError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self, little_endian: bool) -> Result<u32, FlowmapError> {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(if little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn f64(&mut self, little_endian: bool) -> Result<f64, FlowmapError> {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(if little_endian {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        })
    }

    /// Read one vertex, keeping X and Y and skipping Z and M.
    fn point(&mut self, little_endian: bool, dimensions: usize) -> Result<[f64; 2], FlowmapError> {
        let x = self.f64(little_endian)?;
        let y = self.f64(little_endian)?;
        for _ in 2..dimensions {
            self.f64(little_endian)?;
        }
        Ok([x, y])
    }

    /// Read a count of items of `item_size` bytes, checking that they fit in the remaining data.
    fn count(&mut self, little_endian: bool, item_size: usize) -> Result<usize, FlowmapError> {
        let count = usize::try_from(self.u32(little_endian)?)?;
        if count.saturating_mul(item_size) > self.remaining() {
            return Err(invalid_geometry("element count exceeds geometry size"));
        }
        Ok(count)
    }
}

fn invalid_geometry(reason: &str) -> FlowmapError {
    FlowmapError::InvalidGeometry {
        reason: reason.to_string(),
    }
}

/// Append the XY vertices of a GeoPackage binary geometry to `coordinates`.
pub fn blob_coordinates(blob: &[u8], coordinates: &mut Vec<[f64; 2]>) -> Result<(), FlowmapError> {
    let mut reader = Reader::new(blob);
    if reader.take(2)? != b"GP" {
        return Err(invalid_geometry("missing GeoPackage magic"));
    }
    let _version = reader.u8()?;
    let flags = reader.u8()?;
    if flags & 0x20 != 0 {
        return Err(invalid_geometry("extended GeoPackage geometries are not supported"));
    }
    let envelope_len = match (flags >> 1) & 0x07 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        code => {
            return Err(FlowmapError::InvalidGeometry {
                reason: format!("invalid envelope code {code}"),
            })
        }
    };
    let _srs_id = reader.take(4)?;
    reader.take(envelope_len)?;
    if flags & 0x10 != 0 {
        return Ok(());
    }
    wkb_coordinates(&mut reader, coordinates, 0)
}

/// Nesting limit for collections.
const MAX_DEPTH: usize = 32;

fn wkb_coordinates(
    reader: &mut Reader<'_>,
    coordinates: &mut Vec<[f64; 2]>,
    depth: usize,
) -> Result<(), FlowmapError> {
    if depth > MAX_DEPTH {
        return Err(invalid_geometry("geometry nesting too deep"));
    }
    let little_endian = match reader.u8()? {
        0 => false,
        1 => true,
        _ => return Err(invalid_geometry("invalid WKB byte order")),
    };
    let raw_type = reader.u32(little_endian)?;
    let (geometry_type, dimensions, has_srid) = decode_type(raw_type)?;
    if has_srid {
        reader.u32(little_endian)?;
    }
    let point_size = dimensions * 8;
    match geometry_type {
        // Point
        1 => {
            let [x, y] = reader.point(little_endian, dimensions)?;
            // NaN coordinates encode an empty point.
            if !(x.is_nan() && y.is_nan()) {
                coordinates.push([x, y]);
            }
        }
        // LineString
        2 => {
            let count = reader.count(little_endian, point_size)?;
            for _ in 0..count {
                coordinates.push(reader.point(little_endian, dimensions)?);
            }
        }
        // Polygon
        3 => {
            let rings = reader.count(little_endian, 4)?;
            for _ in 0..rings {
                let count = reader.count(little_endian, point_size)?;
                for _ in 0..count {
                    coordinates.push(reader.point(little_endian, dimensions)?);
                }
            }
        }
        // MultiPoint, MultiLineString, MultiPolygon, GeometryCollection
        4..=7 => {
            let parts = reader.count(little_endian, 5)?;
            for _ in 0..parts {
                wkb_coordinates(reader, coordinates, depth + 1)?;
            }
        }
        other => {
            return Err(FlowmapError::InvalidGeometry {
                reason: format!("unsupported WKB geometry type {other}"),
            })
        }
    }
    Ok(())
}

/// Split a WKB type code into base type, coordinate dimension count and SRID presence.
///
/// Handles ISO codes (Z, M and ZM as +1000, +2000 and +3000) and extended WKB flag bits.
fn decode_type(raw_type: u32) -> Result<(u32, usize, bool), FlowmapError> {
    const EWKB_Z: u32 = 0x8000_0000;
    const EWKB_M: u32 = 0x4000_0000;
    const EWKB_SRID: u32 = 0x2000_0000;

    let code = raw_type & 0x0FFF_FFFF;
    let (iso_z, iso_m) = match code / 1000 {
        0 => (false, false),
        1 => (true, false),
        2 => (false, true),
        3 => (true, true),
        _ => {
            return Err(FlowmapError::InvalidGeometry {
                reason: format!("invalid WKB geometry type {raw_type}"),
            })
        }
    };
    let has_z = iso_z || raw_type & EWKB_Z != 0;
    let has_m = iso_m || raw_type & EWKB_M != 0;
    let dimensions = 2 + usize::from(has_z) + usize::from(has_m);
    Ok((code % 1000, dimensions, raw_type & EWKB_SRID != 0))
}
