use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::coords::{
    GeoBounds, GeoPoint, NationalGeodetic, VendorGeodetic, national_ring_to_vendor,
};
use crate::output::sanitize_for_filename;

const NBSP: char = '\u{a0}';

#[derive(Debug, Deserialize)]
struct AoiRow {
    aoi_address: String,
    centroid: String,
    wkt: String,
}

/// One area of interest, already in the vendor frame.
#[derive(Clone, Debug)]
pub struct AoiRecord {
    pub address: String,
    pub centroid: String,
    pub polygon: Vec<GeoPoint<VendorGeodetic>>,
    pub bounds: GeoBounds<VendorGeodetic>,
}

impl AoiRecord {
    pub fn from_national(
        address: impl Into<String>,
        centroid: impl Into<String>,
        ring: &[GeoPoint<NationalGeodetic>],
    ) -> Result<Self> {
        let polygon = national_ring_to_vendor(ring);
        let bounds =
            GeoBounds::covering(&polygon).ok_or_else(|| anyhow!("Polygon has no vertices"))?;
        Ok(Self {
            address: address.into(),
            centroid: centroid.into(),
            polygon,
            bounds,
        })
    }
}

pub fn read_aoi_csv(path: &Path) -> Result<Vec<AoiRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read AOI file {}", path.display()))?;
    parse_aoi_csv(&contents)
        .with_context(|| format!("Failed to parse AOI file {}", path.display()))
}

/// Parses `aoi_address,centroid,wkt` rows. Non-breaking spaces are turned into
/// plain spaces first. Addresses must stay unique after filename sanitizing,
/// compared case-insensitively, since they name the output files.
pub fn parse_aoi_csv(contents: &str) -> Result<Vec<AoiRecord>> {
    let cleaned = contents.replace(NBSP, " ");
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(cleaned.as_bytes());

    let mut records = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();
    for (idx, result) in reader.deserialize().enumerate() {
        let row_number = idx + 1;
        let row: AoiRow = result.with_context(|| format!("Invalid AOI row {row_number}"))?;
        if row.aoi_address.is_empty() {
            bail!("AOI row {row_number} has an empty aoi_address");
        }
        let ring = parse_wkt_polygon(&row.wkt).with_context(|| {
            format!("Invalid polygon for AOI '{}' (row {row_number})", row.aoi_address)
        })?;
        let key = sanitize_for_filename(&row.aoi_address).to_lowercase();
        if let Some(previous) = seen.get(&key) {
            if *previous == row.aoi_address {
                bail!("Duplicate AOI address '{}' (row {row_number})", row.aoi_address);
            }
            bail!(
                "AOI addresses '{previous}' and '{}' (row {row_number}) share the output name '{}'",
                row.aoi_address,
                sanitize_for_filename(&row.aoi_address)
            );
        }
        seen.insert(key, row.aoi_address.clone());
        records.push(AoiRecord::from_national(row.aoi_address, row.centroid, &ring)?);
    }
    Ok(records)
}

/// Reads the exterior ring of a WKT `POLYGON ((lng lat, ...))`. Interior rings
/// are ignored. The returned ring is closed.
pub fn parse_wkt_polygon(raw: &str) -> Result<Vec<GeoPoint<NationalGeodetic>>> {
    let trimmed = raw.trim();
    let keyword_len = "POLYGON".len();
    let is_polygon = trimmed
        .get(..keyword_len)
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case("POLYGON"));
    if !is_polygon {
        bail!("Expected a WKT POLYGON, found '{}'", preview(trimmed));
    }
    let body = trimmed[keyword_len..].trim_start();
    let body = body
        .strip_prefix('(')
        .ok_or_else(|| anyhow!("POLYGON body must start with '('"))?
        .trim_start();
    let body = body
        .strip_prefix('(')
        .ok_or_else(|| anyhow!("POLYGON ring must start with '('"))?;
    let end = body
        .find(')')
        .ok_or_else(|| anyhow!("POLYGON ring is not terminated"))?;

    let mut ring = Vec::new();
    for vertex in body[..end].split(',') {
        let (lng, lat) = parse_vertex(vertex)?;
        ring.push(GeoPoint::new(lat, lng));
    }
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    Ok(ring)
}

fn parse_vertex(raw: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() < 2 || parts.len() > 3 {
        bail!("Polygon vertex '{}' must contain two numbers", raw.trim());
    }
    let lng: f64 = parts[0]
        .parse()
        .with_context(|| format!("Invalid longitude in vertex '{}'", raw.trim()))?;
    let lat: f64 = parts[1]
        .parse()
        .with_context(|| format!("Invalid latitude in vertex '{}'", raw.trim()))?;
    if !lng.is_finite() || !lat.is_finite() {
        bail!("Polygon vertex '{}' is not finite", raw.trim());
    }
    Ok((lng, lat))
}

fn preview(raw: &str) -> String {
    raw.chars().take(24).collect()
}
