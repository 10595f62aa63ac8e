use geo::{Contains, LineString, Point, Polygon};
use geo_types::Coord;
use image::{GrayImage, Luma, Rgb, RgbImage, imageops};

use crate::coords::{GeoBounds, GeoPoint, VendorGeodetic};
use crate::error::{CoreResult, Error};

pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const INSIDE: Luma<u8> = Luma([255]);

/// Keeps the pixels of `raster` that fall inside `polygon` and paints the rest
/// with [`BACKGROUND`]. The result is cropped to the polygon's pixel footprint.
///
/// Vertices are placed by linear interpolation inside `tile_bounds` rather
/// than by reprojection. That only holds while the bounds cover a small area
/// where the projection is close to linear, which is the case for a single
/// AOI crop but not for arbitrary spans.
pub fn mask(
    raster: &RgbImage,
    polygon: &[GeoPoint<VendorGeodetic>],
    tile_bounds: &GeoBounds<VendorGeodetic>,
) -> CoreResult<RgbImage> {
    let ring = open_ring(polygon);
    if ring.len() < 3 {
        return Err(Error::EmptyPolygon {
            vertices: ring.len(),
            width: 0,
            height: 0,
        });
    }
    if tile_bounds.lat_span() <= 0.0 || tile_bounds.lng_span() <= 0.0 {
        return Err(Error::DegenerateBounds {
            lat_span: tile_bounds.lat_span(),
            lng_span: tile_bounds.lng_span(),
        });
    }

    let projected = project_ring(&ring, tile_bounds, raster.width(), raster.height());
    let (left, top, right, bottom) = footprint(&projected, raster.width(), raster.height());
    if right <= left || bottom <= top {
        return Err(Error::EmptyPolygon {
            vertices: ring.len(),
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        });
    }
    let width = right - left;
    let height = bottom - top;

    let region = imageops::crop_imm(raster, left, top, width, height).to_image();
    let relative: Vec<Coord> = projected
        .iter()
        .map(|c| Coord {
            x: c.x - left as f64,
            y: c.y - top as f64,
        })
        .collect();
    let occupancy = rasterize(&relative, width, height);

    Ok(RgbImage::from_fn(width, height, |x, y| {
        if *occupancy.get_pixel(x, y) == INSIDE {
            *region.get_pixel(x, y)
        } else {
            BACKGROUND
        }
    }))
}

/// Drops the closing vertex and consecutive repeats.
fn open_ring(polygon: &[GeoPoint<VendorGeodetic>]) -> Vec<GeoPoint<VendorGeodetic>> {
    let mut ring: Vec<GeoPoint<VendorGeodetic>> = Vec::with_capacity(polygon.len());
    for point in polygon {
        if ring.last() != Some(point) {
            ring.push(*point);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

pub fn project_ring(
    ring: &[GeoPoint<VendorGeodetic>],
    bounds: &GeoBounds<VendorGeodetic>,
    width: u32,
    height: u32,
) -> Vec<Coord> {
    ring.iter()
        .map(|point| Coord {
            x: (point.lng - bounds.min_lng) / bounds.lng_span() * width as f64,
            y: (bounds.max_lat - point.lat) / bounds.lat_span() * height as f64,
        })
        .collect()
}

fn footprint(ring: &[Coord], width: u32, height: u32) -> (u32, u32, u32, u32) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in ring {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
    }
    let clamp = |value: f64, limit: u32| value.round().clamp(0.0, limit as f64) as u32;
    (
        clamp(min_x, width),
        clamp(min_y, height),
        clamp(max_x, width),
        clamp(max_y, height),
    )
}

/// Single-channel occupancy mask: a pixel is set when its centre lies inside
/// the ring.
pub fn rasterize(ring: &[Coord], width: u32, height: u32) -> GrayImage {
    let mut closed = ring.to_vec();
    if let (Some(first), Some(last)) = (closed.first().copied(), closed.last().copied()) {
        if first != last {
            closed.push(first);
        }
    }
    let polygon = Polygon::new(LineString::from(closed), vec![]);
    let mut occupancy = GrayImage::new(width, height);
    for (x, y, px) in occupancy.enumerate_pixels_mut() {
        let centre = Point::new(x as f64 + 0.5, y as f64 + 0.5);
        if polygon.contains(&centre) {
            *px = INSIDE;
        }
    }
    occupancy
}
