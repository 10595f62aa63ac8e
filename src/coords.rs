use std::f64::consts::PI;
use std::fmt;
use std::marker::PhantomData;

use crate::constants::{BASE_ZOOM, TILE_SIZE};
use crate::error::CoreResult;

const X_PI: f64 = PI * 3000.0 / 180.0;
const RADIUS_CORRECTION: f64 = 0.00002;
const ANGLE_CORRECTION: f64 = 0.000003;
const LNG_OFFSET: f64 = 0.0065;
const LAT_OFFSET: f64 = 0.006;

/// Marker for a lat/lng reference frame.
pub trait Frame: Copy + fmt::Debug + PartialEq {
    const NAME: &'static str;
}

/// Frame the AOI polygons are published in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NationalGeodetic;

/// Frame the tile vendor and its conversion service expect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VendorGeodetic;

impl Frame for NationalGeodetic {
    const NAME: &'static str = "national";
}

impl Frame for VendorGeodetic {
    const NAME: &'static str = "vendor";
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint<F: Frame> {
    pub lat: f64,
    pub lng: f64,
    frame: PhantomData<F>,
}

impl<F: Frame> GeoPoint<F> {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            frame: PhantomData,
        }
    }
}

impl<F: Frame> fmt::Display for GeoPoint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6}) [{}]", self.lat, self.lng, F::NAME)
    }
}

/// Axis-aligned lat/lng box in a single frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds<F: Frame> {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
    frame: PhantomData<F>,
}

impl<F: Frame> GeoBounds<F> {
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat: min_lat.min(max_lat),
            min_lng: min_lng.min(max_lng),
            max_lat: min_lat.max(max_lat),
            max_lng: min_lng.max(max_lng),
            frame: PhantomData,
        }
    }

    /// Smallest box covering every point, `None` for an empty slice.
    pub fn covering(points: &[GeoPoint<F>]) -> Option<Self> {
        let first = points.first()?;
        let mut min_lat = first.lat;
        let mut max_lat = first.lat;
        let mut min_lng = first.lng;
        let mut max_lng = first.lng;
        for point in &points[1..] {
            min_lat = min_lat.min(point.lat);
            max_lat = max_lat.max(point.lat);
            min_lng = min_lng.min(point.lng);
            max_lng = max_lng.max(point.lng);
        }
        Some(Self::new(min_lat, min_lng, max_lat, max_lng))
    }

    pub fn south_west(&self) -> GeoPoint<F> {
        GeoPoint::new(self.min_lat, self.min_lng)
    }

    pub fn north_east(&self) -> GeoPoint<F> {
        GeoPoint::new(self.max_lat, self.max_lng)
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }
}

/// Position in the vendor's projected pixel space at `zoom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
    pub zoom: u8,
}

impl PixelPoint {
    pub fn tile(&self) -> TileIndex {
        TileIndex {
            x: (self.x / TILE_SIZE as f64).floor() as i64,
            y: (self.y / TILE_SIZE as f64).floor() as i64,
            zoom: self.zoom,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    pub x: i64,
    pub y: i64,
    pub zoom: u8,
}

impl TileIndex {
    pub fn new(x: i64, y: i64, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Pixel-space position of the tile's `(x * 256, y * 256)` corner.
    pub fn pixel_corner(&self) -> PixelPoint {
        PixelPoint {
            x: (self.x * TILE_SIZE as i64) as f64,
            y: (self.y * TILE_SIZE as i64) as f64,
            zoom: self.zoom,
        }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Local national → vendor geodetic approximation.
pub fn to_vendor_geodetic(point: GeoPoint<NationalGeodetic>) -> GeoPoint<VendorGeodetic> {
    let x = point.lng;
    let y = point.lat;
    let z = (x * x + y * y).sqrt() + RADIUS_CORRECTION * (y * X_PI).sin();
    let theta = y.atan2(x) + ANGLE_CORRECTION * (x * X_PI).cos();
    GeoPoint::new(z * theta.sin() + LAT_OFFSET, z * theta.cos() + LNG_OFFSET)
}

pub fn national_ring_to_vendor(
    ring: &[GeoPoint<NationalGeodetic>],
) -> Vec<GeoPoint<VendorGeodetic>> {
    ring.iter().copied().map(to_vendor_geodetic).collect()
}

/// Remote conversion between vendor geodetic lat/lng and vendor projected
/// coordinates (pixel space at the base zoom).
pub trait GeodeticService {
    /// Returns projected `(x, y)` for a vendor geodetic `(lng, lat)`.
    fn geodetic_to_projected(&self, lng: f64, lat: f64) -> CoreResult<(f64, f64)>;

    /// Returns vendor geodetic `(lng, lat)` for a projected `(x, y)`.
    fn projected_to_geodetic(&self, x: f64, y: f64) -> CoreResult<(f64, f64)>;
}

impl<S: GeodeticService + ?Sized> GeodeticService for &S {
    fn geodetic_to_projected(&self, lng: f64, lat: f64) -> CoreResult<(f64, f64)> {
        (**self).geodetic_to_projected(lng, lat)
    }

    fn projected_to_geodetic(&self, x: f64, y: f64) -> CoreResult<(f64, f64)> {
        (**self).projected_to_geodetic(x, y)
    }
}

pub struct CoordinateConverter<S> {
    service: S,
}

impl<S: GeodeticService> CoordinateConverter<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn to_pixel_space(
        &self,
        zoom: u8,
        point: GeoPoint<VendorGeodetic>,
    ) -> CoreResult<PixelPoint> {
        let (x, y) = self.service.geodetic_to_projected(point.lng, point.lat)?;
        let scale = zoom_scale(zoom);
        Ok(PixelPoint {
            x: x / scale,
            y: y / scale,
            zoom,
        })
    }

    pub fn to_geodetic(&self, pixel: PixelPoint) -> CoreResult<GeoPoint<VendorGeodetic>> {
        let scale = zoom_scale(pixel.zoom);
        let (lng, lat) = self
            .service
            .projected_to_geodetic(pixel.x * scale, pixel.y * scale)?;
        Ok(GeoPoint::new(lat, lng))
    }

    pub fn tile_corner(&self, tile: TileIndex) -> CoreResult<GeoPoint<VendorGeodetic>> {
        self.to_geodetic(tile.pixel_corner())
    }
}

/// Ratio between base-zoom projected units and pixels at `zoom`.
pub fn zoom_scale(zoom: u8) -> f64 {
    2f64.powi(BASE_ZOOM as i32 - zoom as i32)
}
