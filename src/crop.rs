use image::{RgbImage, imageops};

use crate::constants::TILE_SIZE;
use crate::coords::{
    CoordinateConverter, GeoBounds, GeodeticService, PixelPoint, TileIndex, VendorGeodetic,
};
use crate::error::{CoreResult, Error};
use crate::mosaic::Mosaic;

/// Integer pixel rectangle inside a raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Crops `mosaic` to the pixel rectangle of `bounds`.
pub fn crop<S: GeodeticService>(
    converter: &CoordinateConverter<S>,
    mosaic: &Mosaic,
    bounds: &GeoBounds<VendorGeodetic>,
    zoom: u8,
) -> CoreResult<RgbImage> {
    let origin = mosaic.grid().origin;
    if origin.zoom != zoom {
        return Err(Error::ZoomMismatch {
            expected: origin.zoom,
            found: zoom,
        });
    }
    let start = converter.to_pixel_space(zoom, bounds.south_west())?;
    let stop = converter.to_pixel_space(zoom, bounds.north_east())?;
    let rect = crop_rect(start, stop, origin, mosaic.width(), mosaic.height());
    let view = imageops::crop_imm(
        mosaic.image(),
        rect.left,
        rect.top,
        rect.width(),
        rect.height(),
    );
    Ok(view.to_image())
}

/// Maps two pixel-space corners into mosaic-relative pixels and clamps the
/// result to `[0, width] x [0, height]`. The vertical axis is measured down
/// from the origin row, which is the north edge of the mosaic.
pub fn crop_rect(
    start: PixelPoint,
    stop: PixelPoint,
    origin: TileIndex,
    width: u32,
    height: u32,
) -> PixelRect {
    let anchor_x = (origin.x * TILE_SIZE as i64) as f64;
    let anchor_y = (origin.y * TILE_SIZE as i64) as f64;

    let start_x = (start.x - anchor_x).trunc() as i64;
    let start_y = -((start.y - anchor_y).trunc() as i64);
    let stop_x = (stop.x - anchor_x).trunc() as i64;
    let stop_y = -((stop.y - anchor_y).trunc() as i64);

    let clamp_x = |value: i64| value.clamp(0, width as i64) as u32;
    let clamp_y = |value: i64| value.clamp(0, height as i64) as u32;

    let left = clamp_x(start_x.min(stop_x));
    let right = clamp_x(start_x.max(stop_x));
    let top = clamp_y(start_y.min(stop_y));
    let bottom = clamp_y(start_y.max(stop_y));

    PixelRect {
        left,
        top,
        right: right.max(left),
        bottom: bottom.max(top),
    }
}
