use crate::coords::{CoordinateConverter, GeoBounds, GeodeticService, TileIndex, VendorGeodetic};
use crate::error::CoreResult;

/// Half-open tile range `start..stop` on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRange {
    pub start_x: i64,
    pub stop_x: i64,
    pub start_y: i64,
    pub stop_y: i64,
    pub zoom: u8,
}

impl TileRange {
    pub fn len(&self) -> usize {
        ((self.stop_x - self.start_x).max(0) * (self.stop_y - self.start_y).max(0)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every tile in the range, column by column.
    pub fn indices(&self) -> impl Iterator<Item = TileIndex> + '_ {
        (self.start_x..self.stop_x).flat_map(move |x| {
            (self.start_y..self.stop_y).map(move |y| TileIndex::new(x, y, self.zoom))
        })
    }
}

/// Tile layout of a mosaic. `origin` is the top-left corner: the westmost
/// column paired with the exclusive stop row, which is the north edge because
/// vendor tile rows grow northward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub origin: TileIndex,
    pub width: u32,
    pub height: u32,
}

impl TileGrid {
    /// Row index of the southmost tile row.
    pub fn south_row(&self) -> i64 {
        self.origin.y - self.height as i64
    }

    /// Position of `tile` as (column, row counted from the south edge).
    pub fn cell_of(&self, tile: TileIndex) -> Option<(u32, u32)> {
        if tile.zoom != self.origin.zoom {
            return None;
        }
        let col = tile.x - self.origin.x;
        let row = tile.y - self.south_row();
        if (0..self.width as i64).contains(&col) && (0..self.height as i64).contains(&row) {
            Some((col as u32, row as u32))
        } else {
            None
        }
    }

    /// Tile corner diagonally opposite the origin.
    pub fn bottom_right(&self) -> TileIndex {
        TileIndex::new(
            self.origin.x + self.width as i64,
            self.south_row(),
            self.origin.zoom,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridPlan {
    pub range: TileRange,
    pub grid: TileGrid,
}

pub fn plan_grid<S: GeodeticService>(
    converter: &CoordinateConverter<S>,
    zoom: u8,
    bounds: &GeoBounds<VendorGeodetic>,
) -> CoreResult<GridPlan> {
    let start = converter.to_pixel_space(zoom, bounds.south_west())?.tile();
    let stop = converter.to_pixel_space(zoom, bounds.north_east())?.tile();
    Ok(plan_from_corner_tiles(start, stop))
}

/// Half-open range spanning both corner tiles.
pub fn plan_from_corner_tiles(start: TileIndex, stop: TileIndex) -> GridPlan {
    let range = TileRange {
        start_x: start.x.min(stop.x),
        stop_x: start.x.max(stop.x) + 1,
        start_y: start.y.min(stop.y),
        stop_y: start.y.max(stop.y) + 1,
        zoom: start.zoom,
    };
    let grid = TileGrid {
        origin: TileIndex::new(range.start_x, range.stop_y, range.zoom),
        width: (range.stop_x - range.start_x).max(1) as u32,
        height: (range.stop_y - range.start_y).max(1) as u32,
    };
    GridPlan { range, grid }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::constants::TILE_SIZE;
    use crate::testing::LinearService;

    #[test]
    fn widens_stop_by_one_tile() {
        let plan = plan_from_corner_tiles(TileIndex::new(10, 20, 19), TileIndex::new(12, 21, 19));
        assert_eq!(plan.range.start_x, 10);
        assert_eq!(plan.range.stop_x, 13);
        assert_eq!(plan.range.start_y, 20);
        assert_eq!(plan.range.stop_y, 22);
        assert_eq!(plan.grid.width, 3);
        assert_eq!(plan.grid.height, 2);
    }

    #[test]
    fn origin_pairs_start_column_with_stop_row() {
        let plan = plan_from_corner_tiles(TileIndex::new(5, 7, 18), TileIndex::new(6, 9, 18));
        assert_eq!(plan.grid.origin, TileIndex::new(5, 10, 18));
        assert_eq!(plan.grid.south_row(), 7);
        assert_eq!(plan.grid.bottom_right(), TileIndex::new(7, 7, 18));
    }

    #[test]
    fn single_tile_box_yields_one_by_one_grid() {
        let plan = plan_from_corner_tiles(TileIndex::new(3, 3, 19), TileIndex::new(3, 3, 19));
        assert_eq!(plan.grid.width, 1);
        assert_eq!(plan.grid.height, 1);
        assert_eq!(plan.range.len(), 1);
        assert_eq!(
            plan.range.indices().collect::<Vec<_>>(),
            vec![TileIndex::new(3, 3, 19)]
        );
    }

    #[test]
    fn indices_enumerate_whole_range_column_major() {
        let plan = plan_from_corner_tiles(TileIndex::new(0, 0, 19), TileIndex::new(1, 1, 19));
        let tiles: Vec<_> = plan.range.indices().collect();
        assert_eq!(
            tiles,
            vec![
                TileIndex::new(0, 0, 19),
                TileIndex::new(0, 1, 19),
                TileIndex::new(1, 0, 19),
                TileIndex::new(1, 1, 19),
            ]
        );
    }

    #[test]
    fn cell_of_counts_rows_from_the_south() {
        let plan = plan_from_corner_tiles(TileIndex::new(10, 20, 19), TileIndex::new(11, 21, 19));
        assert_eq!(plan.grid.cell_of(TileIndex::new(10, 20, 19)), Some((0, 0)));
        assert_eq!(plan.grid.cell_of(TileIndex::new(11, 21, 19)), Some((1, 1)));
        assert_eq!(plan.grid.cell_of(TileIndex::new(12, 21, 19)), None);
        assert_eq!(plan.grid.cell_of(TileIndex::new(10, 20, 18)), None);
    }

    #[test]
    fn planning_uses_converted_corners() {
        let converter = CoordinateConverter::new(LinearService::default());
        let bounds = GeoBounds::new(31.2300, 121.4700, 31.2310, 121.4712);
        let plan = plan_grid(&converter, 19, &bounds).unwrap();
        assert!(plan.grid.width >= 1);
        assert!(plan.grid.height >= 1);
        for corner in [bounds.south_west(), bounds.north_east()] {
            let pixel = converter.to_pixel_space(19, corner).unwrap();
            assert!(plan.grid.cell_of(pixel.tile()).is_some());
        }
    }

    proptest! {
        #[test]
        fn range_always_covers_both_corners(
            lat in 20.0f64..50.0,
            lng in 80.0f64..130.0,
            dlat in 0.0f64..0.01,
            dlng in 0.0f64..0.01,
            zoom in 12u8..=19,
        ) {
            let converter = CoordinateConverter::new(LinearService::default());
            let bounds = GeoBounds::new(lat, lng, lat + dlat, lng + dlng);
            let plan = plan_grid(&converter, zoom, &bounds).unwrap();
            prop_assert!(plan.grid.width >= 1 && plan.grid.height >= 1);
            let tile = TILE_SIZE as f64;
            for corner in [bounds.south_west(), bounds.north_east()] {
                let pixel = converter.to_pixel_space(zoom, corner).unwrap();
                prop_assert!(pixel.x >= (plan.range.start_x as f64) * tile);
                prop_assert!(pixel.x < (plan.range.stop_x as f64) * tile);
                prop_assert!(pixel.y >= (plan.range.start_y as f64) * tile);
                prop_assert!(pixel.y < (plan.range.stop_y as f64) * tile);
            }
        }
    }
}
