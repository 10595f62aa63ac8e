pub const TILE_SIZE: u32 = 256;
pub const BASE_ZOOM: u8 = 18; // zoom at which projected units equal pixels
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 19;
pub const DEFAULT_ZOOM: u8 = 19;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 32;
pub const ACCESS_KEY_ENV: &str = "AOICROP_ACCESS_KEY";
pub const SUMMARY_DIR: &str = "summary";
pub const STITCHED_DIR: &str = "stitched";
pub const CROPPED_DIR: &str = "cropped";
pub const MASKED_DIR: &str = "masked";
