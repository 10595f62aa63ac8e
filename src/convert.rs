use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::ConvertConfig;
use crate::coords::{GeoPoint, NationalGeodetic, to_vendor_geodetic};

pub fn run_convert(config: &ConvertConfig) -> Result<()> {
    let national: GeoPoint<NationalGeodetic> = GeoPoint::new(config.lat, config.lng);
    let vendor = to_vendor_geodetic(national);
    println!(
        "{} Converted ({:.6}, {:.6}) to the vendor frame",
        "ℹ".blue().bold(),
        config.lng,
        config.lat
    );
    println!("  Longitude: {:.10}", vendor.lng);
    println!("  Latitude:  {:.10}", vendor.lat);
    Ok(())
}
