use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::TileConfig;
use crate::coords::TileIndex;
use crate::grid::TileRange;
use crate::mosaic::FetchedTile;
use crate::output::sanitize_for_filename;
use crate::progress::tile_progress;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    #[default]
    Satellite,
    Road,
}

impl LayerType {
    pub fn suffix(self) -> &'static str {
        match self {
            LayerType::Satellite => "s",
            LayerType::Road => "r",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            LayerType::Satellite => "jpg",
            LayerType::Road => "png",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerType::Satellite => f.write_str("satellite"),
            LayerType::Road => f.write_str("road"),
        }
    }
}

/// Produces the encoded bytes of one tile. Console notes go through `pb` so
/// they do not tear the bar of the range being fetched.
pub trait TileSource: Sync {
    fn fetch(&self, tile: TileIndex, layer: LayerType, pb: &ProgressBar) -> Result<Vec<u8>>;
}

pub struct HttpTileSource {
    client: Client,
    config: TileConfig,
}

impl HttpTileSource {
    pub fn new(config: &TileConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .user_agent(config.user_agent())
            .build()
            .context("Failed to build tile HTTP client")?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

impl TileSource for HttpTileSource {
    fn fetch(&self, tile: TileIndex, layer: LayerType, pb: &ProgressBar) -> Result<Vec<u8>> {
        let url = fill_tile_url(self.config.url_template(layer), tile);
        let retries = self.config.retries();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = match self.client.get(&url).send() {
                Ok(response) => response,
                Err(err) => {
                    if attempt <= retries {
                        pb.println(retry_line(tile, format_args!("network error: {err}")));
                        continue;
                    }
                    return Err(err).with_context(|| format!("Failed to fetch tile {tile}"));
                }
            };
            let status = response.status();
            if status == StatusCode::OK {
                let body = response
                    .bytes()
                    .with_context(|| format!("Failed to read body of tile {tile}"))?;
                return Ok(body.to_vec());
            }
            if attempt <= retries {
                pb.println(retry_line(tile, format_args!("status {status}")));
                continue;
            }
            bail!("Tile request {tile} failed with status {status}");
        }
    }
}

fn retry_line(tile: TileIndex, cause: fmt::Arguments<'_>) -> String {
    format!("  {} Retrying tile {tile} after {cause}", "↻".yellow())
}

pub fn fill_tile_url(template: &str, tile: TileIndex) -> String {
    template
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
        .replace("{z}", &tile.zoom.to_string())
}

/// Path-addressed tile store keyed by tile and layer.
pub trait TileCache: Sync {
    fn has(&self, tile: TileIndex, layer: LayerType) -> bool;
    fn get(&self, tile: TileIndex, layer: LayerType) -> Option<Vec<u8>>;
    fn put(&self, tile: TileIndex, layer: LayerType, bytes: &[u8]) -> Result<()>;
}

pub struct DirTileCache {
    root: PathBuf,
}

impl DirTileCache {
    /// Opens (and creates) the per-area sub-directory `root/<area>`.
    pub fn prepare(root: &Path, area: &str) -> Result<Self> {
        let path = root.join(sanitize_for_filename(area));
        if path.exists() && !path.is_dir() {
            bail!(
                "Tile cache path {} exists and is not a directory",
                path.display()
            );
        }
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create tile cache dir {}", path.display()))?;
        Ok(Self { root: path })
    }

    pub fn tile_path(&self, tile: TileIndex, layer: LayerType) -> PathBuf {
        self.root.join(format!(
            "{}_{}_{}_{}.{}",
            tile.zoom,
            tile.x,
            tile.y,
            layer.suffix(),
            layer.extension()
        ))
    }
}

impl TileCache for DirTileCache {
    fn has(&self, tile: TileIndex, layer: LayerType) -> bool {
        self.tile_path(tile, layer).is_file()
    }

    fn get(&self, tile: TileIndex, layer: LayerType) -> Option<Vec<u8>> {
        fs::read(self.tile_path(tile, layer)).ok()
    }

    fn put(&self, tile: TileIndex, layer: LayerType, bytes: &[u8]) -> Result<()> {
        let path = self.tile_path(tile, layer);
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write tile {}", path.display()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchFailure {
    pub index: TileIndex,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub tiles: Vec<FetchedTile>,
    pub downloaded: usize,
    pub cached: usize,
    pub failures: Vec<FetchFailure>,
}

enum TileOutcome {
    Cached(Vec<u8>),
    Downloaded(Vec<u8>),
    Failed(String),
}

/// Downloads every tile of a range on a bounded pool and returns once all of
/// them have finished.
pub struct TileFetcher<T> {
    source: T,
    layer: LayerType,
    concurrency: usize,
}

impl<T: TileSource> TileFetcher<T> {
    pub fn new(source: T, layer: LayerType, concurrency: usize) -> Self {
        Self {
            source,
            layer,
            concurrency: concurrency.max(1),
        }
    }

    pub fn layer(&self) -> LayerType {
        self.layer
    }

    pub fn fetch_range<C: TileCache>(
        &self,
        range: &TileRange,
        cache: &C,
        label: &str,
    ) -> Result<FetchReport> {
        if range.is_empty() {
            return Ok(FetchReport::default());
        }
        let indices: Vec<TileIndex> = range.indices().collect();
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.concurrency.min(range.len()))
            .build()
            .context("Failed to build tile fetch pool")?;

        let pb = tile_progress(indices.len() as u64, label);
        let outcomes: Vec<(TileIndex, TileOutcome)> = pool.install(|| {
            indices
                .par_iter()
                .map(|&index| {
                    let outcome = self.fetch_one(index, cache, &pb);
                    pb.inc(1);
                    (index, outcome)
                })
                .collect()
        });
        pb.finish_with_message("tiles ready");

        let mut report = FetchReport::default();
        for (index, outcome) in outcomes {
            match outcome {
                TileOutcome::Cached(bytes) => {
                    report.cached += 1;
                    report.tiles.push(FetchedTile { index, bytes });
                }
                TileOutcome::Downloaded(bytes) => {
                    report.downloaded += 1;
                    report.tiles.push(FetchedTile { index, bytes });
                }
                TileOutcome::Failed(message) => {
                    report.failures.push(FetchFailure { index, message });
                }
            }
        }
        Ok(report)
    }

    fn fetch_one<C: TileCache>(
        &self,
        index: TileIndex,
        cache: &C,
        pb: &ProgressBar,
    ) -> TileOutcome {
        if cache.has(index, self.layer) {
            if let Some(bytes) = cache.get(index, self.layer) {
                return TileOutcome::Cached(bytes);
            }
        }
        match self.source.fetch(index, self.layer, pb) {
            Ok(bytes) => {
                if let Err(err) = cache.put(index, self.layer, &bytes) {
                    pb.println(format!("  {} {err:#}", "⚠".yellow().bold()));
                }
                TileOutcome::Downloaded(bytes)
            }
            Err(err) => TileOutcome::Failed(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::grid::plan_from_corner_tiles;
    use crate::mosaic::assemble;
    use crate::testing::{MemoryTileSource, solid_tile_png};

    const GREEN: [u8; 3] = [20, 180, 20];

    fn range_2x2() -> TileRange {
        plan_from_corner_tiles(TileIndex::new(300, 120, 19), TileIndex::new(301, 121, 19)).range
    }

    #[test]
    fn tile_url_fills_every_placeholder() {
        let url = fill_tile_url(
            "http://tiles/it/u=x={x};y={y};z={z};type=sate",
            TileIndex::new(101, 27, 19),
        );
        assert_eq!(url, "http://tiles/it/u=x=101;y=27;z=19;type=sate");
    }

    #[test]
    fn retry_line_names_tile_and_cause() {
        let line = retry_line(TileIndex::new(7, 8, 19), format_args!("status {}", 503));
        assert!(line.contains("Retrying tile z19/7/8 after status 503"));
    }

    struct BarRecordingSource {
        bar_lengths: Mutex<Vec<Option<u64>>>,
    }

    impl TileSource for BarRecordingSource {
        fn fetch(
            &self,
            _tile: TileIndex,
            _layer: LayerType,
            pb: &ProgressBar,
        ) -> Result<Vec<u8>> {
            self.bar_lengths.lock().unwrap().push(pb.length());
            pb.println("  note from source");
            Ok(solid_tile_png(8, GREEN))
        }
    }

    #[test]
    fn sources_report_through_the_range_bar() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirTileCache::prepare(dir.path(), "area").unwrap();
        let source = BarRecordingSource {
            bar_lengths: Mutex::new(Vec::new()),
        };
        let fetcher = TileFetcher::new(source, LayerType::Satellite, 2);
        let report = fetcher.fetch_range(&range_2x2(), &cache, "tiles").unwrap();
        assert_eq!(report.downloaded, 4);
        let lengths = fetcher.source.bar_lengths.lock().unwrap();
        assert_eq!(*lengths, vec![Some(4); 4]);
    }

    #[test]
    fn layer_selects_file_suffix() {
        assert_eq!(LayerType::Satellite.suffix(), "s");
        assert_eq!(LayerType::Satellite.extension(), "jpg");
        assert_eq!(LayerType::Road.suffix(), "r");
        assert_eq!(LayerType::Road.extension(), "png");
        let parsed: LayerType = serde_json::from_str("\"road\"").unwrap();
        assert_eq!(parsed, LayerType::Road);
    }

    #[test]
    fn cache_names_tiles_by_zoom_and_position() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirTileCache::prepare(dir.path(), "Pudong / Block 7").unwrap();
        let path = cache.tile_path(TileIndex::new(12, 34, 19), LayerType::Satellite);
        assert!(path.parent().unwrap().ends_with("Pudong___Block_7"));
        assert_eq!(path.file_name().unwrap(), "19_12_34_s.jpg");
        let road = cache.tile_path(TileIndex::new(12, 34, 19), LayerType::Road);
        assert_eq!(road.file_name().unwrap(), "19_12_34_r.png");
    }

    #[test]
    fn cache_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirTileCache::prepare(dir.path(), "area").unwrap();
        let tile = TileIndex::new(1, 2, 19);
        assert!(!cache.has(tile, LayerType::Satellite));
        assert!(cache.get(tile, LayerType::Satellite).is_none());
        cache.put(tile, LayerType::Satellite, b"bytes").unwrap();
        assert!(cache.has(tile, LayerType::Satellite));
        assert!(!cache.has(tile, LayerType::Road));
        assert_eq!(cache.get(tile, LayerType::Satellite).unwrap(), b"bytes");
    }

    #[test]
    fn cache_root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("taken"), b"file").unwrap();
        assert!(DirTileCache::prepare(dir.path(), "taken").is_err());
    }

    #[test]
    fn fetches_every_tile_and_fills_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirTileCache::prepare(dir.path(), "area").unwrap();
        let source = MemoryTileSource::uniform(GREEN, 8);
        let fetcher = TileFetcher::new(source, LayerType::Satellite, 3);
        let range = range_2x2();
        let report = fetcher.fetch_range(&range, &cache, "tiles").unwrap();
        assert_eq!(report.tiles.len(), 4);
        assert_eq!(report.downloaded, 4);
        assert_eq!(report.cached, 0);
        assert!(report.failures.is_empty());
        for index in range.indices() {
            assert!(cache.has(index, LayerType::Satellite));
        }
    }

    #[test]
    fn cached_tiles_skip_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirTileCache::prepare(dir.path(), "area").unwrap();
        let range = range_2x2();
        let cached = TileIndex::new(300, 120, 19);
        cache
            .put(cached, LayerType::Satellite, &solid_tile_png(8, GREEN))
            .unwrap();

        let source = MemoryTileSource::uniform(GREEN, 8);
        let fetcher = TileFetcher::new(source, LayerType::Satellite, 2);
        let report = fetcher.fetch_range(&range, &cache, "tiles").unwrap();
        assert_eq!(report.cached, 1);
        assert_eq!(report.downloaded, 3);
        assert_eq!(fetcher.source.request_count(), 3);
        assert!(!fetcher.source.requests.lock().unwrap().contains(&cached));
    }

    #[test]
    fn fetched_tiles_keep_their_grid_position() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirTileCache::prepare(dir.path(), "area").unwrap();
        let plan =
            plan_from_corner_tiles(TileIndex::new(300, 120, 19), TileIndex::new(301, 121, 19));
        let red = [220, 30, 30];
        let source =
            MemoryTileSource::uniform(GREEN, 8).with_color(TileIndex::new(300, 121, 19), red);
        let fetcher = TileFetcher::new(source, LayerType::Road, 2);
        let report = fetcher.fetch_range(&plan.range, &cache, "tiles").unwrap();
        let mosaic = assemble(&report.tiles, &plan.grid).unwrap();
        // 300/121 is the north-west tile
        assert_eq!(*mosaic.image().get_pixel(2, 2), image::Rgb(red));
        assert_eq!(*mosaic.image().get_pixel(2, 10), image::Rgb(GREEN));
        assert!(cache.has(TileIndex::new(300, 121, 19), LayerType::Road));
    }

    #[test]
    fn one_failed_tile_still_yields_full_mosaic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirTileCache::prepare(dir.path(), "area").unwrap();
        let plan =
            plan_from_corner_tiles(TileIndex::new(300, 120, 19), TileIndex::new(301, 121, 19));
        let broken = TileIndex::new(301, 121, 19);
        let source = MemoryTileSource::uniform(GREEN, 8).failing_on(broken);
        let fetcher = TileFetcher::new(source, LayerType::Satellite, 4);

        let report = fetcher.fetch_range(&plan.range, &cache, "tiles").unwrap();
        assert_eq!(report.tiles.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, broken);
        assert!(report.failures[0].message.contains("simulated outage"));
        assert!(!cache.has(broken, LayerType::Satellite));

        let mosaic = assemble(&report.tiles, &plan.grid).unwrap();
        assert_eq!((mosaic.width(), mosaic.height()), (16, 16));
        // 301/121 is the north-east tile: top-right quadrant stays black
        let black = image::Rgb([0, 0, 0]);
        assert_eq!(*mosaic.image().get_pixel(12, 3), black);
        assert_eq!(*mosaic.image().get_pixel(3, 3), image::Rgb(GREEN));
        assert_eq!(*mosaic.image().get_pixel(12, 12), image::Rgb(GREEN));
    }
}
