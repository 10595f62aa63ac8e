use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::constants::{
    ACCESS_KEY_ENV, DEFAULT_FETCH_CONCURRENCY, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM,
};
use crate::fetch::LayerType;

#[derive(Debug, Clone)]
pub struct AppConfig {
    zoom: u8,
    layer: LayerType,
    cache_dir: PathBuf,
    service: ServiceConfig,
    tiles: TileConfig,
    fetch_concurrency: usize,
}

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let file: AppConfigFile = serde_json::from_str(contents)?;
        Self::from_file(file)
    }

    /// Fills the access key from the environment when the file left it out.
    pub fn with_env_access_key(mut self) -> Self {
        if self.service.access_key.is_none() {
            if let Ok(value) = std::env::var(ACCESS_KEY_ENV) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    self.service.access_key = Some(trimmed.to_string());
                }
            }
        }
        self
    }

    pub fn with_zoom(mut self, zoom: u8) -> Result<Self> {
        validate_zoom(zoom)?;
        self.zoom = zoom;
        Ok(self)
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn layer(&self) -> LayerType {
        self.layer
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    pub fn tiles(&self) -> &TileConfig {
        &self.tiles
    }

    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        validate_zoom(file.zoom)?;
        if file.fetch.concurrency == 0 {
            bail!("fetch.concurrency must be greater than 0");
        }
        Ok(Self {
            zoom: file.zoom,
            layer: file.layer,
            cache_dir: PathBuf::from(file.cache_dir),
            service: ServiceConfig::from_file(file.service)?,
            tiles: TileConfig::from_file(file.tiles)?,
            fetch_concurrency: file.fetch.concurrency,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            layer: LayerType::Satellite,
            cache_dir: PathBuf::from(default_cache_dir()),
            service: ServiceConfig::default(),
            tiles: TileConfig::default(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

fn validate_zoom(zoom: u8) -> Result<()> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        bail!("zoom must be between {MIN_ZOOM} and {MAX_ZOOM} (got {zoom})");
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    url: String,
    access_key: Option<String>,
    geodetic_frame: String,
    projected_frame: String,
    timeout_seconds: u64,
}

impl ServiceConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn access_key(&self) -> Option<&str> {
        self.access_key.as_deref()
    }

    pub fn geodetic_frame(&self) -> &str {
        &self.geodetic_frame
    }

    pub fn projected_frame(&self) -> &str {
        &self.projected_frame
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn from_file(file: ServiceFile) -> Result<Self> {
        if file.url.trim().is_empty() {
            bail!("service.url must not be empty");
        }
        if file.geodetic_frame.trim().is_empty() || file.projected_frame.trim().is_empty() {
            bail!("service frame identifiers must not be empty");
        }
        if file.geodetic_frame == file.projected_frame {
            bail!("service.geodetic_frame and service.projected_frame must differ");
        }
        if file.timeout_seconds == 0 {
            bail!("service.timeout_seconds must be greater than 0");
        }
        Ok(Self {
            url: file.url,
            access_key: file
                .access_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            geodetic_frame: file.geodetic_frame,
            projected_frame: file.projected_frame,
            timeout_seconds: file.timeout_seconds,
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            access_key: None,
            geodetic_frame: default_geodetic_frame(),
            projected_frame: default_projected_frame(),
            timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileConfig {
    satellite_url: String,
    road_url: String,
    user_agent: String,
    timeout_seconds: u64,
    retries: usize,
}

impl TileConfig {
    pub fn url_template(&self, layer: LayerType) -> &str {
        match layer {
            LayerType::Satellite => &self.satellite_url,
            LayerType::Road => &self.road_url,
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    fn from_file(file: TileFile) -> Result<Self> {
        for (name, template) in [
            ("tiles.satellite_url", &file.satellite_url),
            ("tiles.road_url", &file.road_url),
        ] {
            for placeholder in ["{x}", "{y}", "{z}"] {
                if !template.contains(placeholder) {
                    bail!("{name} must contain the {placeholder} placeholder");
                }
            }
        }
        if file.timeout_seconds == 0 {
            bail!("tiles.timeout_seconds must be greater than 0");
        }
        Ok(Self {
            satellite_url: file.satellite_url,
            road_url: file.road_url,
            user_agent: file.user_agent,
            timeout_seconds: file.timeout_seconds,
            retries: file.retries,
        })
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            satellite_url: default_satellite_url(),
            road_url: default_road_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppConfigFile {
    #[serde(default = "default_zoom")]
    zoom: u8,
    #[serde(default)]
    layer: LayerType,
    #[serde(default = "default_cache_dir")]
    cache_dir: String,
    #[serde(default)]
    service: ServiceFile,
    #[serde(default)]
    tiles: TileFile,
    #[serde(default)]
    fetch: FetchFile,
}

#[derive(Debug, Deserialize)]
struct ServiceFile {
    #[serde(default = "default_service_url")]
    url: String,
    #[serde(default)]
    access_key: Option<String>,
    #[serde(default = "default_geodetic_frame")]
    geodetic_frame: String,
    #[serde(default = "default_projected_frame")]
    projected_frame: String,
    #[serde(default = "default_timeout")]
    timeout_seconds: u64,
}

impl Default for ServiceFile {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            access_key: None,
            geodetic_frame: default_geodetic_frame(),
            projected_frame: default_projected_frame(),
            timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TileFile {
    #[serde(default = "default_satellite_url")]
    satellite_url: String,
    #[serde(default = "default_road_url")]
    road_url: String,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_timeout")]
    timeout_seconds: u64,
    #[serde(default = "default_retries")]
    retries: usize,
}

impl Default for TileFile {
    fn default() -> Self {
        Self {
            satellite_url: default_satellite_url(),
            road_url: default_road_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FetchFile {
    #[serde(default = "default_concurrency")]
    concurrency: usize,
}

impl Default for FetchFile {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_zoom() -> u8 {
    DEFAULT_ZOOM
}

fn default_cache_dir() -> String {
    "img/tiles".to_string()
}

fn default_service_url() -> String {
    "https://api.map.baidu.com/geoconv/v1/".to_string()
}

fn default_geodetic_frame() -> String {
    "5".to_string()
}

fn default_projected_frame() -> String {
    "6".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_satellite_url() -> String {
    "http://shangetu0.map.bdimg.com/it/u=x={x};y={y};z={z};v=009;type=sate&fm=46&udt=20150504&app=webearth2&v=009&udt=20150601".to_string()
}

fn default_road_url() -> String {
    "http://online3.map.bdimg.com/tile/?qt=tile&x={x}&y={y}&z={z}&styles=pl&scaler=1&udt=20180810"
        .to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_retries() -> usize {
    2
}

fn default_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}
