use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::{ImageFormat, RgbImage};

use crate::constants::{CROPPED_DIR, MASKED_DIR, STITCHED_DIR, SUMMARY_DIR};
use crate::metadata::{AoiSummary, write_summary};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Stitched,
    Cropped,
    Masked,
}

impl ArtifactKind {
    fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Stitched => STITCHED_DIR,
            ArtifactKind::Cropped => CROPPED_DIR,
            ArtifactKind::Masked => MASKED_DIR,
        }
    }
}

/// Writes the rasters and the JSON summary of each AOI under one root.
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn prepare(root: &Path) -> Result<Self> {
        if root.exists() && !root.is_dir() {
            bail!("Output path {} exists and is not a directory", root.display());
        }
        for dir in [STITCHED_DIR, CROPPED_DIR, MASKED_DIR, SUMMARY_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create output dir {}", path.display()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raster_path(&self, kind: ArtifactKind, address: &str) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{}.jpg", sanitize_for_filename(address)))
    }

    pub fn summary_path(&self, address: &str) -> PathBuf {
        self.root
            .join(SUMMARY_DIR)
            .join(format!("{}.json", sanitize_for_filename(address)))
    }

    pub fn write_raster(
        &self,
        kind: ArtifactKind,
        address: &str,
        image: &RgbImage,
    ) -> Result<PathBuf> {
        let path = self.raster_path(kind, address);
        if image.width() == 0 || image.height() == 0 {
            bail!("Refusing to write empty raster {}", path.display());
        }
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_summary(&self, summary: &AoiSummary) -> Result<PathBuf> {
        write_summary(&self.summary_path(&summary.address), summary)
    }
}

/// Keeps letters, digits, `-` and `_`; everything else becomes `_`.
pub fn sanitize_for_filename(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
