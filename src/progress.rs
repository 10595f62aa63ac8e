use indicatif::{ProgressBar, ProgressStyle};

/// Bar for one AOI's tile downloads, prefixed with the AOI label.
pub fn tile_progress(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "  {prefix:.bold} [{elapsed_precise}] [{bar:32.green/white}] {pos}/{len} tiles {msg}",
        )
        .expect("valid tile bar template")
        .progress_chars("=> "),
    );
    pb.set_prefix(label.to_string());
    pb
}
