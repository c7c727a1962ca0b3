//! Icon loading, sizing, and best-match selection.
//!
//! Selection uses a Manhattan-distance size match plus a penalty for
//! non-square source images; the final resize uses Lanczos3 resampling.

use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorExt, Result};

/// A discovered icon source file and its natural dimensions.
#[derive(Debug, Clone)]
pub struct IconInfo {
    /// Path to the source image.
    pub path: PathBuf,
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
}

impl IconInfo {
    /// Whether this icon's source image is square.
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Manhattan distance between this icon's natural size and `target`,
    /// used to rank candidates for a given output slot.
    pub fn size_diff(&self, target: u32) -> u32 {
        self.width.abs_diff(target) + self.height.abs_diff(target)
    }
}

/// Load dimension metadata for each path in `icon_paths`, skipping (with a
/// warning) any that cannot be opened. Errors only if every path fails.
pub fn load_icons(icon_paths: &[PathBuf]) -> Result<Vec<IconInfo>> {
    let mut icons = Vec::new();
    for path in icon_paths {
        match image::image_dimensions(path) {
            Ok((width, height)) => icons.push(IconInfo {
                path: path.clone(),
                width,
                height,
            }),
            Err(error) => log::warn!("skipping unreadable icon {path:?}: {error}"),
        }
    }
    if icons.is_empty() && !icon_paths.is_empty() {
        return Err(Error::IconNotFound);
    }
    Ok(icons)
}

/// Pick the best-matching icon for `target_size`, preferring square
/// sources and the closest natural size.
pub fn find_icon_for_size(icons: &[IconInfo], target_size: u32) -> Option<&IconInfo> {
    icons.iter().min_by_key(|icon| {
        let square_penalty = if icon.is_square() { 0 } else { 10_000 };
        icon.size_diff(target_size) + square_penalty
    })
}

/// Load `source_path` and resize it to exactly `target_width` ×
/// `target_height` using Lanczos3 resampling.
pub fn load_and_resize(
    source_path: &Path,
    target_width: u32,
    target_height: u32,
) -> Result<image::RgbaImage> {
    let image = image::open(source_path).fs_context("opening icon source", source_path)?;
    Ok(image::imageops::resize(
        &image.to_rgba8(),
        target_width,
        target_height,
        image::imageops::FilterType::Lanczos3,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icon(width: u32, height: u32) -> IconInfo {
        IconInfo {
            path: PathBuf::from("icon.png"),
            width,
            height,
        }
    }

    #[test]
    fn prefers_square_over_closer_nonsquare() {
        let icons = vec![icon(100, 90), icon(128, 128)];
        let best = find_icon_for_size(&icons, 96).unwrap();
        assert_eq!((best.width, best.height), (128, 128));
    }

    #[test]
    fn picks_closest_among_equally_square_candidates() {
        let icons = vec![icon(16, 16), icon(256, 256), icon(32, 32)];
        let best = find_icon_for_size(&icons, 32).unwrap();
        assert_eq!((best.width, best.height), (32, 32));
    }
}
