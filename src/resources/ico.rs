//! Windows `.ico` generation from the app's configured icon sources, using
//! the standard Windows icon-size ladder (16, 24, 32, 48, 64, 128, 256).

use std::path::Path;

use ico::{IconDir, IconDirEntry, IconImage, ResourceType};

use crate::error::{Error, ErrorExt, Result};

use super::icons::{find_icon_for_size, load_and_resize, IconInfo};

const ICO_SIZES: &[u32] = &[16, 24, 32, 48, 64, 128, 256];

/// Build a multi-resolution `.ico` file at `output` from `icons`.
pub async fn create_ico_file(icons: &[IconInfo], output: &Path) -> Result<()> {
    let mut icon_dir = IconDir::new(ResourceType::Icon);

    for &size in ICO_SIZES {
        let Some(icon_info) = find_icon_for_size(icons, size) else {
            log::warn!("no suitable source icon for {size}x{size}");
            continue;
        };
        let rgba = load_and_resize(&icon_info.path, size, size)?;
        let icon_image = IconImage::from_rgba_data(size, size, rgba.into_raw());
        let entry = IconDirEntry::encode(&icon_image)
            .map_err(|e| Error::Other(format!("encoding {size}x{size} icon: {e}")))?;
        icon_dir.add_entry(entry);
    }

    let file = std::fs::File::create(output).fs_context("creating ICO output file", output)?;
    icon_dir
        .write(file)
        .map_err(|e| Error::Other(format!("writing ICO data: {e}")))?;
    Ok(())
}
