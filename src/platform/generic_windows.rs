//! `GenericWindowsBundler`: a flat output directory (no installer wrapper),
//! consumed by [`super::msi::MsiBundler`].

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::BundlerContext;
use crate::error::Result;
use crate::orchestrator::BundlerOutputStructure;
use crate::platform::{PackageFormat, PlatformBundler};
use crate::relocate::windows as relocate_windows;
use crate::resources;

/// Bundler producing a flat Windows output directory:
/// `<ProductName>.exe`, sibling DLLs, an `.ico` icon, and copied resources.
pub struct GenericWindowsBundler;

#[async_trait]
impl PlatformBundler for GenericWindowsBundler {
    fn format(&self) -> PackageFormat {
        PackageFormat::GenericWindows
    }

    fn intended_output(&self, context: &BundlerContext) -> PathBuf {
        context.output_directory.join(&context.app.product_name)
    }

    async fn bundle(&self, context: &BundlerContext) -> Result<BundlerOutputStructure> {
        let root = self.intended_output(context);
        crate::fsops::remove_dir_all(&root).await?;
        crate::fsops::create_dir_all(&root).await?;

        let main_dest = exe_path(&root, &context.app.main_binary);
        crate::fsops::copy_file(&context.main_binary_path(), &main_dest).await?;

        let mut binaries = vec![main_dest];
        for extra in &context.app.extra_binaries {
            let dest = exe_path(&root, extra);
            let source = exe_path(&context.products_directory, extra);
            crate::fsops::copy_file(&source, &dest).await?;
            binaries.push(dest);
        }

        let search_paths = vec![context.products_directory.clone()];
        relocate_windows::bundle_dll_dependencies(&binaries, &root, &search_paths).await?;

        build_icon(context, &root).await?;
        resources::copy_resources(context, &root, &root, false).await?;

        Ok(BundlerOutputStructure {
            format: self.format(),
            root,
            digest: None,
        })
    }
}

fn exe_path(dir: &std::path::Path, name: &str) -> PathBuf {
    let mut path = dir.join(name);
    if path.extension().is_none() {
        path.set_extension("exe");
    }
    path
}

async fn build_icon(context: &BundlerContext, root: &std::path::Path) -> Result<()> {
    if context.app.icon_paths.is_empty() {
        return Ok(());
    }
    let icons = resources::icons::load_icons(&context.app.icon_paths)?;
    let ico_path = root.join(format!("{}.ico", context.app.product_name));
    resources::ico::create_ico_file(&icons, &ico_path).await?;
    Ok(())
}
