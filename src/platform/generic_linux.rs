//! `GenericLinuxBundler`: an FHS-style output directory with no installer
//! wrapper, consumed directly by [`super::appimage::AppImageBundler`] and
//! [`super::rpm::RpmBundler`].

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::{escape_package_name, BundlerContext};
use crate::error::Result;
use crate::orchestrator::BundlerOutputStructure;
use crate::platform::{PackageFormat, PlatformBundler};
use crate::relocate::linux as relocate_linux;
use crate::resources;
use crate::resources::linux_desktop;

/// Bundler producing a generic Linux output directory:
/// `usr/bin/<binary>`, `usr/lib/<product>/*.so`, `usr/share/...`.
pub struct GenericLinuxBundler;

#[async_trait]
impl PlatformBundler for GenericLinuxBundler {
    fn format(&self) -> PackageFormat {
        PackageFormat::GenericLinux
    }

    fn intended_output(&self, context: &BundlerContext) -> PathBuf {
        context.output_directory.join(&context.app.product_name)
    }

    async fn bundle(&self, context: &BundlerContext) -> Result<BundlerOutputStructure> {
        let root = self.intended_output(context);
        crate::fsops::remove_dir_all(&root).await?;

        let bin_dir = root.join("usr/bin");
        let lib_dir = root.join("usr/lib");
        let share_dir = root.join("usr/share");
        crate::fsops::create_dir_all(&bin_dir).await?;
        crate::fsops::create_dir_all(&lib_dir).await?;
        crate::fsops::create_dir_all(&share_dir).await?;

        let main_dest = bin_dir.join(&context.app.main_binary);
        crate::fsops::copy_file(
            &context.products_directory.join(&context.app.main_binary),
            &main_dest,
        )
        .await?;
        make_executable(&main_dest).await?;

        for extra in &context.app.extra_binaries {
            let dest = bin_dir.join(extra);
            crate::fsops::copy_file(&context.products_directory.join(extra), &dest).await?;
            make_executable(&dest).await?;
        }

        relocate_linux::bundle_library_dependencies(
            &[main_dest],
            &lib_dir,
            &context.products_directory,
        )
        .await?;
        resources::copy_resources(context, &root, &share_dir, false).await?;

        let install_prefix = format!("/opt/{}", escape_package_name(&context.app.product_name));
        linux_desktop::write_desktop_integration(context, &share_dir, &install_prefix).await?;

        Ok(BundlerOutputStructure {
            format: self.format(),
            root,
            digest: None,
        })
    }
}

#[cfg(unix)]
async fn make_executable(path: &std::path::Path) -> Result<()> {
    use crate::error::ErrorExt;
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path)
        .await
        .fs_context("reading binary metadata", path)?
        .permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms)
        .await
        .fs_context("setting binary permissions", path)
}

#[cfg(not(unix))]
async fn make_executable(_path: &std::path::Path) -> Result<()> {
    Ok(())
}
