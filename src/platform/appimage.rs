//! AppImage bundler, wrapping [`super::generic_linux::GenericLinuxBundler`]'s
//! output directory into a single portable `.AppImage` file via the
//! `appimagetool` external tool.
//!
//! Builds the AppDir (`.desktop` file, `AppRun` entry point, `.DirIcon`)
//! on top of the shared generic-Linux layout rather than from scratch, and
//! shells out to a locally installed `appimagetool` rather than fetching
//! `linuxdeploy` over the network at build time.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::config::BundlerContext;
use crate::error::{ErrorExt, Result};
use crate::orchestrator::BundlerOutputStructure;
use crate::platform::generic_linux::GenericLinuxBundler;
use crate::platform::{PackageFormat, PlatformBundler};
use crate::process;

/// Bundler producing a single `.AppImage` file.
pub struct AppImageBundler;

#[async_trait]
impl PlatformBundler for AppImageBundler {
    fn format(&self) -> PackageFormat {
        PackageFormat::AppImage
    }

    fn intended_output(&self, context: &BundlerContext) -> PathBuf {
        let arch = std::env::consts::ARCH;
        context.output_directory.join(format!(
            "{}-{}-{}.AppImage",
            context.app.product_name, context.app.version, arch
        ))
    }

    async fn bundle(&self, context: &BundlerContext) -> Result<BundlerOutputStructure> {
        let generic = GenericLinuxBundler;
        let layout = generic.bundle(context).await?;

        write_desktop_file(context, &layout.root).await?;
        write_app_run(context, &layout.root).await?;
        link_icon(context, &layout.root).await?;

        let output_path = self.intended_output(context);
        if let Some(parent) = output_path.parent() {
            crate::fsops::create_dir_all(parent).await?;
        }

        let appimagetool = process::which("appimagetool", "install appimagetool")?;
        process::run_checked(
            &appimagetool.to_string_lossy(),
            &[
                layout.root.to_string_lossy().as_ref(),
                output_path.to_string_lossy().as_ref(),
            ],
            None,
            &[],
        )
        .await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&output_path, std::fs::Permissions::from_mode(0o755))
                .await
                .fs_context("making AppImage executable", &output_path)?;
        }

        Ok(BundlerOutputStructure {
            format: self.format(),
            root: output_path,
            digest: None,
        })
    }
}

async fn write_app_run(context: &BundlerContext, app_dir: &Path) -> Result<()> {
    let app_run_path = app_dir.join("AppRun");
    let contents = format!(
        "#!/bin/sh\nHERE=\"$(dirname \"$(readlink -f \"$0\")\")\"\nexport LD_LIBRARY_PATH=\"$HERE/usr/lib:$LD_LIBRARY_PATH\"\nexec \"$HERE/usr/bin/{}\" \"$@\"\n",
        context.app.main_binary,
    );
    tokio::fs::write(&app_run_path, contents.as_bytes())
        .await
        .fs_context("writing AppRun entry point", &app_run_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&app_run_path, std::fs::Permissions::from_mode(0o755))
            .await
            .fs_context("making AppRun executable", &app_run_path)?;
    }
    Ok(())
}

async fn write_desktop_file(context: &BundlerContext, app_dir: &Path) -> Result<()> {
    let desktop_path = app_dir.join(format!("{}.desktop", context.app.product_name));
    let mut file = tokio::fs::File::create(&desktop_path)
        .await
        .fs_context("creating desktop entry", &desktop_path)?;

    file.write_all(b"[Desktop Entry]\n").await?;
    file.write_all(b"Type=Application\n").await?;
    file.write_all(format!("Name={}\n", context.app.product_name).as_bytes())
        .await?;
    file.write_all(format!("Exec={}\n", context.app.main_binary).as_bytes())
        .await?;
    file.write_all(format!("Icon={}\n", context.app.product_name).as_bytes())
        .await?;
    file.write_all(b"Terminal=false\n").await?;
    Ok(())
}

async fn link_icon(context: &BundlerContext, app_dir: &Path) -> Result<()> {
    let Some(icon_path) = context
        .app
        .icon_paths
        .iter()
        .find(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
    else {
        return Ok(());
    };
    let dest_icon = app_dir.join(format!("{}.png", context.app.product_name));
    crate::fsops::copy_file(icon_path, &dest_icon).await?;

    #[cfg(unix)]
    {
        let dir_icon = app_dir.join(".DirIcon");
        let _ = tokio::fs::remove_file(&dir_icon).await;
        tokio::fs::symlink(format!("{}.png", context.app.product_name), &dir_icon)
            .await
            .fs_context("creating .DirIcon symlink", &dir_icon)?;
    }
    Ok(())
}
