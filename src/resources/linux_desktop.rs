//! Linux desktop integration: `.desktop` launcher entries, hicolor icon
//! placement, and an optional D-Bus service activation file.

use std::path::Path;

use crate::config::{escape_package_name, BundlerContext};
use crate::error::{ErrorExt, Result};

/// Write `usr/share/applications/<identifier>.desktop`, place the app icon
/// under `usr/share/icons/hicolor/1024x1024/apps/`, and (if
/// `context.app.dbus_activatable`) write a matching D-Bus service file.
///
/// `install_prefix` is the absolute path the package installs itself to
/// (e.g. `/opt/my-app`), used to build the `Exec=` line.
pub async fn write_desktop_integration(
    context: &BundlerContext,
    share_dir: &Path,
    install_prefix: &str,
) -> Result<()> {
    write_desktop_entry(context, share_dir, install_prefix).await?;
    write_hicolor_icon(context, share_dir).await?;
    if context.app.dbus_activatable {
        write_dbus_service(context, share_dir).await?;
    }
    Ok(())
}

async fn write_desktop_entry(
    context: &BundlerContext,
    share_dir: &Path,
    install_prefix: &str,
) -> Result<()> {
    let identifier = &context.app.identifier;
    let exec = format!("{install_prefix}/usr/bin/{} %U", context.app.main_binary);
    let contents = format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Exec={exec}\n\
         Icon={identifier}\n\
         Categories=Utility;\n",
        name = context.app.product_name,
    );

    let applications_dir = share_dir.join("applications");
    crate::fsops::create_dir_all(&applications_dir).await?;
    let desktop_path = applications_dir.join(format!("{identifier}.desktop"));
    tokio::fs::write(&desktop_path, contents.as_bytes())
        .await
        .fs_context("writing .desktop file", &desktop_path)
}

async fn write_hicolor_icon(context: &BundlerContext, share_dir: &Path) -> Result<()> {
    if context.app.icon_paths.is_empty() {
        return Ok(());
    }
    let icons = super::icons::load_icons(&context.app.icon_paths)?;
    const ICON_SIZE: u32 = 1024;
    let Some(icon) = super::icons::find_icon_for_size(&icons, ICON_SIZE) else {
        return Ok(());
    };
    let image = super::icons::load_and_resize(&icon.path, ICON_SIZE, ICON_SIZE)?;

    let apps_dir = share_dir.join("icons/hicolor/1024x1024/apps");
    crate::fsops::create_dir_all(&apps_dir).await?;
    let icon_path = apps_dir.join(format!("{}.png", context.app.identifier));
    image.save(&icon_path)?;
    Ok(())
}

async fn write_dbus_service(context: &BundlerContext, share_dir: &Path) -> Result<()> {
    let identifier = &context.app.identifier;
    let exec_name = escape_package_name(&context.app.product_name);
    let contents = format!(
        "[D-BUS Service]\n\
         Name={identifier}\n\
         Exec=/usr/bin/{exec_name}\n"
    );

    let services_dir = share_dir.join("dbus-1/services");
    crate::fsops::create_dir_all(&services_dir).await?;
    let service_path = services_dir.join(format!("{identifier}.service"));
    tokio::fs::write(&service_path, contents.as_bytes())
        .await
        .fs_context("writing D-Bus service file", &service_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfiguration;
    use crate::platform::Platform;
    use std::collections::BTreeMap;

    fn context(dbus_activatable: bool) -> BundlerContext {
        BundlerContext {
            app_name: "demo".into(),
            app: AppConfiguration {
                identifier: "com.example.demo".into(),
                product_name: "Demo App".into(),
                version: "1.0.0".into(),
                marketing_version: None,
                main_binary: "demo".into(),
                extra_binaries: vec![],
                icon_paths: vec![],
                resources: BTreeMap::new(),
                plist_extras: BTreeMap::new(),
                dependencies: vec![],
                dbus_activatable,
                darwin: Default::default(),
                rpm: Default::default(),
                appimage: Default::default(),
                windows: Default::default(),
                msi: Default::default(),
            },
            products_directory: "/products".into(),
            output_directory: "/out".into(),
            platform: Platform::Linux,
            project_artifacts: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn writes_desktop_entry_with_exec_line() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(false);
        write_desktop_entry(&ctx, dir.path(), "/opt/demo-app").await.unwrap();

        let contents = tokio::fs::read_to_string(
            dir.path().join("applications/com.example.demo.desktop"),
        )
        .await
        .unwrap();
        assert!(contents.contains("Exec=/opt/demo-app/usr/bin/demo %U"));
        assert!(contents.contains("Icon=com.example.demo"));
    }

    #[tokio::test]
    async fn skips_dbus_service_when_not_activatable() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(false);
        write_desktop_integration(&ctx, dir.path(), "/opt/demo-app").await.unwrap();
        assert!(!dir
            .path()
            .join("dbus-1/services/com.example.demo.service")
            .exists());
    }

    #[tokio::test]
    async fn writes_dbus_service_when_activatable() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(true);
        write_dbus_service(&ctx, dir.path()).await.unwrap();
        let contents = tokio::fs::read_to_string(
            dir.path().join("dbus-1/services/com.example.demo.service"),
        )
        .await
        .unwrap();
        assert!(contents.contains("Name=com.example.demo"));
        assert!(contents.contains("Exec=/usr/bin/demo-app"));
    }
}
