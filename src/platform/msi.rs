//! MSI installer bundler, wrapping [`super::generic_windows::GenericWindowsBundler`]'s
//! flat output directory into a single `.msi` via the WiX toolset.
//!
//! Generates a `.wxs` source (or uses a caller-supplied template, per
//! [`crate::config::MsiSettings`]) and uses
//! [`crate::guid::deterministic_guid`] for a stable `UpgradeCode` so
//! repeated builds of the same app upgrade in place rather than installing
//! side-by-side copies.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::BundlerContext;
use crate::error::{ErrorExt, Result};
use crate::guid::deterministic_guid;
use crate::orchestrator::BundlerOutputStructure;
use crate::platform::generic_windows::GenericWindowsBundler;
use crate::platform::{PackageFormat, PlatformBundler};
use crate::process;

/// Bundler producing a single `.msi` installer.
pub struct MsiBundler;

#[async_trait]
impl PlatformBundler for MsiBundler {
    fn format(&self) -> PackageFormat {
        PackageFormat::Msi
    }

    fn intended_output(&self, context: &BundlerContext) -> PathBuf {
        context.output_directory.join(format!(
            "{}-{}.msi",
            context.app.product_name, context.app.version
        ))
    }

    async fn bundle(&self, context: &BundlerContext) -> Result<BundlerOutputStructure> {
        let generic = GenericWindowsBundler;
        let layout = generic.bundle(context).await?;

        let output_path = self.intended_output(context);
        if let Some(parent) = output_path.parent() {
            crate::fsops::create_dir_all(parent).await?;
        }

        let work_dir = context.output_directory.join(".msi-work");
        crate::fsops::create_dir_all(&work_dir).await?;

        let wxs_path = match &context.app.msi.template {
            Some(custom) => custom.clone(),
            None => {
                let generated = work_dir.join("main.wxs");
                let source = render_wxs(context, &layout.root);
                tokio::fs::write(&generated, source.as_bytes())
                    .await
                    .fs_context("writing generated WiX source", &generated)?;
                generated
            }
        };

        build_with_wix(&wxs_path, &work_dir, &output_path).await?;

        Ok(BundlerOutputStructure {
            format: self.format(),
            root: output_path,
            digest: None,
        })
    }
}

fn render_wxs(context: &BundlerContext, layout_root: &std::path::Path) -> String {
    let app = &context.app;
    let upgrade_code = deterministic_guid(&format!("{}::upgrade-code", app.identifier));
    let product_code = deterministic_guid(&format!("{}::{}", app.identifier, app.version));
    let component_guid = deterministic_guid(&format!("{}::main-binary", app.identifier));
    let language = app.msi.language.clone().unwrap_or_else(|| "1033".to_string());

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Wix xmlns="http://schemas.microsoft.com/wix/2006/wi">
  <Product Id="{product_code}" Name="{product_name}" Language="{language}"
           Version="{version}" Manufacturer="{product_name}" UpgradeCode="{upgrade_code}">
    <Package InstallerVersion="500" Compressed="yes" InstallScope="perMachine" />
    <MajorUpgrade DowngradeErrorMessage="A newer version is already installed." />
    <MediaTemplate EmbedCab="yes" />

    <Directory Id="TARGETDIR" Name="SourceDir">
      <Directory Id="ProgramFilesFolder">
        <Directory Id="INSTALLFOLDER" Name="{product_name}">
          <Component Id="MainExecutable" Guid="{component_guid}">
            <File Id="MainExe" Source="{main_binary_path}" KeyPath="yes" />
          </Component>
        </Directory>
      </Directory>
    </Directory>

    <Feature Id="MainFeature" Title="{product_name}" Level="1">
      <ComponentRef Id="MainExecutable" />
    </Feature>
  </Product>
</Wix>
"#,
        product_code = product_code,
        product_name = app.product_name,
        language = language,
        version = app.version,
        upgrade_code = upgrade_code,
        component_guid = component_guid,
        main_binary_path = layout_root
            .join(format!("{}.exe", app.main_binary))
            .to_string_lossy(),
    )
}

async fn build_with_wix(
    wxs_path: &std::path::Path,
    work_dir: &std::path::Path,
    output_path: &std::path::Path,
) -> Result<()> {
    let wix = process::which("wix", "install the WiX Toolset (dotnet tool install --global wix)")?;
    process::run_checked(
        &wix.to_string_lossy(),
        &[
            "build",
            &wxs_path.to_string_lossy(),
            "-out",
            &output_path.to_string_lossy(),
            "-intermediatefolder",
            &work_dir.to_string_lossy(),
        ],
        None,
        &[],
    )
    .await
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfiguration;
    use std::collections::BTreeMap;

    fn context() -> BundlerContext {
        BundlerContext {
            app_name: "demo".into(),
            app: AppConfiguration {
                identifier: "com.example.demo".into(),
                product_name: "Demo".into(),
                version: "1.0.0".into(),
                marketing_version: None,
                main_binary: "demo".into(),
                extra_binaries: vec![],
                icon_paths: vec![],
                resources: BTreeMap::new(),
                plist_extras: BTreeMap::new(),
                dependencies: vec![],
                dbus_activatable: false,
                darwin: Default::default(),
                rpm: Default::default(),
                appimage: Default::default(),
                windows: Default::default(),
                msi: Default::default(),
            },
            products_directory: "/products".into(),
            output_directory: "/out".into(),
            platform: crate::platform::Platform::Windows,
            project_artifacts: BTreeMap::new(),
        }
    }

    #[test]
    fn generated_wxs_embeds_deterministic_upgrade_code() {
        let ctx = context();
        let wxs = render_wxs(&ctx, std::path::Path::new("/out/Demo"));
        let expected = deterministic_guid("com.example.demo::upgrade-code");
        assert!(wxs.contains(&expected));
    }

    #[test]
    fn intended_output_names_msi_after_product_and_version() {
        let bundler = MsiBundler;
        let ctx = context();
        assert_eq!(
            bundler.intended_output(&ctx),
            PathBuf::from("/out/Demo-1.0.0.msi")
        );
    }
}
