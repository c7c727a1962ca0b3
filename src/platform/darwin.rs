//! `DarwinBundler`: produces a `.app` bundle for macOS/iOS/tvOS/visionOS and
//! their simulators.
//!
//! Ten-step sequence: layout → icon → binaries → dylib relocation →
//! resources → metadata → Info.plist → sign → notarize → patch. Signing
//! is skipped, not treated as an error, when no identity is configured.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::BundlerContext;
use crate::error::{ErrorExt, Result};
use crate::metadata;
use crate::orchestrator::BundlerOutputStructure;
use crate::platform::{PackageFormat, Platform, PlatformBundler};
use crate::process;
use crate::relocate::darwin as relocate_darwin;
use crate::resources;

/// Bundler producing Apple `.app` bundles.
pub struct DarwinBundler {
    platform: Platform,
}

impl DarwinBundler {
    /// Construct a bundler for a specific Apple platform (device or
    /// simulator).
    pub fn new(platform: Platform) -> Self {
        DarwinBundler { platform }
    }
}

#[async_trait]
impl PlatformBundler for DarwinBundler {
    fn format(&self) -> PackageFormat {
        PackageFormat::DarwinApp
    }

    fn intended_output(&self, context: &BundlerContext) -> PathBuf {
        context
            .output_directory
            .join(format!("{}.app", context.app.product_name))
    }

    async fn bundle(&self, context: &BundlerContext) -> Result<BundlerOutputStructure> {
        let app_bundle = self.intended_output(context);
        crate::fsops::remove_dir_all(&app_bundle).await?;

        let contents = app_bundle.join("Contents");
        let macos_dir = contents.join("MacOS");
        let resources_dir = contents.join("Resources");
        let frameworks_dir = contents.join("Frameworks");
        crate::fsops::create_dir_all(&macos_dir).await?;
        crate::fsops::create_dir_all(&resources_dir).await?;

        copy_binaries(context, &macos_dir, &resources_dir).await?;

        if !self.platform.is_simulator() {
            let search_paths = standard_framework_search_paths();
            let binaries = binary_paths(context, &macos_dir);
            relocate_darwin::bundle_dylib_dependencies(
                &binaries,
                &frameworks_dir,
                &context.products_directory,
                &search_paths,
            )
            .await?;
        }

        build_icon(context, &resources_dir).await?;
        resources::copy_resources(context, &app_bundle, &resources_dir, true).await?;

        if let Some(archs) = metadata_archs(context) {
            let work_dir = context.output_directory.join(".metadata-work");
            let metadata_output = macos_dir.join("lib_bundle_metadata.a");
            metadata::insert_metadata(context, &work_dir, &archs, &metadata_output).await?;
        }

        write_info_plist(context, &contents).await?;

        if let Some(identity) = &context.app.darwin.signing_identity {
            sign_app(&app_bundle, identity, context.app.darwin.entitlements.as_deref()).await?;
            if context.app.darwin.notarize {
                notarize_app(&app_bundle).await?;
            }
        } else {
            log::info!("no signing_identity configured, skipping code signing");
        }

        crate::patch::patch_binary(&context.main_binary_path_in(&macos_dir), self.format()).await?;

        Ok(BundlerOutputStructure {
            format: self.format(),
            root: app_bundle,
            digest: None,
        })
    }
}

impl BundlerContext {
    fn main_binary_path_in(&self, macos_dir: &Path) -> PathBuf {
        macos_dir.join(&self.app.main_binary)
    }
}

fn binary_paths(context: &BundlerContext, macos_dir: &Path) -> Vec<PathBuf> {
    let mut paths = vec![macos_dir.join(&context.app.main_binary)];
    for extra in &context.app.extra_binaries {
        paths.push(macos_dir.join(extra));
    }
    paths
}

async fn copy_binaries(
    context: &BundlerContext,
    macos_dir: &Path,
    resources_dir: &Path,
) -> Result<()> {
    let main_source = context.products_directory.join(&context.app.main_binary);
    let main_dest = macos_dir.join(&context.app.main_binary);
    crate::fsops::copy_file(&main_source, &main_dest).await?;
    make_executable(&main_dest).await?;

    for extra in &context.app.extra_binaries {
        let source = context.products_directory.join(extra);
        let dest = resources_dir.join(extra);
        crate::fsops::copy_file(&source, &dest).await?;
        make_executable(&dest).await?;
    }
    Ok(())
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
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
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn standard_framework_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/Library/Frameworks"),
        PathBuf::from("/Network/Library/Frameworks"),
        PathBuf::from("/opt/homebrew/lib"),
        PathBuf::from("/usr/local/lib"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        paths.insert(0, PathBuf::from(home).join("Library/Frameworks"));
    }
    paths
}

async fn build_icon(context: &BundlerContext, resources_dir: &Path) -> Result<()> {
    if context.app.icon_paths.is_empty() {
        return Ok(());
    }
    let icons = resources::icons::load_icons(&context.app.icon_paths)?;
    let icns_path = resources_dir.join(format!("{}.icns", context.app.product_name));

    const ICNS_SIZES: &[u32] = &[16, 32, 64, 128, 256, 512, 1024];
    let mut family = icns::IconFamily::new();
    for &size in ICNS_SIZES {
        let Some(icon) = resources::icons::find_icon_for_size(&icons, size) else {
            continue;
        };
        let image = resources::icons::load_and_resize(&icon.path, size, size)?;
        let icns_image =
            icns::Image::from_data(icns::PixelFormat::RGBA, size, size, image.into_raw())?;
        family.add_icon(&icns_image)?;
    }

    let file = std::fs::File::create(&icns_path).fs_context("creating ICNS file", &icns_path)?;
    family.write(file)?;
    Ok(())
}

fn metadata_archs(context: &BundlerContext) -> Option<Vec<metadata::Arch>> {
    if context.app.extra_binaries.is_empty() && context.app.main_binary.is_empty() {
        return None;
    }
    Some(vec![metadata::Arch::Arm64, metadata::Arch::X86_64])
}

async fn write_info_plist(context: &BundlerContext, contents: &Path) -> Result<()> {
    write_pkg_info(contents).await?;
    let dict = resources::plist::build_info_plist(context, context.platform)?;
    let plist_path = contents.join("Info.plist");
    resources::plist::write_plist(&dict, &plist_path)
}

/// Literal 8-byte `PkgInfo` file: the ASCII bytes `APPL????` — the
/// four-character type code `APPL` followed by an all-wildcard,
/// never-populated creator code.
async fn write_pkg_info(contents: &Path) -> Result<()> {
    const PKG_INFO: &[u8; 8] = b"APPL????";
    tokio::fs::write(contents.join("PkgInfo"), PKG_INFO)
        .await
        .fs_context("writing PkgInfo", contents)
}

async fn sign_app(app_bundle: &Path, identity: &str, entitlements: Option<&Path>) -> Result<()> {
    let codesign = process::which("codesign", "install Xcode Command Line Tools")?;
    let mut args = vec!["--force", "--sign", identity, "--options", "runtime"];
    let entitlements_str = entitlements.map(|p| p.to_string_lossy().into_owned());
    if let Some(ref path) = entitlements_str {
        args.push("--entitlements");
        args.push(path);
    }
    let bundle_str = app_bundle.to_string_lossy().into_owned();
    args.push(&bundle_str);
    process::run_checked(&codesign.to_string_lossy(), &args, None, &[])
        .await
        .map(|_| ())
}

async fn notarize_app(app_bundle: &Path) -> Result<()> {
    let xcrun = process::which("xcrun", "install Xcode Command Line Tools")?;
    let bundle_str = app_bundle.to_string_lossy().into_owned();
    process::run_checked(
        &xcrun.to_string_lossy(),
        &["notarytool", "submit", &bundle_str, "--wait"],
        None,
        &[],
    )
    .await?;
    process::run_checked(
        &xcrun.to_string_lossy(),
        &["stapler", "staple", &bundle_str],
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
            platform: Platform::MacOs,
            project_artifacts: BTreeMap::new(),
        }
    }

    #[test]
    fn intended_output_is_pure() {
        let bundler = DarwinBundler::new(Platform::MacOs);
        let ctx = context();
        assert_eq!(bundler.intended_output(&ctx), bundler.intended_output(&ctx));
        assert_eq!(bundler.intended_output(&ctx), PathBuf::from("/out/Demo.app"));
    }

    #[tokio::test]
    async fn pkg_info_is_the_literal_eight_bytes() {
        let dir = tempfile::tempdir().unwrap();
        write_pkg_info(dir.path()).await.unwrap();
        let written = tokio::fs::read(dir.path().join("PkgInfo")).await.unwrap();
        assert_eq!(written, b"APPL????");
    }
}
