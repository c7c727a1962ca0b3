//! Android APK bundler. Deliberately a stub: Android packaging needs a
//! full Gradle/AGP toolchain this crate does not drive, so
//! [`ApkBundler::bundle`] always fails while
//! [`ApkBundler::intended_output`] still reports where an APK would land,
//! letting callers probe the target matrix without special-casing Android.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::BundlerContext;
use crate::error::{Error, Result};
use crate::orchestrator::BundlerOutputStructure;
use crate::platform::{PackageFormat, PlatformBundler};

/// Stub bundler for the Android target.
pub struct ApkBundler;

#[async_trait]
impl PlatformBundler for ApkBundler {
    fn format(&self) -> PackageFormat {
        PackageFormat::Apk
    }

    fn intended_output(&self, context: &BundlerContext) -> PathBuf {
        context
            .output_directory
            .join(format!("{}.apk", context.app.product_name))
    }

    async fn bundle(&self, _context: &BundlerContext) -> Result<BundlerOutputStructure> {
        Err(Error::UnsupportedPackageType {
            package_type: PackageFormat::Apk.short_name().to_string(),
            platform: "this build of the bundler (Android packaging is not implemented)"
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfiguration;
    use std::collections::BTreeMap;

    #[test]
    fn intended_output_is_reported_without_building() {
        let bundler = ApkBundler;
        let ctx = BundlerContext {
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
            platform: crate::platform::Platform::Android,
            project_artifacts: BTreeMap::new(),
        };
        assert_eq!(bundler.intended_output(&ctx), PathBuf::from("/out/Demo.apk"));
    }
}
