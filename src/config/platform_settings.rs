//! Per-platform settings nested under [`super::AppConfiguration`].
//!
//! WiX is treated as an implementation detail of the MSI format rather
//! than a user-facing concept, so its settings live under [`MsiSettings`]
//! rather than a separate `Wix`-named struct.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// macOS/iOS/tvOS/visionOS-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DarwinSettings {
    /// `.framework` bundles or `.dylib` files to copy into
    /// `Contents/Frameworks`.
    #[serde(default)]
    pub frameworks: Vec<PathBuf>,
    /// `LSMinimumSystemVersion` / equivalent deployment target.
    #[serde(default)]
    pub minimum_system_version: Option<String>,
    /// Code signing identity name, e.g. `"Developer ID Application: ..."`.
    /// Absent means "don't sign" rather than an error.
    #[serde(default)]
    pub signing_identity: Option<String>,
    /// Path to an entitlements plist to pass to `codesign --entitlements`.
    #[serde(default)]
    pub entitlements: Option<PathBuf>,
    /// `LSApplicationCategoryType` value.
    #[serde(default)]
    pub category: Option<String>,
    /// Whether to submit the signed app to `xcrun notarytool` and staple
    /// the ticket. Requires `signing_identity` to be set.
    #[serde(default)]
    pub notarize: bool,
}

/// RPM-specific package metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpmSettings {
    /// RPM release field, e.g. `"1"`.
    pub release: String,
    /// RPM epoch, if the package needs one to order upgrades correctly.
    #[serde(default)]
    pub epoch: Option<u32>,
    /// License string for the RPM spec.
    #[serde(default)]
    pub license: Option<String>,
    /// `Requires:` entries, each `"name"` or `"name op version"`.
    #[serde(default)]
    pub depends: Vec<String>,
    /// `Provides:` entries.
    #[serde(default)]
    pub provides: Vec<String>,
    /// `Conflicts:` entries.
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// `Obsoletes:` entries.
    #[serde(default)]
    pub obsoletes: Vec<String>,
    /// Payload compression: one of `"gzip"`, `"xz"`, `"zstd"`, `"bzip2"`.
    #[serde(default = "default_rpm_compression")]
    pub compression: String,
}

fn default_rpm_compression() -> String {
    "gzip".to_string()
}

impl Default for RpmSettings {
    fn default() -> Self {
        RpmSettings {
            release: "1".to_string(),
            epoch: None,
            license: None,
            depends: Vec::new(),
            provides: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
            compression: default_rpm_compression(),
        }
    }
}

/// AppImage-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppImageSettings {
    /// Additional files to place alongside the `AppRun` entry point.
    #[serde(default)]
    pub files: BTreeMap<PathBuf, PathBuf>,
}

/// Windows generic-layout settings (no installer wrapper).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowsGenericSettings {
    /// Authenticode signing certificate path, if signing is desired.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    /// Private key path paired with `cert_path`.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// MSI-specific settings (implemented via WiX toolset invocation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MsiSettings {
    /// WiX UI/installer language code, e.g. `"1033"` for en-US.
    #[serde(default)]
    pub language: Option<String>,
    /// Path to a custom WiX `.wxs` template; a built-in minimal template
    /// is used if absent.
    #[serde(default)]
    pub template: Option<PathBuf>,
    /// Whether to skip bundling the WebView2 runtime bootstrapper.
    #[serde(default)]
    pub skip_webview_install: bool,
    /// Path to a license `.rtf` shown during install.
    #[serde(default)]
    pub license: Option<PathBuf>,
}
