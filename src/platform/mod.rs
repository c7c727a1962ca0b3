//! Target platforms, package formats, and the per-format bundle directory
//! structures they produce.

pub mod android;
#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
pub mod appimage;
#[cfg(target_os = "macos")]
pub mod darwin;
#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
pub mod generic_linux;
#[cfg(windows)]
pub mod generic_windows;
#[cfg(windows)]
pub mod msi;
#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
pub mod rpm;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::BundlerContext;
use crate::error::Result;
use crate::orchestrator::BundlerOutputStructure;

/// The device/OS family a bundle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Platform {
    /// macOS, producing a `.app` bundle.
    MacOs,
    /// iOS device, producing a flat `.app` bundle for install via device
    /// provisioning.
    Ios,
    /// iOS Simulator.
    IosSimulator,
    /// tvOS device.
    TvOs,
    /// tvOS Simulator.
    TvOsSimulator,
    /// visionOS device.
    VisionOs,
    /// visionOS Simulator.
    VisionOsSimulator,
    /// Generic Linux, FHS-style output directory.
    Linux,
    /// Generic Windows, flat output directory.
    Windows,
    /// Android, producing an APK (stubbed — see [`android`]).
    Android,
}

impl Platform {
    /// Whether this platform is one of the Apple device/simulator targets.
    pub fn is_apple(self) -> bool {
        matches!(
            self,
            Platform::MacOs
                | Platform::Ios
                | Platform::IosSimulator
                | Platform::TvOs
                | Platform::TvOsSimulator
                | Platform::VisionOs
                | Platform::VisionOsSimulator
        )
    }

    /// Whether this platform is an Apple *simulator* target, which must
    /// never be code-signed for distribution the way a device build is.
    pub fn is_simulator(self) -> bool {
        matches!(
            self,
            Platform::IosSimulator | Platform::TvOsSimulator | Platform::VisionOsSimulator
        )
    }

    /// Whether this platform is Windows.
    pub fn is_windows(self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Short, lowercase, filesystem-safe name.
    pub fn short_name(self) -> &'static str {
        match self {
            Platform::MacOs => "macos",
            Platform::Ios => "ios",
            Platform::IosSimulator => "ios-simulator",
            Platform::TvOs => "tvos",
            Platform::TvOsSimulator => "tvos-simulator",
            Platform::VisionOs => "visionos",
            Platform::VisionOsSimulator => "visionos-simulator",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// A concrete package/installer format a [`PlatformBundler`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PackageFormat {
    /// Apple `.app` bundle (macOS/iOS/tvOS/visionOS + simulators).
    DarwinApp,
    /// Linux FHS-style generic output directory (no installer wrapper).
    GenericLinux,
    /// Linux AppImage, wrapping [`PackageFormat::GenericLinux`].
    AppImage,
    /// RPM package, wrapping [`PackageFormat::GenericLinux`].
    Rpm,
    /// Windows generic flat output directory (no installer wrapper).
    GenericWindows,
    /// Windows MSI installer, wrapping [`PackageFormat::GenericWindows`].
    Msi,
    /// Android APK (stub; see [`android`]).
    Apk,
}

impl PackageFormat {
    /// Short, lowercase identifier.
    pub fn short_name(self) -> &'static str {
        match self {
            PackageFormat::DarwinApp => "app",
            PackageFormat::GenericLinux => "generic-linux",
            PackageFormat::AppImage => "appimage",
            PackageFormat::Rpm => "rpm",
            PackageFormat::GenericWindows => "generic-windows",
            PackageFormat::Msi => "msi",
            PackageFormat::Apk => "apk",
        }
    }

    /// Bundling order priority: lower runs first. Wrapper formats
    /// (AppImage/RPM/MSI) depend on their generic counterpart having
    /// already been produced.
    pub fn priority(self) -> u32 {
        match self {
            PackageFormat::DarwinApp
            | PackageFormat::GenericLinux
            | PackageFormat::GenericWindows
            | PackageFormat::Apk => 0,
            PackageFormat::AppImage | PackageFormat::Rpm | PackageFormat::Msi => 1,
        }
    }

    /// Default set of formats to produce for `platform` when the caller
    /// does not explicitly request a subset.
    pub fn defaults_for(platform: Platform) -> Vec<PackageFormat> {
        match platform {
            Platform::MacOs
            | Platform::Ios
            | Platform::IosSimulator
            | Platform::TvOs
            | Platform::TvOsSimulator
            | Platform::VisionOs
            | Platform::VisionOsSimulator => vec![PackageFormat::DarwinApp],
            Platform::Linux => vec![
                PackageFormat::GenericLinux,
                PackageFormat::AppImage,
                PackageFormat::Rpm,
            ],
            Platform::Windows => vec![PackageFormat::GenericWindows, PackageFormat::Msi],
            Platform::Android => vec![PackageFormat::Apk],
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// One bundler implementation per [`PackageFormat`].
///
/// `intended_output` must be a pure function of `context` (spec property:
/// callers may query where a bundle *would* land without side effects),
/// while `bundle` performs the actual work and returns the same path.
#[async_trait]
pub trait PlatformBundler: Send + Sync {
    /// The format this bundler produces.
    fn format(&self) -> PackageFormat;

    /// Where the finished bundle will be written, without creating it.
    fn intended_output(&self, context: &BundlerContext) -> PathBuf;

    /// Produce the bundle, returning its on-disk structure.
    async fn bundle(&self, context: &BundlerContext) -> Result<BundlerOutputStructure>;
}
