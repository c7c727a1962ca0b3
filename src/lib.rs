//! Platform-polymorphic application bundler.
//!
//! Packages a directory of already-compiled executables into a native
//! application bundle for the target platform: macOS/iOS/tvOS/visionOS `.app`
//! bundles, Linux generic/AppImage/RPM layouts, Windows generic/MSI layouts,
//! and an Android APK stub.
//!
//! This crate does not compile anything itself, does not parse command-line
//! arguments, and does not implement the external tools it shells out to
//! (`otool`, `install_name_tool`, `ldd`, `patchelf`, `dumpbin`, `codesign`,
//! `lipo`, `rpmbuild`, `appimagetool`, `wix`, ...). It orchestrates them.
//! Dependency-project checkout is the one exception: it uses `gix`, a
//! pure-Rust git implementation, rather than shelling out to a `git` binary.
//!
//! The entry point is [`orchestrator::Orchestrator`], driven by a
//! [`config::BundlerContext`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod fsops;
pub mod guid;
pub mod macho;
pub mod metadata;
pub mod orchestrator;
pub mod patch;
pub mod platform;
pub mod process;
pub mod project_builder;
pub mod relocate;
pub mod resources;
pub mod variables;

pub use config::{AppConfiguration, BundlerContext, PackageConfiguration, ProjectConfiguration};
pub use error::{Error, Result};
pub use orchestrator::{ArtifactDigest, BundlerOutputStructure, Orchestrator};
pub use platform::Platform;
