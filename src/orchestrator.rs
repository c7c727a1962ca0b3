//! Top-level entry point: dispatches a [`BundlerContext`] to the
//! [`PlatformBundler`] implementations for the requested
//! [`PackageFormat`]s, in priority order, and reports what was produced.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

use crate::config::BundlerContext;
use crate::error::{Error, ErrorExt, Result};
use crate::platform::{PackageFormat, Platform, PlatformBundler};

/// SHA-256 checksum and size of a produced bundle, attached for integrity
/// verification by downstream tooling.
#[derive(Debug, Clone)]
pub struct ArtifactDigest {
    /// Total size in bytes (sum over all files, for directory bundles).
    pub size: u64,
    /// Hex-encoded SHA-256 checksum.
    pub checksum: String,
}

/// The on-disk result of one [`PlatformBundler::bundle`] call.
#[derive(Debug, Clone)]
pub struct BundlerOutputStructure {
    /// Format that was produced.
    pub format: PackageFormat,
    /// Root path of the produced bundle (a directory for `.app`/generic
    /// layouts, a single file for `.rpm`/`.msi`/`.AppImage`/`.apk`).
    pub root: PathBuf,
    /// Checksum/size metadata, computed by the orchestrator after
    /// `bundle()` returns — individual bundlers never compute this
    /// themselves.
    pub digest: Option<ArtifactDigest>,
}

/// Dispatches bundling work across [`PlatformBundler`] implementations.
pub struct Orchestrator {
    bundlers: Vec<Box<dyn PlatformBundler>>,
}

impl Orchestrator {
    /// Build an orchestrator with the standard bundler set for `platform`.
    pub fn for_platform(platform: Platform) -> Self {
        let mut bundlers: Vec<Box<dyn PlatformBundler>> = Vec::new();

        #[cfg(target_os = "macos")]
        if platform.is_apple() {
            bundlers.push(Box::new(crate::platform::darwin::DarwinBundler::new(
                platform,
            )));
        }
        #[cfg(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        ))]
        if platform == Platform::Linux {
            bundlers.push(Box::new(
                crate::platform::generic_linux::GenericLinuxBundler,
            ));
            bundlers.push(Box::new(crate::platform::appimage::AppImageBundler));
            bundlers.push(Box::new(crate::platform::rpm::RpmBundler));
        }

        #[cfg(windows)]
        if platform == Platform::Windows {
            bundlers.push(Box::new(
                crate::platform::generic_windows::GenericWindowsBundler,
            ));
            bundlers.push(Box::new(crate::platform::msi::MsiBundler));
        }

        if platform == Platform::Android {
            bundlers.push(Box::new(crate::platform::android::ApkBundler));
        }

        Orchestrator { bundlers }
    }

    /// Where each requested format's output would land, without producing
    /// anything. Calling this never touches the filesystem or spawns a
    /// process.
    pub fn intended_outputs(
        &self,
        context: &BundlerContext,
        formats: &[PackageFormat],
    ) -> Result<Vec<PathBuf>> {
        formats
            .iter()
            .map(|format| self.bundler_for(*format).map(|b| b.intended_output(context)))
            .collect()
    }

    /// Produce every format in `formats`, in priority order (wrapper
    /// formats such as AppImage/RPM/MSI run after their generic
    /// counterpart). Returns one [`BundlerOutputStructure`] per format, in
    /// the same relative order as the (now sorted) priority run, not
    /// necessarily `formats`' original order.
    pub async fn bundle(
        &self,
        context: &BundlerContext,
        formats: &[PackageFormat],
    ) -> Result<Vec<BundlerOutputStructure>> {
        let mut ordered = formats.to_vec();
        ordered.sort_by_key(|f| f.priority());

        let mut results = Vec::with_capacity(ordered.len());
        for format in ordered {
            let bundler = self.bundler_for(format)?;
            let mut output = bundler.bundle(context).await?;
            output.digest = Some(compute_digest(&output.root).await?);
            log::info!(
                "produced {} bundle for {} at {}",
                format,
                context.app.product_name,
                output.root.display()
            );
            results.push(output);
        }
        Ok(results)
    }

    fn bundler_for(&self, format: PackageFormat) -> Result<&dyn PlatformBundler> {
        self.bundlers
            .iter()
            .find(|b| b.format() == format)
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::UnsupportedPackageType {
                package_type: format.short_name().to_string(),
                platform: std::env::consts::OS.to_string(),
            })
    }
}

async fn compute_digest(root: &PathBuf) -> Result<ArtifactDigest> {
    let metadata = tokio::fs::metadata(root)
        .await
        .fs_context("reading artifact metadata", root)?;
    if metadata.is_file() {
        hash_file(root).await
    } else {
        hash_directory(root).await
    }
}

async fn hash_file(path: &PathBuf) -> Result<ArtifactDigest> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening artifact for checksum", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .fs_context("reading artifact for checksum", path)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }
    Ok(ArtifactDigest {
        size,
        checksum: hex::encode(hasher.finalize()),
    })
}

async fn hash_directory(root: &PathBuf) -> Result<ArtifactDigest> {
    let mut entries: Vec<_> = WalkDir::new(root)
        .into_iter()
        .collect::<std::result::Result<_, _>>()?;
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    for entry in entries {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?;
        hasher.update(relative.to_string_lossy().as_bytes());
        let bytes = tokio::fs::read(entry.path())
            .await
            .fs_context("reading artifact for checksum", entry.path())?;
        hasher.update(&bytes);
        size += bytes.len() as u64;
    }
    Ok(ArtifactDigest {
        size,
        checksum: hex::encode(hasher.finalize()),
    })
}
