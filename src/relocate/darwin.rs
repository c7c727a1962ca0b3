//! Darwin dynamic-library relocation: `otool`/embedded Mach-O load
//! commands for discovery, `install_name_tool` for rewriting.
//!
//! Resolves `@rpath`/`@executable_path`/`@loader_path` recursively, with a
//! `HashSet` visited-set shared across every binary in the bundle so a
//! dylib pulled in by two different executables is only copied once, then
//! uses `install_name_tool -change`/`-add_rpath` to point both the copied
//! dylibs and the original binaries at `Contents/Frameworks`.
//!
//! `@rpath/libswift_Concurrency.dylib` is the one `@rpath`-prefixed name
//! treated as system (it names the Swift back-deployment concurrency
//! runtime, not something this build produced); every other `@rpath/`
//! dependency is this build's own output and is searched for under the
//! build's products directory, not the generic framework search paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorExt, Result};
use crate::macho::Parsed;
use crate::process;

/// The one `@rpath`-prefixed dependency name treated as system: the Swift
/// back-deployment concurrency runtime, present on hosts older than the
/// OS version that ships it natively.
const SYSTEM_RPATH_DEPENDENCY: &str = "@rpath/libswift_Concurrency.dylib";

/// Bundle every non-system dynamic library `binaries` depend on (directly
/// or transitively) into `frameworks_dir`, then rewrite both the copied
/// libraries and the original binaries to reference the bundled copies via
/// `@executable_path/../Frameworks`.
///
/// `@rpath/`-prefixed dependencies (other than
/// [`SYSTEM_RPATH_DEPENDENCY`]) are this build's own output and are
/// resolved against `products_directory`/`products_directory/PackageFrameworks`
/// rather than `search_paths`.
pub async fn bundle_dylib_dependencies(
    binaries: &[PathBuf],
    frameworks_dir: &Path,
    products_directory: &Path,
    search_paths: &[PathBuf],
) -> Result<()> {
    crate::fsops::create_dir_all(frameworks_dir).await?;
    let mut processed = HashSet::new();

    for binary in binaries {
        let dependencies = get_dylib_dependencies(binary).await?;
        for dependency in dependencies {
            if is_system_dylib(&dependency) {
                continue;
            }
            if let Some(resolved) =
                resolve_dylib_path(&dependency, products_directory, search_paths).await?
            {
                bundle_dylib_and_deps(
                    &resolved,
                    frameworks_dir,
                    products_directory,
                    search_paths,
                    &mut processed,
                )
                .await?;
            } else {
                log::warn!("could not resolve dependency `{dependency}` of {binary:?}");
            }
        }
        fix_binary_dylib_paths(binary, frameworks_dir).await?;
    }
    Ok(())
}

/// Parse `binary_path`'s Mach-O (or first slice of a universal binary) and
/// return the dylib paths it records as dependencies.
pub async fn get_dylib_dependencies(binary_path: &Path) -> Result<Vec<String>> {
    let bytes = tokio::fs::read(binary_path)
        .await
        .fs_context("reading binary for dependency discovery", binary_path)?;
    match crate::macho::parse(&bytes)? {
        Parsed::Single(macho) => macho.dependency_paths(),
        Parsed::Fat(universal) => {
            let first = universal
                .arches
                .first()
                .ok_or_else(|| Error::Other("universal binary has no architecture slices".into()))?;
            first.macho.dependency_paths()
        }
    }
}

/// Whether `path` names something the OS already provides and must
/// therefore never be copied into the bundle.
pub fn is_system_dylib(path: &str) -> bool {
    path.starts_with("/System/") || path.starts_with("/usr/lib/") || path == SYSTEM_RPATH_DEPENDENCY
}

/// Resolve a recorded dylib path to an absolute path on the build host.
///
/// An `@rpath/`-prefixed name is this build's own output: it is searched
/// for under `products_directory` and `products_directory/PackageFrameworks`
/// only. Anything else is resolved as an absolute path, or by consulting
/// `search_paths` for bare/wildcard-style references (e.g. a Homebrew
/// Cellar layout where the exact version directory is unknown).
pub async fn resolve_dylib_path(
    recorded: &str,
    products_directory: &Path,
    search_paths: &[PathBuf],
) -> Result<Option<PathBuf>> {
    if let Some(name) = recorded.strip_prefix("@rpath/") {
        for base in [
            products_directory.to_path_buf(),
            products_directory.join("PackageFrameworks"),
        ] {
            let pattern = base.join(name).to_string_lossy().into_owned();
            if let Some(found) = resolve_wildcard_path(&pattern)? {
                return Ok(Some(found));
            }
        }
        return Ok(None);
    }

    let direct = PathBuf::from(recorded);
    if direct.is_absolute() && tokio::fs::metadata(&direct).await.is_ok() {
        return Ok(Some(direct));
    }
    for base in search_paths {
        let pattern = base.join(recorded.trim_start_matches('/'));
        let pattern_str = pattern.to_string_lossy().into_owned();
        if let Some(found) = resolve_wildcard_path(&pattern_str)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn resolve_wildcard_path(pattern: &str) -> Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|r| r.ok()).collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

fn bundle_dylib_and_deps<'a>(
    dylib_path: &'a Path,
    frameworks_dir: &'a Path,
    products_directory: &'a Path,
    search_paths: &'a [PathBuf],
    processed: &'a mut HashSet<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let file_name = dylib_path
            .file_name()
            .ok_or_else(|| Error::Other(format!("dylib path {dylib_path:?} has no file name")))?;
        let dest = frameworks_dir.join(file_name);
        if processed.contains(&dest) {
            return Ok(());
        }
        processed.insert(dest.clone());

        crate::fsops::copy_file(dylib_path, &dest).await?;

        let nested = get_dylib_dependencies(&dest).await?;
        for dependency in nested {
            if is_system_dylib(&dependency) {
                continue;
            }
            if let Some(resolved) =
                resolve_dylib_path(&dependency, products_directory, search_paths).await?
            {
                bundle_dylib_and_deps(&resolved, frameworks_dir, products_directory, search_paths, processed)
                    .await?;
            }
        }
        fix_dylib_internal_paths(&dest).await
    })
}

/// Rewrite `dylib`'s own `LC_ID_DYLIB` and its non-system dependency
/// entries to point within `@rpath`, via `install_name_tool -id`/`-change`.
async fn fix_dylib_internal_paths(dylib: &Path) -> Result<()> {
    let install_name_tool = process::which("install_name_tool", "install Xcode Command Line Tools")?;
    let tool = install_name_tool.to_string_lossy().into_owned();
    let file_name = dylib
        .file_name()
        .ok_or_else(|| Error::Other(format!("dylib path {dylib:?} has no file name")))?
        .to_string_lossy()
        .into_owned();

    process::run_checked(
        &tool,
        &["-id", &format!("@rpath/{file_name}"), &dylib.to_string_lossy()],
        None,
        &[],
    )
    .await?;

    let dependencies = get_dylib_dependencies(dylib).await?;
    for dependency in dependencies {
        if is_system_dylib(&dependency) {
            continue;
        }
        let dep_file_name = Path::new(&dependency)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(dependency.clone());
        process::run_checked(
            &tool,
            &[
                "-change",
                &dependency,
                &format!("@rpath/{dep_file_name}"),
                &dylib.to_string_lossy(),
            ],
            None,
            &[],
        )
        .await?;
    }
    Ok(())
}

/// Rewrite `binary`'s non-system dependency entries to `@rpath/<name>` and
/// ensure it has an `@executable_path/../Frameworks` rpath entry.
async fn fix_binary_dylib_paths(binary: &Path, frameworks_dir: &Path) -> Result<()> {
    let install_name_tool = process::which("install_name_tool", "install Xcode Command Line Tools")?;
    let tool = install_name_tool.to_string_lossy().into_owned();

    let dependencies = get_dylib_dependencies(binary).await?;
    for dependency in dependencies {
        if is_system_dylib(&dependency) {
            continue;
        }
        let dep_file_name = Path::new(&dependency)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(dependency.clone());
        if !frameworks_dir.join(&dep_file_name).exists() {
            continue;
        }
        process::run_checked(
            &tool,
            &[
                "-change",
                &dependency,
                &format!("@rpath/{dep_file_name}"),
                &binary.to_string_lossy(),
            ],
            None,
            &[],
        )
        .await?;
    }

    // -add_rpath fails if the entry already exists; that's fine, it only
    // means a previous binary in the same bundle already added it.
    let _ = process::run_checked(
        &tool,
        &[
            "-add_rpath",
            "@executable_path/../Frameworks",
            &binary.to_string_lossy(),
        ],
        None,
        &[],
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_system_paths() {
        assert!(is_system_dylib("/usr/lib/libSystem.B.dylib"));
        assert!(is_system_dylib("/System/Library/Frameworks/Foo.framework/Foo"));
        assert!(is_system_dylib("@rpath/libswift_Concurrency.dylib"));
        assert!(!is_system_dylib("/opt/homebrew/lib/libfoo.dylib"));
    }

    #[test]
    fn other_rpath_dependencies_are_not_system() {
        assert!(!is_system_dylib("@rpath/libMyFramework.dylib"));
    }

    #[tokio::test]
    async fn rpath_dependency_resolves_under_products_directory() {
        let products = tempfile::tempdir().unwrap();
        let framework_dir = products.path().join("PackageFrameworks");
        tokio::fs::create_dir_all(&framework_dir).await.unwrap();
        let dylib = framework_dir.join("libMyFramework.dylib");
        tokio::fs::write(&dylib, b"fake").await.unwrap();

        let resolved = resolve_dylib_path("@rpath/libMyFramework.dylib", products.path(), &[])
            .await
            .unwrap();
        assert_eq!(resolved, Some(dylib));
    }
}
