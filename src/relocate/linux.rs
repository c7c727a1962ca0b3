//! Linux dynamic-library relocation: `ldd` for discovery, `patchelf` for
//! rewriting `$ORIGIN`-relative rpaths.
//!
//! `ldd` already resolves the full transitive dependency graph of a
//! binary, unlike Darwin's `otool -L` (direct dependencies only), so
//! there is no need to recurse into a copied library's own dependencies
//! here — every dependency the bundle needs is already in `ldd`'s output
//! for the original binary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::process;

/// Parse one line of `ldd` output. Typical forms:
/// `"libfoo.so.1 => /usr/lib/libfoo.so.1 (0x00007f...)"`,
/// `"linux-vdso.so.1 (0x00007ffd...)"` (no `=>`, not a real file), and
/// `"libbar.so.2 => not found"`.
fn parse_ldd_line(line: &str) -> Option<(String, Option<PathBuf>)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("linux-vdso") {
        return None;
    }
    let (name, rest) = line.split_once("=>")?;
    let name = name.trim().to_string();
    let rest = rest.trim();
    if rest.starts_with("not found") {
        return Some((name, None));
    }
    let path = rest.split_whitespace().next()?;
    Some((name, Some(PathBuf::from(path))))
}

/// Run `ldd` against `binary` and return each dependency's soname and
/// resolved path (`None` if `ldd` reported it unresolved).
pub async fn ldd_dependencies(binary: &Path) -> Result<Vec<(String, Option<PathBuf>)>> {
    let ldd = process::which("ldd", "install glibc's development tools")?;
    let output = process::run_checked(
        &ldd.to_string_lossy(),
        &[&binary.to_string_lossy()],
        None,
        &[],
    )
    .await?;
    Ok(output.stdout.lines().filter_map(parse_ldd_line).collect())
}

/// Name prefixes of libraries that, even though they live under a system
/// library directory, are part of the Swift toolchain's own runtime
/// rather than the base OS and must be bundled so the app doesn't depend
/// on the host having a matching Swift install.
const ALLOWLIST_PREFIXES: &[&str] = &[
    "libswift",
    "libFoundation",
    "lib_Foundation",
    "libdispatch",
    "libBlocksRuntime",
    "libicu",
];

/// Whether `soname`/`resolved_path` should be copied into the bundle.
///
/// libc is never bundled, regardless of where it resolves. Otherwise, a
/// dependency is bundle-worthy if it resolves to somewhere under
/// `products_dir` (this build's own output, after resolving symlinks) or
/// if its soname matches [`ALLOWLIST_PREFIXES`] (the Swift runtime,
/// Foundation family, or ICU — libraries the base OS does not reliably
/// ship a compatible version of).
pub fn should_bundle_library(soname: &str, resolved_path: Option<&Path>, products_dir: &Path) -> bool {
    if soname.starts_with("libc.so") || soname.starts_with("libc-") {
        return false;
    }
    if let Some(path) = resolved_path {
        if is_under_products_dir(path, products_dir) {
            return true;
        }
    }
    ALLOWLIST_PREFIXES.iter().any(|prefix| soname.starts_with(prefix))
}

fn is_under_products_dir(resolved_path: &Path, products_dir: &Path) -> bool {
    let resolved = resolved_path
        .canonicalize()
        .unwrap_or_else(|_| resolved_path.to_path_buf());
    let products = products_dir
        .canonicalize()
        .unwrap_or_else(|_| products_dir.to_path_buf());
    resolved.starts_with(&products)
}

/// Copy every bundle-worthy dependency of `binaries` into `lib_dir`, then
/// run `patchelf --set-rpath` on both the copied libraries (`$ORIGIN`, so
/// a bundled library can resolve a sibling bundled library) and the
/// original binaries (`$ORIGIN/<relative-path-to-lib_dir>`).
pub async fn bundle_library_dependencies(
    binaries: &[PathBuf],
    lib_dir: &Path,
    products_dir: &Path,
) -> Result<()> {
    crate::fsops::create_dir_all(lib_dir).await?;
    let mut processed = HashSet::new();

    for binary in binaries {
        let dependencies = ldd_dependencies(binary).await?;
        for (soname, resolved) in dependencies {
            if !should_bundle_library(&soname, resolved.as_deref(), products_dir) {
                continue;
            }
            let Some(resolved) = resolved else {
                log::warn!("could not resolve dependency `{soname}` of {binary:?}");
                continue;
            };
            let dest = lib_dir.join(&soname);
            if processed.insert(dest.clone()) {
                crate::fsops::copy_file(&resolved, &dest).await?;
                set_rpath(&dest, "$ORIGIN").await?;
            }
        }
        let binary_dir = binary.parent().unwrap_or_else(|| Path::new("."));
        let rpath = format!("$ORIGIN/{}", relative_path(binary_dir, lib_dir).display());
        set_rpath(binary, &rpath).await?;
    }
    Ok(())
}

/// Compute the relative path leading from `from_dir` to `to_dir`, e.g.
/// `relative_path("root/usr/bin", "root/usr/lib")` is `"../lib"`.
fn relative_path(from_dir: &Path, to_dir: &Path) -> PathBuf {
    let from: Vec<_> = from_dir.components().collect();
    let to: Vec<_> = to_dir.components().collect();
    let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to[common..] {
        result.push(component.as_os_str());
    }
    result
}

async fn set_rpath(binary: &Path, rpath: &str) -> Result<()> {
    let patchelf = process::which("patchelf", "install patchelf")?;
    process::run_checked(
        &patchelf.to_string_lossy(),
        &["--set-rpath", rpath, &binary.to_string_lossy()],
        None,
        &[],
    )
    .await
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resolved_dependency() {
        let (name, path) =
            parse_ldd_line("\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f1234567000)")
                .unwrap();
        assert_eq!(name, "libc.so.6");
        assert_eq!(path, Some(PathBuf::from("/lib/x86_64-linux-gnu/libc.so.6")));
    }

    #[test]
    fn parses_unresolved_dependency() {
        let (name, path) = parse_ldd_line("libbar.so.2 => not found").unwrap();
        assert_eq!(name, "libbar.so.2");
        assert_eq!(path, None);
    }

    #[test]
    fn skips_vdso_line() {
        assert!(parse_ldd_line("\tlinux-vdso.so.1 (0x00007ffd9a1f8000)").is_none());
    }

    #[test]
    fn libc_is_never_bundled() {
        let products_dir = Path::new("/toolchain");
        assert!(!should_bundle_library(
            "libc.so.6",
            Some(Path::new("/lib/x86_64-linux-gnu/libc.so.6")),
            products_dir
        ));
    }

    #[test]
    fn swift_runtime_is_bundled_even_outside_products_dir() {
        let products_dir = Path::new("/toolchain/products");
        assert!(should_bundle_library(
            "libswiftCore.so.5",
            Some(Path::new("/toolchain/usr/lib/libswiftCore.so.5")),
            products_dir
        ));
    }

    #[test]
    fn unrelated_system_library_is_not_bundled() {
        let products_dir = Path::new("/toolchain/products");
        assert!(!should_bundle_library(
            "libz.so.1",
            Some(Path::new("/lib/x86_64-linux-gnu/libz.so.1")),
            products_dir
        ));
    }

    #[test]
    fn relative_path_between_sibling_directories() {
        assert_eq!(
            relative_path(Path::new("/root/usr/bin"), Path::new("/root/usr/lib")),
            PathBuf::from("../lib")
        );
    }
}
