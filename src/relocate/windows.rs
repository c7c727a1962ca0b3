//! Windows dynamic-library relocation: `dumpbin /DEPENDENTS` for
//! discovery, PATH-based search for resolution. Windows has no in-binary
//! rewriting step — a DLL placed next to its importing executable is found
//! by the loader automatically, so relocation here is purely "copy the
//! right files alongside the executable".

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::process;

/// Parse the `Image has the following dependencies:` section of
/// `dumpbin /DEPENDENTS` output, returning each referenced DLL's bare file
/// name.
pub fn parse_dumpbin_dependents(output: &str) -> Vec<String> {
    let mut in_section = false;
    let mut names = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Image has the following dependencies") {
            in_section = true;
            continue;
        }
        if in_section {
            if trimmed.is_empty() || trimmed.starts_with("Summary") {
                break;
            }
            if trimmed.ends_with(".dll") || trimmed.ends_with(".DLL") {
                names.push(trimmed.to_string());
            }
        }
    }
    names
}

/// Run `dumpbin /DEPENDENTS` against `binary` and return the referenced
/// DLL file names.
pub async fn dumpbin_dependencies(binary: &Path) -> Result<Vec<String>> {
    let dumpbin = process::which("dumpbin", "install the Visual Studio Build Tools")?;
    let output = process::run_checked(
        &dumpbin.to_string_lossy(),
        &["/DEPENDENTS", &binary.to_string_lossy()],
        None,
        &[],
    )
    .await?;
    Ok(parse_dumpbin_dependents(&output.stdout))
}

/// Search `search_paths` (in order) for a file named `dll_name`.
pub async fn resolve_in_search_paths(
    dll_name: &str,
    search_paths: &[PathBuf],
) -> Option<PathBuf> {
    for base in search_paths {
        let candidate = base.join(dll_name);
        if tokio::fs::metadata(&candidate).await.is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Whether `dll_name` is part of the Windows system library allow-list and
/// must not be bundled (a small, explicit set — the universe of OS DLLs is
/// too large to enumerate exhaustively, so this only excludes the handful
/// every process links against).
pub fn is_system_dll(dll_name: &str) -> bool {
    const SYSTEM_DLLS: &[&str] = &[
        "kernel32.dll",
        "user32.dll",
        "gdi32.dll",
        "advapi32.dll",
        "shell32.dll",
        "ole32.dll",
        "oleaut32.dll",
        "ws2_32.dll",
        "ntdll.dll",
        "msvcrt.dll",
    ];
    SYSTEM_DLLS.contains(&dll_name.to_ascii_lowercase().as_str())
}

/// Copy every non-system DLL dependency of `binaries` found in
/// `search_paths` into `dest_dir` (alongside the executables), deduping
/// across binaries.
pub async fn bundle_dll_dependencies(
    binaries: &[PathBuf],
    dest_dir: &Path,
    search_paths: &[PathBuf],
) -> Result<()> {
    crate::fsops::create_dir_all(dest_dir).await?;
    let mut processed = HashSet::new();

    for binary in binaries {
        let dependencies = dumpbin_dependencies(binary).await?;
        for dll_name in dependencies {
            if is_system_dll(&dll_name) || !processed.insert(dll_name.to_ascii_lowercase()) {
                continue;
            }
            if let Some(resolved) = resolve_in_search_paths(&dll_name, search_paths).await {
                crate::fsops::copy_file(&resolved, &dest_dir.join(&dll_name)).await?;
            } else {
                log::warn!("could not resolve DLL dependency `{dll_name}` of {binary:?}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dependents_section() {
        let sample = "Dump of file app.exe\n\n\
File Type: EXECUTABLE IMAGE\n\n\
  Image has the following dependencies:\n\n\
    KERNEL32.dll\n    USER32.dll\n    mylib.dll\n\n\
  Summary\n";
        let deps = parse_dumpbin_dependents(sample);
        assert_eq!(deps, vec!["KERNEL32.dll", "USER32.dll", "mylib.dll"]);
    }

    #[test]
    fn recognizes_system_dlls() {
        assert!(is_system_dll("KERNEL32.dll"));
        assert!(!is_system_dll("mylib.dll"));
    }
}
