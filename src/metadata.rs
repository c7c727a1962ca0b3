//! Embeds app identity (identifier, version, product name) into a small
//! static library linked into the final executable, so a process can
//! introspect the bundle it was built as without parsing its own
//! `Info.plist`/manifest at runtime.
//!
//! Multi-architecture objects are combined with `lipo -create` on Apple
//! platforms and archived with `ar` elsewhere.

use std::path::{Path, PathBuf};

use crate::config::BundlerContext;
use crate::error::{ErrorExt, Result};
use crate::process;

/// Exported C symbol name a bundled executable can `dlsym`/declare
/// `extern` to read back the embedded metadata.
pub const METADATA_SYMBOL: &str = "_get_bundle_metadata";

/// One target architecture to compile a metadata object for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    /// `x86_64`.
    X86_64,
    /// `arm64`/`aarch64`.
    Arm64,
}

impl Arch {
    fn clang_arch_flag(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }
}

fn generate_source(context: &BundlerContext) -> String {
    let app = &context.app;
    format!(
        r#"
/* Generated metadata shim, do not edit by hand. */
struct BundleMetadata {{
    const char *identifier;
    const char *version;
    const char *product_name;
}};

static const struct BundleMetadata kBundleMetadata = {{
    "{identifier}",
    "{version}",
    "{product_name}",
}};

const struct BundleMetadata *{symbol}(void) {{
    return &kBundleMetadata;
}}
"#,
        identifier = escape(&app.identifier),
        version = escape(&app.version),
        product_name = escape(&app.product_name),
        symbol = METADATA_SYMBOL,
    )
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Compile the metadata shim for each of `archs` and combine the results
/// into a single static library at `output_path`.
///
/// On Apple platforms with more than one requested architecture, the
/// per-arch objects are combined with `lipo -create`. Elsewhere (or with a
/// single architecture), the lone object is archived directly with `ar`.
pub async fn insert_metadata(
    context: &BundlerContext,
    work_dir: &Path,
    archs: &[Arch],
    output_path: &Path,
) -> Result<PathBuf> {
    crate::fsops::create_dir_all(work_dir).await?;
    let source_path = work_dir.join("bundle_metadata.c");
    let source = generate_source(context);
    tokio::fs::write(&source_path, source.as_bytes())
        .await
        .fs_context("writing generated metadata source", &source_path)?;

    let cc = process::which("cc", "install a C compiler (Xcode CLT / build-essential / MSVC)")?;
    let mut object_paths = Vec::with_capacity(archs.len());
    for arch in archs {
        let object_path = work_dir.join(format!("bundle_metadata_{}.o", arch.clang_arch_flag()));
        let mut args = vec!["-c", "-o"];
        let object_str = object_path.to_string_lossy().into_owned();
        args.push(&object_str);
        let source_str = source_path.to_string_lossy().into_owned();
        args.push(&source_str);
        if context.platform.is_apple() {
            args.push("-arch");
            args.push(arch.clang_arch_flag());
        }
        process::run_checked(&cc.to_string_lossy(), &args, None, &[]).await?;
        object_paths.push(object_path);
    }

    if let Some(parent) = output_path.parent() {
        crate::fsops::create_dir_all(parent).await?;
    }

    if context.platform.is_apple() && object_paths.len() > 1 {
        combine_universal(&object_paths, output_path).await?;
    } else {
        archive_single(&object_paths[0], output_path).await?;
    }
    Ok(output_path.to_path_buf())
}

async fn combine_universal(object_paths: &[PathBuf], output_path: &Path) -> Result<()> {
    let lipo = process::which("lipo", "install Xcode Command Line Tools")?;
    let mut args: Vec<&str> = vec!["-create"];
    let object_strs: Vec<String> = object_paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    for s in &object_strs {
        args.push(s);
    }
    args.push("-output");
    let output_str = output_path.to_string_lossy().into_owned();
    args.push(&output_str);
    process::run_checked(&lipo.to_string_lossy(), &args, None, &[])
        .await
        .map(|_| ())
}

async fn archive_single(object_path: &Path, output_path: &Path) -> Result<()> {
    let ar = process::which("ar", "install binutils")?;
    process::run_checked(
        &ar.to_string_lossy(),
        &[
            "rcs",
            &output_path.to_string_lossy(),
            &object_path.to_string_lossy(),
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

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn generated_source_contains_exported_symbol() {
        let context = BundlerContext {
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
            platform: crate::platform::Platform::MacOs,
            project_artifacts: BTreeMap::new(),
        };
        let source = generate_source(&context);
        assert!(source.contains(METADATA_SYMBOL));
        assert!(source.contains("com.example.demo"));
    }
}
