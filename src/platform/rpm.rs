//! RPM package bundler for Red Hat-based Linux distributions, wrapping
//! [`super::generic_linux::GenericLinuxBundler`]'s output directory.
//!
//! Builds the package via the `rpm` crate's `PackageBuilder`, parsing
//! `depends`/`provides`/`conflicts`/`obsoletes` dependency strings off
//! [`crate::config::AppConfiguration`]/`RpmSettings`.

use std::path::PathBuf;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::config::{escape_package_name, BundlerContext};
use crate::error::{Error, ErrorExt, Result};
use crate::platform::generic_linux::GenericLinuxBundler;
use crate::platform::{PackageFormat, PlatformBundler};

/// Bundler producing a single `.rpm` package from a generic Linux layout.
pub struct RpmBundler;

#[async_trait]
impl PlatformBundler for RpmBundler {
    fn format(&self) -> PackageFormat {
        PackageFormat::Rpm
    }

    fn intended_output(&self, context: &BundlerContext) -> PathBuf {
        let arch = std::env::consts::ARCH;
        let name = escape_package_name(&context.app.product_name);
        context.output_directory.join(format!(
            "{}-{}-{}.{}.rpm",
            name, context.app.version, context.app.rpm.release, arch
        ))
    }

    async fn bundle(&self, context: &BundlerContext) -> Result<crate::orchestrator::BundlerOutputStructure> {
        let generic = GenericLinuxBundler;
        let layout = generic.bundle(context).await?;

        let output_path = self.intended_output(context);
        let settings = context.app.rpm.clone();
        let product_name = escape_package_name(&context.app.product_name);
        let version = context.app.version.clone();
        let arch = rpm_arch_name();
        let summary = format!("{product_name} application bundle");
        let license = settings.license.clone().unwrap_or_else(|| "Unknown".to_string());

        let compression = match settings.compression.as_str() {
            "xz" => rpm::CompressionType::Xz,
            "zstd" => rpm::CompressionType::Zstd,
            "bzip2" => rpm::CompressionType::Bzip2,
            _ => rpm::CompressionType::Gzip,
        };

        let mut entries = Vec::new();
        for entry in WalkDir::new(&layout.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&layout.root)
                .map_err(Error::from)?;
            let content = tokio::fs::read(entry.path())
                .await
                .fs_context("reading bundled file for RPM payload", entry.path())?;
            let dest = format!("/{}", relative.to_string_lossy());
            let mode = if relative.starts_with("usr/bin") {
                0o755
            } else {
                0o644
            };
            entries.push((dest, content, mode));
        }

        let depends = settings.depends.clone();
        let provides = settings.provides.clone();
        let conflicts = settings.conflicts.clone();
        let obsoletes = settings.obsoletes.clone();
        let epoch = settings.epoch;
        let release = settings.release.clone();

        let built = tokio::task::spawn_blocking(move || -> Result<rpm::Package> {
            let build_config = rpm::BuildConfig::default().compression(compression);
            let mut builder = rpm::PackageBuilder::new(&product_name, &version, &license, &arch, &summary)
                .using_config(build_config)
                .release(release);
            if let Some(epoch) = epoch {
                builder = builder.epoch(epoch);
            }
            for dep in &depends {
                builder = builder.requires(parse_dependency(dep)?);
            }
            for dep in &provides {
                builder = builder.provides(parse_dependency(dep)?);
            }
            for dep in &conflicts {
                builder = builder.conflicts(parse_dependency(dep)?);
            }
            for dep in &obsoletes {
                builder = builder.obsoletes(parse_dependency(dep)?);
            }
            for (dest, content, mode) in entries {
                builder = builder.with_file_contents(
                    content,
                    rpm::FileOptions::new(dest.as_str())
                        .mode(rpm::FileMode::regular(mode))
                        .user("root")
                        .group("root"),
                )?;
            }
            Ok(builder.build()?)
        })
        .await
        .map_err(|e| Error::Other(format!("RPM build task panicked: {e}")))??;

        if let Some(parent) = output_path.parent() {
            crate::fsops::create_dir_all(parent).await?;
        }
        let output_path_clone = output_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = std::fs::File::create(&output_path_clone)
                .fs_context("creating RPM output file", &output_path_clone)?;
            built.write(&mut file)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("RPM write task panicked: {e}")))??;

        Ok(crate::orchestrator::BundlerOutputStructure {
            format: self.format(),
            root: output_path,
            digest: None,
        })
    }
}

fn rpm_arch_name() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "x86_64",
        "x86" => "i686",
        "aarch64" => "aarch64",
        "arm" => "armhf",
        "riscv64" => "riscv64",
        other => other,
    }
    .to_string()
}

/// Parse `"name"`, `"name = version"`, `"name >= version"`, etc.
fn parse_dependency(spec: &str) -> Result<rpm::Dependency> {
    let parts: Vec<&str> = spec.split_whitespace().collect();
    match parts.as_slice() {
        [name] => Ok(rpm::Dependency::any(*name)),
        [name, op, version] => match *op {
            "=" | "==" => Ok(rpm::Dependency::eq(*name, *version)),
            ">=" => Ok(rpm::Dependency::greater_eq(*name, *version)),
            ">" => Ok(rpm::Dependency::greater(*name, *version)),
            "<=" => Ok(rpm::Dependency::less_eq(*name, *version)),
            "<" => Ok(rpm::Dependency::less(*name, *version)),
            other => Err(Error::Other(format!("unknown dependency operator `{other}`"))),
        },
        _ => Err(Error::Other(format!(
            "invalid dependency spec `{spec}`, expected `name` or `name OP version`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        assert!(parse_dependency("glibc").is_ok());
    }

    #[test]
    fn parses_versioned_dependency() {
        assert!(parse_dependency("glibc >= 2.17").is_ok());
    }

    #[test]
    fn rejects_malformed_dependency() {
        assert!(parse_dependency("glibc >=").is_err());
    }

    #[test]
    fn intended_output_escapes_spaced_product_name() {
        use crate::config::{AppConfiguration, BundlerContext};
        use std::collections::BTreeMap;

        let ctx = BundlerContext {
            app_name: "demo".into(),
            app: AppConfiguration {
                identifier: "com.ex.MyApp".into(),
                product_name: "My App".into(),
                version: "1.2".into(),
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
            platform: crate::platform::Platform::Linux,
            project_artifacts: BTreeMap::new(),
        };

        let bundler = RpmBundler;
        let output = bundler.intended_output(&ctx);
        let arch = rpm_arch_name();
        assert_eq!(
            output,
            PathBuf::from(format!("/out/my-app-1.2-1.{arch}.rpm"))
        );
    }
}
