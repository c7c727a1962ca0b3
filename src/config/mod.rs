//! The configuration model: package manifest → per-app configuration →
//! the flattened [`BundlerContext`] handed to the orchestrator.
//!
//! Nested per-platform settings structs, validated with `.context("... is
//! required")?` as they're read off the manifest: a package declares one or
//! more apps, and each app may depend on one or more dependency *projects*
//! built by [`crate::project_builder`].

mod platform_settings;

pub use platform_settings::{
    AppImageSettings, DarwinSettings, MsiSettings, RpmSettings, WindowsGenericSettings,
};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Context, Result};
use crate::platform::Platform;
use crate::variables::{EvaluationContext, KnownVariables};

/// The reserved project name denoting "the package being bundled itself"
/// rather than a dependency project.
pub const ROOT_PROJECT_NAME: &str = "__root__";

/// Lowercase `name` and replace runs of whitespace with a single hyphen, for
/// contexts that require a package-manager-safe identifier (an RPM `Name:`
/// field, a Linux installation root under `/opt`). `"My App"` becomes
/// `"my-app"`.
pub fn escape_package_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    let mut last_was_hyphen = false;
    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_hyphen {
                escaped.push('-');
                last_was_hyphen = true;
            }
        } else {
            escaped.extend(ch.to_lowercase());
            last_was_hyphen = false;
        }
    }
    escaped
}

/// Where a dependency project's source comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum ProjectSource {
    /// Clone from a git remote at a specific revision (branch, tag, or
    /// commit).
    Git {
        /// Remote repository URL.
        url: url::Url,
        /// Branch, tag, or commit to check out.
        revision: String,
    },
    /// Use an already-checked-out local directory verbatim.
    Local {
        /// Path to the project's source directory.
        path: PathBuf,
    },
}

/// Declares how to build one dependency project and which artifacts to
/// collect from it once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfiguration {
    /// Where the project's source lives.
    pub source: ProjectSource,
    /// Program and arguments used to build the synthesized "builder"
    /// package against this project (see [`crate::project_builder`]).
    pub builder_command: Vec<String>,
    /// Names of artifacts the builder is expected to emit; each must be
    /// present in the builder's reported output or the build is a failure.
    pub required_artifacts: Vec<String>,
    /// Names of artifacts collected only if the builder happens to produce
    /// them; their absence is not an error.
    #[serde(default)]
    pub optional_artifacts: Vec<String>,
}

/// A single distributable application within a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfiguration {
    /// Reverse-DNS bundle identifier. May contain `$(VAR)` tokens.
    pub identifier: String,
    /// Human-facing product name. May contain `$(VAR)` tokens.
    pub product_name: String,
    /// Build version (`CURRENT_PROJECT_VERSION`). May contain `$(VAR)`.
    pub version: String,
    /// Marketing/display version, if distinct from `version`.
    #[serde(default)]
    pub marketing_version: Option<String>,
    /// Name of the main executable within the products directory.
    pub main_binary: String,
    /// Additional executables/libraries to bundle alongside the main one.
    #[serde(default)]
    pub extra_binaries: Vec<String>,
    /// Icon source paths, largest-first is not required; the resource
    /// pipeline selects the closest match per target size.
    #[serde(default)]
    pub icon_paths: Vec<PathBuf>,
    /// Arbitrary files/directories to copy verbatim into the bundle, keyed
    /// by their destination path relative to the bundle root.
    #[serde(default)]
    pub resources: BTreeMap<PathBuf, PathBuf>,
    /// Extra Info.plist / AndroidManifest keys merged in last, overriding
    /// anything the pipeline would otherwise compute.
    #[serde(default)]
    pub plist_extras: BTreeMap<String, serde_json::Value>,
    /// Names of [`ProjectConfiguration`] entries this app's bundling
    /// depends on (dynamic libraries, plugins, ...).
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Whether this app activates over D-Bus. When set, the Linux resource
    /// pipeline writes a `usr/share/dbus-1/services/<identifier>.service`
    /// entry alongside its `.desktop` file.
    #[serde(default)]
    pub dbus_activatable: bool,
    /// macOS/iOS/tvOS/visionOS-specific settings.
    #[serde(default)]
    pub darwin: DarwinSettings,
    /// Linux RPM-specific settings.
    #[serde(default)]
    pub rpm: RpmSettings,
    /// Linux AppImage-specific settings.
    #[serde(default)]
    pub appimage: AppImageSettings,
    /// Windows generic-layout settings.
    #[serde(default)]
    pub windows: WindowsGenericSettings,
    /// Windows MSI-specific settings.
    #[serde(default)]
    pub msi: MsiSettings,
}

/// The full package manifest: one or more apps plus the dependency
/// projects they may reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfiguration {
    /// Apps declared by this package, keyed by app name.
    pub apps: BTreeMap<String, AppConfiguration>,
    /// Dependency projects apps may reference, keyed by project name.
    /// [`ROOT_PROJECT_NAME`] is reserved and must not appear here.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfiguration>,
}

impl PackageConfiguration {
    /// Parse a package manifest from TOML source text.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).context("parsing package manifest")?;
        if config.projects.contains_key(ROOT_PROJECT_NAME) {
            return Err(crate::error::Error::Other(format!(
                "project name `{ROOT_PROJECT_NAME}` is reserved"
            )));
        }
        Ok(config)
    }
}

/// The flattened, variable-evaluated context handed to the orchestrator for
/// a single app/platform bundling run.
///
/// Every `$(VAR)`-bearing string from [`AppConfiguration`] has already been
/// resolved through [`crate::variables::evaluate`] by the time a
/// `BundlerContext` exists; bundlers never see raw templates.
#[derive(Debug, Clone)]
pub struct BundlerContext {
    /// Name of the app being bundled, as it appeared in the manifest.
    pub app_name: String,
    /// The evaluated app configuration.
    pub app: AppConfiguration,
    /// Directory containing the already-compiled products (binaries,
    /// dynamic libraries) to bundle.
    pub products_directory: PathBuf,
    /// Directory bundlers write their output into.
    pub output_directory: PathBuf,
    /// Target platform for this run.
    pub platform: Platform,
    /// Resolved paths to built dependency-project artifacts, keyed by
    /// `"<project-name>/<artifact-name>"`.
    pub project_artifacts: BTreeMap<String, PathBuf>,
}

impl BundlerContext {
    /// Build a context by evaluating every templated string field of `app`
    /// against `variables`, failing on the first unresolved token.
    pub fn new(
        app_name: String,
        app: AppConfiguration,
        products_directory: PathBuf,
        output_directory: PathBuf,
        platform: Platform,
        variables: &KnownVariables,
    ) -> Result<Self> {
        let evaluated = evaluate_app_configuration(&app, variables)?;
        Ok(BundlerContext {
            app_name,
            app: evaluated,
            products_directory,
            output_directory,
            platform,
            project_artifacts: BTreeMap::new(),
        })
    }

    /// Path to the main executable within [`Self::products_directory`].
    pub fn main_binary_path(&self) -> PathBuf {
        let mut path = self.products_directory.join(&self.app.main_binary);
        if self.platform.is_windows() && path.extension().is_none() {
            path.set_extension("exe");
        }
        path
    }
}

fn evaluate_app_configuration(
    app: &AppConfiguration,
    variables: &KnownVariables,
) -> Result<AppConfiguration> {
    let ctx: &dyn EvaluationContext = variables;
    let mut out = app.clone();
    out.identifier = crate::variables::evaluate(&app.identifier, ctx)?;
    out.product_name = crate::variables::evaluate(&app.product_name, ctx)?;
    out.version = crate::variables::evaluate(&app.version, ctx)?;
    if let Some(marketing) = &app.marketing_version {
        out.marketing_version = Some(crate::variables::evaluate(marketing, ctx)?);
    }
    let evaluated_extras = crate::variables::evaluate_tree(
        &serde_json::to_value(&app.plist_extras).context("serializing plist extras")?,
        ctx,
    )?;
    out.plist_extras = serde_json::from_value(evaluated_extras)
        .context("re-parsing evaluated plist extras")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app() -> AppConfiguration {
        AppConfiguration {
            identifier: "com.example.$(PRODUCT_NAME:rfc1034identifier)".into(),
            product_name: "Demo App".into(),
            version: "$(VERSION)".into(),
            marketing_version: None,
            main_binary: "demo".into(),
            extra_binaries: vec![],
            icon_paths: vec![],
            resources: BTreeMap::new(),
            plist_extras: BTreeMap::new(),
            dependencies: vec![],
            dbus_activatable: false,
            darwin: DarwinSettings::default(),
            rpm: RpmSettings::default(),
            appimage: AppImageSettings::default(),
            windows: WindowsGenericSettings::default(),
            msi: MsiSettings::default(),
        }
    }

    #[test]
    fn escapes_name_with_space_to_hyphenated_lowercase() {
        assert_eq!(escape_package_name("My App"), "my-app");
    }

    #[test]
    fn escapes_name_collapses_repeated_whitespace() {
        assert_eq!(escape_package_name("My   Cool  App"), "my-cool-app");
    }

    #[test]
    fn root_project_name_is_rejected() {
        let toml = format!(
            "[apps.demo]\nidentifier = \"com.example.demo\"\nproduct_name = \"Demo\"\nversion = \"1.0\"\nmain_binary = \"demo\"\n\n[projects.{ROOT_PROJECT_NAME}]\nbuilder_command = [\"true\"]\nrequired_artifacts = []\n\n[projects.{ROOT_PROJECT_NAME}.source]\nkind = \"local\"\npath = \"/tmp\"\n"
        );
        let err = PackageConfiguration::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn context_evaluates_templated_fields() {
        let variables = KnownVariables {
            version: Some("2.0.0".into()),
            ..Default::default()
        };
        let ctx = BundlerContext::new(
            "demo".into(),
            sample_app(),
            PathBuf::from("/products"),
            PathBuf::from("/out"),
            Platform::MacOs,
            &variables,
        )
        .unwrap();
        assert_eq!(ctx.app.version, "2.0.0");
        assert_eq!(ctx.app.identifier, "com.example.demo-app");
    }
}
