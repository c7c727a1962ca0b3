use std::collections::BTreeMap;

use shipwright::config::{AppConfiguration, PackageConfiguration};
use shipwright::platform::{PackageFormat, Platform};
use shipwright::{BundlerContext, Orchestrator};

fn sample_manifest() -> &'static str {
    r#"
[apps.demo]
identifier = "com.example.$(PRODUCT_NAME:rfc1034identifier)"
product_name = "Demo App"
version = "$(VERSION)"
main_binary = "demo"
"#
}

#[test]
fn package_manifest_parses_and_evaluates() {
    let config = PackageConfiguration::from_toml(sample_manifest()).unwrap();
    let app = config.apps.get("demo").unwrap();
    assert_eq!(app.product_name, "Demo App");

    let variables = shipwright::variables::KnownVariables {
        version: Some("3.2.1".into()),
        ..Default::default()
    };
    let context = BundlerContext::new(
        "demo".into(),
        app.clone(),
        "/products".into(),
        "/out".into(),
        Platform::Linux,
        &variables,
    )
    .unwrap();

    assert_eq!(context.app.version, "3.2.1");
    assert_eq!(context.app.identifier, "com.example.demo-app");
}

// The orchestrator only wires up bundlers whose external toolchain exists
// on the host platform (rpm/appimage need Linux, msi/generic-windows need
// Windows, darwin needs macOS) — see `Orchestrator::for_platform`. Android
// is the one format available unconditionally since `ApkBundler` is a
// stub with no host-specific dependency.

#[test]
fn android_apk_stub_reports_intended_output() {
    let orchestrator = Orchestrator::for_platform(Platform::Android);
    let context = sample_context(Platform::Android);
    let outputs = orchestrator
        .intended_outputs(&context, &[PackageFormat::Apk])
        .unwrap();
    assert_eq!(outputs, vec![std::path::PathBuf::from("/out/Demo.apk")]);
}

#[test]
fn requesting_a_format_the_host_cannot_produce_is_an_error() {
    let orchestrator = Orchestrator::for_platform(Platform::Android);
    let context = sample_context(Platform::Android);
    let result = orchestrator.intended_outputs(&context, &[PackageFormat::Rpm]);
    assert!(result.is_err());
}

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
#[test]
fn linux_orchestrator_reports_all_default_formats() {
    let orchestrator = Orchestrator::for_platform(Platform::Linux);
    let context = sample_context(Platform::Linux);
    let outputs = orchestrator
        .intended_outputs(
            &context,
            &[
                PackageFormat::GenericLinux,
                PackageFormat::AppImage,
                PackageFormat::Rpm,
            ],
        )
        .unwrap();
    assert_eq!(outputs.len(), 3);
}

#[cfg(windows)]
#[test]
fn windows_orchestrator_reports_all_default_formats() {
    let orchestrator = Orchestrator::for_platform(Platform::Windows);
    let context = sample_context(Platform::Windows);
    let outputs = orchestrator
        .intended_outputs(&context, &[PackageFormat::GenericWindows, PackageFormat::Msi])
        .unwrap();
    assert_eq!(outputs.len(), 2);
}

#[cfg(target_os = "macos")]
#[test]
fn darwin_orchestrator_reports_app_bundle_output() {
    let orchestrator = Orchestrator::for_platform(Platform::MacOs);
    let context = sample_context(Platform::MacOs);
    let outputs = orchestrator
        .intended_outputs(&context, &[PackageFormat::DarwinApp])
        .unwrap();
    assert_eq!(outputs, vec![std::path::PathBuf::from("/out/Demo.app")]);
}

fn sample_context(platform: Platform) -> BundlerContext {
    BundlerContext {
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
        platform,
        project_artifacts: BTreeMap::new(),
    }
}
