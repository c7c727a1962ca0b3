//! `Info.plist` construction.
//!
//! A fixed key set, built via the `plist` crate's `Dictionary` and written
//! as XML, shared across the Apple device-family platforms. Caller-supplied
//! extras are merged in last, so they can override any generated key.

use std::path::Path;

use plist::{Dictionary, Value};

use crate::config::BundlerContext;
use crate::error::{Context, Result};
use crate::platform::Platform;

/// Build the `Info.plist` dictionary for `context` targeting `platform`.
///
/// `app.plist_extras` is merged in last, so a caller can override any
/// computed key (including ones not listed here) or add platform-specific
/// keys this function doesn't know about (e.g. `CFBundleURLTypes`).
pub fn build_info_plist(context: &BundlerContext, platform: Platform) -> Result<Dictionary> {
    let app = &context.app;
    let mut dict = Dictionary::new();

    dict.insert(
        "CFBundleDevelopmentRegion".into(),
        Value::String("English".into()),
    );
    dict.insert(
        "CFBundleDisplayName".into(),
        Value::String(app.product_name.clone()),
    );
    dict.insert(
        "CFBundleExecutable".into(),
        Value::String(app.main_binary.clone()),
    );
    dict.insert(
        "CFBundleIdentifier".into(),
        Value::String(app.identifier.clone()),
    );
    dict.insert("CFBundleName".into(), Value::String(app.product_name.clone()));
    dict.insert(
        "CFBundlePackageType".into(),
        Value::String(package_type(platform).into()),
    );
    dict.insert(
        "CFBundleShortVersionString".into(),
        Value::String(
            app.marketing_version
                .clone()
                .unwrap_or_else(|| app.version.clone()),
        ),
    );
    dict.insert("CFBundleVersion".into(), Value::String(app.version.clone()));
    dict.insert(
        "CFBundleInfoDictionaryVersion".into(),
        Value::String("6.0".into()),
    );
    dict.insert("NSHighResolutionCapable".into(), Value::Boolean(true));

    if !app.icon_paths.is_empty() {
        dict.insert(
            "CFBundleIconFile".into(),
            Value::String(format!("{}.icns", app.product_name)),
        );
    }
    if let Some(category) = &app.darwin.category {
        dict.insert(
            "LSApplicationCategoryType".into(),
            Value::String(category.clone()),
        );
    }
    if let Some(min_version) = &app.darwin.minimum_system_version {
        dict.insert(
            "LSMinimumSystemVersion".into(),
            Value::String(min_version.clone()),
        );
    }

    for (key, value) in &app.plist_extras {
        dict.insert(key.clone(), json_to_plist_value(value));
    }

    Ok(dict)
}

fn package_type(platform: Platform) -> &'static str {
    match platform {
        Platform::MacOs => "APPL",
        _ => "APPL",
    }
}

fn json_to_plist_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::String(String::new()),
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i.into())
            } else {
                Value::Real(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Array(items.iter().map(json_to_plist_value).collect())
        }
        serde_json::Value::Object(map) => {
            let mut dict = Dictionary::new();
            for (k, v) in map {
                dict.insert(k.clone(), json_to_plist_value(v));
            }
            Value::Dictionary(dict)
        }
    }
}

/// Serialize `dict` as XML plist to `path`.
pub fn write_plist(dict: &Dictionary, path: &Path) -> Result<()> {
    Value::Dictionary(dict.clone())
        .to_file_xml(path)
        .context(format!("writing Info.plist to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfiguration, DarwinSettings};
    use std::collections::BTreeMap;

    fn sample_context() -> BundlerContext {
        BundlerContext {
            app_name: "demo".into(),
            app: AppConfiguration {
                identifier: "com.example.demo".into(),
                product_name: "Demo".into(),
                version: "1.0.0".into(),
                marketing_version: Some("1.0".into()),
                main_binary: "demo".into(),
                extra_binaries: vec![],
                icon_paths: vec![],
                resources: BTreeMap::new(),
                plist_extras: BTreeMap::new(),
                dependencies: vec![],
                dbus_activatable: false,
                darwin: DarwinSettings {
                    category: Some("public.app-category.utilities".into()),
                    ..Default::default()
                },
                rpm: Default::default(),
                appimage: Default::default(),
                windows: Default::default(),
                msi: Default::default(),
            },
            products_directory: "/products".into(),
            output_directory: "/out".into(),
            platform: Platform::MacOs,
            project_artifacts: BTreeMap::new(),
        }
    }

    #[test]
    fn builds_required_keys() {
        let dict = build_info_plist(&sample_context(), Platform::MacOs).unwrap();
        assert_eq!(
            dict.get("CFBundleIdentifier").and_then(|v| v.as_string()),
            Some("com.example.demo")
        );
        assert_eq!(
            dict.get("CFBundleShortVersionString").and_then(|v| v.as_string()),
            Some("1.0")
        );
        assert_eq!(dict.get("NSHighResolutionCapable").and_then(|v| v.as_boolean()), Some(true));
        assert_eq!(
            dict.get("LSApplicationCategoryType").and_then(|v| v.as_string()),
            Some("public.app-category.utilities")
        );
    }

    #[test]
    fn extras_override_computed_keys() {
        let mut context = sample_context();
        context
            .app
            .plist_extras
            .insert("CFBundleIdentifier".into(), serde_json::json!("com.override.id"));
        let dict = build_info_plist(&context, Platform::MacOs).unwrap();
        assert_eq!(
            dict.get("CFBundleIdentifier").and_then(|v| v.as_string()),
            Some("com.override.id")
        );
    }
}
