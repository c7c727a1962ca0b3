//! Evaluator for `$(VARIABLE)` and `$(VARIABLE:modifier)` tokens embedded in
//! configuration string fields (bundle identifiers, plist values, display
//! names, ...).
//!
//! Hand-written rather than built on a templating crate: the token grammar
//! is a single closed form (`$(`, an identifier, an optional `:modifier`,
//! `)`), and a general templating engine buys nothing over a direct scan.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// The fixed set of variables known to the evaluator, independent of any
/// custom values a caller supplies.
#[derive(Debug, Clone, Default)]
pub struct KnownVariables {
    /// Short git commit hash of the source checkout, if any.
    pub commit_hash: Option<String>,
    /// Monotonic revision number (commit count), if any.
    pub revision_number: Option<String>,
    /// Full semantic version string.
    pub version: Option<String>,
    /// Marketing / display version, distinct from the build version.
    pub marketing_version: Option<String>,
    /// Build version shown to the OS (`CFBundleVersion` equivalent).
    pub current_project_version: Option<String>,
    /// Reverse-DNS bundle identifier.
    pub product_bundle_identifier: Option<String>,
    /// Human-facing product name.
    pub product_name: Option<String>,
    /// Bundle package type code, e.g. `"APPL"`.
    pub product_bundle_package_type: Option<String>,
    /// Development region / language, e.g. `"en"`.
    pub development_language: Option<String>,
    /// Module-safe identifier derived from the product name.
    pub product_module_name: Option<String>,
    /// Absolute path to the package source root.
    pub src_root: Option<String>,
}

/// Resolves a variable name (without the `$( )` wrapper, and without any
/// `:modifier` suffix) to its textual value.
pub trait EvaluationContext {
    /// Look up `name`; `None` means the variable is unknown, not empty.
    fn lookup(&self, name: &str) -> Option<String>;
}

impl EvaluationContext for KnownVariables {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "COMMIT_HASH" => self.commit_hash.clone(),
            "REVISION_NUMBER" => self.revision_number.clone(),
            "VERSION" => self.version.clone(),
            "MARKETING_VERSION" => self.marketing_version.clone(),
            "CURRENT_PROJECT_VERSION" => self.current_project_version.clone(),
            "PRODUCT_BUNDLE_IDENTIFIER" => self.product_bundle_identifier.clone(),
            "PRODUCT_NAME" => self.product_name.clone(),
            "PRODUCT_BUNDLE_PACKAGE_TYPE" => self.product_bundle_package_type.clone(),
            "DEVELOPMENT_LANGUAGE" => self.development_language.clone(),
            "PRODUCT_MODULE_NAME" => self
                .product_module_name
                .clone()
                .or_else(|| self.product_name.clone().map(|n| module_safe(&n))),
            "SRCROOT" => self.src_root.clone(),
            "UNIX_TIMESTAMP" => Some(unix_timestamp().to_string()),
            _ => None,
        }
    }
}

/// A [`KnownVariables`] context overlaid with caller-supplied overrides,
/// consulted first.
pub struct OverlayContext<'a> {
    overrides: &'a BTreeMap<String, String>,
    base: &'a KnownVariables,
}

impl<'a> OverlayContext<'a> {
    /// Build a context checking `overrides` before falling back to `base`.
    pub fn new(overrides: &'a BTreeMap<String, String>, base: &'a KnownVariables) -> Self {
        OverlayContext { overrides, base }
    }
}

impl EvaluationContext for OverlayContext<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.overrides
            .get(name)
            .cloned()
            .or_else(|| self.base.lookup(name))
    }
}

/// Applies the RFC 1034-identifier modifier: lowercase ASCII alphanumerics
/// and hyphens only, with every other byte replaced by `-`.
fn rfc1034_identifier(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn module_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Evaluate every `$(VAR)` / `$(VAR:modifier)` token in `input`, looking up
/// values through `context`. Returns [`Error::UnknownVariable`] if any token
/// names a variable `context` does not resolve.
pub fn evaluate(input: &str, context: &dyn EvaluationContext) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        match rest.find("$(") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                let after_open = &rest[start + 2..];
                let Some(close) = after_open.find(')') else {
                    out.push_str(&rest[start..]);
                    break;
                };
                let token = &after_open[..close];
                let (name, modifier) = match token.split_once(':') {
                    Some((n, m)) => (n, Some(m)),
                    None => (token, None),
                };
                let value = context
                    .lookup(name)
                    .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
                let value = match modifier {
                    Some("rfc1034identifier") => rfc1034_identifier(&value),
                    Some(other) => return Err(Error::UnknownVariable(format!("{name}:{other}"))),
                    None => value,
                };
                out.push_str(&value);
                rest = &after_open[close + 1..];
            }
        }
    }
    Ok(out)
}

/// Recursively evaluate every string leaf of a `serde_json::Value` tree,
/// leaving non-string leaves (numbers, booleans, null) untouched. Object
/// keys are never rewritten.
pub fn evaluate_tree(
    value: &serde_json::Value,
    context: &dyn EvaluationContext,
) -> Result<serde_json::Value> {
    Ok(match value {
        serde_json::Value::String(s) => serde_json::Value::String(evaluate(s, context)?),
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate_tree(item, context)?);
            }
            serde_json::Value::Array(out)
        }
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                out.insert(key.clone(), evaluate_tree(val, context)?);
            }
            serde_json::Value::Object(out)
        }
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> KnownVariables {
        KnownVariables {
            product_name: Some("My Cool App".to_string()),
            version: Some("1.2.3".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn substitutes_known_variable() {
        let out = evaluate("v$(VERSION)", &ctx()).unwrap();
        assert_eq!(out, "v1.2.3");
    }

    #[test]
    fn applies_rfc1034_modifier() {
        let out = evaluate("$(PRODUCT_NAME:rfc1034identifier)", &ctx()).unwrap();
        assert_eq!(out, "my-cool-app");
    }

    #[test]
    fn derives_module_name_from_product_name() {
        let out = evaluate("$(PRODUCT_MODULE_NAME)", &ctx()).unwrap();
        assert_eq!(out, "My_Cool_App");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let err = evaluate("$(NOPE)", &ctx()).unwrap_err();
        assert!(matches!(err, Error::UnknownVariable(name) if name == "NOPE"));
    }

    #[test]
    fn evaluates_nested_json_tree() {
        let tree = serde_json::json!({
            "name": "$(PRODUCT_NAME)",
            "nested": { "list": ["$(VERSION)", 5, null] }
        });
        let out = evaluate_tree(&tree, &ctx()).unwrap();
        assert_eq!(out["name"], "My Cool App");
        assert_eq!(out["nested"]["list"][0], "1.2.3");
        assert_eq!(out["nested"]["list"][1], 5);
    }

    #[test]
    fn overlay_context_prefers_override() {
        let overrides = BTreeMap::from([("VERSION".to_string(), "9.9.9".to_string())]);
        let base = ctx();
        let overlay = OverlayContext::new(&overrides, &base);
        assert_eq!(evaluate("$(VERSION)", &overlay).unwrap(), "9.9.9");
        assert_eq!(evaluate("$(PRODUCT_NAME)", &overlay).unwrap(), "My Cool App");
    }
}
