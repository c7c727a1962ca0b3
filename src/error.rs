//! Typed error chain with source location, as used throughout the bundling
//! pipeline.
//!
//! A `#[non_exhaustive]` [`thiserror`](thiserror)-derived enum, a
//! [`Context`]/[`ErrorExt`] trait pair for ergonomic context attachment, and
//! a [`bail!`] macro. Each error carries a captured [`Location`] so the
//! cause chain can be rendered as a tree that points at the call site that
//! first raised it.

use std::fmt::{self, Display};
use std::io;
use std::path::{self, PathBuf};

use thiserror::Error as DeriveError;

/// File, line, and column at which an error was first constructed.
///
/// Captured automatically via `#[track_caller]` on the points that produce
/// an [`Error`] (`Context::context`, `ErrorExt::fs_context`, [`bail!`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Source file that raised the error.
    pub file: &'static str,
    /// Line within `file`.
    pub line: u32,
    /// Column within `line`.
    pub column: u32,
}

impl Location {
    #[track_caller]
    fn here() -> Self {
        let loc = std::panic::Location::caller();
        Location {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Errors produced by the bundling pipeline.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Added context wrapping a lower-level cause. Created by [`Context`].
    #[error("{message}: {cause}")]
    Context {
        /// Human-readable description of the operation that failed.
        message: String,
        /// The underlying error.
        cause: Box<Self>,
        /// Where `.context(...)` was called.
        location: Location,
    },

    /// Filesystem operation failed against a specific path.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Present-tense verb phrase, e.g. "copying binary".
        context: &'static str,
        /// Path that was being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        error: io::Error,
        /// Where `.fs_context(...)` was called.
        location: Location,
    },

    /// An external tool exited with a non-zero status.
    #[error("command `{command}` failed: {detail}")]
    CommandFailed {
        /// The program name and arguments, joined for display.
        command: String,
        /// Captured stderr, or an explanation if the process could not start.
        detail: String,
    },

    /// A required external tool was not found on `PATH`.
    #[error("required tool `{tool}` not found on PATH{hint}")]
    ToolNotFound {
        /// The tool's program name.
        tool: String,
        /// An optional install hint, already formatted with a leading `; `.
        hint: String,
    },

    /// Generic I/O error with no path context attached.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Icon conversion/resize error.
    #[error("{0}")]
    Image(#[from] image::ImageError),

    /// Directory traversal error (resource copy, checksum hashing).
    #[error("{0}")]
    Walkdir(#[from] walkdir::Error),

    /// Path prefix stripping error (relocation, resource trees).
    #[error("{0}")]
    StripPrefix(#[from] path::StripPrefixError),

    /// Archive read/write error.
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    /// Hex decode error (checksum comparison).
    #[error("{0}")]
    Hex(#[from] hex::FromHexError),

    /// JSON (de)serialization error (builder-program context, manifests).
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// TOML manifest parse error.
    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    /// Regular expression error (tool output parsing on Apple/Windows/Linux).
    #[cfg(any(target_os = "macos", windows, target_os = "linux"))]
    #[error("{0}")]
    Regex(#[from] regex::Error),

    /// Glob pattern error (package-manager search path resolution).
    #[error("{0}")]
    GlobPattern(#[from] glob::PatternError),

    /// URL parse error (project source configuration).
    #[error("{0}")]
    UrlParse(#[from] url::ParseError),

    /// A bundle type was requested that its bundler cannot produce on this
    /// host platform.
    #[error("package type {package_type} not supported on {platform}")]
    UnsupportedPackageType {
        /// The requested package type's short name.
        package_type: String,
        /// The host platform's short name.
        platform: String,
    },

    /// Computed digest did not match an expected value.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Expected digest, hex-encoded.
        expected: String,
        /// Actual digest, hex-encoded.
        actual: String,
    },

    /// No usable icon could be resolved from the configuration.
    #[error("could not resolve an icon from the package configuration")]
    IconNotFound,

    /// No DMG background image could be resolved.
    #[error("could not resolve a background image for the DMG")]
    BackgroundNotFound,

    /// A `$(VARIABLE)` token had no known or custom-supplied value.
    #[error("unknown variable `{0}` in template string")]
    UnknownVariable(String),

    /// A referenced dependency project could not be located or built.
    #[error("project `{0}` failed to build: {1}")]
    ProjectBuildFailed(String, String),

    /// A device/deployment target requested by the caller does not exist.
    #[error("no device matching `{0}` is available")]
    MissingTargetDevice(String),

    /// Catch-all for conditions with no dedicated variant. Created by
    /// [`bail!`] and by [`Context`]'s blanket `Option` impl.
    #[error("{0}")]
    Other(String),

    /// RPM package assembly error.
    #[cfg(target_os = "linux")]
    #[error("{0}")]
    Rpm(#[from] rpm::Error),

    /// Property list (plist) encode/decode error.
    #[cfg(target_os = "macos")]
    #[error("{0}")]
    Plist(#[from] plist::Error),

    /// Pure-Rust git checkout error (dependency project sources).
    #[error("git operation failed: {0}")]
    Git(String),
}

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Render the full cause chain as an indented tree, innermost cause
    /// last, annotating each `Context` frame with where it was attached.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Error::Context {
                message,
                cause,
                location,
            } => {
                out.push_str(&format!("{indent}{message} (at {location})\n"));
                cause.render_into(out, depth + 1);
            }
            other => {
                out.push_str(&format!("{indent}{other}\n"));
            }
        }
    }
}

/// Adds human-readable context to a fallible operation, preserving the
/// original error as the cause.
pub trait Context<T> {
    /// Attach a static or owned description.
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Attach a lazily-computed description; use when formatting the
    /// context string is itself non-trivial.
    #[track_caller]
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        let location = Location::here();
        self.map_err(|e| Error::Context {
            message: context.to_string(),
            cause: Box::new(e),
            location,
        })
    }

    #[track_caller]
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        let location = Location::here();
        self.map_err(|e| Error::Context {
            message: f().to_string(),
            cause: Box::new(e),
            location,
        })
    }
}

impl<T> Context<T> for Option<T> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::Other(context.to_string()))
    }

    #[track_caller]
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::Other(f().to_string()))
    }
}

/// Extension trait wrapping I/O errors with the path that caused them.
pub trait ErrorExt<T> {
    /// Attach `context` (a present-tense verb phrase, e.g. "copying binary")
    /// and `path` to an I/O error.
    #[track_caller]
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    #[track_caller]
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        let location = Location::here();
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
            location,
        })
    }
}

/// Early-return with an [`Error::Other`].
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::Error::Other($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::error::Error::Other($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::Other(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_and_renders_tree() {
        let base: Result<()> = Err(Error::Other("disk full".into()));
        let wrapped = base.context("writing bundle manifest");
        let err = wrapped.unwrap_err();
        let tree = err.render_tree();
        assert!(tree.contains("writing bundle manifest"));
        assert!(tree.contains("disk full"));
    }

    #[test]
    fn option_context_produces_other_variant() {
        let none: Option<u32> = None;
        let err = none.context("no main binary configured").unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn bail_macro_formats_message() {
        fn inner() -> Result<()> {
            let value = 42;
            bail!("unexpected value: {value}");
        }
        let err = inner().unwrap_err();
        assert_eq!(err.to_string(), "unexpected value: 42");
    }
}
