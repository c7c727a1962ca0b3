//! Thin wrapper over [`tokio::process::Command`] for invoking the external
//! tools this crate orchestrates but does not implement (`otool`,
//! `install_name_tool`, `ldd`, `patchelf`, `dumpbin`, `codesign`, `lipo`,
//! `rpmbuild`, `appimagetool`, ...).

use std::path::Path;

use crate::error::{Error, Result};

/// Captured output of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Process exit status code, if the process terminated normally.
    pub status: Option<i32>,
    /// Captured standard output, lossily decoded as UTF-8.
    pub stdout: String,
    /// Captured standard error, lossily decoded as UTF-8.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Locate `name` on `PATH`, mapping a miss to [`Error::ToolNotFound`] with
/// `hint` appended as an install suggestion (e.g. `"install Xcode Command
/// Line Tools"`).
pub fn which(name: &str, hint: &str) -> Result<std::path::PathBuf> {
    which::which(name).map_err(|_| Error::ToolNotFound {
        tool: name.to_string(),
        hint: if hint.is_empty() {
            String::new()
        } else {
            format!("; {hint}")
        },
    })
}

/// Run `program` with `args` in `cwd` (defaulting to the current directory),
/// layering `env` on top of the inherited environment, and return its
/// captured output regardless of exit status.
pub async fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    env: &[(&str, &str)],
) -> Result<ProcessOutput> {
    let mut command = tokio::process::Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    for (key, value) in env {
        command.env(key, value);
    }
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    let command_display = format!("{program} {}", args.join(" "));
    let output = command
        .output()
        .await
        .map_err(|error| Error::CommandFailed {
            command: command_display,
            detail: error.to_string(),
        })?;

    Ok(ProcessOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Like [`run`], but maps a non-zero exit status to
/// [`Error::CommandFailed`] with the captured stderr as detail.
pub async fn run_checked(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    env: &[(&str, &str)],
) -> Result<ProcessOutput> {
    let output = run(program, args, cwd, env).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(Error::CommandFailed {
            command: format!("{program} {}", args.join(" ")),
            detail: if output.stderr.trim().is_empty() {
                format!("exited with status {:?}", output.status)
            } else {
                output.stderr.trim().to_string()
            },
        })
    }
}
