//! Builds dependency projects: checks out a project's source, builds and
//! invokes its configured "builder" program, and collects the artifacts it
//! reports.
//!
//! State machine: `Unbuilt → Building → Built(products_dir) | Failed`.
//! Checkout uses `gix`, a pure-Rust git implementation, rather than
//! shelling out to a `git` binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ProjectConfiguration, ProjectSource};
use crate::error::{Context, Error, ErrorExt, Result};
use crate::process;

/// The lifecycle state of one dependency project's build.
#[derive(Debug, Clone)]
pub enum ProjectState {
    /// Not yet checked out or built.
    Unbuilt,
    /// Checkout/build is in progress.
    Building,
    /// Build succeeded; maps artifact name to its path.
    Built(BTreeMap<String, PathBuf>),
    /// Build failed with the given message. Terminal — a failed project
    /// is never retried within a single bundling run.
    Failed(String),
}

/// JSON context written to the builder program's stdin.
#[derive(Debug, Serialize)]
struct BuilderContextPayload<'a> {
    project_name: &'a str,
    source_dir: &'a str,
    scratch_dir: &'a str,
}

/// JSON reported by the builder program on stdout.
#[derive(Debug, Deserialize)]
struct BuilderReport {
    artifacts: BTreeMap<String, PathBuf>,
}

/// Checks out and builds dependency projects beneath `workspace_root`,
/// tracking each project's [`ProjectState`].
pub struct ProjectBuilder {
    workspace_root: PathBuf,
    states: BTreeMap<String, ProjectState>,
}

impl ProjectBuilder {
    /// Create a builder whose scratch checkouts live under
    /// `workspace_root`.
    pub fn new(workspace_root: PathBuf) -> Self {
        ProjectBuilder {
            workspace_root,
            states: BTreeMap::new(),
        }
    }

    /// Current state of `project_name`, [`ProjectState::Unbuilt`] if it has
    /// never been requested.
    pub fn state(&self, project_name: &str) -> ProjectState {
        self.states
            .get(project_name)
            .cloned()
            .unwrap_or(ProjectState::Unbuilt)
    }

    /// Build `project_name` if not already built, returning its artifact
    /// map. A project already in [`ProjectState::Built`] is returned
    /// immediately without re-running its builder; a project already
    /// [`ProjectState::Failed`] returns that same failure again without
    /// retrying.
    pub async fn ensure_built(
        &mut self,
        project_name: &str,
        config: &ProjectConfiguration,
    ) -> Result<BTreeMap<String, PathBuf>> {
        match self.states.get(project_name) {
            Some(ProjectState::Built(artifacts)) => return Ok(artifacts.clone()),
            Some(ProjectState::Failed(message)) => {
                return Err(Error::ProjectBuildFailed(
                    project_name.to_string(),
                    message.clone(),
                ));
            }
            _ => {}
        }

        self.states
            .insert(project_name.to_string(), ProjectState::Building);

        match self.build(project_name, config).await {
            Ok(artifacts) => {
                self.states
                    .insert(project_name.to_string(), ProjectState::Built(artifacts.clone()));
                Ok(artifacts)
            }
            Err(error) => {
                self.states.insert(
                    project_name.to_string(),
                    ProjectState::Failed(error.to_string()),
                );
                Err(error)
            }
        }
    }

    async fn build(
        &self,
        project_name: &str,
        config: &ProjectConfiguration,
    ) -> Result<BTreeMap<String, PathBuf>> {
        let scratch_dir = self.workspace_root.join(project_name);
        crate::fsops::remove_dir_all(&scratch_dir).await?;
        crate::fsops::create_dir_all(&scratch_dir).await?;
        let source_dir = scratch_dir.join("src");

        checkout(&config.source, &source_dir).await?;

        let payload = BuilderContextPayload {
            project_name,
            source_dir: &source_dir.to_string_lossy(),
            scratch_dir: &scratch_dir.to_string_lossy(),
        };
        let payload_json =
            serde_json::to_vec(&payload).context("serializing builder context payload")?;

        let report = run_builder(config, &source_dir, &payload_json).await?;

        for required in &config.required_artifacts {
            if !report.artifacts.contains_key(required) {
                return Err(Error::ProjectBuildFailed(
                    project_name.to_string(),
                    format!("builder did not report required artifact `{required}`"),
                ));
            }
        }

        let mut artifacts = BTreeMap::new();
        for name in config.required_artifacts.iter().chain(&config.optional_artifacts) {
            if let Some(path) = report.artifacts.get(name) {
                artifacts.insert(name.clone(), path.clone());
            }
        }
        Ok(artifacts)
    }
}

async fn run_builder(
    config: &ProjectConfiguration,
    cwd: &Path,
    stdin_payload: &[u8],
) -> Result<BuilderReport> {
    use tokio::io::AsyncWriteExt;

    let [program, rest @ ..] = config.builder_command.as_slice() else {
        return Err(Error::Other("builder_command must name a program".into()));
    };

    let mut command = tokio::process::Command::new(program);
    command.args(rest);
    command.current_dir(cwd);
    command.stdin(std::process::Stdio::piped());
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|error| Error::CommandFailed {
            command: config.builder_command.join(" "),
            detail: error.to_string(),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(stdin_payload)
            .await
            .map_err(|error| Error::CommandFailed {
                command: config.builder_command.join(" "),
                detail: format!("writing builder context: {error}"),
            })?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|error| Error::CommandFailed {
            command: config.builder_command.join(" "),
            detail: error.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: config.builder_command.join(" "),
            detail: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    serde_json::from_slice(&output.stdout).context("parsing builder program's JSON report")
}

async fn checkout(source: &ProjectSource, dest: &Path) -> Result<()> {
    match source {
        ProjectSource::Local { path } => crate::fsops::copy_dir(path, dest).await,
        ProjectSource::Git { url, revision } => checkout_git(url, revision, dest).await,
    }
}

async fn checkout_git(url: &url::Url, revision: &str, dest: &Path) -> Result<()> {
    crate::fsops::create_dir_all(dest).await?;
    let url = url.clone();
    let revision = revision.to_string();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || clone_at_revision(&url, &revision, &dest))
        .await
        .map_err(|join_error| Error::Git(join_error.to_string()))?
}

fn clone_at_revision(url: &url::Url, revision: &str, dest: &Path) -> Result<()> {
    let mut prepare =
        gix::prepare_clone(url.as_str(), dest).map_err(|e| Error::Git(e.to_string()))?;
    let (mut checkout, _) = prepare
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| Error::Git(e.to_string()))?;
    let (repo, _) = checkout
        .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| Error::Git(e.to_string()))?;

    if !revision.is_empty() && revision != "HEAD" {
        let commit = repo
            .rev_parse_single(revision)
            .map_err(|e| Error::Git(format!("resolving revision `{revision}`: {e}")))?
            .object()
            .map_err(|e| Error::Git(e.to_string()))?
            .peel_to_commit()
            .map_err(|e| Error::Git(e.to_string()))?;
        let tree = commit.tree().map_err(|e| Error::Git(e.to_string()))?;
        let index = gix::index::State::from_tree(&tree.id(), &repo.objects, Default::default())
            .map_err(|e| Error::Git(e.to_string()))?;
        let mut index = gix::index::File::from_state(index, repo.index_path());
        gix::worktree::state::checkout(
            &mut index,
            dest,
            repo.objects.clone(),
            &gix::progress::Discard,
            &gix::progress::Discard,
            &gix::interrupt::IS_INTERRUPTED,
            Default::default(),
        )
        .map_err(|e| Error::Git(e.to_string()))?;
        index
            .write(gix::index::write::Options::default())
            .map_err(|e| Error::Git(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn local_checkout_copies_source_directory() {
        let source = tempdir().unwrap();
        tokio::fs::write(source.path().join("file.txt"), b"hi")
            .await
            .unwrap();
        let dest = tempdir().unwrap();
        let dest_path = dest.path().join("checked-out");

        checkout(
            &ProjectSource::Local {
                path: source.path().to_path_buf(),
            },
            &dest_path,
        )
        .await
        .unwrap();

        let copied = tokio::fs::read(dest_path.join("file.txt")).await.unwrap();
        assert_eq!(copied, b"hi");
    }

    #[tokio::test]
    async fn ensure_built_caches_successful_build() {
        let workspace = tempdir().unwrap();
        let source = tempdir().unwrap();
        let mut builder = ProjectBuilder::new(workspace.path().to_path_buf());

        let script = workspace.path().join("builder.sh");
        tokio::fs::write(
            &script,
            b"#!/bin/sh\ncat <<'EOF'\n{\"artifacts\":{\"plugin\":\"/tmp/plugin.so\"}}\nEOF\n",
        )
        .await
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(&script).await.unwrap().permissions();
            perms.set_mode(0o755);
            tokio::fs::set_permissions(&script, perms).await.unwrap();
        }

        let config = ProjectConfiguration {
            source: ProjectSource::Local {
                path: source.path().to_path_buf(),
            },
            builder_command: vec![script.to_string_lossy().into_owned()],
            required_artifacts: vec!["plugin".to_string()],
            optional_artifacts: vec![],
        };

        let artifacts = builder.ensure_built("demo", &config).await.unwrap();
        assert_eq!(artifacts.get("plugin").unwrap(), Path::new("/tmp/plugin.so"));
        assert!(matches!(builder.state("demo"), ProjectState::Built(_)));

        // Second call must hit the cached Built state, not re-run the script.
        tokio::fs::remove_file(&script).await.unwrap();
        let cached = builder.ensure_built("demo", &config).await.unwrap();
        assert_eq!(cached, artifacts);
    }
}
