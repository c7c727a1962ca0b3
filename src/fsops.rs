//! Filesystem primitives used throughout the pipeline, each wrapping its
//! [`std::io::Error`] with the path involved via [`ErrorExt::fs_context`].
//!
//! Recursive, symlink-preserving directory copy, idempotent removal, and
//! a strict single-file copy that refuses to silently copy a directory.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::{ErrorExt, Result};

/// Create `path` and any missing parent directories.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Remove `path` and its contents if present; a no-op if it does not exist.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error).fs_context("removing directory", path),
    }
}

/// Copy a single regular file from `from` to `to`, creating `to`'s parent
/// directory if needed. Errors if `from` is missing or is itself a
/// directory.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(from)
        .await
        .fs_context("reading source metadata", from)?;
    if !metadata.is_file() {
        return Err(crate::error::Error::Other(format!(
            "{} is not a regular file",
            from.display()
        )));
    }
    if let Some(parent) = to.parent() {
        create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to)
        .await
        .map(|_| ())
        .fs_context("copying file", from)
}

/// Recursively copy a directory tree, preserving symlinks as symlinks
/// rather than following them.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    create_dir_all(to).await?;
    for entry in WalkDir::new(from).into_iter() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let dest = to.join(relative);
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            let target = tokio::fs::read_link(entry.path())
                .await
                .fs_context("reading symlink", entry.path())?;
            symlink(&target, &dest).await?;
        } else if file_type.is_dir() {
            create_dir_all(&dest).await?;
        } else {
            copy_file(entry.path(), &dest).await?;
        }
    }
    Ok(())
}

/// Create a symlink at `link` pointing at `target`, dispatching to the
/// platform-appropriate syscall.
pub async fn symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        create_dir_all(parent).await?;
    }
    let target = target.to_path_buf();
    let link = link.to_path_buf();
    tokio::task::spawn_blocking(move || {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&target, &link)
        }
        #[cfg(windows)]
        {
            if target.is_dir() {
                std::os::windows::fs::symlink_dir(&target, &link)
            } else {
                std::os::windows::fs::symlink_file(&target, &link)
            }
        }
    })
    .await
    .map_err(|join_error| crate::error::Error::Other(join_error.to_string()))?
    .fs_context("creating symlink", &link)
}

/// Resolve a single level of symlink indirection.
pub async fn resolve_symlink(path: &Path) -> Result<std::path::PathBuf> {
    tokio::fs::read_link(path)
        .await
        .fs_context("resolving symlink", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn copy_file_rejects_directory_source() {
        let dir = tempdir().unwrap();
        let result = copy_file(dir.path(), &dir.path().join("out")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn copy_dir_preserves_tree_shape() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        tokio::fs::create_dir_all(src.path().join("nested"))
            .await
            .unwrap();
        tokio::fs::write(src.path().join("nested/file.txt"), b"hi")
            .await
            .unwrap();

        copy_dir(src.path(), dst.path()).await.unwrap();

        let copied = tokio::fs::read(dst.path().join("nested/file.txt"))
            .await
            .unwrap();
        assert_eq!(copied, b"hi");
    }

    #[tokio::test]
    async fn remove_dir_all_is_idempotent() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        remove_dir_all(&missing).await.unwrap();
        remove_dir_all(&missing).await.unwrap();
    }
}
