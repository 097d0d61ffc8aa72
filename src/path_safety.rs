use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// Join a generated file name onto an output root, ensuring it stays within it.
/// Rejects absolute paths and any that escape via `..`; the target itself need
/// not exist yet.
pub fn join_under_root(root: &Path, candidate: &Path) -> Result<PathBuf> {
    if candidate.is_absolute() {
        anyhow::bail!("absolute paths are not allowed: {}", candidate.display());
    }
    if candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        anyhow::bail!(
            "path escapes root ({}): {}",
            root.display(),
            candidate.display()
        );
    }

    let canon_root = root
        .canonicalize()
        .with_context(|| format!("failed to canonicalize {}", root.display()))?;
    Ok(canon_root.join(candidate))
}
