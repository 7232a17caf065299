// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for local state files.

use crate::error::{AppError, Result};
use std::path::Path;

/// Write `bytes` to `path` via a sibling temp file and rename, creating the
/// parent directory if needed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let storage_err = |e: std::io::Error| AppError::Storage(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
    }

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(storage_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(storage_err)?;
    Ok(())
}

/// Read a state file; `None` when it does not exist yet.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Storage(format!("{}: {}", path.display(), e))),
    }
}
