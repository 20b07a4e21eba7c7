// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model file discovery

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A model file in the model directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCatalogEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Whether the recorded server is running this file
    pub is_current: bool,
}

/// Result of a listing; recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCatalog {
    pub models: Vec<ModelCatalogEntry>,
    pub active_model_path: Option<PathBuf>,
}

/// Case-insensitive extension match; a leading dot on `extension` is ignored.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}

/// Non-recursive scan of `dir`, sorted by file name.
///
/// A missing or unreadable directory yields an empty list.
pub fn scan_models(dir: &Path, extension: &str, current: Option<&Path>) -> Vec<ModelCatalogEntry> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!("Model directory {} unreadable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut models: Vec<ModelCatalogEntry> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if !has_extension(&path, extension) {
                return None;
            }
            let metadata = std::fs::metadata(&path).ok()?;
            if !metadata.is_file() {
                return None;
            }
            let name = path.file_name()?.to_string_lossy().to_string();
            Some(ModelCatalogEntry {
                is_current: current.is_some_and(|c| c == path),
                name,
                path,
                size_bytes: metadata.len(),
            })
        })
        .collect();

    models.sort_by(|a, b| a.name.cmp(&b.name));
    models
}
