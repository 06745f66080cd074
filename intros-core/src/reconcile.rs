//! Aligns the intro catalog with the files present on disk.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::catalog::{Catalog, CatalogError, CatalogStore, IntroEntry, IntroId, PROVIDER_KEY};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("intro path not found: {path}")]
    PathNotFound { path: PathBuf },
    #[error("failed to scan {path}: {source}")]
    Scan {
        source: walkdir::Error,
        path: PathBuf,
    },
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub catalog: Catalog,
    /// New entries, ordered by path.
    pub added: Vec<IntroEntry>,
    /// Ids of entries whose file disappeared, ordered by id.
    pub removed: Vec<IntroId>,
}

impl ReconciliationResult {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Lists the intro files at `scan_path`: the path itself when it is a file,
/// otherwise the files directly inside it, sorted by name.
pub fn scan_files(scan_path: &Path) -> ReconcileResult<Vec<PathBuf>> {
    let metadata = fs::metadata(scan_path).map_err(|_| ReconcileError::PathNotFound {
        path: scan_path.to_path_buf(),
    })?;
    if metadata.is_file() {
        return Ok(vec![scan_path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(scan_path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ReconcileError::Scan {
            source,
            path: scan_path.to_path_buf(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Computes the catalog matching `files`.
///
/// Entries whose path is still present are kept untouched; new paths get a
/// fresh entry; everything else is reported as removed. When several existing
/// entries share a path only the one with the smallest id survives.
pub fn diff(files: &[PathBuf], existing: &Catalog) -> ReconciliationResult {
    let mut by_path: BTreeMap<&Path, &IntroEntry> = BTreeMap::new();
    for entry in existing.entries() {
        by_path.entry(entry.path.as_path()).or_insert(entry);
    }

    let mut catalog = Catalog::new();
    let mut added = Vec::new();
    let mut seen: HashSet<IntroId> = HashSet::new();
    let mut visited: HashSet<&Path> = HashSet::new();

    for file in files {
        if !visited.insert(file.as_path()) {
            continue;
        }
        match by_path.get(file.as_path()) {
            Some(entry) => {
                debug!(target: "intros.reconcile", path = %file.display(), "found in library");
                seen.insert(entry.id);
                catalog.insert((*entry).clone());
            }
            None => {
                let entry = IntroEntry::discovered(file.clone());
                debug!(
                    target: "intros.reconcile",
                    path = %file.display(),
                    intro_id = %entry.id,
                    "adding to library"
                );
                catalog.insert(entry.clone());
                added.push(entry);
            }
        }
    }

    let removed: Vec<IntroId> = existing
        .ids()
        .filter(|id| !seen.contains(*id))
        .copied()
        .collect();
    added.sort_by(|a, b| a.path.cmp(&b.path));

    ReconciliationResult {
        catalog,
        added,
        removed,
    }
}

/// Scans `scan_path` and diffs it against `existing`.
pub fn reconcile(scan_path: &Path, existing: &Catalog) -> ReconcileResult<ReconciliationResult> {
    let files = scan_files(scan_path)?;
    let result = diff(&files, existing);
    info!(
        target: "intros.reconcile",
        path = %scan_path.display(),
        files = files.len(),
        added = result.added.len(),
        removed = result.removed.len(),
        "reconciled intro catalog"
    );
    Ok(result)
}

/// Catalog entries registered in `store` under the intro provider key.
pub fn load_catalog<S>(store: &S) -> ReconcileResult<Catalog>
where
    S: CatalogStore + ?Sized,
{
    Ok(store.find_by_tag(PROVIDER_KEY, None)?.into_iter().collect())
}

/// Writes a reconciliation result to the catalog store: removals first, then
/// additions.
pub fn apply<S>(store: &S, result: &ReconciliationResult) -> ReconcileResult<()>
where
    S: CatalogStore + ?Sized,
{
    for id in &result.removed {
        debug!(target: "intros.reconcile", intro_id = %id, "removing from library");
        store.delete(*id)?;
    }
    for entry in &result.added {
        store.create(entry)?;
    }
    Ok(())
}

/// Undoes a (possibly partial) [`apply`] of `result`: added entries are
/// deleted and removed entries still missing are recreated from `previous`.
pub fn revert<S>(store: &S, previous: &Catalog, result: &ReconciliationResult) -> ReconcileResult<()>
where
    S: CatalogStore + ?Sized,
{
    for entry in &result.added {
        store.delete(entry.id)?;
    }
    let current = load_catalog(store)?;
    for id in &result.removed {
        if current.contains(id) {
            continue;
        }
        if let Some(entry) = previous.get(id) {
            store.create(entry)?;
        }
    }
    Ok(())
}
