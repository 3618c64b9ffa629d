//! Reference counting over a fixed target set.
//!
//! Every target starts at zero. Candidate files are scanned in parallel and
//! each resolved occurrence that lands on a target bumps its counter once.
//! The key set never changes after construction, so the counters can be
//! plain atomics behind a shared map.

use crate::extract::{extract_kinds, LinkKind};
use crate::resolve::{ResolutionContext, Unresolved};
use crate::storage::Storage;
use ahash::AHashMap;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    count: AtomicUsize,
}

/// What one scan saw. Returned by value and merged, never shared while scanning.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub occurrences: usize,
    pub resolved: usize,
    /// Resolved occurrences that hit an indexed target.
    pub counted: usize,
    pub malformed: usize,
    pub unreadable: usize,
}

impl ScanStats {
    pub fn merge(self, other: Self) -> Self {
        Self {
            files_scanned: self.files_scanned + other.files_scanned,
            occurrences: self.occurrences + other.occurrences,
            resolved: self.resolved + other.resolved,
            counted: self.counted + other.counted,
            malformed: self.malformed + other.malformed,
            unreadable: self.unreadable + other.unreadable,
        }
    }
}

#[derive(Debug)]
pub struct ReferenceIndex {
    entries: AHashMap<String, Entry>,
    case_insensitive: bool,
}

impl ReferenceIndex {
    pub fn new(targets: &[PathBuf], case_insensitive: bool) -> Self {
        let mut entries = AHashMap::with_capacity(targets.len());
        for path in targets {
            entries
                .entry(crate::resolve::lookup_key(path, case_insensitive))
                .or_insert_with(|| Entry {
                    path: path.clone(),
                    count: AtomicUsize::new(0),
                });
        }
        Self {
            entries,
            case_insensitive,
        }
    }

    /// Scans `files` for occurrences of `kinds` and counts those that resolve
    /// to an indexed target.
    pub fn scan(
        &self,
        files: &[PathBuf],
        ctx: &ResolutionContext<'_>,
        storage: &dyn Storage,
        kinds: &[LinkKind],
    ) -> ScanStats {
        files
            .par_iter()
            .map(|file| self.scan_file(file, ctx, storage, kinds))
            .reduce(ScanStats::default, ScanStats::merge)
    }

    fn scan_file(
        &self,
        file: &Path,
        ctx: &ResolutionContext<'_>,
        storage: &dyn Storage,
        kinds: &[LinkKind],
    ) -> ScanStats {
        let mut stats = ScanStats {
            files_scanned: 1,
            ..ScanStats::default()
        };
        let text = match storage.read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                crate::warn!("index"; "cannot read `{}`: {}", file.display(), e);
                stats.unreadable = 1;
                return stats;
            }
        };

        for occurrence in extract_kinds(&text, kinds) {
            stats.occurrences += 1;
            match ctx.resolve(&occurrence, file, storage) {
                Ok(reference) => {
                    stats.resolved += 1;
                    if let Some(entry) = self.entries.get(&reference.key) {
                        entry.count.fetch_add(1, Ordering::Relaxed);
                        stats.counted += 1;
                    }
                }
                Err(Unresolved::Malformed(reason)) => {
                    stats.malformed += 1;
                    crate::warn!(
                        "index";
                        "possible bad link `{}` in `{}` line {}: {}",
                        occurrence.raw, file.display(), occurrence.line, reason
                    );
                }
                Err(other) => {
                    crate::debug!("index"; "`{}` in `{}`: {}", occurrence.raw, file.display(), other);
                }
            }
        }
        stats
    }

    #[cfg(test)]
    pub fn count(&self, path: &Path) -> Option<usize> {
        self.entries
            .get(&crate::resolve::lookup_key(path, self.case_insensitive))
            .map(|e| e.count.load(Ordering::Relaxed))
    }

    /// Targets nothing points at, sorted.
    pub fn orphans(&self) -> Vec<PathBuf> {
        let mut orphans: Vec<PathBuf> = self
            .entries
            .values()
            .filter(|e| e.count.load(Ordering::Relaxed) == 0)
            .map(|e| e.path.clone())
            .collect();
        orphans.sort();
        orphans
    }
}

pub fn build_index(
    candidates: &[PathBuf],
    targets: &[PathBuf],
    ctx: &ResolutionContext<'_>,
    storage: &dyn Storage,
    kinds: &[LinkKind],
) -> (ReferenceIndex, ScanStats) {
    let index = ReferenceIndex::new(targets, ctx.case_insensitive);
    let stats = index.scan(candidates, ctx, storage, kinds);
    crate::debug!(
        "index";
        "{} files, {} occurrences, {} resolved, {} counted",
        stats.files_scanned, stats.occurrences, stats.resolved, stats.counted
    );
    (index, stats)
}
