//! Images, INCLUDE files and code snippets that nothing references.

use super::{delete_files, Deletion, Workspace};
use crate::error::Result;
use crate::extract::LinkKind;
use crate::index::{build_index, ScanStats};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Images,
    Includes,
    Snippets,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Images => "images",
            Self::Includes => "include files",
            Self::Snippets => "code snippets",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaReport {
    pub kind: MediaKind,
    pub targets: usize,
    pub orphans: Vec<PathBuf>,
    pub deletion: Option<Deletion>,
    pub stats: ScanStats,
}

impl MediaKind {
    fn targets(self, ws: &Workspace<'_>, recursive: bool) -> Result<Vec<PathBuf>> {
        let config = ws.config;
        Ok(match self {
            Self::Images => ws.enumerate(&ws.dir, &config.image_patterns(), recursive)?,
            Self::Includes => ws
                .enumerate(&ws.dir, &["*.md"], recursive)?
                .into_iter()
                .filter(|p| config.is_include(p))
                .collect(),
            Self::Snippets => ws.enumerate(&ws.dir, &config.snippet_patterns(), recursive)?,
        })
    }
}

/// Targets come from the input directory (only its top level unless
/// `recursive`); references are searched across the whole docset, since any
/// page may use a shared image or include.
pub fn orphaned_media(
    ws: &Workspace<'_>,
    kind: MediaKind,
    recursive: bool,
    apply: bool,
) -> Result<MediaReport> {
    let targets = kind.targets(ws, recursive)?;
    let mut report = MediaReport {
        kind,
        targets: targets.len(),
        orphans: Vec::new(),
        deletion: None,
        stats: ScanStats::default(),
    };
    if targets.is_empty() {
        crate::log!("media"; "no {} under `{}`", kind, ws.dir.display());
        return Ok(report);
    }

    let linking = ws.docset_files()?;
    crate::log!(
        "media";
        "looking for references to {} {} in {} files",
        targets.len(),
        kind,
        linking.len()
    );
    let (index, stats) = build_index(&linking, &targets, &ws.context(), ws.storage, LinkKind::ALL);
    report.stats = stats;
    report.orphans = index.orphans();

    if apply && !report.orphans.is_empty() {
        report.deletion = Some(delete_files(&report.orphans, ws.storage));
    }
    Ok(report)
}
