//! Redirect manifest maintenance: hop collapsing and reformatting.

use super::Workspace;
use crate::error::{Result, SweepError};
use crate::redirect::{collapse_hops, HopReport, RedirectManifest};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub manifest: PathBuf,
    pub redirects: usize,
    #[serde(flatten)]
    pub hops: HopReport,
    pub written: bool,
}

pub fn clean_redirects(
    ws: &Workspace<'_>,
    manifest_path: Option<&Path>,
    apply: bool,
) -> Result<CleanReport> {
    let (mut manifest, catalog) = ws.load_redirects(manifest_path)?;
    let hops = collapse_hops(
        &mut manifest,
        &catalog,
        &ws.config.site_hosts,
        ws.config.case_insensitive,
    );

    let written = apply && !hops.collapsed.is_empty();
    if written {
        manifest.save(ws.storage)?;
        crate::log!(
            "redirects";
            "rewrote `{}` ({} hops removed)",
            manifest.path.display(),
            hops.collapsed.len()
        );
    }
    Ok(CleanReport {
        manifest: manifest.path.clone(),
        redirects: manifest.redirections.len(),
        hops,
        written,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatReport {
    pub manifest: PathBuf,
    pub redirects: usize,
    pub changed: bool,
    pub written: bool,
}

/// Re-serializes the manifest: consistent indentation, null fields dropped.
pub fn format_redirects(
    ws: &Workspace<'_>,
    manifest_path: Option<&Path>,
    apply: bool,
) -> Result<FormatReport> {
    let path = ws.find_manifest(manifest_path)?;
    let original = ws
        .storage
        .read_to_string(&path)
        .map_err(|e| SweepError::io(&path, e))?;
    let manifest = RedirectManifest::parse(&path, &original)?;
    let changed = manifest.to_json()? != original;

    let written = apply && changed;
    if written {
        manifest.save(ws.storage)?;
    }
    Ok(FormatReport {
        manifest: path,
        redirects: manifest.redirections.len(),
        changed,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{write, DOCFX};
    use super::*;
    use crate::config::Config;
    use crate::storage::FsStorage;
    use std::fs;
    use tempfile::TempDir;

    const CHAIN: &str = r#"{"redirections": [
        {"source_path": "docs/old.md", "redirect_url": "/visualstudio/middle"},
        {"source_path": "docs/middle.md", "redirect_url": "/visualstudio/new", "redirect_document_id": false}
    ]}"#;

    fn setup(manifest: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs/docfx.json", DOCFX);
        let path = write(dir.path(), ".openpublishing.redirection.json", manifest);
        (dir, path)
    }

    #[test]
    fn test_clean_collapses_and_writes() {
        let (dir, path) = setup(CHAIN);
        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(&dir.path().join("docs"), &config, &storage, None).unwrap();

        let report = clean_redirects(&ws, None, true).unwrap();
        assert!(report.written);
        assert_eq!(report.hops.collapsed.len(), 1);

        let saved = RedirectManifest::load(&path, &storage).unwrap();
        assert_eq!(saved.redirections[0].redirect_url, "/visualstudio/new");
        assert_eq!(saved.redirections[1].redirect_document_id, Some(false));

        let again = clean_redirects(&ws, None, true).unwrap();
        assert!(again.hops.collapsed.is_empty());
        assert!(!again.written);
    }

    #[test]
    fn test_clean_dry_run_leaves_file() {
        let (dir, path) = setup(CHAIN);
        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(&dir.path().join("docs"), &config, &storage, None).unwrap();

        let report = clean_redirects(&ws, None, false).unwrap();
        assert_eq!(report.hops.collapsed.len(), 1);
        assert!(!report.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), CHAIN);
    }

    #[test]
    fn test_clean_with_bad_manifest() {
        let (dir, path) = setup("{ broken");
        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(&dir.path().join("docs"), &config, &storage, None).unwrap();

        let err = clean_redirects(&ws, None, true).unwrap_err();
        assert!(matches!(err, SweepError::ManifestParse { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ broken");
    }

    #[test]
    fn test_format_drops_nulls() {
        let (dir, path) = setup(r#"[{"source_path":"a.md","redirect_url":"/x/b","monikers":null}]"#);
        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(&dir.path().join("docs"), &config, &storage, None).unwrap();

        let report = format_redirects(&ws, None, true).unwrap();
        assert!(report.changed && report.written);
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("monikers"));

        let again = format_redirects(&ws, None, true).unwrap();
        assert!(!again.changed);
    }
}
