//! In-place link rewriting.
//!
//! Both rewrites work the same way: scan a file, decide a replacement per
//! occurrence, splice the replacements back from the end so earlier spans
//! stay valid, then write the file once. Files are independent and processed
//! in parallel; each file's read-modify-write happens inside one task.

use super::{FileFailure, Workspace};
use crate::error::Result;
use crate::extract::{extract_kinds, LinkKind, LinkOccurrence};
use crate::redirect::{HopContext, HopStop};
use crate::resolve::{relative_link, ResolutionContext, Unresolved};
use crate::storage::Storage;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub line: usize,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousLink {
    pub file: PathBuf,
    pub line: usize,
    pub raw: String,
    pub candidates: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RewriteReport {
    pub files_scanned: usize,
    pub changes: Vec<FileChange>,
    pub ambiguous: Vec<AmbiguousLink>,
    pub failures: Vec<FileFailure>,
    pub written: bool,
}

impl RewriteReport {
    pub fn replacement_count(&self) -> usize {
        self.changes.iter().map(|c| c.replacements.len()).sum()
    }
}

enum Decision {
    Keep,
    Replace(String),
    Ambiguous(Vec<PathBuf>),
}

#[derive(Default)]
struct FileOutcome {
    change: Option<FileChange>,
    ambiguous: Vec<AmbiguousLink>,
    failure: Option<FileFailure>,
}

/// Applies `decide` to every occurrence of `kinds` in every file.
fn rewrite_files<F>(
    files: &[PathBuf],
    kinds: &[LinkKind],
    storage: &dyn Storage,
    apply: bool,
    decide: F,
) -> RewriteReport
where
    F: Fn(&Path, &LinkOccurrence) -> Decision + Sync,
{
    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .map(|file| rewrite_file(file, kinds, storage, apply, &decide))
        .collect();

    let mut report = RewriteReport {
        files_scanned: files.len(),
        ..RewriteReport::default()
    };
    for outcome in outcomes {
        report.changes.extend(outcome.change);
        report.ambiguous.extend(outcome.ambiguous);
        report.failures.extend(outcome.failure);
    }
    report.written = apply && !report.changes.is_empty();
    report
}

fn rewrite_file<F>(
    file: &Path,
    kinds: &[LinkKind],
    storage: &dyn Storage,
    apply: bool,
    decide: &F,
) -> FileOutcome
where
    F: Fn(&Path, &LinkOccurrence) -> Decision,
{
    let mut outcome = FileOutcome::default();
    let failure = |e: std::io::Error| FileFailure {
        path: file.to_path_buf(),
        error: e.to_string(),
    };
    let text = match storage.read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            crate::warn!("rewrite"; "cannot read `{}`: {}", file.display(), e);
            outcome.failure = Some(failure(e));
            return outcome;
        }
    };

    let occurrences = extract_kinds(&text, kinds);
    let mut edits: Vec<(&LinkOccurrence, String)> = Vec::new();
    for occurrence in &occurrences {
        match decide(file, occurrence) {
            Decision::Keep => {}
            Decision::Replace(to) if to != occurrence.raw => edits.push((occurrence, to)),
            Decision::Replace(_) => {}
            Decision::Ambiguous(candidates) => outcome.ambiguous.push(AmbiguousLink {
                file: file.to_path_buf(),
                line: occurrence.line,
                raw: occurrence.raw.clone(),
                candidates,
            }),
        }
    }
    if edits.is_empty() {
        return outcome;
    }

    let mut updated = text;
    for (occurrence, to) in edits.iter().rev() {
        updated.replace_range(occurrence.span.clone(), to);
    }
    if apply {
        if let Err(e) = storage.write(file, &updated) {
            crate::warn!("rewrite"; "cannot write `{}`: {}", file.display(), e);
            outcome.failure = Some(failure(e));
            return outcome;
        }
    }
    outcome.change = Some(FileChange {
        path: file.to_path_buf(),
        replacements: edits
            .into_iter()
            .map(|(occurrence, to)| Replacement {
                line: occurrence.line,
                from: occurrence.raw.clone(),
                to,
            })
            .collect(),
    });
    outcome
}

/// Keeps `<...>` wrapping and re-attaches the bookmark.
fn respell(occurrence: &LinkOccurrence, target: &str) -> String {
    let mut link = target.to_string();
    if let Some(bookmark) = &occurrence.bookmark {
        if !link.contains('#') {
            link.push('#');
            link.push_str(bookmark);
        }
    }
    if occurrence.raw.trim_start().starts_with('<') {
        format!("<{link}>")
    } else {
        link
    }
}

/// Points links at redirected files to the end of their redirect chain.
pub fn replace_redirected_links(
    ws: &Workspace<'_>,
    manifest_path: Option<&Path>,
    apply: bool,
) -> Result<RewriteReport> {
    let (manifest, catalog) = ws.load_redirects(manifest_path)?;
    let lookup = manifest.lookup(ws.config.case_insensitive);
    let hops = HopContext {
        lookup: &lookup,
        catalog: &catalog,
        site_hosts: &ws.config.site_hosts,
    };
    let ctx = ws.context();
    let files = ws.input_files()?;
    crate::log!("rewrite"; "checking links in {} files against {} redirects", files.len(), lookup.len());

    let report = rewrite_files(&files, LinkKind::TOPIC, ws.storage, apply, |file, occurrence| {
        if occurrence.query.is_some() {
            return Decision::Keep;
        }
        let Ok(reference) = ctx.resolve(occurrence, file, ws.storage) else {
            return Decision::Keep;
        };
        let Some(target) = lookup.get_key(&reference.key) else {
            return Decision::Keep;
        };
        let resolution = hops.resolve_final_target(&reference.key, target);
        if matches!(resolution.stop, HopStop::SelfCycle | HopStop::Cycle) {
            crate::warn!(
                "rewrite";
                "`{}` in `{}` leads into a redirect cycle, not replaced",
                reference.occurrence.raw,
                reference.source.display()
            );
            return Decision::Keep;
        }
        Decision::Replace(respell(&reference.occurrence, &resolution.final_url))
    });
    Ok(report)
}

/// Turns site-relative links (`/<base>/ide/topic`) into file-relative ones
/// (`../ide/topic.md`) when the target exists in this docset.
pub fn relative_links(ws: &Workspace<'_>, apply: bool) -> Result<RewriteReport> {
    ws.require_url_base()?;
    let ctx = ws.context();
    let files = ws.input_files()?;
    crate::log!("rewrite"; "rewriting site-relative links in {} files", files.len());

    let report = rewrite_files(&files, LinkKind::ALL, ws.storage, apply, |file, occurrence| {
        site_to_relative(&ctx, ws.storage, file, occurrence)
    });
    Ok(report)
}

fn site_to_relative(
    ctx: &ResolutionContext<'_>,
    storage: &dyn Storage,
    file: &Path,
    occurrence: &LinkOccurrence,
) -> Decision {
    if !occurrence.path.starts_with('/') || occurrence.path.starts_with("//") {
        return Decision::Keep;
    }
    // Versioned views (`?view=...`) only work through the site URL.
    if occurrence.query.is_some() {
        return Decision::Keep;
    }
    let Some(dir) = file.parent() else {
        return Decision::Keep;
    };
    match ctx.resolve_target(&occurrence.path, dir, storage) {
        Ok(target) if storage.exists(&target) => {
            Decision::Replace(respell(occurrence, &relative_link(dir, &target)))
        }
        Ok(_) => Decision::Keep,
        Err(Unresolved::Ambiguous(candidates)) => Decision::Ambiguous(candidates),
        Err(other) => {
            crate::debug!(
                "rewrite";
                "leaving `{}` in `{}`: {}",
                occurrence.raw,
                file.display(),
                other
            );
            Decision::Keep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{write, DOCFX};
    use super::*;
    use crate::config::Config;
    use crate::storage::FsStorage;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_relative_links() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "docfx.json", DOCFX);
        write(root, "debugger/tips.md", "");
        write(root, "ide/media/pic.png", "");
        write(root, "ide/icon.png", "");
        write(root, "ide/icon.svg", "");
        let article = write(
            root,
            "ide/article.md",
            concat!(
                "See [tips](/visualstudio/debugger/tips#first) and ![p](/visualstudio/ide/media/pic.png).\n",
                "[versioned](/visualstudio/debugger/tips?view=vs-2019)\n",
                "[elsewhere](/azure/devops/intro)\n",
                "[missing](/visualstudio/debugger/missing.md)\n",
                "[icon](/visualstudio/ide/icon)\n",
            ),
        );

        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(root, &config, &storage, None).unwrap();

        let dry = relative_links(&ws, false).unwrap();
        assert_eq!(dry.replacement_count(), 2);
        assert!(fs::read_to_string(&article).unwrap().contains("/visualstudio/debugger/tips#first"));

        let report = relative_links(&ws, true).unwrap();
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.ambiguous[0].line, 5);
        assert_eq!(
            fs::read_to_string(&article).unwrap(),
            concat!(
                "See [tips](../debugger/tips.md#first) and ![p](media/pic.png).\n",
                "[versioned](/visualstudio/debugger/tips?view=vs-2019)\n",
                "[elsewhere](/azure/devops/intro)\n",
                "[missing](/visualstudio/debugger/missing.md)\n",
                "[icon](/visualstudio/ide/icon)\n",
            )
        );
    }

    #[test]
    fn test_replace_redirected_links_follows_chain() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "docs/docfx.json", DOCFX);
        write(
            root,
            ".openpublishing.redirection.json",
            r#"[{"source_path": "docs/ide/old.md", "redirect_url": "/visualstudio/ide/middle"},
                {"source_path": "docs/ide/middle.md", "redirect_url": "/visualstudio/ide/new"}]"#,
        );
        let toc = write(root, "docs/ide/toc.yml", "- name: Old\n  href: old.md\n");
        let article = write(
            root,
            "docs/article.md",
            "[a](ide/old.md#setup) [b](<ide/old.md>) [c](ide/old.md?tabs=x) [d](ide/kept.md)\n",
        );

        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(&root.join("docs"), &config, &storage, None).unwrap();
        let report = replace_redirected_links(&ws, None, true).unwrap();

        assert_eq!(report.replacement_count(), 3);
        assert_eq!(
            fs::read_to_string(&toc).unwrap(),
            "- name: Old\n  href: /visualstudio/ide/new\n"
        );
        assert_eq!(
            fs::read_to_string(&article).unwrap(),
            "[a](/visualstudio/ide/new#setup) [b](</visualstudio/ide/new>) [c](ide/old.md?tabs=x) [d](ide/kept.md)\n"
        );
    }

    #[test]
    fn test_redirect_cycle_leaves_link_alone() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "docs/docfx.json", DOCFX);
        write(
            root,
            ".openpublishing.redirection.json",
            r#"[{"source_path": "docs/ide/old.md", "redirect_url": "/visualstudio/ide/middle"},
                {"source_path": "docs/ide/middle.md", "redirect_url": "/visualstudio/ide/old"}]"#,
        );
        let text = "See [old](ide/old.md).\n";
        let article = write(root, "docs/article.md", text);

        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(&root.join("docs"), &config, &storage, None).unwrap();
        let report = replace_redirected_links(&ws, None, true).unwrap();

        assert!(report.changes.is_empty());
        assert!(!report.written);
        assert_eq!(fs::read_to_string(&article).unwrap(), text);
    }

    #[test]
    fn test_same_site_absolute_url_is_replaced() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "docs/docfx.json", DOCFX);
        write(
            root,
            ".openpublishing.redirection.json",
            r#"[{"source_path": "docs/ide/old.md", "redirect_url": "/visualstudio/ide/new"}]"#,
        );
        let article = write(
            root,
            "docs/article.md",
            concat!(
                "[a](https://learn.microsoft.com/en-us/visualstudio/ide/old.md)\n",
                "[b](https://example.com/visualstudio/ide/old.md)\n",
            ),
        );

        let config = Config::default();
        let storage = FsStorage::default();
        let ws = Workspace::open(&root.join("docs"), &config, &storage, None).unwrap();
        let report = replace_redirected_links(&ws, None, true).unwrap();

        assert_eq!(report.replacement_count(), 1);
        assert_eq!(
            fs::read_to_string(&article).unwrap(),
            concat!(
                "[a](/visualstudio/ide/new)\n",
                "[b](https://example.com/visualstudio/ide/old.md)\n",
            )
        );
    }
}
