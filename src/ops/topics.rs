//! Topics that no TOC links to.

use super::{delete_files, Deletion, Workspace};
use crate::config::has_extension;
use crate::error::Result;
use crate::extract::LinkKind;
use crate::index::ScanStats;
use crate::toc::{is_toc_file, LinkGraph, SearchScope};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct TopicOptions {
    /// Report topics with `redirect_url` front matter instead of skipping them.
    pub include_redirected: bool,
    /// Look for topics below the input directory's subdirectories too.
    pub recursive: bool,
}

impl Default for TopicOptions {
    fn default() -> Self {
        Self {
            include_redirected: false,
            recursive: true,
        }
    }
}

/// An orphan kept alive by a link from a non-TOC file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeptTopic {
    pub path: PathBuf,
    pub referenced_by: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TopicReport {
    pub toc_files: usize,
    pub topics_checked: usize,
    pub orphans: Vec<PathBuf>,
    pub skipped_redirected: Vec<PathBuf>,
    pub kept: Vec<KeptTopic>,
    pub deletion: Option<Deletion>,
    pub stats: ScanStats,
}

pub fn orphaned_topics(ws: &Workspace<'_>, options: TopicOptions, apply: bool) -> Result<TopicReport> {
    let root = &ws.anchor.marker_dir;
    let tocs: Vec<PathBuf> = ws
        .enumerate(root, &["toc.*"], true)?
        .into_iter()
        .filter(|p| is_toc_file(p) && has_extension(p, &["md", "yml"]))
        .collect();
    let topics: Vec<PathBuf> = ws
        .enumerate(&ws.dir, &["*.md"], options.recursive)?
        .into_iter()
        .filter(|p| ws.config.is_topic(p, root))
        .collect();
    crate::log!(
        "topics";
        "checking {} topics against {} TOC files",
        topics.len(),
        tocs.len()
    );

    let ctx = ws.context();
    let graph = LinkGraph::build(&tocs, LinkKind::TOPIC, &ctx, ws.storage);
    let unlisted: Vec<(PathBuf, bool)> = topics
        .par_iter()
        .filter(|topic| !graph.is_linked(topic, SearchScope::AnyOf(&tocs)))
        .map(|topic| (topic.clone(), is_redirected(topic, ws)))
        .collect();

    let mut report = TopicReport {
        toc_files: tocs.len(),
        topics_checked: topics.len(),
        stats: graph.stats(),
        ..TopicReport::default()
    };
    for (topic, redirected) in unlisted {
        if redirected && !options.include_redirected {
            report.skipped_redirected.push(topic);
        } else {
            report.orphans.push(topic);
        }
    }

    if apply && !report.orphans.is_empty() {
        let linking = ws.docset_files()?;
        let backlinks = LinkGraph::build(&linking, LinkKind::BACKLINK, &ctx, ws.storage);
        let mut doomed = Vec::new();
        for orphan in &report.orphans {
            let referenced_by = backlinks.linkers_of(orphan);
            if referenced_by.is_empty() {
                doomed.push(orphan.clone());
            } else {
                report.kept.push(KeptTopic {
                    path: orphan.clone(),
                    referenced_by,
                });
            }
        }
        report.deletion = Some(delete_files(&doomed, ws.storage));
    }
    Ok(report)
}

fn is_redirected(topic: &Path, ws: &Workspace<'_>) -> bool {
    match ws.storage.read_lines(topic) {
        Ok(lines) => has_redirect_metadata(&lines),
        Err(e) => {
            crate::warn!("topics"; "cannot read `{}`: {}", topic.display(), e);
            false
        }
    }
}

/// Whether the YAML front matter block sets `redirect_url`.
pub fn has_redirect_metadata<S: AsRef<str>>(lines: &[S]) -> bool {
    let Some(front_matter) = front_matter(lines) else {
        return false;
    };
    match serde_yaml::from_str::<serde_yaml::Value>(&front_matter) {
        Ok(value) => value.get("redirect_url").is_some_and(|v| !v.is_null()),
        Err(e) => {
            crate::debug!("topics"; "unparseable front matter: {}", e);
            false
        }
    }
}

/// The lines between an opening `---` on the first line and the next `---`.
fn front_matter<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    let (first, rest) = lines.split_first()?;
    let first = first.as_ref();
    if first.strip_prefix('\u{feff}').unwrap_or(first).trim_end() != "---" {
        return None;
    }
    let end = rest.iter().position(|l| l.as_ref().trim_end() == "---")?;
    let mut block = String::new();
    for line in &rest[..end] {
        block.push_str(line.as_ref().trim_end_matches('\r'));
        block.push('\n');
    }
    Some(block)
}
