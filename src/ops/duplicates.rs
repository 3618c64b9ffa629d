//! Topics that appear in more than one TOC, or more than once in one.

use super::Workspace;
use crate::config::has_extension;
use crate::error::Result;
use crate::extract::LinkKind;
use crate::toc::{is_toc_file, LinkGraph, SearchScope, TallyMode};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularTopic {
    pub path: PathBuf,
    pub count: usize,
    /// The TOC files listing the topic.
    pub tocs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub toc_files: usize,
    pub within_toc: bool,
    pub topics: Vec<PopularTopic>,
}

pub fn find_duplicates(ws: &Workspace<'_>, within_toc: bool) -> Result<DuplicateReport> {
    let mut tocs: Vec<PathBuf> = ws
        .enumerate(&ws.anchor.marker_dir, &["toc.*"], true)?
        .into_iter()
        .filter(|p| is_toc_file(p) && has_extension(p, &["md", "yml"]))
        .collect();
    tocs.sort();
    crate::log!("multiples"; "tallying links from {} TOC files", tocs.len());

    let graph = LinkGraph::build(&tocs, LinkKind::TOPIC, &ws.context(), ws.storage);
    let mode = if within_toc {
        TallyMode::Occurrences
    } else {
        TallyMode::DistinctFiles
    };
    let topics = graph
        .tally(mode)
        .into_iter()
        .filter(|(path, count)| *count > 1 && has_extension(path, &["md"]))
        .map(|(path, count)| PopularTopic {
            tocs: tocs
                .iter()
                .filter(|toc| graph.is_linked(&path, SearchScope::File(toc)))
                .cloned()
                .collect(),
            path,
            count,
        })
        .collect();

    Ok(DuplicateReport {
        toc_files: tocs.len(),
        within_toc,
        topics,
    })
}
