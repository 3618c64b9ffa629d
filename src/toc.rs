//! Topic link graph: which file links to which topic.
//!
//! Built once over a file set (the TOCs, or every Markdown/YAML file for the
//! backlink check) and then queried per candidate.

use crate::extract::{extract_kinds, LinkKind};
use crate::index::ScanStats;
use crate::resolve::{ResolutionContext, ResolvedReference, Unresolved};
use crate::storage::Storage;
use ahash::AHashMap;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Where to look for a link to a candidate.
#[derive(Debug, Clone, Copy)]
pub enum SearchScope<'a> {
    File(&'a Path),
    AnyOf(&'a [PathBuf]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyMode {
    /// How many different files link to the target.
    DistinctFiles,
    /// How many links point at the target in total.
    Occurrences,
}

#[derive(Debug, Default)]
struct Outgoing {
    /// Target key → number of links.
    targets: AHashMap<String, usize>,
}

#[derive(Debug)]
struct Incoming {
    path: PathBuf,
    sources: Vec<(PathBuf, usize)>,
}

#[derive(Debug)]
pub struct LinkGraph {
    case_insensitive: bool,
    outgoing: AHashMap<String, Outgoing>,
    incoming: AHashMap<String, Incoming>,
    stats: ScanStats,
}

pub fn is_toc_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.get(..4))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("toc."))
}

impl LinkGraph {
    /// Scans `files` for links of `kinds`.
    pub fn build(
        files: &[PathBuf],
        kinds: &[LinkKind],
        ctx: &ResolutionContext<'_>,
        storage: &dyn Storage,
    ) -> Self {
        let scanned: Vec<(PathBuf, Vec<ResolvedReference>, ScanStats)> = files
            .par_iter()
            .map(|file| {
                let (links, stats) = topic_links(file, kinds, ctx, storage);
                (file.clone(), links, stats)
            })
            .collect();

        let mut graph = Self {
            case_insensitive: ctx.case_insensitive,
            outgoing: AHashMap::with_capacity(scanned.len()),
            incoming: AHashMap::new(),
            stats: ScanStats::default(),
        };
        for (source, links, stats) in scanned {
            graph.stats = graph.stats.merge(stats);
            let mut outgoing = Outgoing::default();
            for reference in &links {
                *outgoing.targets.entry(reference.key.clone()).or_default() += 1;
            }
            for reference in links {
                let count = outgoing.targets.get(&reference.key).copied().unwrap_or(0);
                let incoming = graph
                    .incoming
                    .entry(reference.key)
                    .or_insert_with(|| Incoming {
                        path: reference.path,
                        sources: Vec::new(),
                    });
                if !incoming.sources.iter().any(|(s, _)| s == &reference.source) {
                    incoming.sources.push((reference.source, count));
                }
            }
            graph
                .outgoing
                .insert(crate::resolve::lookup_key(&source, graph.case_insensitive), outgoing);
        }
        for incoming in graph.incoming.values_mut() {
            incoming.sources.sort();
        }
        graph
    }

    fn key(&self, path: &Path) -> String {
        crate::resolve::lookup_key(path, self.case_insensitive)
    }

    /// Whether any file in `scope` links to `candidate`. A file linking to
    /// itself doesn't count, and scope files outside the graph never match.
    pub fn is_linked(&self, candidate: &Path, scope: SearchScope<'_>) -> bool {
        let target = self.key(candidate);
        let links_from = |file: &Path| {
            let source = self.key(file);
            source != target
                && self
                    .outgoing
                    .get(&source)
                    .is_some_and(|o| o.targets.contains_key(&target))
        };
        match scope {
            SearchScope::File(file) => links_from(file),
            SearchScope::AnyOf(files) => files.iter().any(|f| links_from(f.as_path())),
        }
    }

    /// Files linking to `candidate`, sorted, excluding the candidate itself.
    pub fn linkers_of(&self, candidate: &Path) -> Vec<PathBuf> {
        let target = self.key(candidate);
        self.incoming
            .get(&target)
            .map(|i| {
                i.sources
                    .iter()
                    .filter(|(s, _)| self.key(s) != target)
                    .map(|(s, _)| s.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Link tally per target, highest first.
    pub fn tally(&self, mode: TallyMode) -> Vec<(PathBuf, usize)> {
        let mut tally: Vec<(PathBuf, usize)> = self
            .incoming
            .values()
            .map(|i| {
                let n = match mode {
                    TallyMode::DistinctFiles => i.sources.len(),
                    TallyMode::Occurrences => i.sources.iter().map(|(_, n)| n).sum(),
                };
                (i.path.clone(), n)
            })
            .collect();
        tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tally
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}

fn topic_links(
    file: &Path,
    kinds: &[LinkKind],
    ctx: &ResolutionContext<'_>,
    storage: &dyn Storage,
) -> (Vec<ResolvedReference>, ScanStats) {
    let mut stats = ScanStats {
        files_scanned: 1,
        ..ScanStats::default()
    };
    let text = match storage.read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            crate::warn!("toc"; "cannot read `{}`: {}", file.display(), e);
            stats.unreadable = 1;
            return (Vec::new(), stats);
        }
    };

    let mut links = Vec::new();
    for occurrence in extract_kinds(&text, kinds) {
        stats.occurrences += 1;
        match ctx.resolve(&occurrence, file, storage) {
            Ok(reference) => {
                stats.resolved += 1;
                links.push(reference);
            }
            Err(Unresolved::Malformed(reason)) => {
                stats.malformed += 1;
                crate::warn!(
                    "toc";
                    "possible bad link `{}` in `{}` line {}: {}",
                    occurrence.raw, file.display(), occurrence.line, reason
                );
            }
            Err(_) => {}
        }
    }
    stats.counted = links.len();
    (links, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docset::DocsetAnchor;
    use crate::storage::FsStorage;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    fn graph(root: &Path, files: &[PathBuf]) -> LinkGraph {
        let anchor = DocsetAnchor::new(root.to_path_buf(), root.to_path_buf(), Some("docs".into()));
        let hosts: Vec<String> = Vec::new();
        let ctx = ResolutionContext::new(&anchor, &hosts, true);
        LinkGraph::build(files, LinkKind::TOPIC, &ctx, &FsStorage::default())
    }

    #[test]
    fn test_is_toc_file() {
        assert!(is_toc_file(Path::new("/d/TOC.md")));
        assert!(is_toc_file(Path::new("/d/toc.yml")));
        assert!(!is_toc_file(Path::new("/d/toc-old.md")));
        assert!(!is_toc_file(Path::new("/d/mytoc.yml")));
    }

    #[test]
    fn test_markdown_and_yaml_tocs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let topic1 = write(root, "topic1.md", "");
        let topic2 = write(root, "topic2.md", "");
        let nested = write(root, "ide/nested.md", "");
        let md_toc = write(root, "toc.md", "# [Topic](topic1.md)\n");
        let yml_toc = write(root, "ide/TOC.yml", "- name: Nested\n  href: Nested.md\n");

        let tocs = vec![md_toc.clone(), yml_toc.clone()];
        let graph = graph(root, &tocs);
        assert!(graph.is_linked(&topic1, SearchScope::File(&md_toc)));
        assert!(!graph.is_linked(&topic1, SearchScope::File(&yml_toc)));
        assert!(graph.is_linked(&nested, SearchScope::AnyOf(&tocs)));
        assert!(!graph.is_linked(&topic2, SearchScope::AnyOf(&tocs)));
    }

    #[test]
    fn test_self_links_are_ignored() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let a = write(root, "a.md", "[top](a.md#top)\n");
        let b = write(root, "b.md", "[a](a.md)\n");

        let only_a = vec![a.clone()];
        assert!(!graph(root, &only_a).is_linked(&a, SearchScope::AnyOf(&only_a)));

        let both = vec![a.clone(), b.clone()];
        let graph = graph(root, &both);
        assert!(graph.is_linked(&a, SearchScope::AnyOf(&both)));
        assert_eq!(graph.linkers_of(&a), vec![b]);
    }

    #[test]
    fn test_tally_modes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "popular.md", "");
        write(root, "single.md", "");
        let toc1 = write(root, "toc.yml", "- href: popular.md\n- href: single.md\n");
        let toc2 = write(
            root,
            "other/toc.md",
            "# [P](../popular.md)\n## [Again](../popular.md#intro)\n",
        );

        let graph = graph(root, &[toc1, toc2]);
        let distinct = graph.tally(TallyMode::DistinctFiles);
        assert_eq!(distinct[0], (root.join("popular.md"), 2));
        assert_eq!(distinct[1], (root.join("single.md"), 1));

        let occurrences = graph.tally(TallyMode::Occurrences);
        assert_eq!(occurrences[0], (root.join("popular.md"), 3));
    }
}
