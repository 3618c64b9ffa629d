//! Redirect manifest handling and hop collapsing.
//!
//! The manifest (`.openpublishing.redirection.json`) maps repo-relative
//! source files to site-relative URLs. A "hop" is a redirect whose target is
//! itself redirected; collapsing points every source straight at the end of
//! its chain.

use crate::docset::DocsetCatalog;
use crate::error::{Result, SweepError};
use crate::resolve::{is_http_url, lookup_key, normalize, site_path};
use crate::storage::Storage;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path_from_root: Option<String>,
    pub redirect_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_document_id: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monikers: Option<Vec<String>>,
    /// Fields we don't model, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Source file as an absolute, normalized path. Filled in on load.
    #[serde(skip)]
    pub absolute_source: Option<PathBuf>,
}

impl Redirect {
    /// The source as written in the manifest.
    pub fn source_label(&self) -> &str {
        self.source_path
            .as_deref()
            .or(self.source_path_from_root.as_deref())
            .unwrap_or("<no source>")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Array,
    /// `{"redirections": [...]}`, with the full original object kept for its other keys.
    Object(Map<String, Value>),
}

#[derive(Debug, Clone)]
pub struct RedirectManifest {
    pub path: PathBuf,
    shape: Shape,
    pub redirections: Vec<Redirect>,
}

impl RedirectManifest {
    pub fn load(path: &Path, storage: &dyn Storage) -> Result<Self> {
        let text = storage
            .read_to_string(path)
            .map_err(|e| SweepError::io(path, e))?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let parse_error = |source| SweepError::ManifestParse {
            path: path.to_path_buf(),
            source,
        };
        let value: Value = serde_json::from_str(text).map_err(parse_error)?;
        let (shape, records) = match value {
            Value::Array(records) => (Shape::Array, Value::Array(records)),
            Value::Object(object) => {
                let records = object.get("redirections").cloned().ok_or_else(|| {
                    parse_error(serde::de::Error::custom("missing `redirections` array"))
                })?;
                (Shape::Object(object), records)
            }
            _ => {
                return Err(parse_error(serde::de::Error::custom(
                    "expected an array or an object with `redirections`",
                )))
            }
        };
        let mut redirections: Vec<Redirect> =
            serde_json::from_value(records).map_err(parse_error)?;

        let base = path.parent().unwrap_or(Path::new(""));
        for redirect in &mut redirections {
            redirect.absolute_source = absolute_source(redirect, base);
        }
        Ok(Self {
            path: path.to_path_buf(),
            shape,
            redirections,
        })
    }

    /// Pretty JSON with nulls omitted, ready to write.
    pub fn to_json(&self) -> Result<String> {
        let records = serde_json::to_value(&self.redirections)?;
        let value = match &self.shape {
            Shape::Array => records,
            Shape::Object(original) => {
                let mut object = original.clone();
                object.insert("redirections".to_string(), records);
                Value::Object(object)
            }
        };
        let mut text = serde_json::to_string_pretty(&value)?;
        text.push('\n');
        Ok(text)
    }

    /// Serializes first, then writes, so a failure never leaves half a file.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let text = self.to_json()?;
        storage
            .write(&self.path, &text)
            .map_err(|e| SweepError::io(&self.path, e))
    }

    pub fn lookup(&self, case_insensitive: bool) -> RedirectLookup {
        let mut targets = AHashMap::with_capacity(self.redirections.len());
        for redirect in &self.redirections {
            if let Some(source) = &redirect.absolute_source {
                targets.insert(
                    lookup_key(source, case_insensitive),
                    redirect.redirect_url.clone(),
                );
            }
        }
        RedirectLookup {
            targets,
            case_insensitive,
        }
    }
}

fn absolute_source(redirect: &Redirect, base: &Path) -> Option<PathBuf> {
    let relative = redirect
        .source_path
        .as_deref()
        .or(redirect.source_path_from_root.as_deref())?
        .replace('\\', "/");
    normalize(&base.join(relative.trim_start_matches('/'))).ok()
}

/// Source file key → redirect URL. Duplicate sources: the last one wins.
#[derive(Debug, Clone, Default)]
pub struct RedirectLookup {
    targets: AHashMap<String, String>,
    case_insensitive: bool,
}

impl RedirectLookup {
    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.targets.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HopStop {
    /// The target isn't redirected any further.
    Final,
    /// The target lives in a docset we don't have files for.
    CrossDocset,
    /// A redirect points at itself.
    SelfCycle,
    /// The chain comes back to a source it already passed.
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopResolution {
    /// Unchanged start target when the chain is a cycle.
    pub final_url: String,
    pub hops: usize,
    pub stop: HopStop,
}

enum TargetKind {
    Outside,
    NotRedirected,
    Redirected(String),
}

/// Everything needed to turn a redirect URL back into a source file key.
#[derive(Debug, Clone, Copy)]
pub struct HopContext<'a> {
    pub lookup: &'a RedirectLookup,
    pub catalog: &'a DocsetCatalog,
    pub site_hosts: &'a [String],
}

impl HopContext<'_> {
    fn classify(&self, url: &str) -> TargetKind {
        let url = url.split(['#', '?']).next().unwrap_or_default();
        let site_relative;
        let url_path = if is_http_url(url) {
            match site_path(url, self.site_hosts) {
                Some(path) => {
                    site_relative = path;
                    site_relative.as_str()
                }
                None => return TargetKind::Outside,
            }
        } else {
            url
        };
        let Some((docset, rest)) = self.catalog.for_url(url_path) else {
            return TargetKind::Outside;
        };

        let rest = if rest.is_empty() || rest.ends_with('/') {
            format!("{rest}index")
        } else {
            rest.to_string()
        };
        let has_extension = Path::new(&rest).extension().is_some();
        let candidates: Vec<String> = if has_extension {
            vec![rest]
        } else {
            vec![format!("{rest}.md"), format!("{rest}.yml")]
        };
        candidates
            .iter()
            .filter_map(|c| normalize(&docset.content_root.join(c)).ok())
            .map(|p| lookup_key(&p, self.lookup.case_insensitive))
            .find(|key| self.lookup.targets.contains_key(key))
            .map_or(TargetKind::NotRedirected, TargetKind::Redirected)
    }

    /// Follows `start_target` through the lookup until it stops being a
    /// redirect source. `start_key` is the key of the redirect's own source.
    pub fn resolve_final_target(&self, start_key: &str, start_target: &str) -> HopResolution {
        let mut visited = AHashSet::new();
        visited.insert(start_key.to_string());
        let mut current = start_target.to_string();
        let mut hops = 0;

        loop {
            let key = match self.classify(&current) {
                TargetKind::Outside => {
                    return HopResolution {
                        final_url: current,
                        hops,
                        stop: HopStop::CrossDocset,
                    }
                }
                TargetKind::NotRedirected => {
                    return HopResolution {
                        final_url: current,
                        hops,
                        stop: HopStop::Final,
                    }
                }
                TargetKind::Redirected(key) => key,
            };
            let next = self.lookup.get_key(&key).unwrap_or_default();
            let stop = if next == current {
                Some(HopStop::SelfCycle)
            } else if !visited.insert(key) {
                Some(HopStop::Cycle)
            } else {
                None
            };
            if let Some(stop) = stop {
                return HopResolution {
                    final_url: start_target.to_string(),
                    hops: 0,
                    stop,
                };
            }
            current = next.to_string();
            hops += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollapsedHop {
    pub source: String,
    pub from: String,
    pub to: String,
    pub hops: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleWarning {
    pub source: String,
    pub target: String,
    pub kind: HopStop,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HopReport {
    pub collapsed: Vec<CollapsedHop>,
    pub cycles: Vec<CycleWarning>,
}

/// Points every redirect at the end of its chain. All chains are resolved
/// against the manifest as loaded, then applied, so the result doesn't depend
/// on record order and a second pass changes nothing.
pub fn collapse_hops(
    manifest: &mut RedirectManifest,
    catalog: &DocsetCatalog,
    site_hosts: &[String],
    case_insensitive: bool,
) -> HopReport {
    let lookup = manifest.lookup(case_insensitive);
    let hops = HopContext {
        lookup: &lookup,
        catalog,
        site_hosts,
    };
    let resolutions: Vec<Option<HopResolution>> = manifest
        .redirections
        .iter()
        .map(|r| {
            let source = r.absolute_source.as_deref()?;
            Some(hops.resolve_final_target(&lookup_key(source, case_insensitive), &r.redirect_url))
        })
        .collect();

    let mut report = HopReport::default();
    for (redirect, resolution) in manifest.redirections.iter_mut().zip(resolutions) {
        let Some(resolution) = resolution else {
            continue;
        };
        match resolution.stop {
            HopStop::SelfCycle | HopStop::Cycle => {
                crate::warn!(
                    "redirects";
                    "`{}` is part of a redirect cycle through `{}`, left as is",
                    redirect.source_label(), redirect.redirect_url
                );
                report.cycles.push(CycleWarning {
                    source: redirect.source_label().to_string(),
                    target: redirect.redirect_url.clone(),
                    kind: resolution.stop,
                });
            }
            HopStop::Final | HopStop::CrossDocset => {
                if resolution.final_url != redirect.redirect_url {
                    crate::debug!(
                        "redirects";
                        "`{}`: `{}` -> `{}`",
                        redirect.source_label(), redirect.redirect_url, resolution.final_url
                    );
                    report.collapsed.push(CollapsedHop {
                        source: redirect.source_label().to_string(),
                        from: std::mem::replace(&mut redirect.redirect_url, resolution.final_url),
                        to: redirect.redirect_url.clone(),
                        hops: resolution.hops,
                    });
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docset::DocsetAnchor;

    const MANIFEST: &str = r#"{
  "redirections": [
    {
      "source_path": "docs/ide/old.md",
      "redirect_url": "/visualstudio/ide/middle",
      "redirect_document_id": true
    },
    {
      "source_path": "docs/ide/middle.md",
      "redirect_url": "/visualstudio/ide/final#top",
      "monikers": ["vs-2019"]
    },
    {
      "source_path_from_root": "/docs/ide/away.md",
      "redirect_url": "/azure/devops/elsewhere",
      "custom": 7
    }
  ]
}"#;

    fn catalog() -> DocsetCatalog {
        let root = PathBuf::from("/repo/docs");
        DocsetCatalog::single(DocsetAnchor::new(root.clone(), root, Some("visualstudio".into())))
    }

    fn manifest(text: &str) -> RedirectManifest {
        RedirectManifest::parse(Path::new("/repo/.openpublishing.redirection.json"), text).unwrap()
    }

    #[test]
    fn test_parse_resolves_sources() {
        let manifest = manifest(MANIFEST);
        assert_eq!(manifest.redirections.len(), 3);
        assert_eq!(
            manifest.redirections[0].absolute_source.as_deref(),
            Some(Path::new("/repo/docs/ide/old.md"))
        );
        assert_eq!(
            manifest.redirections[2].absolute_source.as_deref(),
            Some(Path::new("/repo/docs/ide/away.md"))
        );
        assert_eq!(manifest.redirections[2].extra["custom"], 7);
    }

    #[test]
    fn test_round_trip_keeps_records() {
        let original = manifest(MANIFEST);
        let reparsed = manifest(&original.to_json().unwrap());
        assert_eq!(original.redirections, reparsed.redirections);
        let text = original.to_json().unwrap();
        assert!(!text.contains("null"));
        assert!(text.contains("\"custom\": 7"));
    }

    #[test]
    fn test_array_manifest_and_nulls() {
        let manifest = manifest(
            r#"[{"source_path": "a.md", "redirect_url": "/x/b", "monikers": null}]"#,
        );
        let text = manifest.to_json().unwrap();
        assert!(text.trim_start().starts_with('['));
        assert!(!text.contains("monikers"));
    }

    #[test]
    fn test_parse_errors() {
        let path = Path::new("r.json");
        assert!(matches!(
            RedirectManifest::parse(path, "{ not json"),
            Err(SweepError::ManifestParse { .. })
        ));
        assert!(matches!(
            RedirectManifest::parse(path, r#"{"other": []}"#),
            Err(SweepError::ManifestParse { .. })
        ));
    }

    #[test]
    fn test_lookup_last_write_wins() {
        let manifest = manifest(
            r#"[{"source_path": "docs/A.md", "redirect_url": "/x/one"},
                {"source_path": "docs/a.md", "redirect_url": "/x/two"}]"#,
        );
        let lookup = manifest.lookup(true);
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.get_key("/repo/docs/a.md"), Some("/x/two"));
    }

    #[test]
    fn test_collapse_follows_chain() {
        let mut manifest = manifest(MANIFEST);
        let report = collapse_hops(&mut manifest, &catalog(), &[], true);
        assert_eq!(report.collapsed.len(), 1);
        assert_eq!(report.collapsed[0].from, "/visualstudio/ide/middle");
        assert_eq!(report.collapsed[0].to, "/visualstudio/ide/final#top");
        assert_eq!(manifest.redirections[0].redirect_url, "/visualstudio/ide/final#top");
        assert_eq!(manifest.redirections[2].redirect_url, "/azure/devops/elsewhere");
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let mut manifest = manifest(MANIFEST);
        collapse_hops(&mut manifest, &catalog(), &[], true);
        let once = manifest.to_json().unwrap();
        let second = collapse_hops(&mut manifest, &catalog(), &[], true);
        assert!(second.collapsed.is_empty());
        assert_eq!(manifest.to_json().unwrap(), once);
    }

    #[test]
    fn test_two_cycle_terminates_unchanged() {
        let mut manifest = manifest(
            r#"[{"source_path": "docs/a.md", "redirect_url": "/visualstudio/b"},
                {"source_path": "docs/b.md", "redirect_url": "/visualstudio/a"}]"#,
        );
        let report = collapse_hops(&mut manifest, &catalog(), &[], true);
        assert!(report.collapsed.is_empty());
        assert_eq!(report.cycles.len(), 2);
        assert_eq!(manifest.redirections[0].redirect_url, "/visualstudio/b");
        assert_eq!(manifest.redirections[1].redirect_url, "/visualstudio/a");
    }

    #[test]
    fn test_self_and_long_cycles() {
        let mut manifest = manifest(
            r#"[{"source_path": "docs/self.md", "redirect_url": "/visualstudio/self"},
                {"source_path": "docs/a.md", "redirect_url": "/visualstudio/b"},
                {"source_path": "docs/b.md", "redirect_url": "/visualstudio/c"},
                {"source_path": "docs/c.md", "redirect_url": "/visualstudio/b"}]"#,
        );
        let report = collapse_hops(&mut manifest, &catalog(), &[], true);
        assert_eq!(report.cycles[0].kind, HopStop::SelfCycle);
        assert!(report.cycles.iter().skip(1).all(|c| c.kind == HopStop::Cycle));
        assert_eq!(report.cycles.len(), 4);
        assert!(report.collapsed.is_empty());
    }

    #[test]
    fn test_absolute_urls_and_index_pages() {
        let mut manifest = manifest(
            r#"[{"source_path": "docs/old.md", "redirect_url": "https://learn.microsoft.com/en-us/visualstudio/ide/"},
                {"source_path": "docs/ide/index.yml", "redirect_url": "/visualstudio/get-started/"}]"#,
        );
        let hosts = vec!["learn.microsoft.com".to_string()];
        let report = collapse_hops(&mut manifest, &catalog(), &hosts, true);
        assert_eq!(report.collapsed.len(), 1);
        assert_eq!(report.collapsed[0].hops, 1);
        assert_eq!(manifest.redirections[0].redirect_url, "/visualstudio/get-started/");
    }
}
