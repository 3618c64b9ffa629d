//! Docset discovery: where the docset lives on disk and which URL it is
//! published under.
//!
//! Two JSON files drive this. `docfx.json` (the root marker) names the
//! content folders and carries a breadcrumb path from which the URL base
//! path is derived; the OPS publish config at the repo root lists every
//! docset in the repo.

use crate::config::Config;
use crate::error::{Result, SweepError};
use crate::resolve::normalize;
use crate::storage::Storage;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct DocFx {
    build: Option<Build>,
}

#[derive(Debug, Deserialize)]
struct Build {
    #[serde(rename = "globalMetadata", default)]
    global_metadata: Option<GlobalMetadata>,
    #[serde(default)]
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalMetadata {
    breadcrumb_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpsConfig {
    #[serde(default)]
    docsets_to_publish: Vec<PublishedDocset>,
}

#[derive(Debug, Deserialize)]
struct PublishedDocset {
    build_source_folder: String,
}

/// Resolution anchor for one docset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsetAnchor {
    /// Directory holding the root marker; `~/` links resolve against it.
    pub marker_dir: PathBuf,
    /// Directory published at the URL base path; site-relative links resolve against it.
    pub content_root: PathBuf,
    /// URL base path without surrounding slashes, e.g. `visualstudio` or `windows/uwp`.
    pub url_base: Option<String>,
    /// Every content folder of the docset, `content_root` included.
    content_roots: Vec<PathBuf>,
}

impl DocsetAnchor {
    pub fn new(marker_dir: PathBuf, content_root: PathBuf, url_base: Option<String>) -> Self {
        Self {
            marker_dir,
            content_roots: vec![content_root.clone()],
            content_root,
            url_base: url_base.and_then(|b| clean_base(&b)),
        }
    }

    /// Adds sibling content folders published under the same URL base.
    pub fn with_content_roots(mut self, roots: Vec<PathBuf>) -> Self {
        for root in roots {
            if !self.content_roots.contains(&root) {
                self.content_roots.push(root);
            }
        }
        self
    }

    /// The content folder holding `linking_dir`, so a site-relative link
    /// lands in the folder its own file is published from.
    pub fn content_root_for(&self, linking_dir: &Path) -> &Path {
        self.content_roots
            .iter()
            .filter(|root| linking_dir.starts_with(root))
            .max_by_key(|root| root.components().count())
            .unwrap_or(&self.content_root)
    }

    /// Strips `/<url_base>/` off a site-relative URL path.
    pub fn strip_site_prefix<'a>(&self, url_path: &'a str) -> Option<&'a str> {
        let base = self.url_base.as_deref()?;
        let rest = url_path.strip_prefix('/')?;
        let head = rest.get(..base.len())?;
        if !head.eq_ignore_ascii_case(base) {
            return None;
        }
        rest[base.len()..].strip_prefix('/')
    }

    /// Finds the marker directory at or above `input_dir`, reads its
    /// `docfx.json`, and picks the content folder that contains `input_dir`.
    pub fn discover(
        input_dir: &Path,
        config: &Config,
        storage: &dyn Storage,
        url_base_override: Option<&str>,
    ) -> Result<Self> {
        let marker_dir = find_root(input_dir, &config.marker_file, storage)
            .ok_or_else(|| SweepError::missing(config.marker_file.clone(), input_dir))?;
        let docfx = load_docfx(&marker_dir.join(&config.marker_file), storage)?;

        let roots = content_roots(&docfx, &marker_dir);
        let content_root = roots
            .iter()
            .find(|root| input_dir.starts_with(root))
            .cloned()
            .unwrap_or_else(|| marker_dir.clone());

        let url_base = match url_base_override {
            Some(base) => Some(base.to_string()),
            None => breadcrumb(&docfx).and_then(url_base_from_breadcrumb),
        };
        if url_base.is_none() {
            crate::debug!("docset"; "no URL base path for `{}`", marker_dir.display());
        }

        Ok(Self::new(marker_dir, content_root, url_base).with_content_roots(roots))
    }
}

/// Every docset published from one repo.
#[derive(Debug, Clone)]
pub struct DocsetCatalog {
    docsets: Vec<DocsetAnchor>,
}

impl DocsetCatalog {
    pub fn single(anchor: DocsetAnchor) -> Self {
        Self {
            docsets: vec![anchor],
        }
    }

    /// Reads the publish config at `repo_root` when present. `primary` is
    /// always part of the catalog and wins over config-derived entries.
    pub fn discover(
        repo_root: &Path,
        primary: DocsetAnchor,
        config: &Config,
        storage: &dyn Storage,
    ) -> Self {
        let mut catalog = Self::single(primary);
        let ops_path = repo_root.join(&config.publish_config);
        if !storage.exists(&ops_path) {
            return catalog;
        }
        let ops: OpsConfig = match storage
            .read_to_string(&ops_path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(ops) => ops,
            Err(e) => {
                crate::warn!("docset"; "ignoring `{}`: {}", ops_path.display(), e);
                return catalog;
            }
        };

        for published in ops.docsets_to_publish {
            let Ok(marker_dir) = normalize(&repo_root.join(&published.build_source_folder)) else {
                continue;
            };
            let docfx = match load_docfx(&marker_dir.join(&config.marker_file), storage) {
                Ok(docfx) => docfx,
                Err(e) => {
                    crate::debug!("docset"; "skipping `{}`: {}", published.build_source_folder, e);
                    continue;
                }
            };
            let Some(base) = breadcrumb(&docfx).and_then(url_base_from_breadcrumb) else {
                continue;
            };
            for content_root in content_roots(&docfx, &marker_dir) {
                catalog.docsets.push(DocsetAnchor::new(
                    marker_dir.clone(),
                    content_root,
                    Some(base.clone()),
                ));
            }
        }
        catalog
    }

    pub fn docsets(&self) -> &[DocsetAnchor] {
        &self.docsets
    }

    /// The docset whose URL base path prefixes `url_path`, and the remainder.
    /// Longer base paths win (`/windows/uwp/` before `/windows/`).
    pub fn for_url<'a>(&self, url_path: &'a str) -> Option<(&DocsetAnchor, &'a str)> {
        self.docsets
            .iter()
            .rev()
            .filter_map(|d| d.strip_site_prefix(url_path).map(|rest| (d, rest)))
            .max_by_key(|(d, _)| d.url_base.as_ref().map_or(0, String::len))
    }
}

/// Nearest directory at or above `start` that contains `marker`.
pub fn find_root(start: &Path, marker: &str, storage: &dyn Storage) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| storage.exists(&dir.join(marker)))
        .map(Path::to_path_buf)
}

fn load_docfx(path: &Path, storage: &dyn Storage) -> Result<DocFx> {
    let text = storage
        .read_to_string(path)
        .map_err(|e| SweepError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| SweepError::DocsetConfig {
        path: path.to_path_buf(),
        source,
    })
}

fn breadcrumb(docfx: &DocFx) -> Option<&str> {
    docfx
        .build
        .as_ref()?
        .global_metadata
        .as_ref()?
        .breadcrumb_path
        .as_deref()
}

fn content_roots(docfx: &DocFx, marker_dir: &Path) -> Vec<PathBuf> {
    let Some(build) = &docfx.build else {
        return Vec::new();
    };
    build
        .content
        .iter()
        .filter_map(|c| c.src.as_deref())
        .filter_map(|src| {
            let src = src.trim().trim_end_matches('/');
            if src.is_empty() || src == "." {
                Some(marker_dir.to_path_buf())
            } else {
                normalize(&marker_dir.join(src)).ok()
            }
        })
        .collect()
}

/// `/visualstudio/_breadcrumb/toc.json` → `visualstudio`.
///
/// The breadcrumb file sits two levels below the docset's URL base path.
/// Tilde-rooted breadcrumbs don't encode the base path at all.
pub fn url_base_from_breadcrumb(breadcrumb: &str) -> Option<String> {
    let breadcrumb = breadcrumb.trim();
    if breadcrumb.starts_with('~') {
        return None;
    }
    let without_file = &breadcrumb[..breadcrumb.rfind('/')?];
    let base = &without_file[..without_file.rfind('/')?];
    clean_base(base)
}

fn clean_base(base: &str) -> Option<String> {
    let base = base.trim().trim_matches('/');
    (!base.is_empty()).then(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsStorage;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_url_base_from_breadcrumb() {
        assert_eq!(
            url_base_from_breadcrumb("/visualstudio/_breadcrumb/toc.json").as_deref(),
            Some("visualstudio")
        );
        assert_eq!(
            url_base_from_breadcrumb("/windows/uwp/breadcrumbs/toc.json").as_deref(),
            Some("windows/uwp")
        );
        assert_eq!(url_base_from_breadcrumb("/breadcrumb/toc.json"), None);
        assert_eq!(url_base_from_breadcrumb("~/breadcrumb/toc.yml"), None);
        assert_eq!(url_base_from_breadcrumb("toc.json"), None);
    }

    #[test]
    fn test_strip_site_prefix() {
        let anchor = DocsetAnchor::new(
            PathBuf::from("/repo/docs"),
            PathBuf::from("/repo/docs"),
            Some("/dotnet/".to_string()),
        );
        assert_eq!(anchor.strip_site_prefix("/dotnet/core/intro"), Some("core/intro"));
        assert_eq!(anchor.strip_site_prefix("/DotNet/core"), Some("core"));
        assert_eq!(anchor.strip_site_prefix("/dotnetcore/intro"), None);
        assert_eq!(anchor.strip_site_prefix("/azure/intro"), None);
        assert_eq!(anchor.strip_site_prefix("dotnet/intro"), None);
    }

    #[test]
    fn test_find_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs/ide/media")).unwrap();
        fs::write(dir.path().join("docs/docfx.json"), "{}").unwrap();

        let storage = FsStorage::default();
        let start = dir.path().join("docs/ide/media");
        assert_eq!(
            find_root(&start, "docfx.json", &storage),
            Some(dir.path().join("docs"))
        );
        assert_eq!(find_root(&start, "no-such-marker.json", &storage), None);
    }

    #[test]
    fn test_discover_picks_content_root_and_base() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(docs.join("vs-2019/ide")).unwrap();
        fs::write(
            docs.join("docfx.json"),
            r#"{"build": {
                "content": [{"src": "./vs-2015"}, {"src": "./vs-2019"}],
                "globalMetadata": {"breadcrumb_path": "/visualstudio/_breadcrumb/toc.json"}
            }}"#,
        )
        .unwrap();

        let storage = FsStorage::default();
        let input = docs.join("vs-2019/ide");
        let anchor = DocsetAnchor::discover(&input, &Config::default(), &storage, None).unwrap();
        assert_eq!(anchor.marker_dir, docs);
        assert_eq!(anchor.content_root, docs.join("vs-2019"));
        assert_eq!(anchor.url_base.as_deref(), Some("visualstudio"));

        let overridden =
            DocsetAnchor::discover(&input, &Config::default(), &storage, Some("vs")).unwrap();
        assert_eq!(overridden.url_base.as_deref(), Some("vs"));
    }

    #[test]
    fn test_discover_without_marker() {
        let dir = TempDir::new().unwrap();
        let storage = FsStorage::default();
        let err = DocsetAnchor::discover(dir.path(), &Config::default(), &storage, None).unwrap_err();
        assert!(matches!(err, SweepError::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_catalog_from_publish_config() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join("uwp")).unwrap();
        fs::write(
            root.join("docs/docfx.json"),
            r#"{"build": {"content": [{"src": "."}],
                "globalMetadata": {"breadcrumb_path": "/windows/breadcrumb/toc.json"}}}"#,
        )
        .unwrap();
        fs::write(
            root.join("uwp/docfx.json"),
            r#"{"build": {"content": [{"src": "."}],
                "globalMetadata": {"breadcrumb_path": "/windows/uwp/breadcrumbs/toc.json"}}}"#,
        )
        .unwrap();
        fs::write(
            root.join(".openpublishing.publish.config.json"),
            r#"{"docsets_to_publish": [
                {"build_source_folder": "docs"},
                {"build_source_folder": "uwp"}
            ]}"#,
        )
        .unwrap();

        let storage = FsStorage::default();
        let primary = DocsetAnchor::new(root.join("docs"), root.join("docs"), Some("windows".into()));
        let catalog = DocsetCatalog::discover(root, primary, &Config::default(), &storage);
        assert_eq!(catalog.docsets().len(), 3);

        let (anchor, rest) = catalog.for_url("/windows/uwp/get-started/intro").unwrap();
        assert_eq!(anchor.content_root, root.join("uwp"));
        assert_eq!(rest, "get-started/intro");

        let (anchor, rest) = catalog.for_url("/windows/desktop/intro").unwrap();
        assert_eq!(anchor.content_root, root.join("docs"));
        assert_eq!(rest, "desktop/intro");

        assert!(catalog.for_url("/azure/intro").is_none());
    }
}
