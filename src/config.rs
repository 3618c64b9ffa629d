//! `.docsweep.toml` settings.
//!
//! Every key is optional. A missing file means "use the defaults", which
//! match the conventions of docfx/OPS documentation repos.

use crate::error::{Result, SweepError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// File whose presence marks a docset root (the scan boundary).
    pub marker_file: String,
    pub redirect_manifest: String,
    pub publish_config: String,
    /// Hosts whose absolute URLs may point back into this repo.
    pub site_hosts: Vec<String>,
    pub image_extensions: Vec<String>,
    pub snippet_extensions: Vec<String>,
    /// Directory names that hold INCLUDE files.
    pub include_dirs: Vec<String>,
    pub excluded_topic_dirs: Vec<String>,
    pub excluded_topic_names: Vec<String>,
    /// Glob patterns for paths that are never enumerated.
    pub exclude: Vec<String>,
    pub case_insensitive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marker_file: "docfx.json".to_string(),
            redirect_manifest: ".openpublishing.redirection.json".to_string(),
            publish_config: ".openpublishing.publish.config.json".to_string(),
            site_hosts: strings(&["docs.microsoft.com", "learn.microsoft.com"]),
            image_extensions: strings(&["png", "jpg", "gif", "svg"]),
            snippet_extensions: strings(&["cs", "vb"]),
            include_dirs: strings(&["includes", "_shared"]),
            excluded_topic_dirs: strings(&["includes", "_shared", "misc"]),
            excluded_topic_names: strings(&["toc.md", "index.md"]),
            exclude: Vec::new(),
            case_insensitive: true,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            crate::debug!("config"; "no config at `{}`, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| SweepError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn exclude_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|source| SweepError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| SweepError::InvalidPattern {
            pattern: self.exclude.join(","),
            source,
        })
    }

    /// Whether `path` lives directly in an INCLUDE directory.
    pub fn is_include(&self, path: &Path) -> bool {
        has_extension(path, &["md"])
            && path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .is_some_and(|dir| self.include_dirs.iter().any(|d| d.eq_ignore_ascii_case(dir)))
    }

    /// Topics are Markdown files that aren't shared content, TOCs or landing pages.
    /// Directory names are only checked below `root`.
    pub fn is_topic(&self, path: &Path, root: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name_excluded = relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                self.excluded_topic_names
                    .iter()
                    .any(|n| n.eq_ignore_ascii_case(name))
            });
        let dir_excluded = relative
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .filter_map(|c| c.as_os_str().to_str())
            .any(|part| {
                self.excluded_topic_dirs
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(part))
            });
        has_extension(relative, &["md"]) && !name_excluded && !dir_excluded
    }

    /// File-name patterns for the image file set.
    pub fn image_patterns(&self) -> Vec<String> {
        self.image_extensions.iter().map(|e| format!("*.{e}")).collect()
    }

    pub fn snippet_patterns(&self) -> Vec<String> {
        self.snippet_extensions.iter().map(|e| format!("*.{e}")).collect()
    }
}

/// Case-insensitive extension check.
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.as_ref().eq_ignore_ascii_case(ext)))
}
