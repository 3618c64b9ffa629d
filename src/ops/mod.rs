//! The user-facing operations. Each one takes a directory and an `apply`
//! flag, does its scanning without side effects, and only then deletes or
//! writes when `apply` is set.

pub mod duplicates;
pub mod media;
pub mod redirects;
pub mod rewrite;
pub mod topics;

use crate::config::Config;
use crate::docset::{find_root, DocsetAnchor, DocsetCatalog};
use crate::error::{Result, SweepError};
use crate::redirect::RedirectManifest;
use crate::resolve::{normalize, ResolutionContext};
use crate::storage::Storage;
use globset::GlobSet;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Markdown and YAML: the files that can contain links.
pub const LINKING_PATTERNS: &[&str] = &["*.md", "*.yml"];

/// A validated input directory together with its docset.
pub struct Workspace<'a> {
    pub dir: PathBuf,
    pub anchor: DocsetAnchor,
    pub config: &'a Config,
    pub storage: &'a dyn Storage,
    /// Configured `exclude` globs, matched relative to the marker directory.
    exclude: GlobSet,
}

impl<'a> Workspace<'a> {
    pub fn open(
        dir: &Path,
        config: &'a Config,
        storage: &'a dyn Storage,
        url_base_override: Option<&str>,
    ) -> Result<Self> {
        if !storage.is_dir(dir) {
            return Err(SweepError::DirectoryNotFound(dir.to_path_buf()));
        }
        let absolute = std::path::absolute(dir).map_err(|e| SweepError::io(dir, e))?;
        let dir = normalize(&absolute).map_err(|_| SweepError::DirectoryNotFound(absolute.clone()))?;
        let exclude = config.exclude_set()?;
        let anchor = DocsetAnchor::discover(&dir, config, storage, url_base_override)?;
        crate::debug!(
            "workspace";
            "docset root `{}`, content root `{}`, base `{}`",
            anchor.marker_dir.display(),
            anchor.content_root.display(),
            anchor.url_base.as_deref().unwrap_or("-")
        );
        Ok(Self {
            dir,
            anchor,
            config,
            storage,
            exclude,
        })
    }

    pub fn context(&self) -> ResolutionContext<'_> {
        ResolutionContext::new(&self.anchor, &self.config.site_hosts, self.config.case_insensitive)
    }

    /// Files under `dir` matching `patterns`, minus the configured excludes.
    /// Excludes are matched against the path below the marker directory, so
    /// a file is excluded the same way whichever directory the walk starts at.
    pub fn enumerate<S: AsRef<str>>(
        &self,
        dir: &Path,
        patterns: &[S],
        recursive: bool,
    ) -> Result<Vec<PathBuf>> {
        let patterns: Vec<&str> = patterns.iter().map(AsRef::as_ref).collect();
        let files = self
            .storage
            .enumerate_files(dir, &patterns, recursive)
            .map_err(|e| SweepError::io(dir, e))?;
        Ok(files.into_iter().filter(|f| !self.is_excluded(f)).collect())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.anchor.marker_dir).unwrap_or(path);
        self.exclude.is_match(relative)
    }

    /// Every Markdown/YAML file in the docset, the set that can keep something alive.
    pub fn docset_files(&self) -> Result<Vec<PathBuf>> {
        self.enumerate(&self.anchor.marker_dir, LINKING_PATTERNS, true)
    }

    /// Markdown/YAML files under the input directory.
    pub fn input_files(&self) -> Result<Vec<PathBuf>> {
        self.enumerate(&self.dir, LINKING_PATTERNS, true)
    }

    pub fn require_url_base(&self) -> Result<&str> {
        self.anchor
            .url_base
            .as_deref()
            .ok_or_else(|| SweepError::missing("the docset URL base path", &self.anchor.marker_dir))
    }

    /// The redirect manifest given on the command line, or the nearest one
    /// at or above the input directory.
    pub fn find_manifest(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return if self.storage.exists(path) {
                Ok(path.to_path_buf())
            } else {
                Err(SweepError::missing(path.display().to_string(), &self.dir))
            };
        }
        find_root(&self.dir, &self.config.redirect_manifest, self.storage)
            .map(|root| root.join(&self.config.redirect_manifest))
            .ok_or_else(|| SweepError::missing(self.config.redirect_manifest.clone(), &self.dir))
    }

    /// Loads the manifest and the docsets its URLs may point into.
    pub fn load_redirects(&self, explicit: Option<&Path>) -> Result<(RedirectManifest, DocsetCatalog)> {
        self.require_url_base()?;
        let path = self.find_manifest(explicit)?;
        let manifest = RedirectManifest::load(&path, self.storage)?;
        let repo_root = path.parent().unwrap_or(Path::new("."));
        let catalog =
            DocsetCatalog::discover(repo_root, self.anchor.clone(), self.config, self.storage);
        crate::log!(
            "redirects";
            "loaded {} redirects from `{}`",
            manifest.redirections.len(),
            path.display()
        );
        crate::debug!("redirects"; "{} docsets known", catalog.docsets().len());
        Ok((manifest, catalog))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
}

/// Deletes each file on its own; one failure doesn't stop the rest.
pub fn delete_files(files: &[PathBuf], storage: &dyn Storage) -> Deletion {
    let mut deletion = Deletion::default();
    for path in files {
        match storage.delete(path) {
            Ok(()) => {
                crate::debug!("delete"; "deleted `{}`", path.display());
                deletion.deleted.push(path.clone());
            }
            Err(e) => {
                crate::warn!("delete"; "could not delete `{}`: {}", path.display(), e);
                deletion.failed.push(FileFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    deletion
}
