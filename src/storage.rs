//! File system access behind a small trait.
//!
//! The scan code only ever talks to [`Storage`], so every operation can run
//! against the real tree ([`FsStorage`]) while tests build throwaway trees.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub trait Storage: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        Ok(self
            .read_to_string(path)?
            .lines()
            .map(str::to_owned)
            .collect())
    }

    fn write(&self, path: &Path, text: &str) -> io::Result<()>;

    fn delete(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Files directly inside `dir`, sorted.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Files under `dir` whose name matches any of `patterns`
    /// (case-insensitive globs such as `*.md` or `TOC.*`), sorted.
    fn enumerate_files(
        &self,
        dir: &Path,
        patterns: &[&str],
        recursive: bool,
    ) -> io::Result<Vec<PathBuf>>;
}

/// The real file system. Enumeration skips hidden entries and honours
/// `.gitignore`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

fn name_matcher(patterns: &[&str]) -> io::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

impl Storage for FsStorage {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, text: &str) -> io::Result<()> {
        fs::write(path, text)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn enumerate_files(
        &self,
        dir: &Path,
        patterns: &[&str],
        recursive: bool,
    ) -> io::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("`{}` is not a directory", dir.display()),
            ));
        }
        let names = name_matcher(patterns)?;

        let mut builder = WalkBuilder::new(dir);
        builder.hidden(true).git_ignore(true).git_global(true);
        if !recursive {
            builder.max_depth(Some(1));
        }

        let mut files = Vec::new();
        for entry in builder.build().filter_map(|e| e.ok()) {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(name) = path.file_name() else {
                continue;
            };
            if !names.is_match(Path::new(name)) {
                continue;
            }
            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }
}
