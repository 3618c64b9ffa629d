//! Turns a link target into a canonical absolute path.
//!
//! The anchor depends on how the target is spelled:
//!
//! | target                         | resolved against                 |
//! |--------------------------------|----------------------------------|
//! | `~/media/pic.png`              | the docset's marker directory    |
//! | `/<url base>/ide/topic`        | the docset's content root        |
//! | `https://<host>/<url base>/..` | same as site-relative            |
//! | `media/pic.png`                | the linking file's directory     |
//!
//! Failures are values, not errors: most of them just mean "this link
//! points somewhere we don't manage".

use crate::docset::DocsetAnchor;
use crate::extract::LinkOccurrence;
use crate::storage::Storage;
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Longest path we'll treat as real.
const MAX_PATH_LEN: usize = 4096;

const INVALID_PATH_CHARS: &[char] = &['<', '>', '|', '"', '*', '\0'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "kebab-case")]
pub enum Unresolved {
    /// Nothing left after stripping the bookmark (`#section` links).
    Empty,
    /// Another scheme (`mailto:`, `xref:`) or an absolute URL to another site.
    External,
    /// Site-relative or absolute URL outside this docset.
    OutOfDocset,
    Malformed(String),
    /// Extension-less target with no matching file on disk.
    Missing,
    /// Extension-less target matching several files, none of them a page.
    Ambiguous(Vec<PathBuf>),
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty target"),
            Self::External => write!(f, "external link"),
            Self::OutOfDocset => write!(f, "outside this docset"),
            Self::Malformed(reason) => write!(f, "malformed path: {reason}"),
            Self::Missing => write!(f, "no matching file"),
            Self::Ambiguous(candidates) => {
                write!(f, "ambiguous target ({} candidates)", candidates.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub path: PathBuf,
    /// Lookup key for `path`, see [`lookup_key`].
    pub key: String,
    /// File the link was found in.
    pub source: PathBuf,
    pub occurrence: LinkOccurrence,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub anchor: &'a DocsetAnchor,
    pub site_hosts: &'a [String],
    pub case_insensitive: bool,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(anchor: &'a DocsetAnchor, site_hosts: &'a [String], case_insensitive: bool) -> Self {
        Self {
            anchor,
            site_hosts,
            case_insensitive,
        }
    }

    pub fn key(&self, path: &Path) -> String {
        lookup_key(path, self.case_insensitive)
    }

    pub fn resolve(
        &self,
        occurrence: &LinkOccurrence,
        linking_file: &Path,
        storage: &dyn Storage,
    ) -> Result<ResolvedReference, Unresolved> {
        let linking_dir = linking_file.parent().unwrap_or(Path::new("/"));
        let path = self.resolve_target(&occurrence.path, linking_dir, storage)?;
        Ok(ResolvedReference {
            key: self.key(&path),
            path,
            source: linking_file.to_path_buf(),
            occurrence: occurrence.clone(),
        })
    }

    /// Resolves an already-split target path (no bookmark or query).
    pub fn resolve_target(
        &self,
        target: &str,
        linking_dir: &Path,
        storage: &dyn Storage,
    ) -> Result<PathBuf, Unresolved> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Unresolved::Empty);
        }

        let site_relative;
        let target = if is_http_url(target) {
            site_relative = site_path(target, self.site_hosts).ok_or(Unresolved::External)?;
            site_relative.as_str()
        } else if target.starts_with("//") || has_uri_scheme(target) {
            return Err(Unresolved::External);
        } else {
            target
        };

        let (base_dir, relative) = if let Some(rest) = target.strip_prefix("~/") {
            (self.anchor.marker_dir.as_path(), rest)
        } else if target.starts_with('/') {
            let rest = self
                .anchor
                .strip_site_prefix(target)
                .ok_or(Unresolved::OutOfDocset)?;
            (self.anchor.content_root_for(linking_dir), rest)
        } else {
            (linking_dir, target)
        };

        if let Some(c) = relative.chars().find(|c| INVALID_PATH_CHARS.contains(c)) {
            return Err(Unresolved::Malformed(format!("invalid character {c:?}")));
        }
        let joined = base_dir.join(relative.replace('\\', "/"));
        let path = normalize(&joined)?;
        if path.as_os_str().len() > MAX_PATH_LEN {
            return Err(Unresolved::Malformed("path too long".to_string()));
        }

        if path.extension().is_none() {
            return infer_extension(&path, self.case_insensitive, storage);
        }
        Ok(path)
    }
}

/// Picks the sibling file that an extension-less link means:
/// `.md` first, then `.yml`, then the only other match.
fn infer_extension(
    path: &Path,
    case_insensitive: bool,
    storage: &dyn Storage,
) -> Result<PathBuf, Unresolved> {
    let (Some(dir), Some(stem)) = (path.parent(), path.file_name().and_then(|n| n.to_str())) else {
        return Err(Unresolved::Missing);
    };
    let same_stem = |candidate: &Path| {
        candidate
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| {
                if case_insensitive {
                    s.eq_ignore_ascii_case(stem)
                } else {
                    s == stem
                }
            })
    };
    let siblings: Vec<PathBuf> = storage
        .list_dir(dir)
        .map_err(|_| Unresolved::Missing)?
        .into_iter()
        .filter(|p| same_stem(p))
        .collect();

    for preferred in ["md", "yml"] {
        if let Some(found) = siblings
            .iter()
            .find(|p| crate::config::has_extension(p, &[preferred]))
        {
            return Ok(found.clone());
        }
    }
    match siblings.len() {
        0 => Err(Unresolved::Missing),
        1 => Ok(siblings[0].clone()),
        _ => Err(Unresolved::Ambiguous(siblings)),
    }
}

/// Collapses `.` and `..` without touching the file system.
/// Climbing above the root is an error rather than silently clamped.
pub fn normalize(path: &Path) -> Result<PathBuf, Unresolved> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(Unresolved::Malformed(format!(
                        "`{}` climbs above the file system root",
                        path.display()
                    )));
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }
    Ok(out)
}

/// Map key for a path: forward slashes, lower-cased when the docs tree is
/// treated as case-insensitive.
pub fn lookup_key(path: &Path, case_insensitive: bool) -> String {
    let key = path.to_string_lossy().replace('\\', "/");
    if case_insensitive {
        key.to_lowercase()
    } else {
        key
    }
}

/// Forward-slash path from `from_dir` to `to`. Both must be absolute and normalized.
pub fn relative_link(from_dir: &Path, to: &Path) -> String {
    let from: Vec<_> = from_dir.components().collect();
    let target: Vec<_> = to.components().collect();
    let common = from
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat("..".to_string()).take(from.len() - common));
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

pub fn is_http_url(target: &str) -> bool {
    let lower = target.get(..8).unwrap_or(target).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `mailto:`, `xref:` and friends. Single letters are drive letters, not schemes.
pub fn has_uri_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    scheme.len() > 1
        && first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Reduces `https://<host>/<locale>/<path>` to `/<path>` when `host` is one of ours.
/// The locale segment (`en-us`) is optional.
pub fn site_path(url: &str, hosts: &[String]) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    if !hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
        return None;
    }
    let path = match path.split_once('/') {
        Some((first, after)) if is_locale(first) => after,
        _ => path,
    };
    Some(format!("/{path}"))
}

fn is_locale(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 5
        && bytes[2] == b'-'
        && bytes[..2].iter().chain(&bytes[3..]).all(u8::is_ascii_alphabetic)
}
