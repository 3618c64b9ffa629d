//! Link discovery over Markdown and YAML text.
//!
//! Each link syntax has its own pattern. They run independently over the
//! whole text body, so a single line can yield several occurrences of
//! different kinds. Where two patterns capture the same target (an INCLUDE
//! directive is also a `](path)` link), the more specific kind wins.
//!
//! Targets keep their raw spelling and byte span so rewrites can splice
//! replacements in place; [`split_target`] does the shared bookmark/query
//! stripping.

use regex::{Captures, Regex};
use serde::Serialize;
use std::ops::Range;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// `[text](path)` or `![alt](path "title")`
    Inline,
    /// `[label]: path`
    Reference,
    /// `<img src="path">`
    HtmlImage,
    /// `href: path`
    YamlHref,
    /// `[!INCLUDE [title](path)]`
    Include,
    /// `:::image source="path" lightbox="path2":::`
    TripleColonImage,
    /// `imageSrc: path`
    ImageSrc,
    /// `:::code source="path":::`
    CodeDirective,
}

impl LinkKind {
    /// Syntaxes that link one topic to another (TOC entries, cross references).
    pub const TOPIC: &'static [LinkKind] = &[LinkKind::Inline, LinkKind::Reference, LinkKind::YamlHref];

    /// Everything that keeps a topic alive outside a TOC: topic links plus INCLUDEs.
    pub const BACKLINK: &'static [LinkKind] = &[
        LinkKind::Inline,
        LinkKind::Reference,
        LinkKind::YamlHref,
        LinkKind::Include,
    ];

    pub const ALL: &'static [LinkKind] = &[
        LinkKind::Inline,
        LinkKind::Reference,
        LinkKind::HtmlImage,
        LinkKind::YamlHref,
        LinkKind::Include,
        LinkKind::TripleColonImage,
        LinkKind::ImageSrc,
        LinkKind::CodeDirective,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOccurrence {
    pub kind: LinkKind,
    /// Target exactly as written, without surrounding quotes.
    pub raw: String,
    /// Target with angle brackets, bookmark and query removed.
    pub path: String,
    /// Fragment after `#`, without the `#`.
    pub bookmark: Option<String>,
    /// Query after `?`, without the `?`.
    pub query: Option<String>,
    /// 1-based line of the target.
    pub line: usize,
    /// Byte range of `raw` in the scanned text.
    pub span: Range<usize>,
}

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[!INCLUDE\s*\[[^\]\n]*\]\(\s*(<[^>\n]+>|[^)\s]+)").expect("valid regex")
});

static INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(\s*(<[^>\n]+>|[^)\s]+)").expect("valid regex"));

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*(<[^>\n]+>|[^\s]+)").expect("valid regex")
});

static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"\n]*)"|'([^'\n]*)'|([^\s>"']+))"#)
        .expect("valid regex")
});

static YAML_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*:[ \t]*(?:"([^"\n]*)"|'([^'\n]*)'|([^\s"'][^\s]*))"#)
        .expect("valid regex")
});

static IMAGE_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bimageSrc\s*:[ \t]*(?:"([^"\n]*)"|'([^'\n]*)'|([^\s"'][^\s]*))"#)
        .expect("valid regex")
});

static IMAGE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is):::image\b.*?:::").expect("valid regex"));

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is):::code\b.*?:::").expect("valid regex"));

static BLOCK_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)(source|lightbox)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"':]+))"#)
        .expect("valid regex")
});

/// All link occurrences in `text`, ordered by position.
pub fn extract(text: &str) -> Vec<LinkOccurrence> {
    let lines = LineIndex::new(text);
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut found = Vec::new();

    let mut push = |kind: LinkKind, span: Range<usize>, found: &mut Vec<LinkOccurrence>| {
        let raw = &text[span.clone()];
        if raw.trim().is_empty()
            || claimed.iter().any(|c| c.start < span.end && span.start < c.end)
        {
            return;
        }
        claimed.push(span.clone());
        let (path, bookmark, query) = split_target(raw);
        found.push(LinkOccurrence {
            kind,
            raw: raw.to_string(),
            path,
            bookmark,
            query,
            line: lines.line_of(span.start),
            span,
        });
    };

    // Most specific syntaxes first so they claim shared spans.
    for caps in INCLUDE.captures_iter(text) {
        if let Some(span) = first_group(&caps) {
            push(LinkKind::Include, span, &mut found);
        }
    }
    for (block, kind, attrs) in [
        (&*IMAGE_BLOCK, LinkKind::TripleColonImage, &["source", "lightbox"][..]),
        (&*CODE_BLOCK, LinkKind::CodeDirective, &["source"][..]),
    ] {
        for block_match in block.find_iter(text) {
            for caps in BLOCK_ATTR.captures_iter(block_match.as_str()) {
                let name = caps.get(1).map_or("", |m| m.as_str());
                if !attrs.iter().any(|a| a.eq_ignore_ascii_case(name)) {
                    continue;
                }
                if let Some(span) = first_value_group(&caps, 2) {
                    let start = block_match.start();
                    push(kind, start + span.start..start + span.end, &mut found);
                }
            }
        }
    }
    for (pattern, kind) in [
        (&*HTML_IMAGE, LinkKind::HtmlImage),
        (&*REFERENCE, LinkKind::Reference),
        (&*IMAGE_SRC, LinkKind::ImageSrc),
        (&*YAML_HREF, LinkKind::YamlHref),
        (&*INLINE, LinkKind::Inline),
    ] {
        for caps in pattern.captures_iter(text) {
            if let Some(span) = first_group(&caps) {
                push(kind, span, &mut found);
            }
        }
    }

    found.sort_by_key(|o| o.span.start);
    found
}

/// Occurrences of the given kinds only.
pub fn extract_kinds(text: &str, kinds: &[LinkKind]) -> Vec<LinkOccurrence> {
    extract(text)
        .into_iter()
        .filter(|o| kinds.contains(&o.kind))
        .collect()
}

fn first_group(caps: &Captures<'_>) -> Option<Range<usize>> {
    first_value_group(caps, 1)
}

fn first_value_group(caps: &Captures<'_>, from: usize) -> Option<Range<usize>> {
    (from..caps.len())
        .filter_map(|i| caps.get(i))
        .map(|m| m.range())
        .next()
}

/// Splits a raw target into path, bookmark and query.
///
/// `media/pic.png?raw=true#lightbox` → (`media/pic.png`, `lightbox`, `raw=true`).
/// A `?` after the `#` belongs to the bookmark.
pub fn split_target(raw: &str) -> (String, Option<String>, Option<String>) {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim();

    let (before_hash, bookmark) = match trimmed.split_once('#') {
        Some((path, bookmark)) => (path, Some(bookmark.to_string())),
        None => (trimmed, None),
    };
    let (path, query) = match before_hash.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (before_hash, None),
    };
    (path.trim().to_string(), bookmark, query)
}

/// Byte offset → 1-based line number.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }
}
