//! Human-readable and JSON output for each operation.

use crate::ops::duplicates::DuplicateReport;
use crate::ops::media::MediaReport;
use crate::ops::redirects::{CleanReport, FormatReport};
use crate::ops::rewrite::RewriteReport;
use crate::ops::topics::TopicReport;
use crate::ops::{Deletion, FileFailure};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

pub fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `path` relative to `base` when it's inside it.
fn shown(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn print_failures(failures: &[FileFailure], base: &Path) {
    for failure in failures {
        println!(
            "  {} {}: {}",
            "!".red().bold(),
            shown(&failure.path, base),
            failure.error.dimmed()
        );
    }
}

fn print_deletion(deletion: &Deletion, base: &Path) {
    println!(
        "\n{} {} files",
        "Deleted".red().bold(),
        deletion.deleted.len().to_string().cyan()
    );
    if !deletion.failed.is_empty() {
        println!("{}", "Could not delete:".yellow().bold());
        print_failures(&deletion.failed, base);
    }
}

pub fn topics(report: &TopicReport, base: &Path) {
    if report.orphans.is_empty() {
        println!(
            "{} ({} topics, {} TOC files)",
            "Every topic is in a TOC.".green(),
            report.topics_checked,
            report.toc_files
        );
    } else {
        println!(
            "{} topics not in any TOC ({} checked against {} TOC files)\n",
            report.orphans.len().to_string().yellow().bold(),
            report.topics_checked,
            report.toc_files
        );
        for orphan in &report.orphans {
            println!("  {}", shown(orphan, base).cyan());
        }
    }
    if !report.skipped_redirected.is_empty() {
        println!(
            "\n{}",
            format!(
                "{} redirected topics skipped (use --include-redirected to list them)",
                report.skipped_redirected.len()
            )
            .dimmed()
        );
    }
    if !report.kept.is_empty() {
        println!(
            "\n{} {} files because other files link to them:",
            "Kept".yellow().bold(),
            report.kept.len()
        );
        for kept in &report.kept {
            println!("  {}", shown(&kept.path, base).cyan());
            for linker in &kept.referenced_by {
                println!("    {} {}", "<-".dimmed(), shown(linker, base));
            }
        }
    }
    if let Some(deletion) = &report.deletion {
        print_deletion(deletion, base);
    }
}

pub fn media(report: &MediaReport, base: &Path) {
    if report.targets == 0 {
        println!("{}", format!("No {} found.", report.kind).yellow());
        return;
    }
    if report.orphans.is_empty() {
        println!(
            "{} ({} {} referenced)",
            "No orphans found.".green(),
            report.targets,
            report.kind
        );
    } else {
        println!(
            "{} orphaned {} out of {}\n",
            report.orphans.len().to_string().yellow().bold(),
            report.kind,
            report.targets
        );
        for orphan in &report.orphans {
            println!("  {}", shown(orphan, base).cyan());
        }
    }
    if report.stats.malformed > 0 {
        println!(
            "\n{}",
            format!("{} links could not be parsed", report.stats.malformed).dimmed()
        );
    }
    if let Some(deletion) = &report.deletion {
        print_deletion(deletion, base);
    }
}

pub fn duplicates(report: &DuplicateReport, base: &Path) {
    if report.topics.is_empty() {
        println!(
            "{} ({} TOC files)",
            "No topic is listed more than once.".green(),
            report.toc_files
        );
        return;
    }
    let what = if report.within_toc {
        "TOC entries"
    } else {
        "TOC files"
    };
    println!(
        "{} topics listed in more than one of the {} TOC files\n",
        report.topics.len().to_string().yellow().bold(),
        report.toc_files
    );
    for topic in &report.topics {
        println!(
            "{} {} {}",
            topic.count.to_string().yellow(),
            what.dimmed(),
            shown(&topic.path, base).cyan()
        );
        for toc in &topic.tocs {
            println!("  {} {}", "~".dimmed(), shown(toc, base));
        }
    }
}

pub fn clean(report: &CleanReport) {
    println!(
        "{} {} ({} redirects)",
        "Manifest".cyan().bold(),
        report.manifest.display(),
        report.redirects
    );
    if report.hops.collapsed.is_empty() {
        println!("{}", "No redirect hops found.".green());
    } else {
        println!(
            "\n{} redirect hops{}\n",
            report.hops.collapsed.len().to_string().yellow().bold(),
            if report.written { " removed" } else { " found (dry run)" }
        );
        for hop in &report.hops.collapsed {
            println!("  {}", hop.source.cyan());
            println!("    {} {}", "-".red(), hop.from);
            println!("    {} {} {}", "+".green(), hop.to, format!("({} hops)", hop.hops).dimmed());
        }
    }
    if !report.hops.cycles.is_empty() {
        println!(
            "\n{} redirects are part of a cycle and were left as is:",
            report.hops.cycles.len().to_string().red().bold()
        );
        for cycle in &report.hops.cycles {
            println!("  {} -> {}", cycle.source.cyan(), cycle.target);
        }
    }
}

pub fn format_manifest(report: &FormatReport) {
    let status = match (report.changed, report.written) {
        (false, _) => "already formatted".green(),
        (true, true) => "reformatted".yellow(),
        (true, false) => "would be reformatted (dry run)".yellow(),
    };
    println!(
        "{} {} ({} redirects) {}",
        "Manifest".cyan().bold(),
        report.manifest.display(),
        report.redirects,
        status
    );
}

pub fn rewrite(report: &RewriteReport, base: &Path) {
    if report.changes.is_empty() {
        println!(
            "{} ({} files checked)",
            "No links to replace.".green(),
            report.files_scanned
        );
    } else {
        println!(
            "{} links {} in {} files\n",
            report.replacement_count().to_string().yellow().bold(),
            if report.written { "replaced" } else { "to replace (dry run)" },
            report.changes.len()
        );
        for change in &report.changes {
            println!("{}", shown(&change.path, base).cyan());
            for replacement in &change.replacements {
                println!(
                    "  L{} {} {} {}",
                    replacement.line.to_string().dimmed(),
                    replacement.from,
                    "->".dimmed(),
                    replacement.to.green()
                );
            }
        }
    }
    if !report.ambiguous.is_empty() {
        println!(
            "\n{} links match several files and were left alone:",
            report.ambiguous.len().to_string().yellow().bold()
        );
        for link in &report.ambiguous {
            println!(
                "  {} L{}: {}",
                shown(&link.file, base).cyan(),
                link.line,
                link.raw
            );
            for candidate in &link.candidates {
                println!("    {} {}", "?".dimmed(), shown(candidate, base));
            }
        }
    }
    if !report.failures.is_empty() {
        println!("\n{}", "Failed:".red().bold());
        print_failures(&report.failures, base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shown_is_relative_inside_base() {
        let base = Path::new("/repo/docs");
        assert_eq!(shown(Path::new("/repo/docs/ide/a.md"), base), "ide/a.md");
        assert_eq!(shown(Path::new("/elsewhere/b.md"), base), "/elsewhere/b.md");
    }
}
