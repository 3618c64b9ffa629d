mod config;
mod docset;
mod error;
mod extract;
mod index;
mod logger;
mod ops;
mod redirect;
mod report;
mod resolve;
mod storage;
mod toc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use ops::media::MediaKind;
use ops::topics::TopicOptions;
use ops::Workspace;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;
use storage::FsStorage;

/// docsweep - Find orphaned files and stale links in docfx documentation repos
#[derive(Parser)]
#[command(name = "docsweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".docsweep.toml")]
    config: PathBuf,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show per-link diagnostics
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List Markdown topics that no TOC file links to
    OrphanedTopics {
        /// Directory to check
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Delete orphans that no other file links to either
        #[arg(long)]
        delete: bool,

        /// Also report topics whose front matter sets redirect_url
        #[arg(long)]
        include_redirected: bool,
        /// Search subdirectories too; `--recursive false` checks the top level only
        #[arg(short = 's', long, default_value_t = true, action = clap::ArgAction::Set)]
        recursive: bool,
    },

    /// List .png/.jpg/.gif/.svg files that no page references
    OrphanedImages {
        /// Directory to check
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Delete the orphaned files
        #[arg(long)]
        delete: bool,
        /// Search subdirectories too; `--recursive false` checks the top level only
        #[arg(short = 's', long, default_value_t = true, action = clap::ArgAction::Set)]
        recursive: bool,
    },

    /// List INCLUDE files that no page includes
    OrphanedIncludes {
        /// Directory to check
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Delete the orphaned files
        #[arg(long)]
        delete: bool,
        /// Search subdirectories too; `--recursive false` checks the top level only
        #[arg(short = 's', long, default_value_t = true, action = clap::ArgAction::Set)]
        recursive: bool,
    },

    /// List code snippet files that no page references
    OrphanedSnippets {
        /// Directory to check
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Delete the orphaned files
        #[arg(long)]
        delete: bool,
        /// Search subdirectories too; `--recursive false` checks the top level only
        #[arg(short = 's', long, default_value_t = true, action = clap::ArgAction::Set)]
        recursive: bool,
    },

    /// List topics that appear in more than one TOC
    Multiples {
        /// Directory inside the docset
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Count every TOC entry instead of distinct TOC files
        #[arg(long)]
        within_toc: bool,
    },

    /// Point redirects at the end of their redirect chain
    CleanRedirects {
        /// Directory inside the docset
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Redirect manifest (default: nearest .openpublishing.redirection.json)
        #[arg(short, long)]
        redirects_file: Option<PathBuf>,

        /// URL base path of the docset, e.g. "visualstudio"
        #[arg(short, long)]
        docset_name: Option<String>,

        /// Report without rewriting the manifest
        #[arg(long)]
        dry_run: bool,
    },

    /// Rewrite the redirect manifest with consistent formatting
    FormatRedirects {
        /// Directory inside the docset
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Redirect manifest (default: nearest .openpublishing.redirection.json)
        #[arg(short, long)]
        redirects_file: Option<PathBuf>,

        /// Report without rewriting the manifest
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace links to redirected files with their final redirect URL
    ReplaceRedirects {
        /// Directory whose files get rewritten
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Redirect manifest (default: nearest .openpublishing.redirection.json)
        #[arg(short, long)]
        redirects_file: Option<PathBuf>,

        /// URL base path of the docset, e.g. "visualstudio"
        #[arg(short, long)]
        docset_name: Option<String>,

        /// Report without touching any file
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace site-relative links with file-relative links
    RelativeLinks {
        /// Directory whose files get rewritten
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// URL base path of the docset, e.g. "visualstudio"
        #[arg(short, long)]
        docset_name: Option<String>,

        /// Report without touching any file
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::set_quiet(cli.quiet || cli.json);
    logger::set_verbose(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::load(&cli.config)?;
    let storage = FsStorage;
    let json = cli.json;
    let start = Instant::now();

    let open = |dir: &Path, docset_name: Option<&str>| {
        Workspace::open(dir, &config, &storage, docset_name)
    };

    match cli.command {
        Commands::OrphanedTopics { dir, delete, include_redirected, recursive } => {
            let ws = open(&dir, None)?;
            let options = TopicOptions {
                include_redirected,
                recursive,
            };
            let report = ops::topics::orphaned_topics(&ws, options, delete)?;
            if json {
                report::print_json(&report)?;
            } else {
                report::topics(&report, &ws.anchor.marker_dir);
            }
        }
        Commands::OrphanedImages { dir, delete, recursive } => {
            cmd_media(&open(&dir, None)?, MediaKind::Images, recursive, delete, json)?;
        }
        Commands::OrphanedIncludes { dir, delete, recursive } => {
            cmd_media(&open(&dir, None)?, MediaKind::Includes, recursive, delete, json)?;
        }
        Commands::OrphanedSnippets { dir, delete, recursive } => {
            cmd_media(&open(&dir, None)?, MediaKind::Snippets, recursive, delete, json)?;
        }
        Commands::Multiples { dir, within_toc } => {
            let ws = open(&dir, None)?;
            let report = ops::duplicates::find_duplicates(&ws, within_toc)?;
            if json {
                report::print_json(&report)?;
            } else {
                report::duplicates(&report, &ws.anchor.marker_dir);
            }
        }
        Commands::CleanRedirects { dir, redirects_file, docset_name, dry_run } => {
            let ws = open(&dir, docset_name.as_deref())?;
            let report = ops::redirects::clean_redirects(&ws, redirects_file.as_deref(), !dry_run)?;
            if json {
                report::print_json(&report)?;
            } else {
                report::clean(&report);
            }
        }
        Commands::FormatRedirects { dir, redirects_file, dry_run } => {
            let ws = open(&dir, None)?;
            let report = ops::redirects::format_redirects(&ws, redirects_file.as_deref(), !dry_run)?;
            if json {
                report::print_json(&report)?;
            } else {
                report::format_manifest(&report);
            }
        }
        Commands::ReplaceRedirects { dir, redirects_file, docset_name, dry_run } => {
            let ws = open(&dir, docset_name.as_deref())?;
            let report =
                ops::rewrite::replace_redirected_links(&ws, redirects_file.as_deref(), !dry_run)?;
            if json {
                report::print_json(&report)?;
            } else {
                report::rewrite(&report, &ws.anchor.marker_dir);
            }
        }
        Commands::RelativeLinks { dir, docset_name, dry_run } => {
            let ws = open(&dir, docset_name.as_deref())?;
            let report = ops::rewrite::relative_links(&ws, !dry_run)?;
            if json {
                report::print_json(&report)?;
            } else {
                report::rewrite(&report, &ws.anchor.marker_dir);
            }
        }
    }

    crate::log!("docsweep"; "done in {:?}", start.elapsed());
    Ok(())
}

fn cmd_media(
    ws: &Workspace<'_>,
    kind: MediaKind,
    recursive: bool,
    delete: bool,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let report = ops::media::orphaned_media(ws, kind, recursive, delete)?;
    if json {
        report::print_json(&report)?;
    } else {
        report::media(&report, &ws.anchor.marker_dir);
    }
    Ok(())
}
