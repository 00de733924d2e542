use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

mod output;

use output::{PromptConfirm, print_record};

use papershelf_core::config_file;
use papershelf_core::paper::{Paper, PaperOptions};
use papershelf_core::reconcile::{AcceptIncoming, Confirm, KeepCurrent};
use papershelf_core::remote::LookupConfig;
use papershelf_core::tags::open_store;
use papershelf_core::BibCache;

/// papershelf - curate bibliographic metadata for a library of academic PDFs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the reconciled record for a PDF
    Show {
        /// Path to the PDF file
        file_path: PathBuf,
    },

    /// Resolve the paper's DOI from tags, text, or a title search
    Doi {
        file_path: PathBuf,

        /// Fall back to a CrossRef title search (gated at >0.9 similarity)
        #[arg(long)]
        by_title: bool,
    },

    /// Resolve bibliography and keywords, write tags, optionally rename
    Update {
        file_path: PathBuf,

        /// Overwrite conflicting values without prompting
        #[arg(long)]
        force: bool,

        /// Rename the file to YEAR-AUTHOR-JOURNAL.pdf afterwards
        #[arg(long)]
        rename: bool,

        /// Skip the sidecar cache and query the registry again
        #[arg(long)]
        no_cache: bool,
    },

    /// Resolve keywords from the text, or set them explicitly
    Keywords {
        file_path: PathBuf,

        /// Comma-separated keywords replacing the resolved set
        #[arg(long, value_delimiter = ',')]
        set: Vec<String>,
    },

    /// Resolve an external article id (PMID/PMCID) to its identifier triple
    Ids {
        file_path: PathBuf,

        /// The id to resolve
        id: String,
    },

    /// Run update over every PDF in a directory
    Scan {
        dir: PathBuf,

        /// Overwrite conflicting values without prompting
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Show { file_path } => {
            let paper = open_paper(&file_path)?;
            print_record(&paper);
            Ok(())
        }
        Command::Doi {
            file_path,
            by_title,
        } => doi(&file_path, by_title).await,
        Command::Update {
            file_path,
            force,
            rename,
            no_cache,
        } => {
            let confirm: Box<dyn Confirm> = if force {
                Box::new(AcceptIncoming)
            } else {
                Box::new(PromptConfirm)
            };
            update(&file_path, confirm.as_ref(), rename, no_cache).await
        }
        Command::Keywords { file_path, set } => keywords(&file_path, set),
        Command::Ids { file_path, id } => ids(&file_path, &id).await,
        Command::Scan { dir, force } => scan(&dir, force).await,
    }
}

/// Resolve configuration: env vars > config file > defaults.
fn build_options() -> PaperOptions {
    let config = config_file::load_config();
    let lookup_section = config.lookup.unwrap_or_default();

    let mailto = std::env::var("CROSSREF_MAILTO")
        .ok()
        .or(lookup_section.crossref_mailto);
    let idconv_email = std::env::var("IDCONV_EMAIL")
        .ok()
        .or(lookup_section.idconv_email);

    let lookup = LookupConfig {
        mailto,
        idconv_tool: lookup_section
            .idconv_tool
            .unwrap_or_else(|| "papershelf".to_string()),
        idconv_email,
        timeout: Duration::from_secs(lookup_section.timeout_secs.unwrap_or(10)),
    };

    let cache = std::env::var("PAPERSHELF_CACHE")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            config
                .cache
                .as_ref()
                .and_then(|c| c.db_path.as_ref())
                .map(PathBuf::from)
        })
        .and_then(|path| match BibCache::open(&path) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not open cache");
                None
            }
        });

    PaperOptions {
        lookup,
        max_pages: config.extraction.and_then(|e| e.max_pages),
        markers: config
            .keywords
            .and_then(|k| k.markers)
            .unwrap_or_default(),
        cache,
    }
}

fn open_paper(path: &Path) -> anyhow::Result<Paper> {
    anyhow::ensure!(path.exists(), "no such file: {}", path.display());
    Ok(Paper::open(path, open_store(path), build_options())?)
}

async fn doi(path: &Path, by_title: bool) -> anyhow::Result<()> {
    let mut paper = open_paper(path)?;
    match paper.resolve_doi(by_title).await? {
        Some(doi) => println!("{}", doi),
        None => println!("{}", "no identifier found".red()),
    }
    Ok(())
}

async fn update(
    path: &Path,
    confirm: &dyn Confirm,
    rename: bool,
    no_cache: bool,
) -> anyhow::Result<()> {
    let mut paper = open_paper(path)?;

    match paper.resolve_doi(true).await? {
        Some(doi) => println!("{} {}", "id:".bold(), doi),
        None => println!("{}", "no identifier found; record stays local".yellow()),
    }

    let found = paper.resolve_bibliography(!no_cache, confirm).await?;
    if found {
        println!("{} {}", "bibliography:".bold(), "resolved".green());
    } else {
        println!("{} {}", "bibliography:".bold(), "not found".red());
    }

    paper.resolve_keywords(None, true)?;
    paper.save_record()?;
    paper.push_to_tags(confirm)?;

    if rename {
        if let Some(new_name) = paper.rename_to_convention(confirm)? {
            println!("{} {}", "renamed to:".bold(), new_name.green());
        }
    }

    print_record(&paper);
    Ok(())
}

fn keywords(path: &Path, set: Vec<String>) -> anyhow::Result<()> {
    let mut paper = open_paper(path)?;
    let explicit = if set.is_empty() { None } else { Some(set) };
    let kws = paper.resolve_keywords(explicit, true)?;
    paper.save_record()?;
    println!("{}", kws.join(", "));
    Ok(())
}

async fn ids(path: &Path, id: &str) -> anyhow::Result<()> {
    let mut paper = open_paper(path)?;
    match paper.resolve_ids(id).await? {
        Some(triple) => {
            println!("{:>6}: {}", "doi".cyan(), triple.doi);
            println!("{:>6}: {}", "pmid".cyan(), triple.pmid);
            println!("{:>6}: {}", "pmcid".cyan(), triple.pmcid);
            paper.save_record()?;
        }
        None => println!("{}", "not found".red()),
    }
    Ok(())
}

async fn scan(dir: &Path, force: bool) -> anyhow::Result<()> {
    anyhow::ensure!(dir.is_dir(), "not a directory: {}", dir.display());

    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
                && !p
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'))
        })
        .collect();
    pdfs.sort();

    // Batch mode never prompts: keep current values unless forced.
    let confirm: Box<dyn Confirm> = if force {
        Box::new(AcceptIncoming)
    } else {
        Box::new(KeepCurrent)
    };

    let bar = indicatif::ProgressBar::new(pdfs.len() as u64);
    bar.set_style(
        indicatif::ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .expect("valid progress template"),
    );

    let mut failures = 0usize;
    for pdf in &pdfs {
        bar.set_message(
            pdf.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        if let Err(e) = update(pdf, confirm.as_ref(), false, false).await {
            failures += 1;
            tracing::warn!(path = %pdf.display(), error = %e, "update failed");
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "{} {} processed, {} failed",
        "scan:".bold(),
        pdfs.len() - failures,
        failures
    );
    Ok(())
}
