use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tracing_subscriber::EnvFilter;

use taxlib_core::config::Config;
use taxlib_core::{BalanceType, ExtendedFilter, SearchCriteria, SearchField, StaticNodeProvider, TaxonomyFile};
use taxlib_index::{IndexEvent, IndexState, LibrarySearch};

/// Build a search index over a taxonomy view and query it.
#[derive(Parser, Debug)]
#[command(name = "taxlib", version)]
struct Cli {
    /// Directory holding config.toml and friends.
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a taxonomy file and report how long it took.
    Index {
        file: PathBuf,
        #[arg(long, default_value = "")]
        language: String,
        /// Give up waiting after this many seconds.
        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },
    /// Index a taxonomy file, then run one search against it.
    Search {
        file: PathBuf,
        #[arg(long, default_value = "")]
        language: String,
        #[arg(long, default_value_t = 600)]
        timeout: u64,
        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Words that may match; earlier words rank higher.
    words: Vec<String>,
    /// Words every hit must contain.
    #[arg(long)]
    required: Option<String>,
    /// Words no hit may contain.
    #[arg(long)]
    prohibited: Option<String>,
    /// Fields to search (label, element_id, definition, references, display_name).
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<SearchField>,
    /// Balance types to keep (none, debit, credit).
    #[arg(long = "balance", value_parser = parse_balance)]
    balances: Vec<BalanceType>,
    #[arg(long)]
    no_abstract: bool,
    #[arg(long, value_parser = parse_extended, default_value = "include")]
    extended: ExtendedFilter,
    #[arg(long)]
    whole_word: bool,
    #[arg(long)]
    no_stem: bool,
    /// Keep only hits below this path, e.g. `Root/Assets/$`.
    #[arg(long)]
    path: Option<String>,
    #[arg(long)]
    min_relative: Option<u8>,
    #[arg(long)]
    top_percent: Option<u8>,
}

fn parse_field(s: &str) -> Result<SearchField, String> {
    SearchField::parse(s).ok_or_else(|| format!("unknown field '{}'", s))
}

fn parse_balance(s: &str) -> Result<BalanceType, String> {
    BalanceType::parse(s).ok_or_else(|| format!("unknown balance type '{}'", s))
}

fn parse_extended(s: &str) -> Result<ExtendedFilter, String> {
    match s.to_ascii_lowercase().as_str() {
        "include" => Ok(ExtendedFilter::Include),
        "exclude" => Ok(ExtendedFilter::Exclude),
        "only" => Ok(ExtendedFilter::Only),
        other => Err(format!("expected include, exclude or only, got '{}'", other)),
    }
}

impl QueryArgs {
    fn criteria(&self) -> SearchCriteria {
        let mut builder = SearchCriteria::builder()
            .optional(&self.words.join(" "))
            .include_abstract(!self.no_abstract)
            .extended(self.extended)
            .whole_word(self.whole_word)
            .stem_plurals(!self.no_stem);
        if let Some(required) = &self.required {
            builder = builder.required(required);
        }
        if let Some(prohibited) = &self.prohibited {
            builder = builder.prohibited(prohibited);
        }
        if !self.fields.is_empty() {
            builder = builder.fields(self.fields.iter().copied());
        }
        if !self.balances.is_empty() {
            builder = builder.balance_types(self.balances.iter().copied());
        }
        if let Some(path) = &self.path {
            builder = builder.ancestry_path(path.clone());
        }
        if let Some(percent) = self.min_relative {
            builder = builder.min_relative_score_percent(percent);
        }
        if let Some(percent) = self.top_percent {
            builder = builder.top_percent(percent);
        }
        builder.build()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,taxlib_index=info"));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init()
    {
        eprintln!("Failed to initialize tracing: {}", e);
    }
}

/// Drive a progress bar from index events until the build completes.
/// Returns whether the build reported per-item errors.
fn follow_build(mut rx: Receiver<IndexEvent>) -> anyhow::Result<thread::JoinHandle<Option<bool>>> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    let handle = thread::Builder::new().name("taxlib-progress".into()).spawn(move || {
        let mut errors = 0usize;
        loop {
            match rx.blocking_recv() {
                Ok(IndexEvent::Started) => pb.set_message("indexing"),
                Ok(IndexEvent::Progress { fraction }) => pb.set_position((fraction * 100.0).round() as u64),
                Ok(IndexEvent::Error { cause }) => {
                    errors += 1;
                    pb.set_message(format!("{} errors", errors));
                    tracing::debug!(%cause, "item failed");
                }
                Ok(IndexEvent::Completed { had_errors }) => {
                    pb.finish_with_message(if had_errors { "done with errors" } else { "done" });
                    return Some(had_errors);
                }
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "progress events dropped"),
                Err(RecvError::Closed) => {
                    pb.abandon_with_message("interrupted");
                    return None;
                }
            }
        }
    })?;
    Ok(handle)
}

fn build(config_dir: &Path, file: &Path, language: &str, timeout: Duration) -> anyhow::Result<LibrarySearch> {
    let config = Config::load_from(config_dir).context("loading configuration")?;
    let taxonomy = TaxonomyFile::read(file).with_context(|| format!("reading {}", file.display()))?;
    let provider = Arc::new(StaticNodeProvider::from(taxonomy));

    let search = LibrarySearch::from_config(&config)?;
    let progress = follow_build(search.subscribe())?;
    let started = Instant::now();
    search.initialize(language, provider)?;
    if !search.wait_until_idle(timeout) {
        search.stop_indexing();
        bail!("indexing did not finish within {}s", timeout.as_secs());
    }
    if search.state() != IndexState::Ready {
        bail!("indexing ended in state {}", search.state());
    }
    let had_errors = match progress.join() {
        Ok(outcome) => outcome,
        Err(_) => bail!("progress reporter panicked"),
    };
    tracing::info!(
        view = ?search.active_view(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        had_errors = had_errors.unwrap_or(false),
        "index ready"
    );
    Ok(search)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Index { file, language, timeout } => {
            let search = build(&cli.config_dir, &file, &language, Duration::from_secs(timeout))?;
            println!("Indexed {} ({})", file.display(), search.state());
            search.dispose();
        }
        Command::Search { file, language, timeout, query } => {
            let search = build(&cli.config_dir, &file, &language, Duration::from_secs(timeout))?;
            let result = search.search(&query.criteria())?;
            if result.is_empty() {
                println!("No matches");
            }
            for item in &result {
                println!("{:>7.3}  {:<40}  {}  ({})", item.score, item.element_id, item.label, item.path);
            }
            search.dispose();
        }
    }
    Ok(())
}
