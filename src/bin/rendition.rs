//! CLI binary for rendition-cache.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `RenditionConfig`, warms or reads the artifact cache, and tallies votes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rendition_cache::{
    classify, ArtifactCache, ArtifactOrigin, CacheObserver, FsDocumentStore, MemoryBallotStore,
    RenditionConfig, SourceFormat, TallyError, TargetKind, VoteTallyAggregator,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner while conversions run plus one log line per
/// served id. Events arrive out of order when several ids build at once.
struct CliObserver {
    bar: ProgressBar,
    builds: AtomicUsize,
    hits: AtomicUsize,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            builds: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl CacheObserver for CliObserver {
    fn on_cache_hit(&self, id: &str, kind: TargetKind, len: usize) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<24} {:<5} {}",
            dim("="),
            id,
            kind,
            dim(&format!("{len:>8} bytes  cached")),
        ));
    }

    fn on_build_start(&self, id: &str, kind: TargetKind, format: SourceFormat) {
        self.bar.set_message(format!("{id} ({format} → {kind})"));
    }

    fn on_build_complete(&self, id: &str, kind: TargetKind, len: usize, published: bool) {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let mark = if published { green("✓") } else { yellow("⚠") };
        let note = if published { "built" } else { "built, not cached" };
        self.bar.println(format!(
            "  {} {:<24} {:<5} {}",
            mark,
            id,
            kind,
            dim(&format!("{len:>8} bytes  {note}")),
        ));
    }

    fn on_publish_failed(&self, id: &str, _kind: TargetKind, error: &str) {
        self.bar
            .println(format!("  {} publish of {} failed: {}", yellow("⚠"), id, error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render a document as embeddable HTML (stdout)
  rendition render doc-42 --kind html

  # Typeset PDF to a file
  rendition render doc-42 --kind pdf -o doc-42.pdf

  # Warm the cache for many documents, 8 conversions at a time
  rendition render doc-1 doc-2 doc-3 --kind html --concurrency 8

  # Scaled member photo
  rendition --source-dir photos render persoon-17 --kind jpeg -o p17.jpg

  # Unconverted source bytes
  rendition raw doc-42 -o doc-42.bin

  # Which converter would handle these files?
  rendition classify docstore/*

  # Tally decisions from a ballots file
  rendition tally D-1 D-2 --ballots ballots.json --json

EXTERNAL TOOLS:
  pandoc + xelatex    word-processor and rich-text → HTML / PDF
  catdoc              legacy .doc → HTML (<pre> text)
  xmlstarlet          transcript XML → HTML via the stylesheet
  pdftohtml           PDF → HTML
  Photos are scaled in-process; no tool is needed.
"#;

/// Render stored documents to HTML, PDF or JPEG through an on-disk cache.
#[derive(Parser, Debug)]
#[command(
    name = "rendition",
    version,
    about = "Render stored documents to HTML, PDF or JPEG through an on-disk cache",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding source documents, one file per id.
    #[arg(long, global = true, env = "RENDITION_SOURCE_DIR", default_value = "docstore")]
    source_dir: PathBuf,

    /// Root of the artifact cache.
    #[arg(long, global = true, env = "RENDITION_CACHE_DIR", default_value = "doccache")]
    cache_dir: PathBuf,

    /// Per-conversion timeout in seconds.
    #[arg(long, global = true, env = "RENDITION_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// XSLT stylesheet for transcript XML.
    #[arg(long, global = true, env = "RENDITION_STYLESHEET", default_value = "tk-div.xslt")]
    stylesheet: PathBuf,

    /// Longest edge of scaled photos, in pixels (16–4096).
    #[arg(long, global = true, env = "RENDITION_PHOTO_SIZE", default_value_t = 400,
          value_parser = clap::value_parser!(u32).range(16..=4096))]
    photo_size: u32,

    /// Wait for an in-flight build of the same document instead of converting twice.
    #[arg(long, global = true, env = "RENDITION_COALESCE")]
    coalesce: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "RENDITION_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RENDITION_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RENDITION_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Get or build renditions.
    Render {
        /// Document ids.
        #[arg(required = true)]
        ids: Vec<String>,

        /// Target representation: html, pdf or jpeg.
        #[arg(short, long, default_value = "html")]
        kind: TargetKind,

        /// Output file (one id) or directory (several ids).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Conversions running at once.
        #[arg(short, long, env = "RENDITION_CONCURRENCY", default_value_t = 4)]
        concurrency: usize,
    },

    /// Print the unconverted source bytes.
    Raw {
        id: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the detected source format of files.
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Tally the ballots of decisions.
    Tally {
        #[arg(required = true)]
        decision_ids: Vec<String>,

        /// JSON array of ballots.
        #[arg(long, env = "RENDITION_BALLOTS")]
        ballots: PathBuf,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters during renders, so INFO
    // library logs are suppressed while it is active.
    let is_render = matches!(cli.command, Command::Render { .. });
    let show_progress = is_render && !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Render {
            ids,
            kind,
            output,
            concurrency,
        } => render(&cli, ids, *kind, output.as_deref(), *concurrency, show_progress).await,
        Command::Raw { id, output } => raw(&cli, id, output.as_deref()).await,
        Command::Classify { paths } => {
            for path in paths {
                let format = classify(path).await;
                println!("{}\t{}", format, path.display());
            }
            Ok(())
        }
        Command::Tally {
            decision_ids,
            ballots,
            json,
        } => tally(decision_ids, ballots, *json).await,
    }
}

/// Map CLI args to `RenditionConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<dyn CacheObserver>>) -> Result<RenditionConfig> {
    let mut builder = RenditionConfig::builder()
        .cache_dir(&cli.cache_dir)
        .conversion_timeout_secs(cli.timeout)
        .transcript_stylesheet(&cli.stylesheet)
        .photo_max_dimension(cli.photo_size)
        .coalesce_builds(cli.coalesce);

    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

fn open_cache(cli: &Cli, observer: Option<Arc<dyn CacheObserver>>) -> Result<ArtifactCache> {
    let config = build_config(cli, observer)?;
    let store = Arc::new(FsDocumentStore::new(&cli.source_dir));
    Ok(ArtifactCache::new(config, store))
}

async fn render(
    cli: &Cli,
    ids: &[String],
    kind: TargetKind,
    output: Option<&Path>,
    concurrency: usize,
    show_progress: bool,
) -> Result<()> {
    let observer = show_progress.then(CliObserver::new);
    let cache = open_cache(cli, observer.clone().map(|o| o as Arc<dyn CacheObserver>))?;

    let start = Instant::now();

    // A single id streams straight to stdout or the output file.
    if let [id] = ids {
        let result = cache.get_or_build(id, kind).await;
        if let Some(ref obs) = observer {
            obs.finish();
        }
        let artifact = result.with_context(|| format!("Rendering {id} as {kind} failed"))?;
        match output {
            Some(path) => tokio::fs::write(path, &artifact.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => write_stdout(&artifact.bytes)?,
        }
        if !cli.quiet {
            eprintln!(
                "{}  {} {}  {} bytes  {}ms{}",
                green("✔"),
                id,
                kind,
                artifact.bytes.len(),
                start.elapsed().as_millis(),
                match artifact.origin {
                    ArtifactOrigin::CacheHit => dim("  (cached)"),
                    ArtifactOrigin::Built => String::new(),
                    ArtifactOrigin::BuiltUncached => yellow("  (not cached)"),
                }
            );
        }
        return Ok(());
    }

    if let Some(dir) = output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let results = cache.get_or_build_many(ids, kind, concurrency).await;
    if let Some(ref obs) = observer {
        obs.finish();
    }

    let mut failed = 0usize;
    for (id, result) in &results {
        match result {
            Ok(artifact) => {
                if let Some(dir) = output {
                    let path = dir.join(format!("{id}{}", kind.extension()));
                    tokio::fs::write(&path, &artifact.bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("  {} {:<24} {}", red("✗"), id, red(&e.to_string()));
            }
        }
    }

    if !cli.quiet {
        let (built, hits) = observer
            .as_ref()
            .map(|o| (o.builds.load(Ordering::SeqCst), o.hits.load(Ordering::SeqCst)))
            .unwrap_or_default();
        let summary = format!(
            "{}/{} rendered  {}ms",
            results.len() - failed,
            results.len(),
            start.elapsed().as_millis()
        );
        if show_progress {
            eprintln!(
                "{}  {}  {}",
                if failed == 0 { green("✔") } else { red("✘") },
                bold(&summary),
                dim(&format!("{built} built, {hits} cached"))
            );
        } else {
            eprintln!("{summary}");
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} documents failed", results.len());
    }
    Ok(())
}

async fn raw(cli: &Cli, id: &str, output: Option<&Path>) -> Result<()> {
    let cache = open_cache(cli, None)?;
    let doc = cache
        .raw(id)
        .await
        .with_context(|| format!("Reading source of {id} failed"))?;

    match output {
        Some(path) => tokio::fs::write(path, &doc.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => write_stdout(&doc.bytes)?,
    }
    if !cli.quiet {
        eprintln!("{}  {} bytes", doc.content_type, doc.bytes.len());
    }
    Ok(())
}

async fn tally(decision_ids: &[String], ballots: &Path, json: bool) -> Result<()> {
    let store = MemoryBallotStore::load_json(ballots)
        .await
        .with_context(|| format!("Failed to load ballots from {}", ballots.display()))?;
    let aggregator = VoteTallyAggregator::new(Arc::new(store));

    let mut report = serde_json::Map::new();
    for decision_id in decision_ids {
        match aggregator.tally(decision_id).await {
            Ok(result) => {
                if json {
                    report.insert(
                        decision_id.clone(),
                        serde_json::to_value(&result).context("Failed to serialise result")?,
                    );
                } else {
                    println!(
                        "{}  {}  for {} · against {} · abstained {}  {}",
                        bold(decision_id),
                        dim(&format!("{:?}", result.mode)),
                        green(&result.for_count.to_string()),
                        red(&result.against_count.to_string()),
                        result.abstained_count,
                        if result.for_count > result.against_count {
                            green("carried")
                        } else {
                            red("rejected")
                        }
                    );
                    println!("    for:       {}", join(&result.for_set));
                    println!("    against:   {}", join(&result.against_set));
                    println!("    abstained: {}", join(&result.abstained_set));
                }
            }
            Err(TallyError::NoBallots { .. }) => {
                if json {
                    report.insert(decision_id.clone(), serde_json::Value::Null);
                } else {
                    println!("{}  {}", bold(decision_id), dim("no recorded vote"));
                }
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("Tallying {decision_id} failed")))
            }
        }
    }

    if json {
        let text = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{text}");
    }
    Ok(())
}

fn join(names: &std::collections::BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(bytes)
        .and_then(|_| handle.flush())
        .context("Failed to write to stdout")
}
