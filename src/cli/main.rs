use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use tripshot::config::Config;
use tripshot::pipeline::{self, GalleryPhoto, Pipeline};
use tripshot::session::{GallerySession, LoadOutcome};
use tripshot::source::{Group, PhotoSource};

#[derive(Parser, Debug)]
#[command(
    name = "tripshot",
    version,
    about = "Build a chronological trip gallery from photos: HEIC conversion, capture dates, and GPS"
)]
struct Cli {
    /// Photo URLs, image files, or directories
    #[arg(value_name = "SOURCE")]
    sources: Vec<String>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Load galleries from a group JSON file (one group or an array)
    #[arg(short, long, value_name = "FILE")]
    group: Option<PathBuf>,

    /// Resolve a single photo; failing to fetch it is an error
    #[arg(long, value_name = "SOURCE")]
    detail: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let pipeline = Pipeline::from_config(&config)?;
    let display_dir = config.output.display_dir.as_deref().map(Path::new);

    // Handle --detail: no batch to fall back on, so a fetch failure ends the run.
    if let Some(arg) = &cli.detail {
        let source = PhotoSource::parse(arg);
        let photo = pipeline
            .build_gallery_photo(&source)
            .await
            .with_context(|| format!("Could not load {source}"))?;
        emit(&[photo], cli.json, display_dir)?;
        return Ok(());
    }

    if cli.sources.is_empty() && cli.group.is_none() {
        anyhow::bail!("No photo sources specified. Use --help for usage.");
    }

    if let Some(group_path) = &cli.group {
        let contents = std::fs::read_to_string(group_path)
            .with_context(|| format!("Failed to read group file {}", group_path.display()))?;
        let groups = Group::parse_many(&contents).context("Failed to parse group file")?;

        let session = GallerySession::new(pipeline.clone());
        for group in &groups {
            match session.load(group).await {
                LoadOutcome::Applied(n) => {
                    if !cli.json {
                        println!("\n{BOLD}{}{RESET} {DIM}({n} photos){RESET}", group.name);
                    }
                    emit(&session.photos(), cli.json, display_dir)?;
                }
                LoadOutcome::Stale => log::warn!("Gallery for {} was superseded", group.name),
            }
        }
    }

    if !cli.sources.is_empty() {
        let sources = resolve_sources(&cli.sources);
        if sources.is_empty() {
            anyhow::bail!("No supported photos found in the specified sources.");
        }
        log::info!("Found {} photo(s) to process", sources.len());

        let gallery = pipeline.build_gallery(&sources).await;
        emit(&gallery, cli.json, display_dir)?;

        let dropped = sources.len() - gallery.len();
        if dropped > 0 {
            log::warn!("{dropped} photo(s) could not be fetched");
        }
    }

    Ok(())
}

/// URLs pass through; local paths are expanded with directory walking.
fn resolve_sources(args: &[String]) -> Vec<PhotoSource> {
    let mut sources = Vec::new();
    for arg in args {
        match PhotoSource::parse(arg) {
            url @ PhotoSource::Url(_) => sources.push(url),
            _ => sources.extend(
                pipeline::collect_images(&[PathBuf::from(arg)])
                    .into_iter()
                    .map(PhotoSource::file),
            ),
        }
    }
    sources
}

/// Print photos and save converted display images if configured.
fn emit(photos: &[GalleryPhoto], json: bool, display_dir: Option<&Path>) -> Result<()> {
    let mut saved = Vec::with_capacity(photos.len());
    for photo in photos {
        let path = match display_dir {
            Some(dir) => save_display(dir, photo)?,
            None => None,
        };
        saved.push(path);
    }

    if json {
        let rows: Vec<serde_json::Value> = photos
            .iter()
            .zip(&saved)
            .map(|(p, saved)| {
                serde_json::json!({
                    "source": p.original_source.to_string(),
                    "kind": p.kind,
                    "converted": p.is_converted(),
                    "captureDate": p.metadata.capture_date,
                    "latitude": p.metadata.latitude(),
                    "longitude": p.metadata.longitude(),
                    "displayPath": saved.as_ref().map(|s| s.display().to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for (photo, saved) in photos.iter().zip(&saved) {
            print_photo(photo, saved.as_deref());
        }
    }
    Ok(())
}

/// Write a converted display JPEG into `dir`. Unconverted photos are skipped.
fn save_display(dir: &Path, photo: &GalleryPhoto) -> Result<Option<PathBuf>> {
    let PhotoSource::Bytes { name, data, .. } = &photo.display_source else {
        return Ok(None);
    };
    if !photo.is_converted() {
        return Ok(None);
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::debug!("Saved display image {}", path.display());
    Ok(Some(path))
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

fn print_photo(photo: &GalleryPhoto, saved: Option<&Path>) {
    let date = photo
        .metadata
        .capture_date
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{DIM}{:<19}{RESET}", "undated"));
    let location = match photo.metadata.location {
        Some(loc) => format!("{:>10.6}, {:>11.6}", loc.latitude, loc.longitude),
        None => format!("{DIM}{:<23}{RESET}", "no location"),
    };
    let kind = if photo.is_converted() {
        format!("{GREEN}heic→jpg{RESET}")
    } else {
        format!("{:<8}", format!("{:?}", photo.kind).to_lowercase())
    };

    println!("  {date}  {location}  {kind}  {}", photo.original_source);
    if let Some(path) = saved {
        println!("  {DIM}↳ {}{RESET}", path.display());
    }
}
