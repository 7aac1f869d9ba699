use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use scoremark_core::{EngineConfig, PageAnnotation};
use scoremark_export::{ExportManifest, Exporter};
use scoremark_render::raster::composite_over;
use scoremark_render::{
    default_engine, render_overlay, DirectoryFetcher, DocumentSession, Font, PageRenderer,
    RenderRequest, SourceKind, SourceRef, SurfaceId,
};
use scoremark_scheduler::RetryPolicy;
use scoremark_storage::{JsonFileRepository, NoteRepository};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter directives
pub const LOG_ENV: &str = "SCOREMARK_LOG";

const CLI_SURFACE: SurfaceId = SurfaceId::new("cli");

#[derive(Debug, Parser)]
#[command(name = "scoremark")]
#[command(about = "Sheet-music annotation toolkit")]
pub struct Cli {
    /// Configuration file of `key = value` lines; defaults to SCOREMARK_* variables
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one page with its ink to a PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Annotations: a saved note, a note store file, or a list of pages
        #[arg(long, value_name = "NOTES.json")]
        notes: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Merge the sources of a manifest into one PDF.
    Export {
        #[arg(value_name = "MANIFEST.json")]
        manifest: PathBuf,
        /// Directory source references are resolved against
        #[arg(long, value_name = "DIR")]
        sources: PathBuf,
        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,
        /// TrueType font for labels and typed text
        #[arg(long, value_name = "FONT.ttf")]
        font: Option<PathBuf>,
    },
    /// Inspect saved notes.
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
}

#[derive(Debug, Subcommand)]
enum NotesCommand {
    /// List one owner's notes, newest first.
    List {
        #[arg(long)]
        owner: String,
        /// Note store directory; defaults to the configured or per-user one
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    kind: SourceKind,
    page_count: u32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    native_width: f64,
    native_height: f64,
    scale: f64,
    canvas_width: u32,
    canvas_height: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoteSummary {
    id: String,
    title: String,
    source_ref: SourceRef,
    pages: usize,
    updated_at: DateTime<Utc>,
}

/// Shapes accepted by `render --notes`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NotesFile {
    Pages(Vec<PageAnnotation>),
    Note { annotations: Vec<PageAnnotation> },
    Stored { note: StoredNote },
}

#[derive(Debug, Deserialize)]
struct StoredNote {
    annotations: Vec<PageAnnotation>,
}

impl NotesFile {
    fn into_pages(self) -> Vec<PageAnnotation> {
        match self {
            Self::Pages(pages) | Self::Note { annotations: pages } => pages,
            Self::Stored { note } => note.annotations,
        }
    }
}

/// Install the stderr log subscriber, filtered by `SCOREMARK_LOG` (default `info`)
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => EngineConfig::from_env().context("invalid SCOREMARK_* configuration")?,
    };

    match cli.command {
        Commands::Info { file } => run_info(&config, &file),
        Commands::Render { file, page, notes, output } => {
            run_render(&config, &file, page, notes.as_deref(), &output)
        }
        Commands::Export { manifest, sources, output_dir, font } => {
            run_export(&config, &manifest, &sources, &output_dir, font.as_deref())
        }
        Commands::Notes { command: NotesCommand::List { owner, store } } => {
            run_notes_list(&config, &owner, store)
        }
    }
}

fn run_info(config: &EngineConfig, file: &Path) -> Result<()> {
    let (mut session, source) = open_session(config, file)?;
    let kind = session.kind().context("document did not open")?;
    let page_count = session.page_count()?;

    let pages = (0..page_count)
        .map(|page| {
            let geometry = session.geometry(page)?;
            Ok(PageOutput {
                native_width: geometry.native_width,
                native_height: geometry.native_height,
                scale: geometry.scale,
                canvas_width: geometry.canvas.width,
                canvas_height: geometry.canvas.height,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput { path: file.display().to_string(), kind, page_count, pages };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    tracing::debug!(source = %source, "info printed");
    session.close();
    Ok(())
}

fn run_render(
    config: &EngineConfig,
    file: &Path,
    page: u32,
    notes: Option<&Path>,
    output: &Path,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let annotations = match notes {
        Some(path) => load_notes(path)?,
        None => Vec::new(),
    };
    let (mut session, source) = open_session(config, file)?;

    let mut renderer = PageRenderer::new(RetryPolicy::once_after(config.engine_retry_delay));
    let mut request = RenderRequest::new(source, page - 1);
    if let Some(kind) = session.kind() {
        request = request.with_kind(kind);
    }
    let rendered = renderer
        .render_now(&mut session, CLI_SURFACE, request)
        .context("failed to render page")?;

    let mut image = rendered.image;
    if let Some(ink) = annotations.get((page - 1) as usize).filter(|ink| !ink.is_empty()) {
        let font = load_configured_font(config);
        composite_over(&mut image, &render_overlay(rendered.geometry.canvas, ink, font.as_ref()));
    }

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    image.save(output).with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn run_export(
    config: &EngineConfig,
    manifest_path: &Path,
    sources: &Path,
    output_dir: &Path,
    font: Option<&Path>,
) -> Result<()> {
    let manifest = ExportManifest::from_file(manifest_path)
        .with_context(|| format!("failed to load manifest {}", manifest_path.display()))?;
    if !sources.is_dir() {
        anyhow::bail!("sources directory does not exist: {}", sources.display());
    }

    let font = match font {
        Some(path) => Some(
            Font::from_file(path)
                .with_context(|| format!("failed to load font {}", path.display()))?,
        ),
        None => load_configured_font(config),
    };

    let mut exporter =
        Exporter::new(Box::new(DirectoryFetcher::new(sources))).with_limits(config.canvas_limits);
    if let Some(font) = font {
        exporter = exporter.with_font(font);
    }

    let today = chrono::Local::now().date_naive();
    let outcome = exporter.export(&manifest, today).context("export failed")?;
    for skipped in &outcome.skipped {
        eprintln!("warning: {skipped}: {}", skipped.reason);
    }

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&outcome.file_name);
    fs::write(&path, &outcome.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("{}", path.display());
    Ok(())
}

fn run_notes_list(config: &EngineConfig, owner: &str, store: Option<PathBuf>) -> Result<()> {
    let repository = match store.or_else(|| config.store_dir.clone()) {
        Some(root) => JsonFileRepository::with_root(root),
        None => JsonFileRepository::from_default_project()?,
    };

    let summaries: Vec<NoteSummary> = repository
        .list_by_owner(owner)
        .context("failed to list notes")?
        .into_iter()
        .map(|note| NoteSummary {
            id: note.id.to_string(),
            title: note.title,
            source_ref: note.source_ref,
            pages: note.annotations.len(),
            updated_at: note.updated_at,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

/// Session over the file's directory with the file opened
fn open_session(config: &EngineConfig, file: &Path) -> Result<(DocumentSession, SourceRef)> {
    ensure_file_exists(file)?;
    let directory =
        file.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .and_then(|name| name.to_str())
        .context("file name is not valid UTF-8")?;
    let source = SourceRef::new(name);

    let fetcher = DirectoryFetcher::new(directory);
    let mut session = DocumentSession::new(Box::new(fetcher), Box::new(default_engine()))
        .with_limits(config.canvas_limits);
    session
        .open(&source, SourceKind::from_path(file))
        .with_context(|| format!("failed to open {}", file.display()))?;
    Ok((session, source))
}

fn load_notes(path: &Path) -> Result<Vec<PageAnnotation>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read notes {}", path.display()))?;
    let notes: NotesFile = serde_json::from_str(&json)
        .with_context(|| format!("unrecognized notes file {}", path.display()))?;
    Ok(notes.into_pages())
}

/// Label font from configuration; a broken font only costs the labels
fn load_configured_font(config: &EngineConfig) -> Option<Font> {
    let path = config.label_font.as_ref()?;
    match Font::from_file(path) {
        Ok(font) => Some(font),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "label font unavailable");
            None
        }
    }
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
