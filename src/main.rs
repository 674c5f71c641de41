use anyhow::{bail, Context, Result};
use boothmark::config::Config;
use boothmark::watermark::{
    parse_watermark_set, FontBook, ImageFetcher, ImageFetcherConfig, OutputFormat, ProjectRecord,
    WatermarkProcessor,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Boothmark - watermark compositing for event photo booths
#[derive(Parser, Debug)]
#[command(name = "boothmark")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fail instead of writing the unwatermarked original
    #[arg(long, global = true)]
    strict: bool,

    /// Print Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a watermark onto a photo at full resolution
    Compose {
        /// Base photo: URL, data URI or local path
        #[arg(long)]
        base: String,

        /// Project record JSON (advanced set or legacy fields)
        #[arg(long, conflicts_with = "elements")]
        project: Option<PathBuf>,

        /// Bare watermark set JSON array
        #[arg(long)]
        elements: Option<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format: jpeg or png
        #[arg(long)]
        format: Option<OutputFormat>,

        /// JPEG quality (1-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,
    },

    /// Render a reduced preview as a data URI
    Preview {
        #[arg(long)]
        base: String,

        #[arg(long)]
        project: PathBuf,

        /// Preview box width (default from config)
        #[arg(long)]
        width: Option<u32>,

        /// Preview box height (default from config)
        #[arg(long)]
        height: Option<u32>,

        /// Write the data URI here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    boothmark::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    tracing::info!(
        config_file = ?args.config,
        allow_http = config.fetcher.allow_http,
        cache_entries = config.fetcher.max_cache_entries,
        "Configuration loaded successfully"
    );

    if let Command::CheckConfig = args.command {
        println!("Configuration OK");
        return Ok(());
    }

    let processor = build_processor(&config)?;

    match &args.command {
        Command::Compose {
            base,
            project,
            elements,
            output,
            format,
            quality,
        } => {
            let format = resolve_format(*format, *quality, config.output.jpeg_quality);
            compose(
                &processor,
                base,
                project.as_deref(),
                elements.as_deref(),
                output,
                format,
                args.strict,
            )
            .await?;
        }
        Command::Preview {
            base,
            project,
            width,
            height,
            output,
        } => {
            let project = read_project(project)?;
            let width = width.unwrap_or(config.preview.width);
            let height = height.unwrap_or(config.preview.height);
            let uri = processor
                .generate_preview(base, &project, width, height)
                .await
                .context("Preview generation failed")?;

            match output {
                Some(path) => std::fs::write(path, &uri)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{}", uri),
            }
        }
        Command::CheckConfig => {}
    }

    if args.metrics {
        eprint!("{}", processor.metrics().export_prometheus());
    }

    Ok(())
}

fn build_processor(config: &Config) -> Result<WatermarkProcessor> {
    let mut fetcher_config = ImageFetcherConfig::from(&config.fetcher);
    // Local files are the common case on the command line
    fetcher_config.allow_file_sources = true;

    let fetcher = ImageFetcher::new(fetcher_config).context("Failed to build image fetcher")?;
    let fonts = FontBook::from_config(&config.fonts);
    if fonts.face_count() == 0 {
        tracing::warn!("No fonts available, text elements will be skipped");
    }

    Ok(WatermarkProcessor::new(Arc::new(fetcher), Arc::new(fonts)))
}

fn resolve_format(format: Option<OutputFormat>, quality: Option<u8>, configured: u8) -> OutputFormat {
    match format.unwrap_or_default() {
        OutputFormat::Jpeg { .. } => OutputFormat::jpeg(quality.unwrap_or(configured)),
        OutputFormat::Png => OutputFormat::Png,
    }
}

fn read_project(path: &Path) -> Result<ProjectRecord> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid project JSON in {}", path.display()))
}

async fn compose(
    processor: &WatermarkProcessor,
    base: &str,
    project: Option<&Path>,
    elements: Option<&Path>,
    output: &Path,
    format: OutputFormat,
    strict: bool,
) -> Result<()> {
    let result = match (project, elements) {
        (Some(path), _) => {
            let project = read_project(path)?;
            processor.composite_project(&project, base, format).await
        }
        (None, Some(path)) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read elements {}", path.display()))?;
            let set = parse_watermark_set(&json)?;
            processor.composite_advanced(base, &set, format).await
        }
        (None, None) => processor.composite_advanced(base, &[], format).await,
    };

    match result {
        Ok(encoded) => {
            std::fs::write(output, &encoded.data)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!(
                output = %output.display(),
                width = encoded.width,
                height = encoded.height,
                content_type = encoded.content_type(),
                bytes = encoded.data.len(),
                "Watermarked image written"
            );
            Ok(())
        }
        Err(e) if strict => Err(e.into()),
        Err(e) => {
            tracing::error!(error = %e, "Composition failed, writing unwatermarked original");
            let original = read_original(base)?;
            std::fs::write(output, original)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            Ok(())
        }
    }
}

/// Raw bytes of a local base photo, used when composition fails.
fn read_original(base: &str) -> Result<Vec<u8>> {
    if base.contains("://") && !base.starts_with("file://") {
        bail!("No local original to fall back to for {}", base);
    }
    let path = base.strip_prefix("file://").unwrap_or(base);
    std::fs::read(path).with_context(|| format!("Failed to read original {}", path))
}
