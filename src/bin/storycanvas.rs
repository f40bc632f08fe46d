use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use storycanvas::{
    BackgroundMode, ComposeRequest, ComposerConfig, ImageCrateDecoder, StoriesComposer,
    StoryResult, SystemFontProvider, TextPosition,
};

#[derive(Parser, Debug)]
#[command(name = "storycanvas", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose one image into a 1080x1920 story JPEG.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Source image (JPEG, PNG or WebP).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output JPEG path.
    #[arg(long)]
    out: PathBuf,

    /// Overlay text. A catchphrase is picked when omitted.
    #[arg(long)]
    text: Option<String>,

    /// Content description used to pick a catchphrase.
    #[arg(long)]
    keywords: Option<String>,

    #[arg(long, value_enum, default_value_t = BackgroundChoice::Gradient)]
    background: BackgroundChoice,

    #[arg(long, value_enum, default_value_t = PositionChoice::Auto)]
    position: PositionChoice,

    /// Preferred font file.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Seed for catchphrase selection; random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// JSON composer configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the metadata JSON here.
    #[arg(long)]
    metadata: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BackgroundChoice {
    Gradient,
    Blurred,
}

impl From<BackgroundChoice> for BackgroundMode {
    fn from(c: BackgroundChoice) -> Self {
        match c {
            BackgroundChoice::Gradient => BackgroundMode::Gradient,
            BackgroundChoice::Blurred => BackgroundMode::Blurred,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PositionChoice {
    Auto,
    Top,
    Center,
    Bottom,
}

impl From<PositionChoice> for TextPosition {
    fn from(c: PositionChoice) -> Self {
        match c {
            PositionChoice::Auto => TextPosition::Auto,
            PositionChoice::Top => TextPosition::Top,
            PositionChoice::Center => TextPosition::Center,
            PositionChoice::Bottom => TextPosition::Bottom,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
    }
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let source = std::fs::read(&args.in_path)
        .with_context(|| format!("read input '{}'", args.in_path.display()))?;
    let mut request = ComposeRequest::new(source)
        .background_mode(args.background.into())
        .text_position(args.position.into());
    request.overlay_text = args.text;
    request.content_keywords = args.keywords;
    request.font_path = args.font;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let outcome = build_composer(args.config.as_deref())
        .and_then(|composer| composer.compose(&request, &mut rng));
    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(%err, "composition failed, writing the original image instead");
            eprintln!("storycanvas: {err}; copied original to {}", args.out.display());
            copy_original(&args.in_path, &args.out)?;
            return Ok(());
        }
    };

    let bytes = result.to_jpeg_bytes()?;
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write output '{}'", args.out.display()))?;

    let json = serde_json::to_string_pretty(&result.metadata).context("serialize metadata")?;
    if let Some(path) = &args.metadata {
        std::fs::write(path, &json)
            .with_context(|| format!("write metadata '{}'", path.display()))?;
    }
    println!("{json}");
    Ok(())
}

fn build_composer(config: Option<&Path>) -> StoryResult<StoriesComposer> {
    let config = match config {
        Some(path) => ComposerConfig::from_path(path)?,
        None => ComposerConfig::default(),
    };
    StoriesComposer::with_config(
        Box::new(ImageCrateDecoder),
        Arc::new(SystemFontProvider::new()),
        config,
    )
}

fn copy_original(src: &Path, dst: &Path) -> anyhow::Result<()> {
    std::fs::copy(src, dst)
        .with_context(|| format!("copy '{}' to '{}'", src.display(), dst.display()))?;
    Ok(())
}
