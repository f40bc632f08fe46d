use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;

use crate::assets::{FontProvider, ImageCrateDecoder, ImageDecoder, SystemFontProvider};
use crate::background::{BackgroundMode, BackgroundSynthesizer};
use crate::catchphrase::{CatchphraseSelector, PhraseCategory};
use crate::color::{ColorExtractor, DominantColorSet};
use crate::compositor::{Compositor, Placement, is_fast_path};
use crate::config::ComposerConfig;
use crate::encode_jpeg::{DEFAULT_JPEG_QUALITY, TempJpeg, encode_jpeg};
use crate::foundation::core::{DegradedFlag, DegradedFlags, StoryCanvas};
use crate::foundation::error::StoryResult;
use crate::region::{Region, RegionDecision, RegionScorer};
use crate::text::TextLayoutEngine;

/// Where the caller wants the overlay text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    /// Let [`RegionScorer`] decide.
    #[default]
    Auto,
    Top,
    Center,
    Bottom,
}

impl TextPosition {
    /// The forced region, or `None` for [`TextPosition::Auto`].
    pub fn fixed_region(self) -> Option<Region> {
        match self {
            TextPosition::Auto => None,
            TextPosition::Top => Some(Region::Top),
            TextPosition::Center => Some(Region::Center),
            TextPosition::Bottom => Some(Region::Bottom),
        }
    }
}

/// Where the overlay text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "category")]
pub enum TextSource {
    Explicit,
    Catchphrase(PhraseCategory),
}

/// Everything one composition needs.
#[derive(Clone, Debug, Default)]
pub struct ComposeRequest {
    /// Encoded source image.
    pub source: Vec<u8>,
    /// Declared MIME type; the sniffed format wins when both are known.
    pub mime_type: Option<String>,
    /// Text to draw. Blank or absent text is replaced by a catchphrase.
    pub overlay_text: Option<String>,
    /// Free text describing the content, used to pick a catchphrase.
    pub content_keywords: Option<String>,
    pub background_mode: BackgroundMode,
    pub text_position: TextPosition,
    /// Preferred font file; falls back to the provider's default.
    pub font_path: Option<PathBuf>,
}

impl ComposeRequest {
    pub fn new(source: Vec<u8>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn overlay_text(mut self, text: impl Into<String>) -> Self {
        self.overlay_text = Some(text.into());
        self
    }

    pub fn content_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.content_keywords = Some(keywords.into());
        self
    }

    pub fn background_mode(mut self, mode: BackgroundMode) -> Self {
        self.background_mode = mode;
        self
    }

    pub fn text_position(mut self, position: TextPosition) -> Self {
        self.text_position = position;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }
}

/// What happened during a composition.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CompositionMetadata {
    /// `None` when the fast path skipped background synthesis.
    pub background_mode_used: Option<BackgroundMode>,
    pub fast_path: bool,
    pub chosen_region: Region,
    pub dominant_colors: DominantColorSet,
    pub text_line_count: usize,
    pub degraded_flags: DegradedFlags,
    /// Text that was laid out, after catchphrase selection.
    pub overlay_text: String,
    pub text_source: TextSource,
    /// Requested position; anything but `Auto` bypasses scoring.
    pub text_position: TextPosition,
    /// Where the source image landed on the canvas.
    pub source_placement: Placement,
    /// Full scoring breakdown when the region was chosen automatically.
    pub region_decision: Option<RegionDecision>,
}

/// Composed story and its metadata.
#[derive(Clone, Debug)]
pub struct CompositionResult {
    pub canvas: StoryCanvas,
    pub metadata: CompositionMetadata,
}

impl CompositionResult {
    /// Encode the canvas as a quality-95 JPEG.
    pub fn to_jpeg_bytes(&self) -> StoryResult<Vec<u8>> {
        encode_jpeg(&self.canvas, DEFAULT_JPEG_QUALITY)
    }

    /// Write the canvas to a temporary JPEG that is deleted when the returned value drops.
    pub fn save_temp_jpeg(&self) -> StoryResult<TempJpeg> {
        TempJpeg::write(&self.canvas, DEFAULT_JPEG_QUALITY)
    }
}

/// Turns one source image into a 1080×1920 story.
///
/// Holds only configuration and injected collaborators, so a single instance can serve
/// concurrent [`compose`](Self::compose) calls.
pub struct StoriesComposer {
    decoder: Box<dyn ImageDecoder>,
    fonts: Arc<dyn FontProvider>,
    config: ComposerConfig,
    colors: ColorExtractor,
    backgrounds: BackgroundSynthesizer,
    scorer: RegionScorer,
    catchphrases: CatchphraseSelector,
}

impl std::fmt::Debug for StoriesComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoriesComposer")
            .field("config", &self.config)
            .field("colors", &self.colors)
            .finish_non_exhaustive()
    }
}

impl StoriesComposer {
    /// Composer with the default configuration.
    pub fn new(decoder: Box<dyn ImageDecoder>, fonts: Arc<dyn FontProvider>) -> Self {
        Self::build(decoder, fonts, ComposerConfig::default())
    }

    /// Composer with a custom configuration, validated up front.
    pub fn with_config(
        decoder: Box<dyn ImageDecoder>,
        fonts: Arc<dyn FontProvider>,
        config: ComposerConfig,
    ) -> StoryResult<Self> {
        config.validate()?;
        Ok(Self::build(decoder, fonts, config))
    }

    /// `image`-crate decoding and the system default font.
    pub fn with_system_fonts() -> Self {
        Self::new(
            Box::new(ImageCrateDecoder),
            Arc::new(SystemFontProvider::new()),
        )
    }

    fn build(
        decoder: Box<dyn ImageDecoder>,
        fonts: Arc<dyn FontProvider>,
        config: ComposerConfig,
    ) -> Self {
        Self {
            colors: ColorExtractor::from_config(&config.color),
            backgrounds: BackgroundSynthesizer::new(config.background.clone()),
            scorer: RegionScorer::new(config.scorer.clone()),
            catchphrases: CatchphraseSelector,
            decoder,
            fonts,
            config,
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Run the full pipeline.
    ///
    /// Only an undecodable source or an internal invariant violation produce an error; every
    /// other problem degrades and is listed in
    /// [`CompositionMetadata::degraded_flags`].
    #[tracing::instrument(skip(self, request, rng), fields(
        bytes = request.source.len(),
        mode = ?request.background_mode,
        position = ?request.text_position,
    ))]
    pub fn compose<R: Rng + ?Sized>(
        &self,
        request: &ComposeRequest,
        rng: &mut R,
    ) -> StoryResult<CompositionResult> {
        let source = self
            .decoder
            .decode(&request.source, request.mime_type.as_deref())?;
        let mut flags = DegradedFlags::default();

        let (overlay_text, text_source) = match request.overlay_text.as_deref() {
            Some(text) if !text.trim().is_empty() => (text.to_string(), TextSource::Explicit),
            _ => {
                let keywords = request.content_keywords.as_deref().unwrap_or("");
                let (category, phrase) = self.catchphrases.select(keywords, rng);
                (phrase, TextSource::Catchphrase(category))
            }
        };

        let extraction = self.colors.extract(&source);
        flags.extend(&extraction.flags);

        let fast_path = is_fast_path(source.width(), source.height());
        let (mut canvas, source_placement, background_mode_used) = if fast_path {
            tracing::debug!(
                width = source.width(),
                height = source.height(),
                "source already has story aspect, skipping background"
            );
            let canvas = Compositor.fast_path(&source)?;
            (canvas, Placement::full_canvas(), None)
        } else {
            let background = self.backgrounds.synthesize(
                request.background_mode,
                &source,
                &extraction.colors,
            );
            flags.extend(&background.flags);
            let (canvas, placement) = Compositor.composite(background.canvas, &source)?;
            (canvas, placement, Some(request.background_mode))
        };

        let font = self.fonts.resolve(request.font_path.as_deref());
        if font.degraded {
            flags.insert(DegradedFlag::FontLoadDegraded);
        }
        let mut text = TextLayoutEngine::new(
            self.config.layout.clone(),
            self.config.scorer.policy,
            font.face.as_deref(),
        );
        let block = text.measure(&overlay_text);
        if block.overflow {
            flags.insert(DegradedFlag::LayoutOverflow);
        }

        let (chosen_region, region_decision) = match request.text_position.fixed_region() {
            Some(region) => (region, None),
            None => {
                let decision = self
                    .scorer
                    .score(&canvas, &overlay_text, block.total_height_px);
                (decision.chosen, Some(decision))
            }
        };

        if !block.is_empty() && !text.render(&mut canvas, &block, chosen_region)? {
            flags.insert(DegradedFlag::TextNotRendered);
        }

        tracing::info!(
            fast_path,
            region = ?chosen_region,
            lines = block.line_count(),
            degraded = flags.as_slice().len(),
            "story composed"
        );

        Ok(CompositionResult {
            canvas,
            metadata: CompositionMetadata {
                background_mode_used,
                fast_path,
                chosen_region,
                dominant_colors: extraction.colors,
                text_line_count: block.line_count(),
                degraded_flags: flags,
                overlay_text,
                text_source,
                text_position: request.text_position,
                source_placement,
                region_decision,
            },
        })
    }
}
