//! Storycanvas composes a single source image into a 1080×1920 "Stories" frame.
//!
//! A [`StoriesComposer`] decodes the source, fills the frame with a background synthesized from
//! the image (dominant-color gradient or blurred cover), centers the source on it and draws an
//! overlay caption in the band least likely to cover a person:
//!
//! - [`ColorExtractor`] derives the dominant colors
//! - [`BackgroundSynthesizer`] builds the background
//! - [`Compositor`] fits and pastes the source
//! - [`RegionScorer`] picks Top, Center or Bottom for the text
//! - [`TextLayoutEngine`] wraps and draws the caption
//! - [`CatchphraseSelector`] supplies a caption when none is given
#![forbid(unsafe_code)]

mod foundation;

pub mod assets;
pub mod background;
pub mod blur_cpu;
pub mod catchphrase;
pub mod color;
pub mod compose;
pub mod composite_cpu;
pub mod compositor;
pub mod config;
pub mod encode_jpeg;
pub mod region;
pub mod text;

pub use crate::foundation::core::{
    CANVAS_HEIGHT, CANVAS_WIDTH, ColorRgb, DegradedFlag, DegradedFlags, RasterImage, StoryCanvas,
};
pub use crate::foundation::error::{StoryError, StoryResult};

pub use crate::assets::{
    FontFace, FontOrigin, FontProvider, FontResolution, ImageCrateDecoder, ImageDecoder,
    SystemFontProvider,
};
pub use crate::background::{Background, BackgroundMode, BackgroundSynthesizer};
pub use crate::catchphrase::{CatchphraseSelector, PhraseCategory};
pub use crate::color::{
    ColorClusterer, ColorExtraction, ColorExtractor, DominantColorSet, KMeansClusterer,
    PaletteQuantizer,
};
pub use crate::compose::{
    ComposeRequest, CompositionMetadata, CompositionResult, StoriesComposer, TextPosition,
    TextSource,
};
pub use crate::compositor::{Compositor, Placement};
pub use crate::config::{
    BackgroundConfig, ClustererKind, ColorConfig, ComposerConfig, LayoutConfig, RegionPolicy,
    ScorerConfig,
};
pub use crate::encode_jpeg::{DEFAULT_JPEG_QUALITY, TempJpeg, encode_jpeg};
pub use crate::region::{OverrideReason, Region, RegionDecision, RegionScore, RegionScorer};
pub use crate::text::{TextBlock, TextLayoutEngine};
