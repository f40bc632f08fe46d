use image::{Rgb, RgbImage};

use crate::foundation::error::{StoryError, StoryResult};

/// Width of every composed story in pixels.
pub const CANVAS_WIDTH: u32 = 1080;
/// Height of every composed story in pixels.
pub const CANVAS_HEIGHT: u32 = 1920;

/// Owned 8-bit RGB raster passed stage to stage.
pub type RasterImage = RgbImage;

/// Straight 8-bit RGB color.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ColorRgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl ColorRgb {
    /// Neutral gray used whenever a color cannot be derived from the image.
    pub const NEUTRAL_GRAY: Self = Self::new(128, 128, 128);

    /// Build from channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Shift every channel by `delta`, clamped to `[0, 255]`.
    pub fn offset(self, delta: i16) -> Self {
        let f = |c: u8| (i16::from(c) + delta).clamp(0, 255) as u8;
        Self::new(f(self.r), f(self.g), f(self.b))
    }

    /// Rec. 601 luma in `[0, 255]`.
    pub fn luma(self) -> f32 {
        0.299 * f32::from(self.r) + 0.587 * f32::from(self.g) + 0.114 * f32::from(self.b)
    }

    /// Channel-wise linear interpolation, `t` clamped to `[0, 1]`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| {
            (f32::from(a) + (f32::from(b) - f32::from(a)) * t)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }

    /// Convert to an `image` pixel.
    pub fn to_pixel(self) -> Rgb<u8> {
        Rgb([self.r, self.g, self.b])
    }
}

impl From<Rgb<u8>> for ColorRgb {
    fn from(px: Rgb<u8>) -> Self {
        Self::new(px[0], px[1], px[2])
    }
}

impl From<[u8; 3]> for ColorRgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// Fully initialized 1080×1920 RGB raster.
///
/// The dimensions are checked on construction and cannot change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct StoryCanvas {
    image: RgbImage,
}

impl StoryCanvas {
    /// Canvas filled with one color.
    pub fn filled(color: ColorRgb) -> Self {
        Self {
            image: RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, color.to_pixel()),
        }
    }

    /// Wrap an existing raster, rejecting anything that is not exactly canvas sized.
    pub fn from_image(image: RgbImage) -> StoryResult<Self> {
        if image.dimensions() != (CANVAS_WIDTH, CANVAS_HEIGHT) {
            return Err(StoryError::validation(format!(
                "canvas must be {CANVAS_WIDTH}x{CANVAS_HEIGHT}, got {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying raster.
    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub(crate) fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Release the underlying raster.
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Color of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> ColorRgb {
        ColorRgb::from(*self.image.get_pixel(x, y))
    }
}

/// Locally recovered condition recorded on a composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedFlag {
    /// The configured clusterer failed; colors came from palette quantization.
    ClusteringDegraded,
    /// No colors could be derived; the neutral gray set was used.
    ColorExtractionFallback,
    /// Background synthesis failed; a flat gray canvas was used.
    BackgroundFallback,
    /// The preferred font could not be loaded; the default font was used.
    FontLoadDegraded,
    /// At least one word was wider than the wrap width and got a line of its own.
    LayoutOverflow,
    /// No font was available at all; the overlay text was measured but not drawn.
    TextNotRendered,
}

/// Ordered, de-duplicated set of [`DegradedFlag`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DegradedFlags(Vec<DegradedFlag>);

impl DegradedFlags {
    /// Record a flag once, keeping first-occurrence order.
    pub fn insert(&mut self, flag: DegradedFlag) {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    /// Merge another set into this one.
    pub fn extend(&mut self, other: &DegradedFlags) {
        for &flag in &other.0 {
            self.insert(flag);
        }
    }

    /// Return `true` when `flag` was recorded.
    pub fn contains(&self, flag: DegradedFlag) -> bool {
        self.0.contains(&flag)
    }

    /// Return `true` when nothing degraded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recorded flags in order of occurrence.
    pub fn as_slice(&self) -> &[DegradedFlag] {
        &self.0
    }
}
