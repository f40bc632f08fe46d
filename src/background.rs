use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::blur_cpu::{blur_rgb8, blur_rgb8_vertical, default_sigma};
use crate::color::DominantColorSet;
use crate::config::BackgroundConfig;
use crate::foundation::core::{
    CANVAS_HEIGHT, CANVAS_WIDTH, ColorRgb, DegradedFlag, DegradedFlags, StoryCanvas,
};
use crate::foundation::error::{StoryError, StoryResult};

/// How the area around the source image is filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// Vertical gradient through the dominant colors.
    #[default]
    Gradient,
    /// Blurred, muted cover-crop of the source itself.
    Blurred,
}

/// Synthesized background plus anything that degraded while building it.
#[derive(Clone, Debug)]
pub struct Background {
    pub canvas: StoryCanvas,
    pub flags: DegradedFlags,
}

/// The heavy cover blur runs at `1 / COVER_BLUR_DOWNSCALE` of canvas resolution.
const COVER_BLUR_DOWNSCALE: u32 = 4;

/// Builds exact canvas-sized backgrounds. Never fails: any internal error yields a flat gray
/// canvas flagged [`DegradedFlag::BackgroundFallback`].
#[derive(Clone, Debug, Default)]
pub struct BackgroundSynthesizer {
    cfg: BackgroundConfig,
}

impl BackgroundSynthesizer {
    pub fn new(cfg: BackgroundConfig) -> Self {
        Self { cfg }
    }

    /// Build the background for `mode`.
    #[tracing::instrument(skip(self, source, colors))]
    pub fn synthesize(
        &self,
        mode: BackgroundMode,
        source: &RgbImage,
        colors: &DominantColorSet,
    ) -> Background {
        let built = match mode {
            BackgroundMode::Gradient => self.gradient(colors),
            BackgroundMode::Blurred => self.blurred(source),
        };
        let mut flags = DegradedFlags::default();
        let canvas = built.unwrap_or_else(|err| {
            tracing::warn!(%err, ?mode, "background synthesis failed, using flat gray");
            flags.insert(DegradedFlag::BackgroundFallback);
            StoryCanvas::filled(ColorRgb::NEUTRAL_GRAY)
        });
        Background { canvas, flags }
    }

    /// Multi-stop vertical gradient, lightly blurred against banding.
    pub fn gradient(&self, colors: &DominantColorSet) -> StoryResult<StoryCanvas> {
        let stops = gradient_stops(colors, self.cfg.stop_delta);
        let mut img = RgbImage::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        let last_row = (CANVAS_HEIGHT - 1) as f32;
        let segments = (stops.len() - 1) as f32;

        for (y, row) in img.enumerate_rows_mut() {
            let pos = (y as f32 / last_row) * segments;
            let i = (pos.floor() as usize).min(stops.len() - 2);
            let color = stops[i].lerp(stops[i + 1], pos - i as f32).to_pixel();
            for (_, _, px) in row {
                *px = color;
            }
        }

        let radius = self.cfg.gradient_blur_radius;
        let img = blur_rgb8_vertical(&img, radius, default_sigma(radius))?;
        StoryCanvas::from_image(img)
    }

    /// Cover-crop of `source`, heavily blurred, desaturated and darkened.
    pub fn blurred(&self, source: &RgbImage) -> StoryResult<StoryCanvas> {
        let (sw, sh) = source.dimensions();
        if sw == 0 || sh == 0 {
            return Err(StoryError::validation("cannot blur an empty source"));
        }

        let small_w = CANVAS_WIDTH / COVER_BLUR_DOWNSCALE;
        let small_h = CANVAS_HEIGHT / COVER_BLUR_DOWNSCALE;
        let small = cover_crop(source, small_w, small_h);

        let radius = self.cfg.cover_blur_radius.div_ceil(COVER_BLUR_DOWNSCALE);
        let sigma = default_sigma(self.cfg.cover_blur_radius) / COVER_BLUR_DOWNSCALE as f32;
        let mut small = blur_rgb8(&small, radius, sigma.max(0.5))?;
        mute_in_place(&mut small, self.cfg.saturation, self.cfg.brightness);

        let full = imageops::resize(&small, CANVAS_WIDTH, CANVAS_HEIGHT, FilterType::Triangle);
        StoryCanvas::from_image(full)
    }
}

/// Two or three gradient stops; a single color is expanded to lighter / base / darker.
pub fn gradient_stops(colors: &DominantColorSet, delta: i16) -> Vec<ColorRgb> {
    match colors.as_slice() {
        [only] => vec![only.offset(delta), *only, only.offset(-delta)],
        many => many.iter().take(3).copied().collect(),
    }
}

/// Scale `source` so it covers `width`×`height`, then center-crop to exactly that size.
///
/// The crop is taken in source space first, so extreme aspect ratios never upscale past the
/// target.
pub fn cover_crop(source: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (sw, sh) = source.dimensions();
    let target = f64::from(width) / f64::from(height);
    let (cw, ch) = if f64::from(sw) / f64::from(sh) > target {
        ((f64::from(sh) * target).round() as u32, sh)
    } else {
        (sw, (f64::from(sw) / target).round() as u32)
    };
    let (cw, ch) = (cw.clamp(1, sw), ch.clamp(1, sh));

    let cropped = imageops::crop_imm(source, (sw - cw) / 2, (sh - ch) / 2, cw, ch).to_image();
    imageops::resize(&cropped, width, height, FilterType::Triangle)
}

/// Blend each pixel toward its luma by `saturation`, then scale by `brightness`.
fn mute_in_place(img: &mut RgbImage, saturation: f32, brightness: f32) {
    for px in img.pixels_mut() {
        let gray = ColorRgb::from(*px).luma();
        for c in px.0.iter_mut() {
            let v = (gray + saturation * (f32::from(*c) - gray)) * brightness;
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(colors: &[ColorRgb]) -> DominantColorSet {
        DominantColorSet::new(colors.to_vec()).unwrap()
    }

    #[test]
    fn single_color_gets_lighter_and_darker_stops() {
        let stops = gradient_stops(&set(&[ColorRgb::new(240, 100, 10)]), 30);
        assert_eq!(
            stops,
            vec![
                ColorRgb::new(255, 130, 40),
                ColorRgb::new(240, 100, 10),
                ColorRgb::new(210, 70, 0),
            ]
        );
    }

    #[test]
    fn at_most_three_stops_are_used() {
        let colors = [
            ColorRgb::new(1, 1, 1),
            ColorRgb::new(2, 2, 2),
            ColorRgb::new(3, 3, 3),
            ColorRgb::new(4, 4, 4),
        ];
        assert_eq!(gradient_stops(&set(&colors), 30).len(), 3);
        assert_eq!(gradient_stops(&set(&colors[..2]), 30).len(), 2);
    }

    #[test]
    fn gradient_runs_top_to_bottom_through_stops() {
        let synth = BackgroundSynthesizer::default();
        let canvas = synth
            .gradient(&set(&[ColorRgb::new(250, 0, 0), ColorRgb::new(0, 0, 250)]))
            .unwrap();
        assert_eq!((canvas.width(), canvas.height()), (CANVAS_WIDTH, CANVAS_HEIGHT));

        let top = canvas.pixel(0, 0);
        let mid = canvas.pixel(540, 960);
        let bottom = canvas.pixel(1079, 1919);
        assert!(top.r > 240 && top.b < 10, "top {top:?}");
        assert!(bottom.b > 240 && bottom.r < 10, "bottom {bottom:?}");
        assert!((i32::from(mid.r) - 125).abs() <= 2, "mid {mid:?}");
        // Rows are uniform.
        assert_eq!(canvas.pixel(0, 700), canvas.pixel(1079, 700));
    }

    #[test]
    fn blurred_background_is_muted_and_canvas_sized() {
        let source = RgbImage::from_fn(300, 200, |x, _| {
            if x < 150 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 255, 0])
            }
        });
        let canvas = BackgroundSynthesizer::default().blurred(&source).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (CANVAS_WIDTH, CANVAS_HEIGHT));

        let left = canvas.pixel(10, 960);
        // Saturation at 30% and brightness at 70% pull pure red well toward gray.
        assert!(left.r < 200, "{left:?}");
        assert!(left.g > 20, "{left:?}");
        assert!(left.r > left.g);
    }

    #[test]
    fn cover_crop_fills_target_exactly() {
        let wide = RgbImage::new(400, 100);
        assert_eq!(cover_crop(&wide, 270, 480).dimensions(), (270, 480));
        let tall = RgbImage::new(10, 900);
        assert_eq!(cover_crop(&tall, 270, 480).dimensions(), (270, 480));
        let sliver = RgbImage::new(4000, 1);
        assert_eq!(cover_crop(&sliver, 270, 480).dimensions(), (270, 480));
    }

    #[test]
    fn cover_crop_keeps_the_center() {
        let src = RgbImage::from_fn(900, 160, |x, _| {
            if (300..600).contains(&x) {
                image::Rgb([0, 200, 0])
            } else {
                image::Rgb([200, 0, 0])
            }
        });
        // A 90x160 window around the middle column sees only the green stripe.
        let out = cover_crop(&src, 9, 16);
        assert!(out.pixels().all(|p| p.0 == [0, 200, 0]));
    }

    #[test]
    fn synthesize_never_fails() {
        let out = BackgroundSynthesizer::default().synthesize(
            BackgroundMode::Blurred,
            &RgbImage::new(0, 0),
            &DominantColorSet::fallback(),
        );
        assert!(out.flags.contains(DegradedFlag::BackgroundFallback));
        assert_eq!(out.canvas.pixel(5, 5), ColorRgb::NEUTRAL_GRAY);
    }
}
