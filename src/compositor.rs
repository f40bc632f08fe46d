use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::foundation::core::{CANVAS_HEIGHT, CANVAS_WIDTH, StoryCanvas};
use crate::foundation::error::{StoryError, StoryResult};

/// Width / height of the story canvas.
pub const TARGET_ASPECT: f64 = CANVAS_WIDTH as f64 / CANVAS_HEIGHT as f64;

/// Sources whose aspect ratio is within this distance of [`TARGET_ASPECT`] skip the background.
pub const FAST_PATH_TOLERANCE: f64 = 0.01;

/// Where the resized source lands on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    /// Left offset in canvas pixels.
    pub x: u32,
    /// Top offset in canvas pixels.
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Placement covering the full canvas.
    pub fn full_canvas() -> Self {
        Self {
            x: 0,
            y: 0,
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }
}

/// Return `true` when a `width`×`height` source can be resized straight onto the canvas.
pub fn is_fast_path(width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let aspect = f64::from(width) / f64::from(height);
    (aspect - TARGET_ASPECT).abs() < FAST_PATH_TOLERANCE
}

/// Aspect-preserving fit of a `width`×`height` source, centered on the canvas.
///
/// The result never exceeds the canvas and its offsets are floor-divided.
pub fn fit_placement(width: u32, height: u32) -> StoryResult<Placement> {
    if width == 0 || height == 0 {
        return Err(StoryError::validation("source image has zero area"));
    }
    let scale = f64::min(
        f64::from(CANVAS_WIDTH) / f64::from(width),
        f64::from(CANVAS_HEIGHT) / f64::from(height),
    );
    // The epsilon keeps exact fits (e.g. 540 * 2.0) from flooring one pixel short.
    let fit = |side: u32, max: u32| -> u32 {
        ((f64::from(side) * scale + 1e-9).floor() as u32).clamp(1, max)
    };
    let new_w = fit(width, CANVAS_WIDTH);
    let new_h = fit(height, CANVAS_HEIGHT);

    Ok(Placement {
        x: (CANVAS_WIDTH - new_w) / 2,
        y: (CANVAS_HEIGHT - new_h) / 2,
        width: new_w,
        height: new_h,
    })
}

/// Places the source image onto a background.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compositor;

impl Compositor {
    /// Resize `source` directly to canvas size; only valid when [`is_fast_path`] holds.
    #[tracing::instrument(skip(self, source))]
    pub fn fast_path(&self, source: &RgbImage) -> StoryResult<StoryCanvas> {
        if !is_fast_path(source.width(), source.height()) {
            return Err(StoryError::validation(
                "fast path requires a source with the canvas aspect ratio",
            ));
        }
        let resized = resize_exact(source, CANVAS_WIDTH, CANVAS_HEIGHT);
        StoryCanvas::from_image(resized)
    }

    /// Fit `source` inside the canvas and paste it centered over `background`.
    #[tracing::instrument(skip(self, background, source))]
    pub fn composite(
        &self,
        mut background: StoryCanvas,
        source: &RgbImage,
    ) -> StoryResult<(StoryCanvas, Placement)> {
        let placement = fit_placement(source.width(), source.height())?;
        let resized = resize_exact(source, placement.width, placement.height);
        imageops::replace(
            background.as_image_mut(),
            &resized,
            i64::from(placement.x),
            i64::from(placement.y),
        );
        tracing::debug!(?placement, "source composited");
        Ok((background, placement))
    }
}

fn resize_exact(source: &RgbImage, width: u32, height: u32) -> RgbImage {
    if source.dimensions() == (width, height) {
        return source.clone();
    }
    imageops::resize(source, width, height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::ColorRgb;

    #[test]
    fn square_source_is_centered_vertically() {
        let p = fit_placement(1080, 1080).unwrap();
        assert_eq!(
            p,
            Placement {
                x: 0,
                y: 420,
                width: 1080,
                height: 1080
            }
        );
    }

    #[test]
    fn small_and_wide_sources_scale_without_overflow() {
        let p = fit_placement(540, 540).unwrap();
        assert_eq!((p.width, p.height, p.y), (1080, 1080, 420));

        let wide = fit_placement(4000, 1000).unwrap();
        assert_eq!((wide.width, wide.height), (1080, 270));
        assert_eq!((wide.x, wide.y), (0, 825));

        let tall = fit_placement(100, 1000).unwrap();
        assert_eq!((tall.width, tall.height), (192, 1920));
        assert_eq!(tall.x, (1080 - 192) / 2);

        let sliver = fit_placement(10_000, 1).unwrap();
        assert_eq!(sliver.height, 1);
    }

    #[test]
    fn fast_path_tolerance() {
        assert!(is_fast_path(1080, 1920));
        assert!(is_fast_path(720, 1280));
        assert!(is_fast_path(1090, 1920));
        assert!(!is_fast_path(1080, 1080));
        assert!(!is_fast_path(0, 1920));
    }

    #[test]
    fn composite_keeps_background_outside_placement() {
        let bg = StoryCanvas::filled(ColorRgb::new(1, 2, 3));
        let source = RgbImage::from_pixel(1080, 1080, image::Rgb([200, 200, 200]));
        let (canvas, placement) = Compositor.composite(bg, &source).unwrap();
        assert_eq!(placement.y, 420);
        assert_eq!(canvas.pixel(540, 419), ColorRgb::new(1, 2, 3));
        assert_eq!(canvas.pixel(540, 420), ColorRgb::new(200, 200, 200));
        assert_eq!(canvas.pixel(540, 1499), ColorRgb::new(200, 200, 200));
        assert_eq!(canvas.pixel(540, 1500), ColorRgb::new(1, 2, 3));
    }

    #[test]
    fn fast_path_rejects_other_aspects() {
        assert!(Compositor.fast_path(&RgbImage::new(100, 100)).is_err());
        let canvas = Compositor.fast_path(&RgbImage::new(540, 960)).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (1080, 1920));
    }
}
