use crate::assets::FontFace;
use crate::composite_cpu::over_rgba8_premul_in_place;
use crate::config::{LayoutConfig, RegionPolicy, TextStyle};
use crate::foundation::core::{CANVAS_HEIGHT, CANVAS_WIDTH, StoryCanvas};
use crate::foundation::error::{StoryError, StoryResult};
use crate::region::Region;

/// Straight RGBA8 brush carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrushRgba8 {
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
}

/// Wrapped and measured overlay text.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TextBlock {
    /// Text exactly as requested.
    pub source: String,
    /// Wrapped lines, top to bottom.
    pub lines: Vec<String>,
    /// Pixel width of each line in `lines`.
    pub line_widths: Vec<f32>,
    pub font_size_px: f32,
    pub line_height_px: f32,
    pub total_height_px: f32,
    /// Width the lines were wrapped against.
    pub max_width_px: f32,
    /// At least one word was wider than `max_width_px` on its own.
    pub overflow: bool,
}

impl TextBlock {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One wrapped line and its measured width.
#[derive(Clone, Debug, PartialEq)]
pub struct WrappedLine {
    pub text: String,
    pub width: f32,
}

/// Greedy word wrap of `text` against `max_width`.
///
/// Words are split on whitespace and rejoined with single spaces. A word wider than
/// `max_width` gets a line of its own and sets the returned overflow flag.
pub fn wrap_words(
    text: &str,
    max_width: f32,
    mut measure: impl FnMut(&str) -> f32,
) -> (Vec<WrappedLine>, bool) {
    let mut lines = Vec::new();
    let mut overflow = false;
    let mut current = String::new();
    let mut current_width = 0.0f32;

    for word in text.split_whitespace() {
        if current.is_empty() {
            current_width = measure(word);
            overflow |= current_width > max_width;
            current.push_str(word);
            continue;
        }

        let candidate = format!("{current} {word}");
        let candidate_width = measure(&candidate);
        if candidate_width <= max_width {
            current = candidate;
            current_width = candidate_width;
            continue;
        }

        lines.push(WrappedLine {
            text: std::mem::take(&mut current),
            width: current_width,
        });
        current_width = measure(word);
        overflow |= current_width > max_width;
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(WrappedLine {
            text: current,
            width: current_width,
        });
    }
    (lines, overflow)
}

/// Top edge of a text block of `total_height` placed in `region`, kept inside the canvas.
pub fn vertical_start(cfg: &LayoutConfig, region: Region, total_height: f32) -> f32 {
    let canvas_h = CANVAS_HEIGHT as f32;
    let y = match region {
        Region::Top => cfg.top_offset_px,
        Region::Center => (canvas_h - total_height) / 2.0,
        Region::Bottom => canvas_h - cfg.bottom_offset_px - total_height,
    };
    y.clamp(0.0, (canvas_h - total_height).max(0.0))
}

/// Left edge of a line of `width` centered on the canvas.
///
/// Overflowing lines stay centered and are clipped on both sides.
pub fn centered_x(width: f32) -> f32 {
    (CANVAS_WIDTH as f32 - width) / 2.0
}

/// Parley contexts bound to a single registered font.
struct Shaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl Shaper {
    fn new(face: &FontFace) -> StoryResult<Self> {
        // One blob over the provider's bytes serves both shaping and drawing.
        let blob = parley::fontique::Blob::new(face.bytes.clone());
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx.collection.register_fonts(blob.clone(), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            StoryError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| StoryError::validation("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(blob, face.index);
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    /// Single-line layout of `text`.
    fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> parley::Layout<TextBrushRgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }

    fn advance(&mut self, text: &str, size_px: f32) -> f32 {
        self.layout(text, size_px, TextBrushRgba8::default()).width()
    }
}

/// Wraps, measures and draws overlay text.
///
/// Built per composition from the resolved font. Without a usable font it still measures, using
/// a fixed per-character advance, but [`render`](Self::render) draws nothing.
pub struct TextLayoutEngine {
    cfg: LayoutConfig,
    policy: RegionPolicy,
    shaper: Option<Shaper>,
}

impl TextLayoutEngine {
    pub fn new(cfg: LayoutConfig, policy: RegionPolicy, face: Option<&FontFace>) -> Self {
        let shaper = face.and_then(|face| match Shaper::new(face) {
            Ok(shaper) => Some(shaper),
            Err(err) => {
                tracing::warn!(%err, origin = ?face.origin, "font could not be registered for shaping");
                None
            }
        });
        Self {
            cfg,
            policy,
            shaper,
        }
    }

    /// `true` when a font is available to draw with.
    pub fn can_render(&self) -> bool {
        self.shaper.is_some()
    }

    /// Size and margin used for `text`.
    pub fn style_for(&self, text: &str) -> TextStyle {
        if self.policy.is_short_phrase(text) {
            self.cfg.short
        } else {
            self.cfg.long
        }
    }

    /// Wrap and measure `text` with the style its length calls for.
    #[tracing::instrument(skip(self))]
    pub fn measure(&mut self, text: &str) -> TextBlock {
        let style = self.style_for(text);
        let size = style.font_size_px;
        let max_width = CANVAS_WIDTH.saturating_sub(style.side_margin_px * 2) as f32;
        let approx_advance = self.cfg.fallback_advance_em * size;

        let shaper = &mut self.shaper;
        let (wrapped, overflow) = wrap_words(text, max_width, |s| match shaper.as_mut() {
            Some(shaper) => shaper.advance(s, size),
            None => s.chars().count() as f32 * approx_advance,
        });

        let line_height = size + self.cfg.leading_px;
        let (lines, line_widths): (Vec<_>, Vec<_>) =
            wrapped.into_iter().map(|l| (l.text, l.width)).unzip();
        let total_height = lines.len() as f32 * line_height;
        if overflow {
            tracing::debug!(max_width, "word wider than the text column");
        }

        TextBlock {
            source: text.to_string(),
            lines,
            line_widths,
            font_size_px: size,
            line_height_px: line_height,
            total_height_px: total_height,
            max_width_px: max_width,
            overflow,
        }
    }

    /// Top-left corner of every line of `block` when placed in `region`.
    pub fn line_origins(&self, block: &TextBlock, region: Region) -> Vec<(f32, f32)> {
        let top = vertical_start(&self.cfg, region, block.total_height_px);
        block
            .line_widths
            .iter()
            .enumerate()
            .map(|(i, w)| (centered_x(*w), top + i as f32 * block.line_height_px))
            .collect()
    }

    /// Draw `block` into `canvas` at `region`: a translucent black shadow, then white text.
    ///
    /// Returns `Ok(false)` when nothing was drawn because no font is available.
    #[tracing::instrument(skip(self, canvas, block), fields(lines = block.line_count()))]
    pub fn render(
        &mut self,
        canvas: &mut StoryCanvas,
        block: &TextBlock,
        region: Region,
    ) -> StoryResult<bool> {
        if block.is_empty() {
            return Ok(true);
        }
        let origins = self.line_origins(block, region);
        let Some(shaper) = self.shaper.as_mut() else {
            return Ok(false);
        };

        let width = u16::try_from(canvas.width())
            .map_err(|_| StoryError::validation("canvas width exceeds u16"))?;
        let height = u16::try_from(canvas.height())
            .map_err(|_| StoryError::validation("canvas height exceeds u16"))?;
        let mut ctx = vello_cpu::RenderContext::new(width, height);

        let shadow = TextBrushRgba8 {
            r: 0,
            g: 0,
            b: 0,
            a: self.cfg.shadow_alpha,
        };
        let offset = f64::from(self.cfg.shadow_offset_px);
        let passes = [(shadow, offset), (TextBrushRgba8::WHITE, 0.0)];

        for (brush, dxy) in passes {
            for (line, (x, y)) in block.lines.iter().zip(&origins) {
                let layout = shaper.layout(line, block.font_size_px, brush);
                ctx.set_transform(vello_cpu::kurbo::Affine::translate((
                    f64::from(*x) + dxy,
                    f64::from(*y) + dxy,
                )));
                draw_layout(&mut ctx, &layout, &shaper.font);
            }
        }

        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);
        over_rgba8_premul_in_place(canvas.as_image_mut(), pixmap.data_as_u8_slice())?;
        Ok(true)
    }
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: &vello_cpu::peniko::FontData,
) {
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}
