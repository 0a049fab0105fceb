use std::sync::Arc;
use std::time::Instant;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::colors::parse_hex;
use crate::error::LoadError;
use crate::io::{ImageLoader, LoadOutcome};

// ============================================================================
// BLEND MODES
// ============================================================================

/// The compositing operations offered in the blend selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Color,
    Multiply,
    Overlay,
    Screen,
    SoftLight,
    HardLight,
}

impl BlendMode {
    /// Returns all blend modes for UI display
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Color,
            BlendMode::Multiply,
            BlendMode::Overlay,
            BlendMode::Screen,
            BlendMode::SoftLight,
            BlendMode::HardLight,
        ]
    }

    /// Canonical operation name, as handed to the rendering backend and
    /// written to settings.
    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Color => "color",
            BlendMode::Multiply => "multiply",
            BlendMode::Overlay => "overlay",
            BlendMode::Screen => "screen",
            BlendMode::SoftLight => "soft-light",
            BlendMode::HardLight => "hard-light",
        }
    }

    /// Returns the localized display name for UI rendering
    pub fn display_name(&self) -> String {
        match self {
            BlendMode::Color => t!("blend.color"),
            BlendMode::Multiply => t!("blend.multiply"),
            BlendMode::Overlay => t!("blend.overlay"),
            BlendMode::Screen => t!("blend.screen"),
            BlendMode::SoftLight => t!("blend.soft_light"),
            BlendMode::HardLight => t!("blend.hard_light"),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::all().iter().copied().find(|m| m.name() == name)
    }
}

/// Current compositing operation of a [`Surface`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompositeOp {
    #[default]
    SourceOver,
    Blend(BlendMode),
}

impl CompositeOp {
    pub fn name(&self) -> &'static str {
        match self {
            CompositeOp::SourceOver => "source-over",
            CompositeOp::Blend(mode) => mode.name(),
        }
    }
}

// ============================================================================
// PIXEL MATH
// ============================================================================

/// Composite `top` onto `base` with `op`, scaling the top alpha by `alpha`.
///
/// Blending follows the W3C compositing model: the blended color is mixed with
/// the source by backdrop alpha, then painted source-over.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, op: CompositeOp, alpha: f32) -> Rgba<u8> {
    let alpha = alpha.clamp(0.0, 1.0);

    // Fast path: nothing painted
    if top[3] == 0 || alpha == 0.0 {
        return base;
    }

    // Fast path: plain opaque paint
    if op == CompositeOp::SourceOver && alpha >= 1.0 && top[3] == 255 {
        return top;
    }

    let cb = [
        base[0] as f32 / 255.0,
        base[1] as f32 / 255.0,
        base[2] as f32 / 255.0,
    ];
    let base_a = base[3] as f32 / 255.0;
    let cs = [
        top[0] as f32 / 255.0,
        top[1] as f32 / 255.0,
        top[2] as f32 / 255.0,
    ];
    let top_a = (top[3] as f32 / 255.0) * alpha;

    let mixed = match op {
        CompositeOp::SourceOver => cs,
        CompositeOp::Blend(mode) => {
            let b = blend_color(mode, cb, cs);
            [
                (1.0 - base_a) * cs[0] + base_a * b[0],
                (1.0 - base_a) * cs[1] + base_a * b[1],
                (1.0 - base_a) * cs[2] + base_a * b[2],
            ]
        }
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let c = (mixed[i] * top_a + cb[i] * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// B(Cb, Cs) for each mode, channels in 0..1.
fn blend_color(mode: BlendMode, cb: [f32; 3], cs: [f32; 3]) -> [f32; 3] {
    let per_channel = |f: fn(f32, f32) -> f32| [f(cb[0], cs[0]), f(cb[1], cs[1]), f(cb[2], cs[2])];
    match mode {
        BlendMode::Multiply => per_channel(|b, s| b * s),
        BlendMode::Screen => per_channel(|b, s| 1.0 - (1.0 - b) * (1.0 - s)),
        BlendMode::Overlay => per_channel(overlay_channel),
        BlendMode::HardLight => per_channel(|b, s| overlay_channel(s, b)),
        BlendMode::SoftLight => per_channel(soft_light_channel),
        BlendMode::Color => set_lum(cs, lum(cb)),
    }
}

// Blend mode helper functions
fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

/// W3C Soft Light formula.
fn soft_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base - (1.0 - 2.0 * top) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * top - 1.0) * (d - base)
    }
}

// -- Non-separable helpers (W3C "color") --------------------------

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 {
        for ch in &mut out {
            *ch = l + (*ch - l) * l / (l - n);
        }
    }
    if x > 1.0 {
        for ch in &mut out {
            *ch = l + (*ch - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

// ============================================================================
// SURFACE: the drawing target and its context state
// ============================================================================

/// A pixel buffer plus the paint state that applies to the next draw.
pub struct Surface {
    pixels: RgbaImage,
    composite_op: CompositeOp,
    global_alpha: f32,
    fill_style: [u8; 3],
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            composite_op: CompositeOp::SourceOver,
            global_alpha: 1.0,
            fill_style: [0, 0, 0],
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Reallocate as transparent `width×height`. Like a canvas element, this
    /// also resets the paint state.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn composite_op(&self) -> CompositeOp {
        self.composite_op
    }

    pub fn set_composite_op(&mut self, op: CompositeOp) {
        self.composite_op = op;
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    /// Values outside [0, 1] and NaN are ignored.
    pub fn set_global_alpha(&mut self, alpha: f32) {
        if (0.0..=1.0).contains(&alpha) {
            self.global_alpha = alpha;
        }
    }

    pub fn fill_style(&self) -> [u8; 3] {
        self.fill_style
    }

    pub fn set_fill_style(&mut self, rgb: [u8; 3]) {
        self.fill_style = rgb;
    }

    /// Draw `image` unscaled with its top-left corner at (dx, dy).
    pub fn draw_image(&mut self, image: &RgbaImage, dx: u32, dy: u32) {
        let op = self.composite_op;
        let alpha = self.global_alpha;
        let w = self.width();
        let copy_w = image.width().min(w.saturating_sub(dx));
        let copy_h = image.height().min(self.height().saturating_sub(dy));
        if copy_w == 0 || copy_h == 0 {
            return;
        }
        let row_len = (w * 4) as usize;

        self.pixels
            .par_chunks_mut(row_len)
            .enumerate()
            .skip(dy as usize)
            .take(copy_h as usize)
            .for_each(|(y, row)| {
                let sy = y as u32 - dy;
                for sx in 0..copy_w {
                    let i = ((dx + sx) * 4) as usize;
                    let base = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                    let out = blend_pixel(base, *image.get_pixel(sx, sy), op, alpha);
                    row[i..i + 4].copy_from_slice(&out.0);
                }
            });
    }

    /// Paint a rectangle with the fill style under the current op and alpha.
    /// The rectangle is clipped to the surface.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let op = self.composite_op;
        let alpha = self.global_alpha;
        let [r, g, b] = self.fill_style;
        let top = Rgba([r, g, b, 255]);
        let w = self.width();
        let x1 = x.saturating_add(width).min(w);
        let y1 = y.saturating_add(height).min(self.height());
        if x >= x1 || y >= y1 {
            return;
        }
        let row_len = (w * 4) as usize;

        self.pixels
            .par_chunks_mut(row_len)
            .enumerate()
            .skip(y as usize)
            .take((y1 - y) as usize)
            .for_each(|(_, row)| {
                for px in x..x1 {
                    let i = (px * 4) as usize;
                    let base = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                    let out = blend_pixel(base, top, op, alpha);
                    row[i..i + 4].copy_from_slice(&out.0);
                }
            });
    }
}

/// Render `image` and wash it with `color` under `mode` at `opacity`, then put
/// the surface back into its default paint state.
pub fn composite(surface: &mut Surface, image: &RgbaImage, color: [u8; 3], opacity: f32, mode: BlendMode) {
    surface.resize(image.width(), image.height());
    surface.draw_image(image, 0, 0);

    surface.set_composite_op(CompositeOp::Blend(mode));
    surface.set_fill_style(color);
    surface.set_global_alpha(opacity);
    surface.fill_rect(0, 0, surface.width(), surface.height());

    surface.set_composite_op(CompositeOp::SourceOver);
    surface.set_global_alpha(1.0);
}

// ============================================================================
// COMPOSITOR: render parameters in, pixels out
// ============================================================================

/// Everything a render depends on. Any change re-runs the full pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderParams {
    pub image_url: Option<String>,
    pub color: String,
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

/// Result of one [`Compositor::poll`].
#[derive(Debug)]
pub enum RenderEvent {
    /// The surface was recomposited.
    Composited,
    /// The latest load failed; the surface kept its previous pixels.
    Failed(LoadError),
}

/// Loads the base image for each render request and composites it once the
/// load lands.
pub struct Compositor {
    surface: Surface,
    loader: ImageLoader,
    /// Parameters of the render currently waiting on its image.
    pending: Option<RenderParams>,
    composites: u64,
    generation: u64,
}

impl Compositor {
    pub fn new(loader: ImageLoader) -> Self {
        Self {
            surface: Surface::new(0, 0),
            loader,
            pending: None,
            composites: 0,
            generation: 0,
        }
    }

    /// Start a full render. A render without an image URL leaves the surface
    /// alone.
    pub fn render(&mut self, params: &RenderParams, now: Instant) {
        let Some(url) = params.image_url.as_deref() else {
            return;
        };
        log::debug!(
            "render {} with {} at {:.0}% ({})",
            url,
            params.color,
            params.opacity * 100.0,
            params.blend_mode.name()
        );
        self.loader.request(url, now);
        self.pending = Some(params.clone());
    }

    /// Drain finished loads and composite the latest one.
    pub fn poll(&mut self, now: Instant) -> Option<RenderEvent> {
        match self.loader.poll(now)? {
            LoadOutcome::Loaded(image) => {
                let params = self.pending.take()?;
                self.apply(&image, &params);
                Some(RenderEvent::Composited)
            }
            LoadOutcome::Failed(err) => {
                self.pending = None;
                log::warn!("image load failed: {}", err);
                Some(RenderEvent::Failed(err))
            }
        }
    }

    /// Block until the pending render finishes or `max_wait` elapses.
    pub fn wait(&mut self, max_wait: std::time::Duration) -> Option<RenderEvent> {
        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(event) = self.poll(Instant::now()) {
                return Some(event);
            }
            if !self.is_busy() || Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
    }

    fn apply(&mut self, image: &Arc<RgbaImage>, params: &RenderParams) {
        let color = match parse_hex(&params.color) {
            Ok(rgb) => rgb,
            Err(e) => {
                log::warn!("skipping composite: {}", e);
                return;
            }
        };
        composite(&mut self.surface, image, color, params.opacity, params.blend_mode);
        self.composites += 1;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Number of completed composites.
    pub fn composites(&self) -> u64 {
        self.composites
    }

    /// Bumped on every composite; hosts compare it to know when to re-upload.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
