//! The drawing component: owns the color, the picker, the compositor and the
//! generation stub, and re-renders whenever a render input changes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::canvas::{BlendMode, Compositor, RenderEvent, RenderParams, Surface};
use crate::components::colors::{ColorModel, Readout};
use crate::components::picker::{self, ColorPicker};
use crate::components::pointer::{Bounds, Point, WindowListeners};
use crate::error::ColorParseError;
use crate::generate::Generator;
use crate::io::{ImageFetch, ImageLoader};
use crate::settings::AppSettings;

/// Locale keys of the example prompts, in display order.
pub const EXAMPLE_PROMPTS: [&str; 4] = [
    "examples.cute_cat",
    "examples.fantasy_landscape",
    "examples.space_background",
    "examples.illustration_style",
];

/// Localized example prompts.
pub fn example_prompts() -> Vec<String> {
    EXAMPLE_PROMPTS.iter().map(|key| t!(key)).collect()
}

/// What raised the banner. A successful composite only clears load errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSource {
    Load,
    Generation,
}

/// Called with the new parameters after every change.
pub type RenderObserver = Box<dyn FnMut(&RenderParams)>;

/// Startup values for a [`DrawingSession`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub image_url: Option<String>,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub generation_delay: Duration,
    pub generation_timeout: Duration,
    pub placeholder_url: String,
    pub load_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for SessionConfig {
    fn from(settings: &AppSettings) -> Self {
        let image_url = Some(settings.default_image_url.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        Self {
            image_url,
            opacity: settings.default_opacity.clamp(0.0, 1.0),
            blend_mode: settings.default_blend_mode,
            generation_delay: settings.generation_delay(),
            generation_timeout: settings.generation_timeout(),
            placeholder_url: settings.placeholder_url.clone(),
            load_timeout: settings.load_timeout(),
        }
    }
}

pub struct DrawingSession {
    color: ColorModel,
    picker: ColorPicker,
    window: WindowListeners,
    opacity: f32,
    blend_mode: BlendMode,
    image_url: Option<String>,
    prompt: String,
    generator: Generator,
    compositor: Compositor,
    /// Localized message shown over the canvas.
    error: Option<(ErrorSource, String)>,
    last: Option<RenderParams>,
    observers: Vec<RenderObserver>,
}

impl DrawingSession {
    /// Build the session and kick off the first render.
    pub fn new(config: SessionConfig, fetcher: Arc<dyn ImageFetch>) -> Self {
        let window = WindowListeners::new();
        let loader = ImageLoader::new(fetcher, config.load_timeout);
        let mut session = Self {
            color: ColorModel::default(),
            picker: ColorPicker::new(window.clone()),
            window,
            opacity: config.opacity,
            blend_mode: config.blend_mode,
            image_url: config.image_url,
            prompt: String::new(),
            generator: Generator::new(
                config.generation_delay,
                config.generation_timeout,
                config.placeholder_url,
            ),
            compositor: Compositor::new(loader),
            error: None,
            last: None,
            observers: Vec::new(),
        };
        session.publish(Instant::now());
        session
    }

    // ---- observer pipeline ------------------------------------------------

    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            image_url: self.image_url.clone(),
            color: self.color.hex().to_string(),
            opacity: self.opacity,
            blend_mode: self.blend_mode,
        }
    }

    /// Register a callback run after every render-input change.
    pub fn subscribe(&mut self, observer: RenderObserver) {
        self.observers.push(observer);
    }

    /// Re-render if any render input differs from the last published set.
    fn publish(&mut self, now: Instant) {
        let params = self.render_params();
        if self.last.as_ref() == Some(&params) {
            return;
        }
        self.compositor.render(&params, now);
        for observer in &mut self.observers {
            observer(&params);
        }
        self.last = Some(params);
    }

    /// Advance the pending generation and image load. Returns `true` when
    /// something visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if let Some(result) = self.generator.poll(now) {
            changed = true;
            match result {
                Ok(url) => {
                    self.image_url = Some(url);
                    self.publish(now);
                }
                Err(e) => {
                    self.error = Some((ErrorSource::Generation, t!("ui.generate_failed", reason = e)))
                }
            }
        }

        if let Some(event) = self.compositor.poll(now) {
            changed = true;
            match event {
                RenderEvent::Composited => {
                    if self.error_source() == Some(ErrorSource::Load) {
                        self.error = None;
                    }
                }
                RenderEvent::Failed(e) => {
                    self.error = Some((ErrorSource::Load, t!("ui.load_failed", reason = e)))
                }
            }
        }
        changed
    }

    // ---- pointer input ----------------------------------------------------

    /// Report where the host laid out the plane and the hue strip this frame.
    pub fn layout(&mut self, plane: Bounds, strip: Bounds) {
        self.picker.layout(plane, strip);
    }

    /// Pointer pressed on one of the picking surfaces.
    pub fn pointer_down(&mut self, surface: picker::Surface, p: Point) {
        let changed = match surface {
            picker::Surface::SvPlane => self.picker.plane_down(p, &mut self.color),
            picker::Surface::HueStrip => self.picker.strip_click(p, &mut self.color),
        };
        if changed {
            self.publish(Instant::now());
        }
    }

    /// Window-level pointer move.
    pub fn pointer_move(&mut self, p: Point) {
        if self.picker.window_move(p, &mut self.color) {
            self.publish(Instant::now());
        }
    }

    /// Window-level pointer release.
    pub fn pointer_up(&mut self) {
        self.picker.window_up();
    }

    /// The window-level listener registry. Hosts forward moves and releases
    /// only while it wants them.
    pub fn listeners(&self) -> &WindowListeners {
        &self.window
    }

    pub fn is_dragging(&self) -> bool {
        self.picker.is_dragging()
    }

    // ---- controls ---------------------------------------------------------

    /// Preset swatch. Sets the hex directly; the HSV triple is left as is.
    pub fn select_preset(&mut self, hex: &str) -> Result<(), ColorParseError> {
        self.color.set_direct(hex)?;
        self.publish(Instant::now());
        Ok(())
    }

    /// Opacity in 0..=1. NaN is ignored.
    pub fn set_opacity(&mut self, opacity: f32) {
        if opacity.is_nan() {
            return;
        }
        self.opacity = opacity.clamp(0.0, 1.0);
        self.publish(Instant::now());
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
        self.publish(Instant::now());
    }

    pub fn set_image_url(&mut self, url: Option<String>) {
        self.image_url = url;
        self.publish(Instant::now());
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Overwrite the prompt with an example. Returns `false` for an unknown index.
    pub fn use_example(&mut self, index: usize) -> bool {
        let Some(key) = EXAMPLE_PROMPTS.get(index) else {
            return false;
        };
        self.prompt = t!(key);
        true
    }

    /// Start the generation stub. Ignored while one is already running.
    pub fn generate(&mut self, now: Instant) -> bool {
        if !self.generator.start(now) {
            return false;
        }
        log::info!("generate requested for prompt {:?}", self.prompt);
        self.error = None;
        true
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    // ---- state ------------------------------------------------------------

    pub fn color(&self) -> &ColorModel {
        &self.color
    }

    pub fn readout(&self) -> Readout {
        self.color.readout()
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn is_loading(&self) -> bool {
        self.generator.is_loading()
    }

    pub fn is_rendering(&self) -> bool {
        self.compositor.is_busy()
    }

    /// Time until the pending generation resolves.
    pub fn generation_remaining(&self, now: Instant) -> Option<Duration> {
        self.generator.remaining(now)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|(_, message)| message.as_str())
    }

    pub fn error_source(&self) -> Option<ErrorSource> {
        self.error.as_ref().map(|(source, _)| *source)
    }

    pub fn surface(&self) -> &Surface {
        self.compositor.surface()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }
}
