use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2};

use crate::canvas::BlendMode;
use crate::components::colors::{PRESETS, hsv_to_rgb, parse_hex};
use crate::components::picker;
use crate::components::pointer::{Bounds, ListenerKind, Point};
use crate::i18n;
use crate::io::UrlFetcher;
use crate::session::{DrawingSession, SessionConfig, example_prompts};
use crate::settings::AppSettings;

/// Logical size of the canvas frame.
const CANVAS_FRAME: f32 = 512.0;
const PLANE_SIZE: Vec2 = Vec2::new(232.0, 160.0);
const STRIP_HEIGHT: f32 = 16.0;
const SWATCH: f32 = 22.0;
/// Gradient resolution of the SV plane mesh.
const PLANE_CELLS: u32 = 24;

fn rgb(c: [u8; 3]) -> Color32 {
    Color32::from_rgb(c[0], c[1], c[2])
}

fn bounds_of(rect: Rect) -> Bounds {
    Bounds::new(rect.min.x, rect.min.y, rect.width(), rect.height())
}

fn point_of(pos: Pos2) -> Point {
    Point::new(pos.x, pos.y)
}

pub struct HuewashApp {
    session: DrawingSession,
    settings: AppSettings,
    texture: Option<TextureHandle>,
    texture_generation: u64,
}

impl HuewashApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let fetcher = UrlFetcher::new(settings.asset_root.clone(), settings.load_timeout());
        let session = DrawingSession::new(SessionConfig::from(&settings), Arc::new(fetcher));
        Self {
            session,
            settings,
            texture: None,
            texture_generation: 0,
        }
    }

    /// Re-upload the surface when the compositor produced new pixels.
    fn sync_texture(&mut self, ctx: &egui::Context) {
        let generation = self.session.compositor().generation();
        if generation == self.texture_generation {
            return;
        }
        self.texture_generation = generation;
        let surface = self.session.surface();
        if surface.width() == 0 || surface.height() == 0 {
            return;
        }
        let image = ColorImage::from_rgba_unmultiplied(
            [surface.width() as usize, surface.height() as usize],
            surface.pixels().as_raw(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => self.texture = Some(ctx.load_texture("canvas", image, TextureOptions::LINEAR)),
        }
    }

    // ------------------------------------------------------------------
    // Left toolbar
    // ------------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.add_space(6.0);
        ui.label(t!("ui.prompt"));
        let mut prompt = self.session.prompt().to_string();
        let edit = egui::TextEdit::multiline(&mut prompt)
            .hint_text(t!("ui.prompt_hint"))
            .desired_rows(3)
            .desired_width(f32::INFINITY);
        if ui.add(edit).changed() {
            self.session.set_prompt(prompt);
        }

        ui.add_space(8.0);
        ui.label(t!("ui.color"));
        let plane = self.sv_plane(ui);
        ui.add_space(4.0);
        let strip = self.hue_strip(ui);
        self.session.layout(bounds_of(plane), bounds_of(strip));

        let readout = self.session.readout();
        ui.monospace(format!(
            "#{}  H {}  S {}  V {}",
            readout.hex, readout.h, readout.s, readout.v
        ));

        ui.add_space(8.0);
        ui.label(t!("ui.blend_mode"));
        let mut mode = self.session.blend_mode();
        egui::ComboBox::from_id_source("blend_mode")
            .selected_text(mode.display_name())
            .width(PLANE_SIZE.x)
            .show_ui(ui, |ui| {
                for m in BlendMode::all() {
                    ui.selectable_value(&mut mode, *m, m.display_name());
                }
            });
        if mode != self.session.blend_mode() {
            self.session.set_blend_mode(mode);
        }

        ui.add_space(8.0);
        ui.label(t!("ui.opacity"));
        let mut percent = (self.session.opacity() * 100.0).round();
        let slider = egui::Slider::new(&mut percent, 0.0..=100.0)
            .step_by(1.0)
            .suffix("%");
        if ui.add(slider).changed() {
            self.session.set_opacity(percent / 100.0);
        }

        ui.add_space(8.0);
        ui.label(t!("ui.presets"));
        self.presets(ui);

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label(t!("ui.current_color"));
            let current = parse_hex(self.session.color().hex()).unwrap_or([0, 0, 0]);
            let (rect, _) = ui.allocate_exact_size(Vec2::splat(SWATCH), Sense::hover());
            ui.painter().rect_filled(rect, 4.0, rgb(current));
            ui.painter()
                .rect_stroke(rect, 4.0, Stroke::new(1.0, Color32::GRAY));
        });

        ui.add_space(12.0);
        let label = if self.session.is_loading() {
            t!("ui.generating")
        } else {
            t!("ui.generate")
        };
        let button = egui::Button::new(label).min_size(Vec2::new(PLANE_SIZE.x, 28.0));
        if ui.add_enabled(!self.session.is_loading(), button).clicked() {
            self.session.generate(Instant::now());
        }

        ui.add_space(4.0);
        if ui.button(t!("ui.open_image")).clicked()
            && let Some(path) = rfd::FileDialog::new()
                .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
                .pick_file()
        {
            self.session
                .set_image_url(Some(format!("file://{}", path.display())));
        }

        ui.add_space(12.0);
        self.language_picker(ui);
    }

    /// Saturation/value plane for the current hue.
    fn sv_plane(&mut self, ui: &mut egui::Ui) -> Rect {
        let (rect, response) = ui.allocate_exact_size(PLANE_SIZE, Sense::click_and_drag());
        let hsv = self.session.color().hsv().clamped();

        if ui.is_rect_visible(rect) {
            let mut mesh = egui::Mesh::default();
            let n = PLANE_CELLS;
            for row in 0..=n {
                for col in 0..=n {
                    let fx = col as f32 / n as f32;
                    let fy = row as f32 / n as f32;
                    let pos = Pos2::new(
                        rect.min.x + fx * rect.width(),
                        rect.min.y + fy * rect.height(),
                    );
                    let c = hsv_to_rgb(hsv.h, fx * 100.0, 100.0 - fy * 100.0);
                    mesh.colored_vertex(pos, rgb(c));
                }
            }
            for row in 0..n {
                for col in 0..n {
                    let i = row * (n + 1) + col;
                    mesh.add_triangle(i, i + 1, i + n + 1);
                    mesh.add_triangle(i + 1, i + n + 1, i + n + 2);
                }
            }
            let painter = ui.painter();
            painter.add(egui::Shape::mesh(mesh));

            // Indicator follows HSV, not the hex cache.
            let marker = Pos2::new(
                rect.min.x + hsv.s / 100.0 * rect.width(),
                rect.min.y + (1.0 - hsv.v / 100.0) * rect.height(),
            );
            painter.circle_stroke(marker, 6.0, Stroke::new(2.0, Color32::WHITE));
            painter.circle_stroke(marker, 7.5, Stroke::new(1.0, Color32::BLACK));
        }

        let (pressed, pos) = ui.input(|i| (i.pointer.primary_pressed(), i.pointer.interact_pos()));
        if pressed
            && response.hovered()
            && let Some(pos) = pos.map(point_of)
            && bounds_of(rect).contains(pos)
        {
            self.session.pointer_down(picker::Surface::SvPlane, pos);
        }
        rect
    }

    /// Full-spectrum hue strip. Click only.
    fn hue_strip(&mut self, ui: &mut egui::Ui) -> Rect {
        let size = Vec2::new(PLANE_SIZE.x, STRIP_HEIGHT);
        let (rect, response) = ui.allocate_exact_size(size, Sense::click());

        if ui.is_rect_visible(rect) {
            let segs: u32 = 36;
            let mut mesh = egui::Mesh::default();
            for i in 0..=segs {
                let f = i as f32 / segs as f32;
                let x = rect.min.x + f * rect.width();
                let c = rgb(hsv_to_rgb(f * 360.0, 100.0, 100.0));
                mesh.colored_vertex(Pos2::new(x, rect.min.y), c);
                mesh.colored_vertex(Pos2::new(x, rect.max.y), c);
            }
            for i in 0..segs {
                let b = i * 2;
                mesh.add_triangle(b, b + 1, b + 2);
                mesh.add_triangle(b + 1, b + 2, b + 3);
            }
            let painter = ui.painter();
            painter.add(egui::Shape::mesh(mesh));

            let hue = self.session.color().hsv().clamped().h;
            let x = rect.min.x + hue / 360.0 * rect.width();
            painter.line_segment(
                [Pos2::new(x, rect.min.y - 2.0), Pos2::new(x, rect.max.y + 2.0)],
                Stroke::new(2.0, Color32::WHITE),
            );
        }

        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            self.session.pointer_down(picker::Surface::HueStrip, point_of(pos));
        }
        rect
    }

    fn presets(&mut self, ui: &mut egui::Ui) {
        for row in PRESETS.iter() {
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 4.0;
                for hex in row {
                    let Ok(c) = parse_hex(hex) else { continue };
                    let (rect, response) = ui.allocate_exact_size(Vec2::splat(SWATCH), Sense::click());
                    ui.painter().rect_filled(rect, 3.0, rgb(c));
                    ui.painter()
                        .rect_stroke(rect, 3.0, Stroke::new(1.0, Color32::from_gray(160)));
                    if response.on_hover_text(*hex).clicked()
                        && let Err(e) = self.session.select_preset(hex)
                    {
                        log::warn!("preset {} rejected: {}", hex, e);
                    }
                }
            });
        }
    }

    fn language_picker(&mut self, ui: &mut egui::Ui) {
        let current = i18n::current_language();
        let current_name = i18n::LANGUAGES
            .iter()
            .find(|(code, _)| *code == current)
            .map(|(_, name)| *name)
            .unwrap_or("English");
        ui.horizontal(|ui| {
            ui.label(t!("ui.language"));
            egui::ComboBox::from_id_source("language")
                .selected_text(current_name)
                .show_ui(ui, |ui| {
                    for (code, name) in i18n::LANGUAGES {
                        if ui.selectable_label(current == *code, *name).clicked() && current != *code {
                            i18n::set_language(code);
                            self.settings.language = code.to_string();
                            self.settings.save();
                        }
                    }
                });
        });
    }

    // ------------------------------------------------------------------
    // Canvas and examples
    // ------------------------------------------------------------------

    fn canvas(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(12.0);
            if let Some(err) = self.session.error().map(str::to_string) {
                ui.horizontal(|ui| {
                    ui.colored_label(Color32::from_rgb(220, 60, 60), err);
                    if ui.small_button(t!("ui.dismiss")).clicked() {
                        self.session.dismiss_error();
                    }
                });
            }

            let (frame, _) = ui.allocate_exact_size(Vec2::splat(CANVAS_FRAME), Sense::hover());
            let painter = ui.painter_at(frame);
            painter.rect_filled(frame, 8.0, Color32::from_gray(245));

            if let Some(texture) = &self.texture {
                let size = texture.size_vec2();
                let scale = (CANVAS_FRAME / size.x).min(CANVAS_FRAME / size.y);
                let rect = Rect::from_center_size(frame.center(), size * scale);
                painter.image(
                    texture.id(),
                    rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            } else if !self.session.is_rendering() {
                painter.text(
                    frame.center(),
                    egui::Align2::CENTER_CENTER,
                    t!("ui.empty_canvas"),
                    egui::FontId::proportional(16.0),
                    Color32::GRAY,
                );
            }

            let status = if self.session.is_loading() {
                Some(t!("ui.generating"))
            } else if self.session.is_rendering() {
                Some(t!("ui.loading_image"))
            } else {
                None
            };
            if let Some(status) = status {
                painter.rect_filled(frame, 8.0, Color32::from_rgba_unmultiplied(255, 255, 255, 160));
                painter.text(
                    frame.center(),
                    egui::Align2::CENTER_CENTER,
                    status,
                    egui::FontId::proportional(18.0),
                    Color32::DARK_GRAY,
                );
            }
        });
    }

    fn examples(&mut self, ui: &mut egui::Ui) {
        ui.add_space(6.0);
        ui.heading(t!("ui.examples"));
        ui.add_space(6.0);
        for (i, text) in example_prompts().into_iter().enumerate() {
            let button = egui::Button::new(text).min_size(Vec2::new(ui.available_width(), 28.0));
            if ui.add(button).clicked() {
                self.session.use_example(i);
            }
        }
    }

    /// Forward window-wide pointer moves and releases while a drag wants them.
    fn window_pointer(&mut self, ctx: &egui::Context) {
        let listeners = self.session.listeners();
        let wants_move = listeners.wants(ListenerKind::PointerMove);
        let wants_up = listeners.wants(ListenerKind::PointerUp);
        if !wants_move && !wants_up {
            return;
        }
        let (pos, released) = ctx.input(|i| (i.pointer.latest_pos(), i.pointer.any_released()));
        if wants_move && let Some(pos) = pos {
            self.session.pointer_move(point_of(pos));
        }
        if wants_up && released {
            self.session.pointer_up();
        }
    }
}

impl eframe::App for HuewashApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.session.tick(Instant::now()) {
            ctx.request_repaint();
        }
        self.sync_texture(ctx);

        egui::SidePanel::left("toolbar")
            .resizable(false)
            .exact_width(PLANE_SIZE.x + 24.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.toolbar(ui));
            });

        egui::SidePanel::right("examples")
            .resizable(false)
            .exact_width(200.0)
            .show(ctx, |ui| self.examples(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        self.window_pointer(ctx);

        if let Some(left) = self.session.generation_remaining(Instant::now()) {
            ctx.request_repaint_after(left);
        }
        if self.session.is_rendering() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }
}
