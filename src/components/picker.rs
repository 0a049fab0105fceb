//! Pointer-to-color mapping for the saturation/value plane and the hue strip.

use super::colors::{ColorModel, Hsv};
use super::pointer::{Bounds, ListenerGuard, ListenerKind, Point, WindowListeners};

/// Which picking surface a press landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Surface {
    /// Saturation horizontally, value vertically (top = full brightness).
    SvPlane,
    /// Hue across the width. Click-only.
    HueStrip,
}

/// Saturation/value for a pointer over the plane.
pub fn sv_at(bounds: Bounds, p: Point) -> Option<(f32, f32)> {
    let (fx, fy) = bounds.clamped_fraction(p)?;
    Some((fx * 100.0, 100.0 - fy * 100.0))
}

/// Hue for a pointer over the strip.
pub fn hue_at(bounds: Bounds, p: Point) -> Option<f32> {
    if bounds.width <= 0.0 {
        return None;
    }
    let fx = ((p.x - bounds.x) / bounds.width).clamp(0.0, 1.0);
    Some(fx * 360.0)
}

/// Tracks the two surfaces' layout and the active drag.
///
/// The host reports surface bounds every frame through [`ColorPicker::layout`];
/// presses and window-wide moves are then translated into [`ColorModel`]
/// updates.
pub struct ColorPicker {
    plane: Bounds,
    strip: Bounds,
    window: WindowListeners,
    drag: Option<ListenerGuard>,
}

impl ColorPicker {
    pub fn new(window: WindowListeners) -> Self {
        Self {
            plane: Bounds::new(0.0, 0.0, 0.0, 0.0),
            strip: Bounds::new(0.0, 0.0, 0.0, 0.0),
            window,
            drag: None,
        }
    }

    pub fn layout(&mut self, plane: Bounds, strip: Bounds) {
        self.plane = plane;
        self.strip = strip;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Pointer pressed on the plane: start a drag and pick once. A plane
    /// without area takes no press and starts no drag.
    pub fn plane_down(&mut self, p: Point, color: &mut ColorModel) -> bool {
        if sv_at(self.plane, p).is_none() {
            return false;
        }
        if self.drag.is_none() {
            self.drag = Some(
                self.window
                    .register(&[ListenerKind::PointerMove, ListenerKind::PointerUp]),
            );
            log::debug!("drag started at ({:.1}, {:.1})", p.x, p.y);
        }
        self.pick_plane(p, color)
    }

    /// Hue strip click. Never starts a drag.
    pub fn strip_click(&mut self, p: Point, color: &mut ColorModel) -> bool {
        let Some(h) = hue_at(self.strip, p) else {
            return false;
        };
        let Hsv { s, v, .. } = color.hsv();
        color.update(h, s, v);
        true
    }

    /// Window-wide pointer move. Only acts while a drag is live.
    pub fn window_move(&mut self, p: Point, color: &mut ColorModel) -> bool {
        if self.drag.is_none() {
            return false;
        }
        self.pick_plane(p, color)
    }

    /// Window-wide pointer release anywhere ends the drag.
    pub fn window_up(&mut self) {
        if self.drag.take().is_some() {
            log::debug!("drag ended");
        }
    }

    fn pick_plane(&self, p: Point, color: &mut ColorModel) -> bool {
        let Some((s, v)) = sv_at(self.plane, p) else {
            return false;
        };
        color.update(color.hsv().h, s, v);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane() -> Bounds {
        Bounds::new(100.0, 50.0, 200.0, 160.0)
    }

    fn strip() -> Bounds {
        Bounds::new(100.0, 220.0, 200.0, 16.0)
    }

    fn picker() -> (ColorPicker, WindowListeners) {
        let window = WindowListeners::new();
        let mut picker = ColorPicker::new(window.clone());
        picker.layout(plane(), strip());
        (picker, window)
    }

    #[test]
    fn plane_corners() {
        assert_eq!(sv_at(plane(), Point::new(100.0, 50.0)), Some((0.0, 100.0)));
        assert_eq!(sv_at(plane(), Point::new(300.0, 210.0)), Some((100.0, 0.0)));
    }

    #[test]
    fn plane_clamps_outside_points() {
        assert_eq!(sv_at(plane(), Point::new(-1000.0, -1000.0)), Some((0.0, 100.0)));
        assert_eq!(sv_at(plane(), Point::new(1000.0, 1000.0)), Some((100.0, 0.0)));
        assert_eq!(sv_at(plane(), Point::new(200.0, -5.0)), Some((50.0, 100.0)));
    }

    #[test]
    fn strip_center_is_cyan_hue() {
        assert_eq!(hue_at(strip(), Point::new(200.0, 228.0)), Some(180.0));
        assert_eq!(hue_at(strip(), Point::new(-10.0, 0.0)), Some(0.0));
        assert_eq!(hue_at(strip(), Point::new(900.0, 0.0)), Some(360.0));
    }

    #[test]
    fn plane_click_keeps_hue() {
        let (mut picker, _window) = picker();
        let mut color = ColorModel::from_hsv(Hsv::new(200.0, 50.0, 50.0));
        // 25% across, 75% down
        assert!(picker.plane_down(Point::new(150.0, 170.0), &mut color));
        assert_eq!(color.hsv(), Hsv::new(200.0, 25.0, 25.0));
        assert_eq!(color.hex(), Hsv::new(200.0, 25.0, 25.0).to_hex());
    }

    #[test]
    fn strip_click_keeps_sv_and_does_not_drag() {
        let (mut picker, window) = picker();
        let mut color = ColorModel::from_hsv(Hsv::new(10.0, 40.0, 60.0));
        assert!(picker.strip_click(Point::new(200.0, 228.0), &mut color));
        assert_eq!(color.hsv(), Hsv::new(180.0, 40.0, 60.0));
        assert!(!picker.is_dragging());
        assert!(window.is_empty());
    }

    #[test]
    fn drag_lifecycle() {
        let (mut picker, window) = picker();
        let mut color = ColorModel::from_hsv(Hsv::new(90.0, 0.0, 0.0));

        assert!(!picker.window_move(Point::new(200.0, 100.0), &mut color));
        assert_eq!(color.hsv(), Hsv::new(90.0, 0.0, 0.0));

        picker.plane_down(Point::new(200.0, 130.0), &mut color);
        assert!(picker.is_dragging());
        assert!(window.wants(ListenerKind::PointerMove));
        assert_eq!(color.hsv(), Hsv::new(90.0, 50.0, 50.0));

        // Far outside the viewport still clamps.
        assert!(picker.window_move(Point::new(-5000.0, 9000.0), &mut color));
        assert_eq!(color.hsv(), Hsv::new(90.0, 0.0, 0.0));
        assert!(picker.window_move(Point::new(5000.0, -9000.0), &mut color));
        assert_eq!(color.hsv(), Hsv::new(90.0, 100.0, 100.0));

        picker.window_up();
        assert!(!picker.is_dragging());
        assert!(window.is_empty());

        assert!(!picker.window_move(Point::new(100.0, 210.0), &mut color));
        assert_eq!(color.hsv(), Hsv::new(90.0, 100.0, 100.0));
    }

    #[test]
    fn second_press_reuses_the_drag() {
        let (mut picker, window) = picker();
        let mut color = ColorModel::default();
        picker.plane_down(Point::new(150.0, 60.0), &mut color);
        picker.plane_down(Point::new(160.0, 60.0), &mut color);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn teardown_removes_listeners() {
        let (mut picker, window) = picker();
        let mut color = ColorModel::default();
        picker.plane_down(Point::new(150.0, 60.0), &mut color);
        drop(picker);
        assert!(window.is_empty());
    }

    #[test]
    fn unlaid_plane_ignores_presses() {
        let window = WindowListeners::new();
        let mut picker = ColorPicker::new(window.clone());
        let mut color = ColorModel::default();
        assert!(!picker.plane_down(Point::new(1.0, 1.0), &mut color));
        assert_eq!(color.hsv(), ColorModel::default().hsv());
        assert!(!picker.is_dragging());
        assert!(window.is_empty());
    }
}
