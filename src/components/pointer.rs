//! Window-level pointer listeners.
//!
//! Surfaces react to presses inside their own bounds, but a drag has to keep
//! tracking the pointer after it leaves the surface. For that a surface
//! registers move/up listeners on the window for the lifetime of the drag.
//! Registration hands back a [`ListenerGuard`]; dropping the guard is the only
//! way listeners go away, so drag end and teardown share one cleanup path.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A pointer position in host coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box of an input surface, as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Position of `p` relative to the box as fractions in [0, 1], clamped to
    /// the nearest edge. `None` while the box has no area.
    pub fn clamped_fraction(&self, p: Point) -> Option<(f32, f32)> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let x = (p.x - self.x).clamp(0.0, self.width);
        let y = (p.y - self.y).clamp(0.0, self.height);
        Some((x / self.width, y / self.height))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerKind {
    PointerMove,
    PointerUp,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    active: Vec<(u64, ListenerKind)>,
}

/// The window's listener table.
#[derive(Clone, Default)]
pub struct WindowListeners {
    inner: Rc<RefCell<Registry>>,
}

impl WindowListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one listener per kind and return the guard that owns them.
    pub fn register(&self, kinds: &[ListenerKind]) -> ListenerGuard {
        let mut reg = self.inner.borrow_mut();
        let mut ids = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let id = reg.next_id;
            reg.next_id += 1;
            reg.active.push((id, kind));
            ids.push(id);
        }
        log::trace!("registered window listeners {:?}", kinds);
        ListenerGuard {
            registry: Rc::downgrade(&self.inner),
            ids,
        }
    }

    /// Whether at least one listener of `kind` is live. The host uses this to
    /// decide whether window-wide events need forwarding at all.
    pub fn wants(&self, kind: ListenerKind) -> bool {
        self.inner.borrow().active.iter().any(|(_, k)| *k == kind)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns a set of registered listeners; removes them on drop.
#[must_use = "dropping the guard removes the listeners immediately"]
pub struct ListenerGuard {
    registry: Weak<RefCell<Registry>>,
    ids: Vec<u64>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .active
                .retain(|(id, _)| !self.ids.contains(id));
            log::trace!("removed {} window listeners", self.ids.len());
        }
    }
}
