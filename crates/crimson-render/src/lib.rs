// SPDX-License-Identifier: CEPL-1.0
use std::cell::Cell;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-area drawable.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Anything that can report the current drawable (framebuffer) size in pixels.
pub trait DrawableSize {
    fn drawable_size(&self) -> RenderSize;
}

impl DrawableSize for RenderSize {
    fn drawable_size(&self) -> RenderSize {
        *self
    }
}

/// Geometry-change notification raised by the window layer and consumed
/// once per frame by whoever drives presentation.
#[derive(Debug, Default)]
pub struct ResizeSignal {
    pending: Cell<bool>,
}

impl ResizeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.pending.set(true);
    }

    pub fn is_raised(&self) -> bool {
        self.pending.get()
    }

    /// Read-and-clear.
    pub fn take(&self) -> bool {
        self.pending.replace(false)
    }
}
