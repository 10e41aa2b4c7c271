// SPDX-License-Identifier: CEPL-1.0
// winit lives here; the app and the renderer reach it through this crate
pub use winit;

use std::ops::Deref;

use crimson_render::{DrawableSize, RenderSize};
use tracing::info;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::error::OsError;
use winit::event_loop::ActiveEventLoop;
use winit::raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use winit::window::Window;

pub fn render_size(size: PhysicalSize<u32>) -> RenderSize {
    RenderSize::new(size.width, size.height)
}

/// The single application window. Owns the `winit` window; everything else
/// only borrows it.
pub struct AppWindow {
    window: Window,
}

impl AppWindow {
    pub fn create(
        event_loop: &ActiveEventLoop,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, OsError> {
        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height))
            .with_resizable(true);
        let window = event_loop.create_window(attrs)?;
        let size = window.inner_size();
        info!("window \"{title}\" created ({}x{})", size.width, size.height);
        Ok(Self { window })
    }
}

impl Deref for AppWindow {
    type Target = Window;

    fn deref(&self) -> &Window {
        &self.window
    }
}

impl HasWindowHandle for AppWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for AppWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl DrawableSize for AppWindow {
    fn drawable_size(&self) -> RenderSize {
        // minimized windows do not always report 0x0 themselves
        if self.window.is_minimized().unwrap_or(false) {
            return RenderSize::default();
        }
        render_size(self.window.inner_size())
    }
}
