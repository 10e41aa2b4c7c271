// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use crimson_render::{DrawableSize, ResizeSignal};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

use crate::device::DeviceContext;
use crate::error::{RenderError, Result};
use crate::frame::{FrameBackend, FrameDriver, FrameOutcome, FrameRequest};
use crate::overlay::{FrameTimingOverlay, Overlay, OverlayInit};
use crate::swapchain::{
    Acquire, Present, PresentModePreference, PresentationSurfaceSet, Recreate,
};

#[derive(Clone, Copy, Debug)]
pub struct VkConfig {
    pub clear_color: [f32; 4],
    pub present_mode: PresentModePreference,
    /// Khronos validation layer + debug-utils messenger.
    pub validation: bool,
    /// Per-type capacity of the overlay descriptor pool. Exhaustion is fatal.
    pub descriptor_budget: u32,
    pub overlay: bool,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.15, 1.0],
            present_mode: PresentModePreference::Mailbox,
            validation: cfg!(debug_assertions),
            descriptor_budget: 1000,
            overlay: true,
        }
    }
}

/// The real [`FrameBackend`]: the device context and presentation set,
/// borrowed for one call into the driver.
struct VkFrameBackend<'a> {
    device: &'a DeviceContext,
    surfaces: &'a mut PresentationSurfaceSet,
}

impl FrameBackend for VkFrameBackend<'_> {
    fn image_count(&self) -> usize {
        self.surfaces.state().framebuffers().len()
    }

    fn extent(&self) -> vk::Extent2D {
        self.surfaces.state().extent()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.surfaces.state().render_pass()
    }

    fn recreate(&mut self, window: &dyn DrawableSize) -> Result<Recreate> {
        self.surfaces.recreate(self.device, window)
    }

    fn acquire(&mut self) -> Result<Acquire> {
        self.surfaces.acquire_next_image(self.device)
    }

    fn begin_frame(&mut self, image_index: u32, clear: [f32; 4]) -> Result<FrameRequest> {
        let device = self.device.device();
        let state = self.surfaces.state();
        let framebuffer = *state
            .framebuffers()
            .get(image_index as usize)
            .ok_or(RenderError::ImageIndexOutOfRange {
                index: image_index,
                count: state.framebuffers().len(),
            })?;

        let cmd = self.device.allocate_command_buffer()?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        if let Err(e) = unsafe { device.begin_command_buffer(cmd, &begin) } {
            self.device.free_command_buffer(cmd);
            return Err(RenderError::recording("vkBeginCommandBuffer")(e));
        }

        let clears = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        }];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: state.render_pass(),
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: state.extent(),
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe { device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE) };

        Ok(FrameRequest {
            image_index,
            command_buffer: cmd,
        })
    }

    fn end_frame(&mut self, frame: &FrameRequest) -> Result<()> {
        let device = self.device.device();
        unsafe {
            device.cmd_end_render_pass(frame.command_buffer);
            device
                .end_command_buffer(frame.command_buffer)
                .map_err(RenderError::recording("vkEndCommandBuffer"))
        }
    }

    fn submit(&mut self, frame: &FrameRequest) -> Result<()> {
        self.device.submit_and_wait(frame.command_buffer)
    }

    fn present(&mut self, image_index: u32, stale_hint: bool) -> Result<Present> {
        self.surfaces.present(self.device, image_index, stale_hint)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }

    fn release(&mut self, frame: FrameRequest) {
        self.device.free_command_buffer(frame.command_buffer);
    }

    fn teardown(&mut self) {
        self.surfaces.destroy(self.device);
    }
}

/// Does nothing; stands in when the overlay is disabled.
struct NoOverlay;

impl Overlay for NoOverlay {
    fn initialize(&mut self, _init: &OverlayInit<'_>) -> Result<()> {
        Ok(())
    }
    fn begin_frame_content(&mut self) {}
    fn record_into(&mut self, _target: &crate::overlay::OverlayTarget) {}
    fn shutdown(&mut self) {}
}

/// Owns the whole GPU side of one window. Dropping it releases, in order:
/// overlay resources, the swapchain set, then device-scoped resources.
pub struct VkContext {
    overlay: Box<dyn Overlay>,
    driver: FrameDriver,
    surfaces: PresentationSurfaceSet,
    device: DeviceContext,
}

impl VkContext {
    pub fn new<W>(window: &W, cfg: &VkConfig) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + DrawableSize,
    {
        let overlay: Box<dyn Overlay> = if cfg.overlay {
            Box::new(FrameTimingOverlay::new())
        } else {
            Box::new(NoOverlay)
        };
        Self::with_overlay(window, cfg, overlay)
    }

    pub fn with_overlay<W>(
        window: &W,
        cfg: &VkConfig,
        mut overlay: Box<dyn Overlay>,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + DrawableSize,
    {
        let device = DeviceContext::new(window, window, cfg)?;
        let mut surfaces = PresentationSurfaceSet::create(&device, window, cfg.present_mode)?;

        let init = OverlayInit {
            device: &device,
            render_pass: surfaces.state().render_pass(),
            image_count: surfaces.state().images().len(),
            descriptor_pool: device.descriptor_pool(),
        };
        if let Err(e) = overlay.initialize(&init) {
            device.wait_idle().ok();
            surfaces.destroy(&device);
            return Err(e);
        }

        info!("Vulkan context ready on {}", device.device_name());
        Ok(Self {
            overlay,
            driver: FrameDriver::new(cfg.clear_color),
            surfaces,
            device,
        })
    }

    /// One frame-driver iteration. Staleness is handled here; only fatal
    /// errors come back.
    pub fn render_frame(
        &mut self,
        window: &dyn DrawableSize,
        resize: &ResizeSignal,
    ) -> Result<FrameOutcome> {
        let mut backend = VkFrameBackend {
            device: &self.device,
            surfaces: &mut self.surfaces,
        };
        self.driver
            .run_frame(&mut backend, self.overlay.as_mut(), window, resize)
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.driver.set_clear_color(rgba);
    }

    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    pub fn surfaces(&self) -> &PresentationSurfaceSet {
        &self.surfaces
    }

    pub fn driver(&self) -> &FrameDriver {
        &self.driver
    }
}

impl Drop for VkContext {
    fn drop(&mut self) {
        let mut backend = VkFrameBackend {
            device: &self.device,
            surfaces: &mut self.surfaces,
        };
        self.driver.shutdown(&mut backend, self.overlay.as_mut());
        info!(
            "Vulkan context released ({} frames, {} swapchain rebuilds)",
            self.driver.frames_presented(),
            self.driver.recreations()
        );
        // `device` drops last: pools, device, surface, messenger, instance
    }
}
