// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::vk;
use crimson_render::{DrawableSize, RenderSize};
use tracing::{debug, info, warn};

use crate::device::DeviceContext;
use crate::error::{RenderError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentModePreference {
    Fifo,
    /// Low-latency triple-buffering, where available.
    #[default]
    Mailbox,
}

/// What the surface reports for one physical device.
#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub(crate) unsafe fn query(
        loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> ash::prelude::VkResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: loader.get_physical_device_surface_capabilities(phys, surface)?,
                formats: loader.get_physical_device_surface_formats(phys, surface)?,
                present_modes: loader.get_physical_device_surface_present_modes(phys, surface)?,
            })
        }
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Prefers 8-bit BGRA in the sRGB non-linear colour space; otherwise the
/// first format the surface lists.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

/// FIFO is the only mode every surface must support.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentModePreference,
) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        _ => vk::PresentModeKHR::FIFO,
    }
}

/// The drawable size clamped into the device's reported bounds.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, drawable: RenderSize) -> vk::Extent2D {
    vk::Extent2D {
        width: drawable
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: drawable
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum; `max_image_count == 0` means unbounded.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        want
    } else {
        want.min(caps.max_image_count)
    }
}

/// Every choice that goes into a swapchain, derived from a capability
/// report and the drawable size alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub min_image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    pub fn new(
        support: &SwapchainSupport,
        drawable: RenderSize,
        preference: PresentModePreference,
    ) -> Option<Self> {
        Some(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes, preference),
            extent: choose_extent(&support.capabilities, drawable),
            min_image_count: choose_image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
        })
    }
}

/// The swapchain and everything tied to its geometry. Views, framebuffers
/// and images are always the same length.
pub struct SwapchainState {
    handle: vk::SwapchainKHR,
    plan: SwapchainPlan,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainState {
    fn empty(plan: SwapchainPlan) -> Self {
        Self {
            handle: vk::SwapchainKHR::null(),
            plan,
            images: Vec::new(),
            image_views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
        }
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.plan.surface_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.plan.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.plan.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn is_built(&self) -> bool {
        self.handle != vk::SwapchainKHR::null()
    }

    unsafe fn build(
        ctx: &DeviceContext,
        loader: &swapchain::Device,
        drawable: RenderSize,
        preference: PresentModePreference,
    ) -> Result<Self> {
        let support = unsafe {
            SwapchainSupport::query(ctx.surface_loader(), ctx.physical_device(), ctx.surface())
        }
        .map_err(RenderError::swapchain("vkGetPhysicalDeviceSurface*KHR"))?;
        let plan = SwapchainPlan::new(&support, drawable, preference).ok_or(
            RenderError::SwapchainCreation {
                call: "vkGetPhysicalDeviceSurfaceFormatsKHR",
                result: vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            },
        )?;

        let mut state = Self::empty(plan);
        if let Err(e) = unsafe { state.populate(ctx, loader) } {
            unsafe { state.destroy(ctx.device(), loader) };
            return Err(e);
        }
        debug_assert_eq!(state.images.len(), state.image_views.len());
        debug_assert_eq!(state.images.len(), state.framebuffers.len());
        Ok(state)
    }

    /// Swapchain, images, views, render pass, framebuffers. On error the
    /// partially built state is left for the caller to destroy.
    unsafe fn populate(&mut self, ctx: &DeviceContext, loader: &swapchain::Device) -> Result<()> {
        let device = ctx.device();
        let plan = self.plan;
        let families = ctx.queue_families();
        let family_indices = [families.graphics, families.present];

        let (sharing_mode, index_count) = if families.shared() {
            (vk::SharingMode::EXCLUSIVE, 0)
        } else {
            (vk::SharingMode::CONCURRENT, family_indices.len() as u32)
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: ctx.surface(),
            min_image_count: plan.min_image_count,
            image_format: plan.surface_format.format,
            image_color_space: plan.surface_format.color_space,
            image_extent: plan.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: index_count,
            p_queue_family_indices: family_indices.as_ptr(),
            pre_transform: plan.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: plan.present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };

        self.handle = unsafe { loader.create_swapchain(&swap_info, None) }
            .map_err(RenderError::swapchain("vkCreateSwapchainKHR"))?;
        self.images = unsafe { loader.get_swapchain_images(self.handle) }
            .map_err(RenderError::swapchain("vkGetSwapchainImagesKHR"))?;

        for &image in &self.images {
            let iv_info = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: plan.surface_format.format,
                components: vk::ComponentMapping::default(),
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = unsafe { device.create_image_view(&iv_info, None) }
                .map_err(RenderError::swapchain("vkCreateImageView"))?;
            self.image_views.push(view);
        }

        self.render_pass = unsafe { create_render_pass(device, plan.surface_format.format)? };

        for &view in &self.image_views {
            let fb_info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: 1,
                p_attachments: &view,
                width: plan.extent.width,
                height: plan.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = unsafe { device.create_framebuffer(&fb_info, None) }
                .map_err(RenderError::swapchain("vkCreateFramebuffer"))?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    /// Framebuffers, image views, render pass, swapchain, in that order.
    /// Images belong to the swapchain and go with it. Leaves the state
    /// empty, so calling it twice is harmless.
    unsafe fn destroy(&mut self, device: &ash::Device, loader: &swapchain::Device) {
        unsafe {
            for fb in self.framebuffers.drain(..) {
                device.destroy_framebuffer(fb, None);
            }
            for iv in self.image_views.drain(..) {
                device.destroy_image_view(iv, None);
            }
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
            loader.destroy_swapchain(self.handle, None);
            self.handle = vk::SwapchainKHR::null();
        }
        self.images.clear();
    }
}

/// Single colour attachment: clear on load, keep on store, UNDEFINED to
/// PRESENT_SRC. One subpass, no depth.
unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass> {
    let color_att = vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };
    let att_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &att_ref,
        ..Default::default()
    };
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ..Default::default()
    };
    let rp_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_att,
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    unsafe { device.create_render_pass(&rp_info, None) }
        .map_err(RenderError::swapchain("vkCreateRenderPass"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Acquired { index: u32, suboptimal: bool },
    /// The swapchain must be rebuilt; this frame is dropped.
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Present {
    Done,
    /// Out-of-date, suboptimal, or a resize is pending: rebuild before the
    /// next frame.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recreate {
    Rebuilt,
    /// The window has no drawable area right now; try again next frame.
    Deferred,
}

/// The size a rebuild may target, or `None` while the window has zero area.
pub(crate) fn recreate_gate(size: RenderSize) -> Option<RenderSize> {
    (!size.is_empty()).then_some(size)
}

/// A rebuild that failed after the window shrank to nothing is a deferral;
/// any other failure stands.
pub(crate) fn rebuild_failure(err: RenderError, now: RenderSize) -> Result<Recreate> {
    if now.is_empty() {
        warn!("swapchain rebuild interrupted by zero-area window: {err}");
        return Ok(Recreate::Deferred);
    }
    Err(err)
}

/// Maps `vkAcquireNextImageKHR`. Suboptimal still counts as acquired.
pub(crate) fn classify_acquire(r: VkResult<(u32, bool)>) -> Result<Acquire> {
    match r {
        Ok((index, suboptimal)) => Ok(Acquire::Acquired { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
        Err(e) => Err(RenderError::Acquire(e)),
    }
}

/// Maps `vkQueuePresentKHR`. `pending` marks the frame stale even when the
/// present itself was clean.
pub(crate) fn classify_present(r: VkResult<bool>, pending: bool) -> Result<Present> {
    match r {
        Ok(false) if !pending => Ok(Present::Done),
        Ok(_) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Present::Stale),
        Err(e) => Err(RenderError::Present(e)),
    }
}

/// Owns the swapchain loader, the current [`SwapchainState`], and the fence
/// used to wait out each image acquisition.
pub struct PresentationSurfaceSet {
    loader: swapchain::Device,
    state: SwapchainState,
    acquire_fence: vk::Fence,
    preference: PresentModePreference,
}

impl PresentationSurfaceSet {
    pub fn create(
        ctx: &DeviceContext,
        window: &dyn DrawableSize,
        preference: PresentModePreference,
    ) -> Result<Self> {
        let loader = swapchain::Device::new(ctx.instance(), ctx.device());
        let fence_info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            ..Default::default()
        };
        let acquire_fence = unsafe { ctx.device().create_fence(&fence_info, None) }
            .map_err(RenderError::swapchain("vkCreateFence"))?;

        let size = window.drawable_size();
        let state = match unsafe { SwapchainState::build(ctx, &loader, size, preference) } {
            Ok(s) => s,
            Err(e) => {
                unsafe { ctx.device().destroy_fence(acquire_fence, None) };
                return Err(e);
            }
        };
        log_state("swapchain ready", &state);

        Ok(Self {
            loader,
            state,
            acquire_fence,
            preference,
        })
    }

    pub fn state(&self) -> &SwapchainState {
        &self.state
    }

    /// Full teardown and rebuild against the current drawable size. Never
    /// runs while the window has zero area.
    pub fn recreate(
        &mut self,
        ctx: &DeviceContext,
        window: &dyn DrawableSize,
    ) -> Result<Recreate> {
        let Some(size) = recreate_gate(window.drawable_size()) else {
            debug!("recreate deferred, drawable has zero area");
            return Ok(Recreate::Deferred);
        };

        // nothing in flight may reference what is about to be destroyed
        ctx.wait_idle()?;
        unsafe { self.state.destroy(ctx.device(), &self.loader) };

        match unsafe { SwapchainState::build(ctx, &self.loader, size, self.preference) } {
            Ok(state) => {
                self.state = state;
                log_state("swapchain recreated", &self.state);
                Ok(Recreate::Rebuilt)
            }
            Err(e) => rebuild_failure(e, window.drawable_size()),
        }
    }

    pub fn acquire_next_image(&mut self, ctx: &DeviceContext) -> Result<Acquire> {
        let device = ctx.device();
        let acquired = unsafe {
            self.loader.acquire_next_image(
                self.state.handle,
                u64::MAX,
                vk::Semaphore::null(),
                self.acquire_fence,
            )
        };
        let acquired = classify_acquire(acquired)?;
        if let Acquire::Acquired { .. } = acquired {
            unsafe {
                let fences = std::slice::from_ref(&self.acquire_fence);
                device
                    .wait_for_fences(fences, true, u64::MAX)
                    .map_err(RenderError::Acquire)?;
                device.reset_fences(fences).map_err(RenderError::Acquire)?;
            }
        }
        Ok(acquired)
    }

    pub fn present(
        &mut self,
        ctx: &DeviceContext,
        index: u32,
        suboptimal_or_resize_pending: bool,
    ) -> Result<Present> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            swapchain_count: 1,
            p_swapchains: &self.state.handle,
            p_image_indices: &index,
            ..Default::default()
        };
        let presented = unsafe { self.loader.queue_present(ctx.present_queue(), &present) };
        classify_present(presented, suboptimal_or_resize_pending)
    }

    /// Releases the swapchain state and the acquire fence. The device must
    /// be idle.
    pub fn destroy(&mut self, ctx: &DeviceContext) {
        unsafe {
            self.state.destroy(ctx.device(), &self.loader);
            ctx.device().destroy_fence(self.acquire_fence, None);
        }
        self.acquire_fence = vk::Fence::null();
    }
}

fn log_state(what: &str, s: &SwapchainState) {
    info!(
        "{what} ({}x{}, {:?}/{:?}, {:?}, {} images)",
        s.extent().width,
        s.extent().height,
        s.surface_format().format,
        s.surface_format().color_space,
        s.present_mode(),
        s.images().len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: (u32, u32), max: (u32, u32), count: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: count.0,
            max_image_count: count.1,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn desktop_support() -> SwapchainSupport {
        SwapchainSupport {
            capabilities: caps((1, 1), (4096, 4096), (2, 8)),
            formats: vec![
                fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            ],
            present_modes: vec![
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::IMMEDIATE,
                vk::PresentModeKHR::MAILBOX,
            ],
        }
    }

    #[test]
    fn preferred_format_wins_over_first() {
        let s = desktop_support();
        let chosen = choose_surface_format(&s.formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn first_format_is_the_fallback() {
        let formats = [
            fmt(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[0]));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn mailbox_preferred_fifo_guaranteed() {
        let s = desktop_support();
        assert_eq!(
            choose_present_mode(&s.present_modes, PresentModePreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], PresentModePreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&s.present_modes, PresentModePreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_is_clamped_into_device_bounds() {
        let c = caps((64, 64), (1920, 1080), (2, 0));
        assert_eq!(
            choose_extent(&c, RenderSize::new(3000, 10)),
            vk::Extent2D {
                width: 1920,
                height: 64
            }
        );
    }

    #[test]
    fn image_count_respects_max_when_bounded() {
        assert_eq!(choose_image_count(&caps((1, 1), (1, 1), (2, 0))), 3);
        assert_eq!(choose_image_count(&caps((1, 1), (1, 1), (2, 8))), 3);
        assert_eq!(choose_image_count(&caps((1, 1), (1, 1), (3, 3))), 3);
    }

    #[test]
    fn window_800x600_yields_exact_extent_and_deterministic_choices() {
        let plan = SwapchainPlan::new(
            &desktop_support(),
            RenderSize::new(800, 600),
            PresentModePreference::Mailbox,
        )
        .unwrap();
        assert_eq!(
            plan.extent,
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        assert_eq!(plan.surface_format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(plan.min_image_count, 3);
    }

    #[test]
    fn plan_is_stable_for_stable_geometry() {
        let s = desktop_support();
        let a = SwapchainPlan::new(&s, RenderSize::new(1280, 720), PresentModePreference::Mailbox);
        let b = SwapchainPlan::new(&s, RenderSize::new(1280, 720), PresentModePreference::Mailbox);
        assert_eq!(a, b);
    }

    #[test]
    fn plan_requires_a_format() {
        let mut s = desktop_support();
        s.formats.clear();
        assert!(!s.is_adequate());
        let plan = SwapchainPlan::new(&s, RenderSize::new(800, 600), PresentModePreference::Fifo);
        assert!(plan.is_none());
    }

    #[test]
    fn zero_area_never_reaches_a_rebuild() {
        assert_eq!(recreate_gate(RenderSize::new(0, 0)), None);
        assert_eq!(recreate_gate(RenderSize::new(640, 0)), None);
        assert_eq!(recreate_gate(RenderSize::new(0, 480)), None);
        assert_eq!(
            recreate_gate(RenderSize::new(640, 480)),
            Some(RenderSize::new(640, 480))
        );
    }

    #[test]
    fn rebuild_failure_defers_only_when_window_collapsed() {
        let err = || RenderError::SwapchainCreation {
            call: "vkCreateSwapchainKHR",
            result: vk::Result::ERROR_INITIALIZATION_FAILED,
        };
        assert_eq!(
            rebuild_failure(err(), RenderSize::new(0, 0)).unwrap(),
            Recreate::Deferred
        );
        assert!(matches!(
            rebuild_failure(err(), RenderSize::new(800, 600)),
            Err(RenderError::SwapchainCreation { .. })
        ));
    }

    #[test]
    fn acquire_results_are_classified() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            Acquire::Acquired {
                index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Ok((1, true))).unwrap(),
            Acquire::Acquired {
                index: 1,
                suboptimal: true
            }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            Acquire::OutOfDate
        );
        for fatal in [
            vk::Result::ERROR_SURFACE_LOST_KHR,
            vk::Result::ERROR_DEVICE_LOST,
            vk::Result::TIMEOUT,
        ] {
            assert!(matches!(
                classify_acquire(Err(fatal)),
                Err(RenderError::Acquire(r)) if r == fatal
            ));
        }
    }

    #[test]
    fn present_results_are_classified() {
        assert_eq!(classify_present(Ok(false), false).unwrap(), Present::Done);
        assert_eq!(classify_present(Ok(false), true).unwrap(), Present::Stale);
        assert_eq!(classify_present(Ok(true), false).unwrap(), Present::Stale);
        assert_eq!(classify_present(Ok(true), true).unwrap(), Present::Stale);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), false).unwrap(),
            Present::Stale
        );
        for fatal in [vk::Result::ERROR_SURFACE_LOST_KHR, vk::Result::ERROR_DEVICE_LOST] {
            assert!(matches!(
                classify_present(Err(fatal), false),
                Err(RenderError::Present(r)) if r == fatal
            ));
        }
    }
}
